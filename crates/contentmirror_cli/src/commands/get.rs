//! Get command implementation.

use super::CliError;
use contentmirror_store::{ContentStore, SqlStore};
use std::io::Write;

/// Prints the record stored under `id` as JSON.
pub fn run(store: &SqlStore, id: &str, out: &mut impl Write) -> Result<(), CliError> {
    let record = store.find(id)?.ok_or_else(|| format!("No record with id {id:?}"))?;
    writeln!(out, "{}", serde_json::to_string_pretty(&record)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_testkit::{blog_records, seed, TestSqlStore};

    #[test]
    fn prints_record_json() {
        let store = TestSqlStore::new();
        seed(&*store, blog_records());

        let mut out = Vec::new();
        run(&store, "au1", &mut out).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(json["sys"]["id"], "au1");
        assert_eq!(json["fields"]["name"]["en-US"], "Ada");

        assert!(run(&store, "missing", &mut Vec::new()).is_err());
    }
}
