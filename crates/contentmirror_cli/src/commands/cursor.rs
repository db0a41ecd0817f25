//! Cursor command implementation.

use super::CliError;
use contentmirror_core::RecordKind;
use contentmirror_store::{ContentStore, SqlStore};
use std::io::Write;

/// Shows the cursor stored under `key`, deleting it first when `reset` is set.
pub fn run(store: &SqlStore, key: &str, reset: bool, out: &mut impl Write) -> Result<(), CliError> {
    let current = match store.find(key)? {
        Some(record) if record.kind() == RecordKind::SyncToken => record.token,
        Some(record) => {
            return Err(format!("record {key:?} is a {}, not a sync cursor", record.kind()).into())
        }
        None => None,
    };

    if reset {
        store.delete(key)?;
        tracing::info!(key, "cursor reset");
        writeln!(out, "Cursor reset (was {})", current.as_deref().unwrap_or("unset"))?;
    } else {
        writeln!(out, "{}", current.as_deref().unwrap_or("(none)"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_core::Record;
    use contentmirror_testkit::seeded_sql_store;

    #[test]
    fn show_and_reset() {
        let store = seeded_sql_store(vec![Record::sync_token("sync_token", "mock-9")]);

        let mut out = Vec::new();
        run(&store, "sync_token", false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "mock-9");

        run(&store, "sync_token", true, &mut Vec::new()).unwrap();
        assert!(store.find("sync_token").unwrap().is_none());
    }

    #[test]
    fn refuses_non_cursor_records() {
        let store = seeded_sql_store(vec![Record::entry("sync_token", "post").with_revision(1)]);
        assert!(run(&store, "sync_token", true, &mut Vec::new()).is_err());
        assert!(store.find("sync_token").unwrap().is_some());
    }
}
