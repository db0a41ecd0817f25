//! Resolve command implementation.

use super::CliError;
use contentmirror_resolve::{LinkResolver, ResolveOptions};
use contentmirror_store::{ContentStore, SqlStore};
use std::io::Write;

/// Prints `id` with links resolved `depth` levels deep.
pub fn run(
    store: &SqlStore,
    id: &str,
    depth: usize,
    locale: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let record = store.find(id)?.ok_or_else(|| format!("No record with id {id:?}"))?;
    let mut options = ResolveOptions::new(depth);
    if let Some(locale) = locale {
        options = options.with_locale(locale);
    }

    let resolver = LinkResolver::new(store, store.config().locales.clone());
    let graph = resolver.resolve_with(&record, &options)?;
    tracing::debug!(id, nodes = graph.len(), lookups = graph.lookups(), "resolved");
    writeln!(out, "{}", serde_json::to_string_pretty(&graph.root().to_json())?)?;
    Ok(())
}
