//! Schema-driven walk over raw record fields.

use crate::error::ResolveResult;
use contentmirror_core::{
    collect_links, ContentTypeRegistry, FieldDescriptor, FieldKind, LinkType, Record,
};
use contentmirror_store::RecordLookup;
use serde_json::Value;
use std::collections::HashSet;
use tracing::trace;

/// One value handed to a [`LinkVisitor`] callback.
#[derive(Debug, Clone, Copy)]
pub struct Visit<'a> {
    /// Record holding the value.
    pub record: &'a Record,
    /// Schema of the field.
    pub field: &'a FieldDescriptor,
    /// Locale of the value, `None` only when the record has no locale information.
    pub locale: Option<&'a str>,
    /// The raw value.
    pub value: &'a Value,
    /// Link hops from the starting record.
    pub depth: usize,
}

/// Walks the fields of raw records according to their content type.
///
/// Unlike [`LinkResolver`](crate::LinkResolver) nothing is materialized:
/// the callback sees each stored value once per locale. The field and kind
/// filters only select what reaches the callback. Entry links are followed
/// through every link field up to the configured depth, and each record is
/// visited at most once per walk.
///
/// Records whose content type is not registered are skipped.
#[derive(Debug, Clone)]
pub struct LinkVisitor<'r> {
    registry: &'r ContentTypeRegistry,
    fields: Option<Vec<String>>,
    kinds: Option<Vec<FieldKind>>,
    depth: usize,
}

impl<'r> LinkVisitor<'r> {
    /// Creates a visitor that does not follow links.
    pub fn new(registry: &'r ContentTypeRegistry) -> Self {
        Self {
            registry,
            fields: None,
            kinds: None,
            depth: 0,
        }
    }

    /// Only reports the named fields.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Only reports fields of the given kinds.
    #[must_use]
    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = FieldKind>) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Follows entry links up to `depth` hops.
    #[must_use]
    pub const fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Walks `record`, calling `callback` for every selected value.
    ///
    /// Returns the number of callback invocations.
    pub fn visit<L, F>(&self, record: &Record, lookup: &L, mut callback: F) -> ResolveResult<usize>
    where
        L: RecordLookup + ?Sized,
        F: FnMut(&Visit<'_>),
    {
        let mut seen = HashSet::new();
        seen.insert(record.id().to_string());
        self.walk(record, 0, lookup, &mut callback, &mut seen)
    }

    fn selects(&self, field: &FieldDescriptor) -> bool {
        let by_name = self
            .fields
            .as_ref()
            .map_or(true, |names| names.iter().any(|n| *n == field.id));
        let by_kind = self
            .kinds
            .as_ref()
            .map_or(true, |kinds| kinds.contains(&field.kind));
        by_name && by_kind
    }

    fn walk<L, F>(
        &self,
        record: &Record,
        depth: usize,
        lookup: &L,
        callback: &mut F,
        seen: &mut HashSet<String>,
    ) -> ResolveResult<usize>
    where
        L: RecordLookup + ?Sized,
        F: FnMut(&Visit<'_>),
    {
        let Some(content_type) = record
            .content_type_id()
            .and_then(|id| self.registry.get(id))
        else {
            trace!(id = record.id(), "no schema, skipping");
            return Ok(0);
        };

        let mut visited = 0;
        let mut targets = Vec::new();
        for field in &content_type.fields {
            for (locale, value) in localized_values(record, &field.id) {
                if self.selects(field) {
                    callback(&Visit {
                        record,
                        field,
                        locale,
                        value,
                        depth,
                    });
                    visited += 1;
                }
                if depth < self.depth && field.links_entries() {
                    collect_links(value, &mut targets);
                }
            }
        }

        for link in targets {
            if link.link_type != LinkType::Entry || !seen.insert(link.id.clone()) {
                continue;
            }
            match lookup.lookup(&link.id)? {
                Some(target) if !target.is_deletion() => {
                    visited += self.walk(&target, depth + 1, lookup, callback, seen)?;
                }
                _ => trace!(id = %link.id, "link target not found"),
            }
        }
        Ok(visited)
    }
}

/// Lists `(locale, value)` pairs of one field in either record shape.
fn localized_values<'a>(record: &'a Record, name: &str) -> Vec<(Option<&'a str>, &'a Value)> {
    let Some(raw) = record.fields.get(name) else {
        return Vec::new();
    };
    match (record.sys.locale.as_deref(), raw) {
        (Some(locale), value) => vec![(Some(locale), value)],
        (None, Value::Object(by_locale)) => by_locale
            .iter()
            .map(|(locale, value)| (Some(locale.as_str()), value))
            .collect(),
        (None, value) => vec![(None, value)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_core::{Config, ContentType, Link};
    use contentmirror_store::{ContentStore, MemoryStore};
    use serde_json::json;

    fn registry() -> ContentTypeRegistry {
        ContentTypeRegistry::new()
            .with(
                ContentType::new("page")
                    .with_field(FieldDescriptor::new("title", FieldKind::Symbol).localized())
                    .with_field(FieldDescriptor::link("hero", LinkType::Asset))
                    .with_field(FieldDescriptor::links("sections", LinkType::Entry)),
            )
            .with(
                ContentType::new("section")
                    .with_field(FieldDescriptor::new("body", FieldKind::Text))
                    .with_field(FieldDescriptor::link("parent", LinkType::Entry)),
            )
    }

    fn fixture() -> (MemoryStore, Record) {
        let store = MemoryStore::new(Config::default());
        let page = Record::entry("home", "page")
            .with_field("title", "en-US", "Home")
            .with_field("title", "de-DE", "Start")
            .with_field("hero", "en-US", Link::asset("img"))
            .with_field(
                "sections",
                "en-US",
                json!([Link::entry("s1").to_value(), Link::entry("s2").to_value()]),
            );
        store.index(page.clone()).unwrap();
        for id in ["s1", "s2"] {
            store
                .index(
                    Record::entry(id, "section")
                        .with_field("body", "en-US", format!("body of {id}"))
                        .with_field("parent", "en-US", Link::entry("home")),
                )
                .unwrap();
        }
        (store, page)
    }

    #[test]
    fn visits_every_locale_without_following_links() {
        let registry = registry();
        let (store, page) = fixture();
        let mut seen = Vec::new();
        let count = LinkVisitor::new(&registry)
            .visit(&page, &store, |visit| {
                seen.push((visit.field.id.clone(), visit.locale.map(str::to_string)));
            })
            .unwrap();
        assert_eq!(count, 4);
        assert!(seen.contains(&("title".to_string(), Some("de-DE".to_string()))));
        assert_eq!(store.stats().finds(), 0);
    }

    #[test]
    fn kind_filter_selects_asset_links() {
        let registry = registry();
        let (store, page) = fixture();
        let mut links = Vec::new();
        LinkVisitor::new(&registry)
            .with_kinds([FieldKind::Link])
            .visit(&page, &store, |visit| {
                links.extend(Link::from_value(visit.value));
            })
            .unwrap();
        assert_eq!(links, vec![Link::asset("img")]);
    }

    #[test]
    fn follows_entry_links_once_each() {
        let registry = registry();
        let (store, page) = fixture();
        let mut bodies = Vec::new();
        LinkVisitor::new(&registry)
            .with_fields(["body"])
            .with_depth(5)
            .visit(&page, &store, |visit| {
                assert_eq!(visit.depth, 1);
                bodies.push(visit.value.clone());
            })
            .unwrap();
        assert_eq!(bodies, vec![json!("body of s1"), json!("body of s2")]);
        // "home" is never fetched again through the parent links.
        assert_eq!(store.stats().finds(), 2);
    }

    #[test]
    fn unregistered_types_are_skipped() {
        let registry = registry();
        let (store, _) = fixture();
        let record = Record::entry("x", "unknown").with_field("title", "en-US", "X");
        let count = LinkVisitor::new(&registry)
            .visit(&record, &store, |_| panic!("no callback expected"))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn single_locale_records() {
        let registry = registry();
        let (store, _) = fixture();
        let record = Record::entry("s9", "section")
            .with_locale("de-DE")
            .with_field("body", "ignored", "Text");
        let mut locales = Vec::new();
        LinkVisitor::new(&registry)
            .visit(&record, &store, |visit| locales.push(visit.locale.map(str::to_string)))
            .unwrap();
        assert_eq!(locales, vec![Some("de-DE".to_string())]);
    }
}
