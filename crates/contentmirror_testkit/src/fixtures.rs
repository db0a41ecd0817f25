//! Record builders and seeded store fixtures.

use contentmirror_core::{
    Config, ContentType, ContentTypeRegistry, FieldDescriptor, FieldKind, Link, LinkType,
    LocaleConfig, Record,
};
use contentmirror_protocol::MockSource;
use contentmirror_store::{ContentStore, MemoryStore, SqlStore};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Locale every fixture writes to.
pub const FIXTURE_LOCALE: &str = "en-US";

/// Builds a published entry (revision 1) from a JSON object of field values.
///
/// Values are stored under [`FIXTURE_LOCALE`]. Non-object `fields` are ignored.
pub fn entry(id: &str, content_type: &str, fields: Value) -> Record {
    let mut record = Record::entry(id, content_type).with_revision(1);
    if let Value::Object(fields) = fields {
        for (name, value) in fields {
            record.set_field(&name, FIXTURE_LOCALE, value);
        }
    }
    record
}

/// Builds a published asset with a title and file url.
pub fn asset(id: &str, title: &str, url: &str) -> Record {
    Record::asset(id)
        .with_revision(1)
        .with_field("title", FIXTURE_LOCALE, title)
        .with_field("file", FIXTURE_LOCALE, serde_json::json!({ "url": url }))
}

/// A link to an entry, as stored in a field.
pub fn link_to(id: &str) -> Value {
    Link::entry(id).to_value()
}

/// A link to an asset, as stored in a field.
pub fn asset_link(id: &str) -> Value {
    Link::asset(id).to_value()
}

/// Locales used by the blog fixtures: `en-US` (default) and `de-DE` falling back to it.
pub fn fixture_locales() -> LocaleConfig {
    LocaleConfig::new(FIXTURE_LOCALE).with_locale("de-DE", Some(FIXTURE_LOCALE))
}

/// Configuration matching the fixtures.
pub fn fixture_config() -> Config {
    Config::new().locales(fixture_locales())
}

/// Schema of the blog corpus.
pub fn blog_registry() -> ContentTypeRegistry {
    ContentTypeRegistry::new()
        .with(
            ContentType::new("author")
                .with_display_field("name")
                .with_field(FieldDescriptor::new("name", FieldKind::Symbol).required())
                .with_field(FieldDescriptor::link("avatar", LinkType::Asset)),
        )
        .with(
            ContentType::new("post")
                .with_display_field("title")
                .with_field(FieldDescriptor::new("title", FieldKind::Symbol).localized())
                .with_field(FieldDescriptor::new("slug", FieldKind::Symbol).required())
                .with_field(FieldDescriptor::new("views", FieldKind::Integer))
                .with_field(FieldDescriptor::new("featured", FieldKind::Boolean))
                .with_field(FieldDescriptor::link("author", LinkType::Entry))
                .with_field(FieldDescriptor::links("related", LinkType::Entry))
                .with_field(FieldDescriptor::link("hero", LinkType::Asset)),
        )
}

/// A small blog: two authors, three posts, one asset.
///
/// `p1` and `p2` are written by Ada, `p3` by Grace. `p1` and `p2` list each
/// other as related, and `p1` has a German title.
pub fn blog_records() -> Vec<Record> {
    use serde_json::json;
    vec![
        asset("img1", "Portrait", "//images/ada.png"),
        entry("au1", "author", json!({ "name": "Ada", "avatar": asset_link("img1") })),
        entry("au2", "author", json!({ "name": "Grace" })),
        entry(
            "p1",
            "post",
            json!({
                "title": "Engines",
                "slug": "/engines",
                "views": 120,
                "featured": true,
                "author": link_to("au1"),
                "related": [link_to("p2")],
                "hero": asset_link("img1"),
            }),
        )
        .with_field("title", "de-DE", "Maschinen"),
        entry(
            "p2",
            "post",
            json!({
                "title": "Notes",
                "slug": "/notes",
                "views": 40,
                "featured": false,
                "author": link_to("au1"),
                "related": [link_to("p1")],
            }),
        ),
        entry(
            "p3",
            "post",
            json!({
                "title": "Compilers",
                "slug": "/compilers",
                "views": 300,
                "author": link_to("au2"),
            }),
        ),
    ]
}

/// Indexes `records` into `store`, panicking on failure.
pub fn seed<S: ContentStore + ?Sized>(store: &S, records: impl IntoIterator<Item = Record>) {
    for record in records {
        store.index(record).expect("Failed to seed record");
    }
}

/// A memory store with the blog registry holding `records`.
pub fn seeded_memory_store(records: impl IntoIterator<Item = Record>) -> MemoryStore {
    let store = MemoryStore::new(fixture_config()).with_registry(blog_registry());
    seed(&store, records);
    store
}

/// An in-memory SQLite store with the blog registry holding `records`.
pub fn seeded_sql_store(records: impl IntoIterator<Item = Record>) -> SqlStore {
    let store = SqlStore::open_in_memory(fixture_config())
        .expect("Failed to open in-memory sql store")
        .with_registry(blog_registry());
    seed(&store, records);
    store
}

/// A mock source that has published `records`, in order.
pub fn seeded_source(records: impl IntoIterator<Item = Record>) -> Arc<MockSource> {
    let source = Arc::new(MockSource::new());
    source.publish_all(records);
    source
}

/// A file-backed SQLite store removed on drop.
pub struct TestSqlStore {
    /// The store.
    pub store: SqlStore,
    path: PathBuf,
    // Declared last so the connection closes before the directory goes away.
    _temp_dir: TempDir,
}

impl TestSqlStore {
    /// Creates an empty store in a fresh temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("mirror.sqlite");
        let store = SqlStore::open(&path, fixture_config()).expect("Failed to open sql store");
        Self {
            store,
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Returns the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes and reopens the database file.
    pub fn reopen(self) -> Self {
        let Self {
            store,
            path,
            _temp_dir,
        } = self;
        drop(store);
        let store = SqlStore::open(&path, fixture_config()).expect("Failed to reopen sql store");
        Self {
            store,
            path,
            _temp_dir,
        }
    }
}

impl Default for TestSqlStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestSqlStore {
    type Target = SqlStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs `f` against a temporary file-backed SQLite store.
pub fn with_temp_sql_store<F, R>(f: F) -> R
where
    F: FnOnce(&SqlStore, &Path) -> R,
{
    let test_store = TestSqlStore::new();
    f(&test_store.store, test_store.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentmirror_store::StoreExt;

    #[test]
    fn entry_builder_uses_fixture_locale() {
        let record = entry("e1", "post", serde_json::json!({ "slug": "/a" }));
        assert_eq!(record.revision(), Some(1));
        assert_eq!(record.field("slug", &[FIXTURE_LOCALE]), Some(&serde_json::json!("/a")));
    }

    #[test]
    fn blog_corpus_matches_registry() {
        let registry = blog_registry();
        for record in blog_records() {
            let Some(content_type) = record.sys.content_type.as_deref() else {
                continue;
            };
            for name in record.fields.keys() {
                registry.validate_field(content_type, name).unwrap();
            }
        }
    }

    #[test]
    fn seeded_stores_agree() {
        let memory = seeded_memory_store(blog_records());
        let sql = seeded_sql_store(blog_records());
        let a = memory.find_all("post").gte("views", 100).unwrap().to_vec().unwrap();
        let b = sql.find_all("post").gte("views", 100).unwrap().to_vec().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn temp_sql_store_survives_reopen() {
        let test_store = TestSqlStore::new();
        seed(&*test_store, blog_records());
        let test_store = test_store.reopen();
        assert!(test_store.find("p1").unwrap().is_some());
        assert!(test_store.path().exists());
    }

    #[test]
    fn seeded_source_publishes_in_order() {
        use contentmirror_protocol::ContentSource;
        let source = seeded_source(blog_records());
        let page = source.sync(None).unwrap();
        assert_eq!(page.items.len(), 6);
        assert_eq!(page.items[0].id(), "img1");
    }
}
