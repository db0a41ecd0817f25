//! SQLite store.
//!
//! Records are kept as JSON bodies in one table. Queries compile to SQL over
//! SQLite's JSON functions, so filtering, link hops and paging run inside
//! the database.

mod compile;

use crate::error::{StoreError, StoreResult};
use crate::include::collect_includes;
use crate::query::{QueryResult, QuerySpec};
use crate::stats::StoreStats;
use crate::store::{apply_indexed, ContentStore, RevisionDecision};
use compile::compile;
use contentmirror_core::{Config, ContentTypeRegistry, Record};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    id           TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,
    content_type TEXT,
    revision     INTEGER,
    body         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS records_content_type ON records (content_type);
";

/// Upper bound of ids per `IN (...)` lookup, below SQLite's variable limit.
const FETCH_CHUNK: usize = 500;

/// A store backed by a SQLite database.
///
/// A single connection is shared behind a mutex, so all operations on one
/// store are serialized.
#[derive(Debug)]
pub struct SqlStore {
    config: Config,
    registry: Option<ContentTypeRegistry>,
    conn: Mutex<Connection>,
    stats: StoreStats,
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |e| StoreError::Connection(format!("{context}: {e}"))
}

impl SqlStore {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>, config: Config) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(db_err("failed to open database"))?;
        info!(path = %path.display(), "opened sql store");
        Self::with_connection(conn, config)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory(config: Config) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("failed to open database"))?;
        Self::with_connection(conn, config)
    }

    fn with_connection(conn: Connection, config: Config) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(db_err("failed to initialize schema"))?;
        debug!("sql store schema ready");
        Ok(Self {
            config,
            registry: None,
            conn: Mutex::new(conn),
            stats: StoreStats::new(),
        })
    }

    /// Validates query field names against `registry`.
    #[must_use]
    pub fn with_registry(mut self, registry: ContentTypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Returns the operation counters.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }

    /// Returns the number of stored records, including sync tokens.
    pub fn len(&self) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .map_err(db_err("failed to count records"))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the number of records per content type, ordered by content type.
    pub fn content_type_counts(&self) -> StoreResult<Vec<(String, usize)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT content_type, COUNT(*) FROM records
                 WHERE content_type IS NOT NULL
                 GROUP BY content_type ORDER BY content_type",
            )
            .map_err(db_err("failed to prepare statement"))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_err("failed to count content types"))?;

        let mut counts = Vec::new();
        for row in rows {
            let (content_type, count) = row.map_err(db_err("failed to read row"))?;
            counts.push((content_type, usize::try_from(count).unwrap_or(0)));
        }
        Ok(counts)
    }
}

fn read_row(conn: &Connection, id: &str) -> StoreResult<Option<Record>> {
    let body: Option<String> = conn
        .query_row("SELECT body FROM records WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()
        .map_err(db_err("failed to read record"))?;
    body.map(|b| Record::from_json(&b).map_err(StoreError::from))
        .transpose()
}

fn write_row(conn: &Connection, id: &str, record: &Record) -> StoreResult<()> {
    let body = record.to_json()?;
    let revision = record.revision().and_then(|r| i64::try_from(r).ok());
    conn.execute(
        "INSERT OR REPLACE INTO records (id, kind, content_type, revision, body)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            id,
            record.kind().as_str(),
            record.content_type_id(),
            revision,
            body
        ],
    )
    .map_err(db_err("failed to write record"))?;
    Ok(())
}

fn remove_row(conn: &Connection, id: &str) -> StoreResult<()> {
    conn.execute("DELETE FROM records WHERE id = ?1", params![id])
        .map_err(db_err("failed to delete record"))?;
    Ok(())
}

fn fetch_many(conn: &Connection, ids: &[String]) -> StoreResult<Vec<Record>> {
    let mut records = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(FETCH_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!("SELECT body FROM records WHERE id IN ({placeholders})");
        let mut stmt = conn
            .prepare(&sql)
            .map_err(db_err("failed to prepare include lookup"))?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))
            .map_err(db_err("failed to load included records"))?;
        for body in rows {
            let body = body.map_err(db_err("failed to read row"))?;
            records.push(Record::from_json(&body)?);
        }
    }
    Ok(records)
}

impl ContentStore for SqlStore {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn registry(&self) -> Option<&ContentTypeRegistry> {
        self.registry.as_ref()
    }

    fn find(&self, id: &str) -> StoreResult<Option<Record>> {
        self.stats.record_find();
        read_row(&self.conn.lock(), id)
    }

    fn set(&self, id: &str, record: Record) -> StoreResult<Option<Record>> {
        self.stats.record_write();
        let conn = self.conn.lock();
        let prior = read_row(&conn, id)?;
        write_row(&conn, id, &record)?;
        Ok(prior)
    }

    fn delete(&self, id: &str) -> StoreResult<Option<Record>> {
        self.stats.record_delete();
        let conn = self.conn.lock();
        let existing = read_row(&conn, id)?;
        remove_row(&conn, id)?;
        Ok(existing)
    }

    fn index(&self, record: Record) -> StoreResult<Option<Record>> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .map_err(db_err("failed to begin transaction"))?;
        let existing = read_row(&tx, record.id())?;
        let is_deletion = record.is_deletion();

        let (decision, result) = apply_indexed(
            self.backend_name(),
            existing,
            record,
            |r| write_row(&tx, r.id(), r),
            |id| remove_row(&tx, id),
        )?;
        tx.commit().map_err(db_err("failed to commit"))?;

        match decision {
            RevisionDecision::Reject => self.stats.record_rejected_write(),
            RevisionDecision::Apply if is_deletion => self.stats.record_delete(),
            RevisionDecision::Apply => self.stats.record_write(),
        }
        Ok(result)
    }

    fn supports_indexing(&self) -> bool {
        true
    }

    fn execute(&self, spec: &QuerySpec) -> StoreResult<QueryResult> {
        self.stats.record_query();
        let compiled = compile(spec);
        let conn = self.conn.lock();

        let total: i64 = conn
            .query_row(
                &compiled.count_sql,
                params_from_iter(compiled.params.iter()),
                |row| row.get(0),
            )
            .map_err(db_err("failed to count matches"))?;

        let mut stmt = conn
            .prepare(&compiled.select_sql)
            .map_err(db_err("failed to prepare query"))?;
        let rows = stmt
            .query_map(
                params_from_iter(compiled.params.iter().chain(compiled.page.iter())),
                |row| row.get::<_, String>(0),
            )
            .map_err(db_err("failed to run query"))?;

        let mut items = Vec::new();
        for body in rows {
            let body = body.map_err(db_err("failed to read row"))?;
            items.push(Record::from_json(&body)?);
        }

        let included = collect_includes(&items, spec.options.include, |ids| fetch_many(&conn, ids))?;

        debug!(
            content_type = %spec.content_type,
            conditions = spec.conditions.len(),
            total,
            returned = items.len(),
            "sql query"
        );
        Ok(QueryResult {
            items,
            included,
            total: usize::try_from(total).unwrap_or(0),
        })
    }
}
