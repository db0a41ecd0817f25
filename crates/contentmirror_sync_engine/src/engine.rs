//! The delta sync loop.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::event::{EventBus, SyncEvent, SyncSubscriber};
use crate::state::{SyncOutcome, SyncState, SyncStats};
use contentmirror_core::{Record, RecordKind};
use contentmirror_protocol::ContentSource;
use contentmirror_store::ContentStore;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, info, warn};

/// Keeps a [`ContentStore`] current with the delta stream of a [`ContentSource`].
///
/// Calls to [`next`](Self::next) are serialized per engine: a second caller
/// blocks until the first returns. Reads from the store are not affected.
///
/// Subscribers run on the syncing thread while the call is in progress.
/// Calling [`next`](Self::next), [`reset`](Self::reset) or
/// [`cursor`](Self::cursor) from a subscriber fails with
/// [`SyncError::Reentrant`].
///
/// # Example
///
/// ```rust
/// use contentmirror_core::{Config, Record};
/// use contentmirror_protocol::MockSource;
/// use contentmirror_store::{ContentStore, MemoryStore};
/// use contentmirror_sync_engine::{SyncConfig, SyncEngine};
/// use std::sync::Arc;
///
/// let source = MockSource::new();
/// source.publish(Record::entry("e1", "page").with_revision(1));
///
/// let store = Arc::new(MemoryStore::new(Config::default()));
/// let engine = SyncEngine::new(SyncConfig::default(), source, Arc::clone(&store));
///
/// let outcome = engine.next(Some("e1")).unwrap();
/// assert!(outcome.found);
/// assert!(store.find("e1").unwrap().is_some());
/// ```
pub struct SyncEngine<S: ContentSource, St: ContentStore + ?Sized> {
    config: SyncConfig,
    source: S,
    store: Arc<St>,
    events: EventBus,
    /// Held for the duration of `next`. Caches the cursor once loaded.
    cursor: Mutex<Option<String>>,
    /// Thread currently inside `next`.
    running_on: Mutex<Option<ThreadId>>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

/// Clears the running thread when `next` returns or unwinds.
struct RunMarker<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for RunMarker<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

impl<S: ContentSource, St: ContentStore + ?Sized> SyncEngine<S, St> {
    /// Creates an engine writing into `store`.
    pub fn new(config: SyncConfig, source: S, store: Arc<St>) -> Self {
        Self {
            config,
            source,
            store,
            events: EventBus::new(),
            cursor: Mutex::new(None),
            running_on: Mutex::new(None),
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the store being synced.
    pub fn store(&self) -> &Arc<St> {
        &self.store
    }

    /// Returns the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Returns a snapshot of the statistics.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns the event bus.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Registers a subscriber.
    pub fn add_subscriber(&self, subscriber: Arc<dyn SyncSubscriber>) {
        self.events.add_subscriber(subscriber);
    }

    /// Returns a receiver for all future events.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Pulls and applies every pending change.
    ///
    /// Reports whether `up_to_id` appeared in the stream. Source errors are
    /// returned as-is; the items applied before the failure stay applied and
    /// the cursor is left where it was, so the next call replays them.
    #[tracing::instrument(skip(self))]
    pub fn next(&self, up_to_id: Option<&str>) -> SyncResult<SyncOutcome> {
        let mut cursor = self.lock_cursor()?;
        *self.running_on.lock() = Some(thread::current().id());
        let _running = RunMarker(&self.running_on);

        let result = self.run(&mut cursor, up_to_id);
        self.set_state(SyncState::Idle);

        match &result {
            Ok(outcome) => {
                let mut stats = self.stats.write();
                stats.calls += 1;
                stats.items_applied += outcome.applied as u64;
                stats.last_cursor = cursor.clone();
                stats.last_error = None;
            }
            Err(err) => {
                warn!(error = %err, "sync failed");
                self.stats.write().last_error = Some(err.to_string());
            }
        }
        result
    }

    /// Calls [`next`](Self::next) until `up_to_id` shows up, sleeping between
    /// attempts according to the configured [`RetryPolicy`](crate::RetryPolicy).
    ///
    /// Retryable errors are retried too. The last outcome is returned when the
    /// attempts run out without seeing the id.
    pub fn next_with_retry(&self, up_to_id: Option<&str>) -> SyncResult<SyncOutcome> {
        let policy = &self.config.retry;
        let mut attempt = 0;
        loop {
            match self.next(up_to_id) {
                Ok(outcome) if outcome.found || up_to_id.is_none() => return Ok(outcome),
                Ok(outcome) if !policy.has_attempts_after(attempt) => return Ok(outcome),
                Ok(_) => debug!(attempt, ?up_to_id, "id not seen yet, rescheduling"),
                Err(err) if policy.should_retry(attempt, &err) => {
                    debug!(attempt, error = %err, "retrying sync");
                }
                Err(err) => return Err(err),
            }
            attempt += 1;
            std::thread::sleep(policy.delay_for_attempt(attempt));
        }
    }

    /// Forgets the cursor so the next call performs an initial sync.
    pub fn reset(&self) -> SyncResult<()> {
        let mut cursor = self.lock_cursor()?;
        self.store.delete(&self.config.cursor_key)?;
        *cursor = None;
        self.stats.write().last_cursor = None;
        info!(key = %self.config.cursor_key, "sync cursor reset");
        Ok(())
    }

    /// Returns the cursor the next call will start from.
    pub fn cursor(&self) -> SyncResult<Option<String>> {
        let mut cursor = self.lock_cursor()?;
        if cursor.is_none() {
            *cursor = self.load_cursor()?;
        }
        Ok(cursor.clone())
    }

    fn lock_cursor(&self) -> SyncResult<MutexGuard<'_, Option<String>>> {
        if *self.running_on.lock() == Some(thread::current().id()) {
            return Err(SyncError::Reentrant);
        }
        Ok(self.cursor.lock())
    }

    fn run(&self, cursor: &mut Option<String>, up_to_id: Option<&str>) -> SyncResult<SyncOutcome> {
        if cursor.is_none() {
            *cursor = self.load_cursor()?;
        }
        let start = cursor.clone();
        debug!(cursor = ?start, "sync started");

        let mut outcome = SyncOutcome::default();
        let mut summary = Vec::new();
        let mut next_cursor = start.clone();
        let mut pages = 0;
        loop {
            self.set_state(SyncState::Fetching);
            let page = self.source.sync(next_cursor.as_deref())?;
            pages += 1;
            self.stats.write().pages_fetched += 1;

            self.set_state(SyncState::Applying);
            for item in page.items {
                if up_to_id == Some(item.id()) {
                    outcome.found = true;
                }
                if item.kind() == RecordKind::SyncToken {
                    warn!(id = item.id(), "ignoring cursor record in delta stream");
                    continue;
                }
                self.store.index(item.clone())?;
                outcome.applied += 1;
                summary.push(item.identity());
                if let Some(event) = SyncEvent::from_record(item) {
                    self.events.publish(&event);
                }
            }
            next_cursor = Some(page.next_cursor);

            if !page.has_more {
                break;
            }
            if self.config.max_pages_per_call.is_some_and(|max| pages >= max) {
                outcome.more_pending = true;
                break;
            }
        }

        self.events.publish(&SyncEvent::SyncComplete(summary));

        if let Some(token) = &next_cursor {
            if next_cursor != start {
                self.store
                    .index(Record::sync_token(&self.config.cursor_key, token))?;
            }
        }
        *cursor = next_cursor;

        info!(
            applied = outcome.applied,
            pages,
            found = outcome.found,
            cursor = ?cursor,
            "sync batch finished"
        );
        Ok(outcome)
    }

    fn load_cursor(&self) -> SyncResult<Option<String>> {
        let Some(record) = self.store.find(&self.config.cursor_key)? else {
            return Ok(None);
        };
        match (record.kind(), record.token) {
            (RecordKind::SyncToken, Some(token)) => Ok(Some(token)),
            (kind, _) => Err(SyncError::InvalidCursor(format!(
                "record {} is a {kind} without a token",
                self.config.cursor_key
            ))),
        }
    }

    fn set_state(&self, state: SyncState) {
        *self.state.write() = state;
    }
}

impl<S: ContentSource, St: ContentStore + ?Sized> std::fmt::Debug for SyncEngine<S, St> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("config", &self.config)
            .field("backend", &self.store.backend_name())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryPolicy;
    use crate::event::SubscriberError;
    use contentmirror_core::{Config, RecordIdentity};
    use contentmirror_protocol::{MockSource, SourceError};
    use contentmirror_store::{MemoryStore, StoreExt};
    use std::time::Duration;

    fn setup(page_size: usize) -> (Arc<MockSource>, Arc<MemoryStore>, SyncEngine<Arc<MockSource>, MemoryStore>) {
        let source = Arc::new(MockSource::with_page_size(page_size));
        let store = Arc::new(MemoryStore::new(Config::default()));
        let engine = SyncEngine::new(SyncConfig::default(), Arc::clone(&source), Arc::clone(&store));
        (source, store, engine)
    }

    fn page(id: &str, revision: u64) -> Record {
        Record::entry(id, "page")
            .with_revision(revision)
            .with_field("title", "en-US", format!("{id} r{revision}"))
    }

    #[test]
    fn subscriber_reentry_is_an_error() {
        let (source, _store, engine) = setup(10);
        let engine = Arc::new(engine);
        let weak = Arc::downgrade(&engine);
        let results = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = Arc::clone(&results);
        engine.add_subscriber(Arc::new(move |_: &SyncEvent| -> Result<(), SubscriberError> {
            if let Some(engine) = weak.upgrade() {
                seen.lock().push((
                    matches!(engine.next(None), Err(SyncError::Reentrant)),
                    matches!(engine.cursor(), Err(SyncError::Reentrant)),
                ));
            }
            Ok(())
        }));

        source.publish(page("e1", 1));
        assert_eq!(engine.next(None).unwrap().applied, 1);
        assert_eq!(*results.lock(), vec![(true, true), (true, true)]);

        assert_eq!(engine.cursor().unwrap().as_deref(), Some("mock-1"));
        assert!(engine.next(None).is_ok());
    }

    #[test]
    fn initial_sync_applies_everything_and_persists_cursor() {
        let (source, store, engine) = setup(2);
        source.publish_all(vec![page("e1", 1), page("e2", 1), Record::asset("a1").with_revision(1)]);

        let outcome = engine.next(None).unwrap();
        assert_eq!(outcome.applied, 3);
        assert!(!outcome.found);
        assert_eq!(store.find_all("page").count().unwrap(), 2);
        assert!(store.find("a1").unwrap().is_some());

        let token = store.find("sync_token").unwrap().unwrap();
        assert_eq!(token.kind(), RecordKind::SyncToken);
        assert_eq!(token.token.as_deref(), Some("mock-3"));
        assert_eq!(source.sync_calls(), vec![None, Some("mock-2".to_string())]);

        let stats = engine.stats();
        assert_eq!(stats.calls, 1);
        assert_eq!(stats.items_applied, 3);
        assert_eq!(stats.pages_fetched, 2);
        assert_eq!(stats.last_cursor.as_deref(), Some("mock-3"));
        assert_eq!(engine.state(), SyncState::Idle);
    }

    #[test]
    fn second_call_resumes_from_cursor() {
        let (source, _, engine) = setup(10);
        source.publish(page("e1", 1));
        engine.next(None).unwrap();

        source.publish(page("e2", 1));
        let outcome = engine.next(Some("e2")).unwrap();
        assert!(outcome.found);
        assert_eq!(outcome.applied, 1);
        assert_eq!(source.sync_calls()[1].as_deref(), Some("mock-1"));
    }

    #[test]
    fn events_per_item_then_one_summary() {
        let (source, _, engine) = setup(1);
        source.publish_all(vec![
            page("e1", 1),
            Record::asset("a1").with_revision(1),
            Record::deleted_entry("e1").with_revision(2),
            Record::deleted_asset("a1").with_revision(2),
        ]);
        let rx = engine.subscribe();
        engine.next(None).unwrap();

        let names: Vec<_> = rx.try_iter().map(|e| e.name()).collect();
        assert_eq!(
            names,
            vec!["Entry", "Asset", "DeletedEntry", "DeletedAsset", "SyncComplete"]
        );
    }

    #[test]
    fn summary_is_pruned_to_identities() {
        let (source, _, engine) = setup(10);
        source.publish_all(vec![page("e1", 1), Record::deleted_entry("e0").with_revision(1)]);
        let rx = engine.subscribe();
        engine.next(None).unwrap();

        let complete = rx.try_iter().last().unwrap();
        assert_eq!(
            complete,
            SyncEvent::SyncComplete(vec![
                RecordIdentity { id: "e1".into(), kind: RecordKind::Entry },
                RecordIdentity { id: "e0".into(), kind: RecordKind::DeletedEntry },
            ])
        );
    }

    #[test]
    fn deletions_remove_records() {
        let (source, store, engine) = setup(10);
        source.publish(page("e1", 1));
        engine.next(None).unwrap();
        source.publish(Record::deleted_entry("e1").with_revision(2));
        engine.next(None).unwrap();
        assert!(store.find("e1").unwrap().is_none());
    }

    #[test]
    fn out_of_order_revisions_keep_the_newer_record() {
        let (source, store, engine) = setup(10);
        source.publish_all(vec![page("e1", 3), page("e1", 2)]);
        let outcome = engine.next(None).unwrap();
        assert_eq!(outcome.applied, 2);
        assert_eq!(store.find("e1").unwrap().unwrap().revision(), Some(3));
        assert_eq!(store.stats().rejected_writes(), 1);
    }

    #[test]
    fn failing_subscriber_does_not_abort_sync() {
        let (source, store, engine) = setup(10);
        source.publish_all(vec![page("e1", 1), page("e2", 1)]);
        let broken = |_: &SyncEvent| -> Result<(), SubscriberError> { Err("handler down".into()) };
        engine.add_subscriber(Arc::new(broken));
        let rx = engine.subscribe();

        let outcome = engine.next(None).unwrap();
        assert_eq!(outcome.applied, 2);
        assert_eq!(rx.try_iter().count(), 3);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn source_errors_propagate_and_keep_cursor() {
        let (source, store, engine) = setup(10);
        source.publish(page("e1", 1));
        engine.next(None).unwrap();

        source.publish(page("e2", 1));
        source.fail_next(SourceError::transport_retryable("connection reset"));
        let err = engine.next(None).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(engine.state(), SyncState::Idle);
        assert!(engine.stats().last_error.is_some());
        assert!(store.find("e2").unwrap().is_none());
        assert_eq!(engine.cursor().unwrap().as_deref(), Some("mock-1"));

        engine.next(None).unwrap();
        assert!(store.find("e2").unwrap().is_some());
        assert!(engine.stats().last_error.is_none());
    }

    #[test]
    fn restarted_engine_reads_cursor_from_store() {
        let (source, store, engine) = setup(10);
        source.publish(page("e1", 1));
        engine.next(None).unwrap();
        drop(engine);

        let engine = SyncEngine::new(SyncConfig::default(), Arc::clone(&source), Arc::clone(&store));
        source.publish(page("e2", 1));
        let outcome = engine.next(None).unwrap();
        assert_eq!(outcome.applied, 1);
        assert_eq!(source.sync_calls().last().unwrap().as_deref(), Some("mock-1"));
    }

    #[test]
    fn reset_forces_initial_sync() {
        let (source, store, engine) = setup(10);
        source.publish(page("e1", 1));
        engine.next(None).unwrap();

        engine.reset().unwrap();
        assert!(store.find("sync_token").unwrap().is_none());
        assert_eq!(engine.next(None).unwrap().applied, 1);
        assert_eq!(source.sync_calls().last().unwrap(), &None);
    }

    #[test]
    fn page_cap_leaves_rest_for_next_call() {
        let source = Arc::new(MockSource::with_page_size(1));
        let store = Arc::new(MemoryStore::new(Config::default()));
        let config = SyncConfig::new().with_max_pages_per_call(2);
        let engine = SyncEngine::new(config, Arc::clone(&source), store);
        source.publish_all((1..=3).map(|i| page(&format!("e{i}"), 1)));

        let first = engine.next(None).unwrap();
        assert_eq!(first.applied, 2);
        assert!(first.more_pending);
        let second = engine.next(None).unwrap();
        assert_eq!(second.applied, 1);
        assert!(!second.more_pending);
    }

    #[test]
    fn invalid_cursor_record() {
        let (_, store, engine) = setup(10);
        store.set("sync_token", page("sync_token", 1)).unwrap();
        assert!(matches!(engine.next(None), Err(SyncError::InvalidCursor(_))));
    }

    #[test]
    fn retry_until_id_appears() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new(Config::default()));
        let retry = RetryPolicy::new(3).with_initial_delay(Duration::ZERO);
        let engine = SyncEngine::new(SyncConfig::new().with_retry(retry), Arc::clone(&source), store);

        source.fail_next(SourceError::transport_retryable("flaky"));
        source.publish(page("e1", 1));
        let outcome = engine.next_with_retry(Some("e1")).unwrap();
        assert!(outcome.found);
        assert_eq!(source.sync_calls().len(), 2);

        let outcome = engine.next_with_retry(Some("never")).unwrap();
        assert!(!outcome.found);
        assert_eq!(source.sync_calls().len(), 5);
    }

    #[test]
    fn fatal_errors_are_not_retried() {
        let source = Arc::new(MockSource::new());
        let store = Arc::new(MemoryStore::new(Config::default()));
        let retry = RetryPolicy::new(5).with_initial_delay(Duration::ZERO);
        let engine = SyncEngine::new(SyncConfig::new().with_retry(retry), Arc::clone(&source), store);

        source.fail_next(SourceError::Protocol("garbage".into()));
        assert!(engine.next_with_retry(None).is_err());
        assert_eq!(source.sync_calls().len(), 1);
    }

    #[test]
    fn concurrent_calls_are_serialized() {
        let (source, store, engine) = setup(3);
        source.publish_all((0..30).map(|i| page(&format!("e{i}"), 1)));
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.next(None).unwrap().applied)
            })
            .collect();
        let applied: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(applied, 30);
        assert_eq!(store.find_all("page").count().unwrap(), 30);
        assert_eq!(engine.stats().calls, 4);
    }
}
