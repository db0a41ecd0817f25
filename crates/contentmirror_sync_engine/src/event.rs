//! Events published while syncing.
//!
//! Every applied item is published as one event, followed by a single
//! [`SyncEvent::SyncComplete`] per `next` call. Subscribers are either
//! [`SyncSubscriber`] implementations, called in registration order, or
//! channels handed out by [`EventBus::subscribe`].
//!
//! A subscriber that returns an error or panics is logged and skipped. It
//! never stops delivery to the others or aborts the sync.

use contentmirror_core::{Record, RecordIdentity, RecordKind};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tracing::warn;

/// Error type subscribers may return.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// A change observed in the delta stream.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// An entry was created or updated.
    Entry(Record),
    /// An asset was created or updated.
    Asset(Record),
    /// An entry was deleted.
    DeletedEntry(Record),
    /// An asset was deleted.
    DeletedAsset(Record),
    /// A `next` call finished. Carries the identities of every item it applied.
    SyncComplete(Vec<RecordIdentity>),
}

impl SyncEvent {
    /// Wraps a delta item. Cursor records produce no event.
    pub fn from_record(record: Record) -> Option<Self> {
        match record.kind() {
            RecordKind::Entry => Some(SyncEvent::Entry(record)),
            RecordKind::Asset => Some(SyncEvent::Asset(record)),
            RecordKind::DeletedEntry => Some(SyncEvent::DeletedEntry(record)),
            RecordKind::DeletedAsset => Some(SyncEvent::DeletedAsset(record)),
            RecordKind::SyncToken => None,
        }
    }

    /// Returns the record carried by a per-item event.
    pub fn record(&self) -> Option<&Record> {
        match self {
            SyncEvent::Entry(r)
            | SyncEvent::Asset(r)
            | SyncEvent::DeletedEntry(r)
            | SyncEvent::DeletedAsset(r) => Some(r),
            SyncEvent::SyncComplete(_) => None,
        }
    }

    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::Entry(_) => "Entry",
            SyncEvent::Asset(_) => "Asset",
            SyncEvent::DeletedEntry(_) => "DeletedEntry",
            SyncEvent::DeletedAsset(_) => "DeletedAsset",
            SyncEvent::SyncComplete(_) => "SyncComplete",
        }
    }
}

/// Receives sync events.
pub trait SyncSubscriber: Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &SyncEvent) -> Result<(), SubscriberError>;
}

impl<F> SyncSubscriber for F
where
    F: Fn(&SyncEvent) -> Result<(), SubscriberError> + Send + Sync,
{
    fn on_event(&self, event: &SyncEvent) -> Result<(), SubscriberError> {
        self(event)
    }
}

/// Fans events out to subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn SyncSubscriber>>>,
    channels: RwLock<Vec<Sender<SyncEvent>>>,
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber.
    pub fn add_subscriber(&self, subscriber: Arc<dyn SyncSubscriber>) {
        self.subscribers.write().push(subscriber);
    }

    /// Returns a receiver for all future events.
    ///
    /// Dropping the receiver unsubscribes it on the next publish.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.channels.write().push(tx);
        rx
    }

    /// Number of subscribers and live channels.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len() + self.channels.read().len()
    }

    /// Delivers `event` to everyone.
    pub fn publish(&self, event: &SyncEvent) {
        let subscribers = self.subscribers.read().clone();
        for (index, subscriber) in subscribers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| subscriber.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(subscriber = index, event = event.name(), error = %err, "subscriber failed");
                }
                Err(_) => {
                    warn!(subscriber = index, event = event.name(), "subscriber panicked");
                }
            }
        }

        let mut channels = self.channels.write();
        channels.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.read().len())
            .field("channels", &self.channels.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, Arc<dyn SyncSubscriber>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let subscriber = move |event: &SyncEvent| -> Result<(), SubscriberError> {
            sink.lock().push(event.name().to_string());
            Ok(())
        };
        (seen, Arc::new(subscriber))
    }

    #[test]
    fn event_from_record() {
        assert!(matches!(
            SyncEvent::from_record(Record::entry("e1", "page")),
            Some(SyncEvent::Entry(_))
        ));
        assert!(matches!(
            SyncEvent::from_record(Record::deleted_asset("a1")),
            Some(SyncEvent::DeletedAsset(_))
        ));
        assert!(SyncEvent::from_record(Record::sync_token("sync_token", "t")).is_none());
    }

    #[test]
    fn failing_subscribers_do_not_stop_delivery() {
        let bus = EventBus::new();
        let failing = |_: &SyncEvent| -> Result<(), SubscriberError> { Err("nope".into()) };
        let panicking = |_: &SyncEvent| -> Result<(), SubscriberError> { panic!("boom") };
        bus.add_subscriber(Arc::new(failing));
        bus.add_subscriber(Arc::new(panicking));
        let (seen, subscriber) = recorder();
        bus.add_subscriber(subscriber);

        bus.publish(&SyncEvent::Entry(Record::entry("e1", "page")));
        bus.publish(&SyncEvent::SyncComplete(vec![]));
        assert_eq!(*seen.lock(), vec!["Entry", "SyncComplete"]);
    }

    #[test]
    fn channels_receive_and_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let dropped = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(dropped);

        let event = SyncEvent::Asset(Record::asset("a1"));
        bus.publish(&event);
        assert_eq!(rx.recv().unwrap(), event);
        assert_eq!(bus.subscriber_count(), 1);
    }
}
