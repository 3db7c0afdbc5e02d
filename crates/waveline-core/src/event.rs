//! Typed publish/subscribe primitive
//!
//! Components announce buffer changes through an [`EventDispatcher`] instead
//! of being statically wired to their subscribers. Handlers fire in
//! registration order; `emit` iterates over a snapshot of the handler list so
//! a handler may subscribe or unsubscribe while an emission is in flight.

use std::sync::{Arc, Mutex};

use crate::types::Sample;

/// Handle returned by [`EventDispatcher::subscribe`], used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An explicit subscription list with deterministic fire order
pub struct EventDispatcher<T> {
    handlers: Mutex<Vec<(SubscriptionId, Handler<T>)>>,
    next_id: Mutex<u64>,
}

impl<T> Default for EventDispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventDispatcher<T> {
    /// Create a dispatcher with no subscribers
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    /// Register a handler; it fires after all previously registered handlers
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut next = self.next_id.lock().unwrap();
        let id = SubscriptionId(*next);
        *next += 1;
        self.handlers.lock().unwrap().push((id, Arc::new(handler)));
        id
    }

    /// Remove a handler; returns false when the id is unknown
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock().unwrap();
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    /// True when nobody is subscribed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fire all handlers in registration order
    ///
    /// The handler list is snapshotted before iterating, so handlers removed
    /// mid-emission still fire once and handlers added mid-emission fire on
    /// the next event.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .lock()
            .unwrap()
            .iter()
            .map(|(_, h)| h.clone())
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }
}

/// A loaded file as seen by event subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    /// Source url of the file
    pub url: String,
    /// Display color assigned at load time
    pub color: String,
}

/// Fired whenever the master buffer's contents change
///
/// Carries everything a subscriber needs so handlers never have to reach
/// back into the aggregator mid-emission.
#[derive(Clone)]
pub struct BufferChanged {
    /// The active channel's current samples (zero-copy view)
    pub active_channel: Arc<Vec<Sample>>,
    /// Engine sample rate in Hz
    pub sample_rate: u32,
    /// Buffer duration in seconds
    pub duration: f64,
    /// Number of loaded files
    pub file_count: usize,
    /// Starting sample offset of each file, in file-list order
    pub positions: Vec<usize>,
    /// Url and display color of each file, in file-list order
    pub files: Vec<FileInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_order_is_registration_order() {
        let dispatcher = EventDispatcher::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in 0..3 {
            let log = log.clone();
            dispatcher.subscribe(move |_| log.lock().unwrap().push(tag));
        }

        dispatcher.emit(&0);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_unsubscribe() {
        let dispatcher = EventDispatcher::<u32>::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let id = dispatcher.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        dispatcher.emit(&0);
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        dispatcher.emit(&0);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_during_emit_is_safe() {
        let dispatcher = Arc::new(EventDispatcher::<u32>::new());
        let count = Arc::new(AtomicUsize::new(0));

        let id_slot = Arc::new(Mutex::new(None::<SubscriptionId>));

        // First handler removes the second one mid-emission; the snapshot
        // guarantees the second still fires for this event.
        let d = dispatcher.clone();
        let slot = id_slot.clone();
        dispatcher.subscribe(move |_| {
            if let Some(id) = slot.lock().unwrap().take() {
                d.unsubscribe(id);
            }
        });

        let c = count.clone();
        let id = dispatcher.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        *id_slot.lock().unwrap() = Some(id);

        dispatcher.emit(&0);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        dispatcher.emit(&0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
