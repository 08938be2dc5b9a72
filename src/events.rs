//! Store event publication.
//!
//! The store announces state changes on a broadcast channel; presentation
//! layers subscribe and the store has no knowledge of who is listening.

use std::collections::HashMap;

use tokio::sync::broadcast;

use crate::{Category, Note};

/// Full-state snapshots published by the store.
///
/// Consumers must treat payloads as replacements of their current view,
/// never as deltas.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    /// A backup directory finished loading. Fires exactly once per load.
    NotesLoaded(Vec<Note>),
    /// The subset of notes matching a caller-supplied filter.
    NotesFiltered(Vec<Note>),
    /// A note was created or updated; carries the full sorted sequence.
    NoteModified(Vec<Note>),
    /// The sort order changed; carries the full re-sorted sequence.
    NotesSorted(Vec<Note>),
    /// A category was saved or deleted; carries the full category index.
    CategoryModified(HashMap<i64, Category>),
}

/// Publish side of the notification channel.
pub struct EventBus {
    tx: broadcast::Sender<StoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event. Having no subscribers is not an error.
    pub fn publish(&self, event: StoreEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(StoreEvent::NotesLoaded(Vec::new()));
    }

    #[test]
    fn subscribers_receive_events_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(StoreEvent::NotesLoaded(Vec::new()));
        bus.publish(StoreEvent::NotesSorted(Vec::new()));

        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::NotesLoaded(_)));
        assert!(matches!(rx.try_recv().unwrap(), StoreEvent::NotesSorted(_)));
        assert!(rx.try_recv().is_err());
    }
}
