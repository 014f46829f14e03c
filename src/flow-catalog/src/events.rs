//! Fan-out notification channel from the pipeline to observers
//!
//! Events are fire-and-forget "go re-read the catalog" signals (plus
//! per-entry percentages), so a lagging receiver that drops a few is
//! harmless.

use tokio::sync::broadcast;

/// Notification emitted by the ingestion/thumbnail machinery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// One of the catalog collections changed; observers should re-read.
    CatalogChanged,
    /// Thumbnail progress for one entry, 0-100.
    EntryProgress { entry_id: String, percent: u8 },
}

const EVENT_CAPACITY: usize = 256;

/// Broadcast bus carrying [`CatalogEvent`]s to any number of observers.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CatalogEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogEvent> {
        self.tx.subscribe()
    }

    /// Send without caring whether anyone is listening.
    pub fn emit(&self, event: CatalogEvent) {
        let _ = self.tx.send(event);
    }

    pub fn catalog_changed(&self) {
        self.emit(CatalogEvent::CatalogChanged);
    }

    pub fn entry_progress(&self, entry_id: &str, percent: u8) {
        self.emit(CatalogEvent::EntryProgress {
            entry_id: entry_id.to_string(),
            percent,
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multiple_subscribers_see_the_same_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.entry_progress("abc", 50);

        let expected = CatalogEvent::EntryProgress {
            entry_id: "abc".to_string(),
            percent: 50,
        };
        assert_eq!(a.recv().await.unwrap(), expected);
        assert_eq!(b.recv().await.unwrap(), expected);
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new();
        bus.catalog_changed();
    }
}
