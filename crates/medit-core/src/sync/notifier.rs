//! Conflict delivery to the consuming application.

use tokio::sync::broadcast;

use crate::models::DiagramRecord;

const DEFAULT_CAPACITY: usize = 64;

/// Both versions of a diagram whose remote copy is newer than the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEvent {
    pub local: DiagramRecord,
    pub cloud: DiagramRecord,
}

/// Broadcasts conflict events to every subscriber.
///
/// Publishing never blocks the sync pass. A subscriber that falls behind by more
/// than the channel capacity sees `RecvError::Lagged` and can reload open
/// conflicts from the store's conflict log.
#[derive(Debug, Clone)]
pub struct ConflictNotifier {
    sender: broadcast::Sender<ConflictEvent>,
}

impl Default for ConflictNotifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ConflictNotifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConflictEvent> {
        self.sender.subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: ConflictEvent) -> usize {
        let id = event.local.id.clone();
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("No conflict subscribers for diagram {}", id);
                0
            }
        }
    }
}
