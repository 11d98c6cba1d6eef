//! Completion broadcasting.

use tokio::sync::broadcast;
use tracing::debug;

use labdock_core::OperationType;

/// Topic tag carried on every completion event.
pub const TOPIC_LSR_COMPLETED: &str = "lsr.completed";

/// Notification emitted when a schedule request finishes successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LsrCompleted {
    pub topic: &'static str,
    pub live_lesson_id: String,
    pub stage: usize,
    pub operation: OperationType,
}

/// Best-effort fan-out of completion events to in-process subscribers.
///
/// Publishing never fails: with no subscribers the event is simply
/// dropped, matching the fire-and-forget contract of the upstream bus.
#[derive(Debug, Clone)]
pub struct CompletionBroadcaster {
    tx: broadcast::Sender<LsrCompleted>,
}

impl CompletionBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, live_lesson_id: &str, stage: usize, operation: OperationType) {
        let event = LsrCompleted {
            topic: TOPIC_LSR_COMPLETED,
            live_lesson_id: live_lesson_id.to_string(),
            stage,
            operation,
        };
        debug!(live_lesson_id = %event.live_lesson_id, ?operation, "publishing completion");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LsrCompleted> {
        self.tx.subscribe()
    }
}

impl Default for CompletionBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
