//! Request dispatch.
//!
//! The dispatcher owns the unbounded request queue. Each dequeued request
//! runs its handler on an independent task, so the dispatch loop never
//! blocks on handler progress - a DELETE or BOOP can always overtake an
//! in-progress CREATE. Within a single LiveLesson id, queue order between
//! the facade and the dispatcher is FIFO; interleaving of concurrent
//! handlers for the same id is constrained by the per-id locks in the
//! scheduler core.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use labdock_core::LessonScheduleRequest;

use crate::scheduler::Scheduler;

/// Clonable publish handle for the API facade and the garbage collector.
#[derive(Debug, Clone)]
pub struct RequestQueue {
    tx: mpsc::UnboundedSender<LessonScheduleRequest>,
}

impl RequestQueue {
    /// Enqueues a request. Best-effort once the dispatcher has shut down.
    pub fn publish(&self, request: LessonScheduleRequest) {
        if self.tx.send(request).is_err() {
            debug!("dispatcher stopped, dropping schedule request");
        }
    }
}

/// Creates the queue pair: a publish handle and the receiver handed to
/// [`run`].
pub fn request_channel() -> (RequestQueue, mpsc::UnboundedReceiver<LessonScheduleRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RequestQueue { tx }, rx)
}

/// Dispatch loop. Runs until every publish handle is dropped.
///
/// Handler panics are isolated to their own task and logged; they never
/// terminate the loop.
pub async fn run(scheduler: Arc<Scheduler>, mut rx: mpsc::UnboundedReceiver<LessonScheduleRequest>) {
    while let Some(request) = rx.recv().await {
        let scheduler = scheduler.clone();
        let operation = request.operation;
        let live_lesson_id = request.live_lesson_id.clone();

        let handler = tokio::spawn(async move {
            scheduler.handle(request).await;
        });
        tokio::spawn(async move {
            if let Err(e) = handler.await {
                if e.is_panic() {
                    error!(
                        ?operation,
                        live_lesson_id = %live_lesson_id,
                        "handler panicked; dispatcher continues"
                    );
                }
            }
        });
    }
    debug!("request queue closed, dispatcher stopping");
}
