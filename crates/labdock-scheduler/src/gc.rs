//! Garbage collection of idle lesson environments.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use labdock_core::{labels, LessonScheduleRequest, LiveLessonStatus, OperationType};

use crate::dispatcher::RequestQueue;
use crate::error::Result;
use crate::scheduler::Scheduler;

/// Periodically reaps idle LiveLessons.
///
/// The namespace `lastInteraction` label is the authoritative idle-age
/// source; in-memory state is never consulted. The collector does not
/// delete anything itself - it publishes DELETE requests through the
/// dispatcher so per-id serialisation holds for GC and user requests
/// alike.
pub struct GarbageCollector {
    scheduler: Arc<Scheduler>,
    queue: RequestQueue,
}

impl GarbageCollector {
    pub fn new(scheduler: Arc<Scheduler>, queue: RequestQueue) -> Self {
        Self { scheduler, queue }
    }

    /// Tick loop. Runs forever at the configured interval.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.scheduler.config.gc.interval);
        loop {
            ticker.tick().await;
            match self.tick().await {
                Ok(reaped) if !reaped.is_empty() => {
                    info!(count = reaped.len(), "garbage collection pass reaped idle lessons");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "garbage collection pass failed"),
            }
        }
    }

    /// One collection pass. Returns the LiveLesson ids a DELETE was
    /// published for.
    pub async fn tick(&self) -> Result<Vec<String>> {
        let now = Utc::now();
        let mut reaped = Vec::new();

        for ns in self.scheduler.cluster.list_managed_namespaces().await? {
            let Some(live_lesson_id) = ns.label(labels::LIVE_LESSON_ID) else {
                warn!(namespace = %ns.name, "managed namespace missing liveLessonId label, skipping");
                continue;
            };
            let session_id = ns.label(labels::SESSION_ID).unwrap_or_default();
            let lesson_slug = ns.label(labels::LESSON_SLUG).unwrap_or_default();

            let Some(last_interaction) = ns
                .label(labels::LAST_INTERACTION)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|t| t.with_timezone(&Utc))
            else {
                warn!(namespace = %ns.name, "managed namespace missing lastInteraction label, skipping");
                continue;
            };

            let idle = now.signed_duration_since(last_interaction);
            let threshold = self.threshold_for(live_lesson_id).await;
            let threshold = chrono::Duration::from_std(threshold)
                .unwrap_or_else(|_| chrono::Duration::MAX);
            if idle <= threshold {
                continue;
            }
            if self.scheduler.whitelist.contains(session_id) {
                debug!(session_id = %session_id, "session whitelisted, not reaping");
                continue;
            }

            info!(
                live_lesson_id = %live_lesson_id,
                idle_secs = idle.num_seconds(),
                "reaping idle lesson"
            );
            self.queue.publish(LessonScheduleRequest::new(
                live_lesson_id,
                lesson_slug,
                session_id,
                OperationType::Delete,
                0,
            ));
            reaped.push(live_lesson_id.to_string());
        }
        Ok(reaped)
    }

    /// Errored sessions are reaped on the shorter failed-state threshold.
    async fn threshold_for(&self, live_lesson_id: &str) -> std::time::Duration {
        let gc = &self.scheduler.config.gc;
        match self.scheduler.store.get_live_lesson(live_lesson_id).await {
            Ok(ll) if ll.error || ll.status == LiveLessonStatus::Error => gc.failed_threshold,
            _ => gc.threshold,
        }
    }

    /// Boot-time reclamation: deletes every managed namespace left over
    /// from a previous run, in parallel. Destructive, therefore opt-in via
    /// `nuke_on_start`.
    pub async fn nuke_from_orbit(&self) -> Result<usize> {
        let namespaces = self.scheduler.cluster.list_managed_namespaces().await?;
        if namespaces.is_empty() {
            info!("no managed namespaces found, starting normally");
            return Ok(0);
        }

        warn!(count = namespaces.len(), "nuking all managed namespaces");
        let deletions = namespaces
            .iter()
            .map(|ns| self.scheduler.delete_namespace_and_wait(&ns.name));
        let reclaimed = join_all(deletions)
            .await
            .into_iter()
            .filter(Result::is_ok)
            .count();
        info!(reclaimed, "nuke complete");
        Ok(reclaimed)
    }
}
