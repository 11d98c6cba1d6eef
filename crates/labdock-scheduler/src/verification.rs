//! Stage completeness verification.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, instrument};

use labdock_cluster::JobSpec;
use labdock_core::{labels, naming, LessonScheduleRequest, VerificationTask};
use labdock_state::CatalogStore;

use crate::error::{Result, SchedulerError};
use crate::scheduler::Scheduler;

/// Image executing verification jobs.
const VERIFIER_IMAGE: &str = "labdock/verifier";

/// How long a finished VerificationTask stays visible before the sweeper
/// removes it.
pub const VERIFICATION_RETENTION: Duration = Duration::from_secs(15);

/// Sweep cadence.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

impl Scheduler {
    /// VERIFY: run the current stage's completeness check as a one-shot
    /// job and record the outcome on a VerificationTask.
    ///
    /// Refused outright when the stage offers no verification. A failing
    /// or timed-out check is a normal outcome for the learner - it lands
    /// on the task, not on the LiveLesson.
    #[instrument(skip(self, req), fields(live_lesson_id = %req.live_lesson_id))]
    pub(crate) async fn handle_verify(&self, req: &LessonScheduleRequest) -> Result<()> {
        let ll = self.store.get_live_lesson(&req.live_lesson_id).await?;
        let lesson = self.store.get_lesson(&ll.lesson_slug).await?;
        let stage = lesson.stages.get(ll.current_stage).ok_or_else(|| {
            SchedulerError::Validation(format!(
                "stage {} out of range for lesson {}",
                ll.current_stage, lesson.slug
            ))
        })?;
        if !stage.verify_completeness {
            return Err(SchedulerError::Validation(format!(
                "stage {} of lesson {} offers no completeness verification",
                ll.current_stage, lesson.slug
            )));
        }

        let task_id = naming::verification_task_id(&ll.id, ll.current_stage);
        if let Ok(existing) = self.store.get_verification_task(&task_id).await {
            if existing.working {
                debug!(task = %task_id, "verification already in flight");
                return Ok(());
            }
        }

        let mut task = VerificationTask::started(&ll.id, ll.current_stage);
        self.store.put_verification_task(task.clone()).await?;

        let ns_name = naming::namespace_name(&self.config.instance_id, &ll.id);
        let job_name = naming::verify_job_name(ll.current_stage);
        let mut job_labels = labdock_cluster::Labels::new();
        job_labels.insert(labels::MANAGED.to_string(), labels::MANAGED_VALUE.to_string());
        job_labels.insert(labels::LIVE_LESSON_ID.to_string(), ll.id.clone());
        job_labels.insert(labels::ROLE.to_string(), labels::ROLE_VERIFY.to_string());

        let outcome = async {
            self.cluster
                .create_job(JobSpec {
                    name: job_name.clone(),
                    namespace: ns_name.clone(),
                    image: VERIFIER_IMAGE.to_string(),
                    endpoint_host: ll.id.clone(),
                    stage: ll.current_stage,
                    config_asset: stage.config_asset.clone(),
                    curriculum: self.config.curriculum.source(),
                    labels: job_labels,
                })
                .await?;
            self.wait_for_job(&ns_name, &job_name).await
        }
        .await;

        let now = Utc::now();
        match outcome {
            Ok(()) => {
                info!(task = %task_id, "verification passed");
                task.complete(true, "verification passed", now);
            }
            Err(SchedulerError::ConfigurationFailed(_)) => {
                info!(task = %task_id, "verification checks failed");
                task.complete(false, "verification checks failed", now);
            }
            Err(SchedulerError::Timeout(_)) => {
                task.complete(false, "verification timed out", now);
            }
            Err(e) => {
                task.complete(false, format!("verification error: {e}"), now);
                self.store.put_verification_task(task).await?;
                return Err(e);
            }
        }
        self.store.put_verification_task(task).await?;
        Ok(())
    }
}

/// Removes VerificationTasks older than the retention window past their
/// completion. Returns how many were removed.
pub async fn sweep_verification_tasks(store: &dyn CatalogStore) -> Result<usize> {
    let cutoff = chrono::Duration::from_std(VERIFICATION_RETENTION)
        .unwrap_or_else(|_| chrono::Duration::seconds(15));
    let now = Utc::now();
    let mut removed = 0;

    for task in store.list_verification_tasks().await? {
        let Some(completed_at) = task.completed_at else {
            continue;
        };
        if now.signed_duration_since(completed_at) > cutoff
            && store.delete_verification_task(&task.id()).await.is_ok()
        {
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(removed, "swept stale verification tasks");
    }
    Ok(removed)
}

/// Background loop driving [`sweep_verification_tasks`].
pub async fn run_verification_sweeper(store: Arc<dyn CatalogStore>) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(e) = sweep_verification_tasks(store.as_ref()).await {
            error!(error = %e, "verification sweep failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labdock_state::MemoryStore;

    #[tokio::test]
    async fn sweep_removes_only_stale_completed_tasks() {
        let store = MemoryStore::new(vec![]);

        // Still working: kept.
        store
            .put_verification_task(VerificationTask::started("ll-1", 0))
            .await
            .unwrap();

        // Completed just now: kept.
        let mut fresh = VerificationTask::started("ll-2", 0);
        fresh.complete(true, "ok", Utc::now());
        store.put_verification_task(fresh).await.unwrap();

        // Completed beyond retention: removed.
        let mut stale = VerificationTask::started("ll-3", 0);
        stale.complete(false, "nope", Utc::now() - chrono::Duration::seconds(60));
        store.put_verification_task(stale).await.unwrap();

        let removed = sweep_verification_tasks(&store).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.list_verification_tasks().await.unwrap().len(), 2);
        assert!(store.get_verification_task("ll-3:0").await.is_err());
    }
}
