//! Operation handlers: the per-request lifecycle drivers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, info, instrument};

use labdock_cluster::{ClusterError, JobPhase, JobSpec, PodReadiness};
use labdock_core::{
    labels, naming, Lesson, LessonScheduleRequest, LiveLesson, LiveLessonStatus, OperationType,
};
use labdock_state::StateError;

use crate::error::{Result, SchedulerError};
use crate::scheduler::Scheduler;

impl Scheduler {
    /// CREATE: build the topology and drive the LiveLesson from
    /// INITIAL_BOOT through BOOTING and CONFIGURATION into READY.
    #[instrument(skip(self, req), fields(live_lesson_id = %req.live_lesson_id, stage = req.stage))]
    pub(crate) async fn handle_create(&self, req: &LessonScheduleRequest) -> Result<()> {
        let ns_name = naming::namespace_name(&self.config.instance_id, &req.live_lesson_id);
        let lesson = self.store.get_lesson(&req.lesson_slug).await?;

        info!(
            live_lesson_id = %req.live_lesson_id,
            namespace = %ns_name,
            lesson = %lesson.slug,
            "provisioning lesson environment"
        );

        // Topology build and the BOOTING transition form one locked
        // section. The entry check keeps a CREATE that lost the race
        // against DELETE from recreating the namespace it just removed.
        let pods = {
            let _guard = self.locks.lock(&req.live_lesson_id).await;
            self.store.get_live_lesson(&req.live_lesson_id).await?;
            let pods = self.build_topology(&lesson, req, &ns_name).await?;
            self.store
                .update_live_lesson_status(&req.live_lesson_id, LiveLessonStatus::Booting)
                .await?;
            pods
        };

        self.wait_for_pods(&ns_name, &pods).await?;

        // Reload for the cluster IPs recorded during topology build.
        let ll = self.store.get_live_lesson(&req.live_lesson_id).await?;
        self.wait_until_reachable(&ll).await?;

        // The configuration phase is a status-changing section too; the
        // lock keeps a concurrent MODIFY's kill_jobs from tearing down
        // these jobs mid-flight.
        {
            let _guard = self.locks.lock(&req.live_lesson_id).await;
            self.store
                .update_live_lesson_status(&req.live_lesson_id, LiveLessonStatus::Configuration)
                .await?;
            self.configure_endpoints(&lesson, &ll, req.stage, &ns_name)
                .await?;

            // Applied only after configuration had its window: once the
            // policy is in place, only job pods retain internet access.
            if self.config.allow_egress {
                self.cluster.create_network_policy(&ns_name).await?;
            }

            self.store
                .update_live_lesson_status(&req.live_lesson_id, LiveLessonStatus::Ready)
                .await?;
        }

        self.broadcaster
            .publish(&req.live_lesson_id, req.stage, OperationType::Create);
        info!(live_lesson_id = %req.live_lesson_id, "lesson environment ready");
        Ok(())
    }

    /// MODIFY: reconfigure the existing environment for a new stage. Pods
    /// and services are left untouched.
    #[instrument(skip(self, req), fields(live_lesson_id = %req.live_lesson_id, stage = req.stage))]
    pub(crate) async fn handle_modify(&self, req: &LessonScheduleRequest) -> Result<()> {
        let ns_name = naming::namespace_name(&self.config.instance_id, &req.live_lesson_id);
        let ll = self.store.get_live_lesson(&req.live_lesson_id).await?;
        let lesson = self.store.get_lesson(&ll.lesson_slug).await?;
        if req.stage >= lesson.stages.len() {
            return Err(SchedulerError::Validation(format!(
                "stage {} out of range for lesson {}",
                req.stage, lesson.slug
            )));
        }

        info!(
            live_lesson_id = %req.live_lesson_id,
            stage = req.stage,
            "reconfiguring for stage change"
        );

        // One locked section end to end, like BOOP and DELETE: two
        // MODIFYs for the same id must not interleave their kill_jobs
        // and job creation.
        {
            let _guard = self.locks.lock(&req.live_lesson_id).await;
            self.store
                .update_live_lesson_status(&req.live_lesson_id, LiveLessonStatus::Configuration)
                .await?;
            self.store
                .update_live_lesson_stage(&req.live_lesson_id, req.stage)
                .await?;

            self.configure_endpoints(&lesson, &ll, req.stage, &ns_name)
                .await?;

            self.store
                .update_live_lesson_status(&req.live_lesson_id, LiveLessonStatus::Ready)
                .await?;

            // A stage change is user activity; refresh the idle timer.
            let now = self.boop_namespace(&ns_name).await?;
            if let Err(e) = self
                .store
                .update_live_lesson_interaction(&req.live_lesson_id, now)
                .await
            {
                debug!(live_lesson_id = %req.live_lesson_id, error = %e, "interaction mirror skipped");
            }
        }

        self.broadcaster
            .publish(&req.live_lesson_id, req.stage, OperationType::Modify);
        Ok(())
    }

    /// BOOP: refresh the idle timer. The namespace label is the canonical
    /// idle-age source; the record mirrors it. A vanished namespace or
    /// record makes this a no-op.
    #[instrument(skip(self, req), fields(live_lesson_id = %req.live_lesson_id))]
    pub(crate) async fn handle_boop(&self, req: &LessonScheduleRequest) -> Result<()> {
        let ns_name = naming::namespace_name(&self.config.instance_id, &req.live_lesson_id);
        let _guard = self.locks.lock(&req.live_lesson_id).await;

        let now = self.boop_namespace(&ns_name).await?;
        match self
            .store
            .update_live_lesson_interaction(&req.live_lesson_id, now)
            .await
        {
            Ok(()) | Err(StateError::LiveLessonNotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// DELETE: remove the namespace, wait for it to disappear, then remove
    /// the record. Idempotent - a missing namespace or record counts as
    /// already deleted.
    #[instrument(skip(self, req), fields(live_lesson_id = %req.live_lesson_id))]
    pub(crate) async fn handle_delete(&self, req: &LessonScheduleRequest) -> Result<()> {
        let ns_name = naming::namespace_name(&self.config.instance_id, &req.live_lesson_id);
        let _guard = self.locks.lock(&req.live_lesson_id).await;

        self.delete_namespace_and_wait(&ns_name).await?;

        match self.store.delete_live_lesson(&req.live_lesson_id).await {
            Ok(()) | Err(StateError::LiveLessonNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(live_lesson_id = %req.live_lesson_id, namespace = %ns_name, "lesson environment deleted");
        Ok(())
    }

    /// Sets the namespace's last-interaction label to now and returns the
    /// timestamp written.
    pub(crate) async fn boop_namespace(&self, ns_name: &str) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        match self
            .cluster
            .set_namespace_label(ns_name, labels::LAST_INTERACTION, &now.to_rfc3339())
            .await
        {
            Ok(()) => Ok(now),
            Err(e) if e.is_not_found() => {
                debug!(namespace = %ns_name, "namespace absent, nothing to boop");
                Ok(now)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Starts namespace deletion and polls until the namespace is gone or
    /// the deletion budget expires.
    pub(crate) async fn delete_namespace_and_wait(&self, ns_name: &str) -> Result<()> {
        match self.cluster.delete_namespace(ns_name).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(namespace = %ns_name, "namespace already absent");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let budget = self.config.timeouts.namespace_delete;
        let poll = self.config.timeouts.namespace_delete_poll;
        let wait = async {
            loop {
                match self.cluster.get_namespace(ns_name).await {
                    Err(e) if e.is_not_found() => return Ok(()),
                    Err(e) => return Err(SchedulerError::from(e)),
                    Ok(_) => {
                        debug!(namespace = %ns_name, "waiting for namespace deletion");
                        tokio::time::sleep(poll).await;
                    }
                }
            }
        };
        timed(budget, wait, || format!("namespace {ns_name} did not delete")).await
    }

    /// Waits for every created pod to report ready, in parallel, each with
    /// its own wall-clock budget. Any terminal pod failure or timeout
    /// fails the whole lesson.
    pub(crate) async fn wait_for_pods(&self, ns_name: &str, pods: &[String]) -> Result<()> {
        let waits = pods.iter().map(|name| self.wait_for_pod(ns_name, name));
        collect_first_err(join_all(waits).await)
    }

    async fn wait_for_pod(&self, ns_name: &str, pod: &str) -> Result<()> {
        let budget = self.config.timeouts.pod_ready;
        let poll = self.config.timeouts.pod_poll;
        let wait = async {
            loop {
                match self.cluster.pod_ready(ns_name, pod).await? {
                    PodReadiness::Ready => {
                        debug!(namespace = %ns_name, pod = %pod, "pod ready");
                        return Ok(());
                    }
                    PodReadiness::Failed => {
                        return Err(SchedulerError::Cluster(ClusterError::Backend(format!(
                            "pod {pod} entered a terminal failure state"
                        ))));
                    }
                    PodReadiness::NotReady => tokio::time::sleep(poll).await,
                }
            }
        };
        timed(budget, wait, || format!("pod {pod} never became ready")).await
    }

    /// Probes every presentation once per cycle until all pass or the
    /// reachability budget expires. Each cycle's healthy/total counts are
    /// persisted on the record.
    #[instrument(skip(self, ll), fields(live_lesson_id = %ll.id))]
    pub(crate) async fn wait_until_reachable(&self, ll: &LiveLesson) -> Result<()> {
        let targets: Vec<_> = ll
            .endpoints
            .values()
            .flat_map(|ep| {
                ep.presentations
                    .iter()
                    .map(move |p| (ep.host.clone(), p.port, p.kind))
            })
            .collect();
        let total = targets.len();
        if total == 0 {
            debug!(live_lesson_id = %ll.id, "no presentations to probe");
            return Ok(());
        }

        let deadline = tokio::time::Instant::now() + self.config.timeouts.reachability;
        loop {
            let probes = targets
                .iter()
                .map(|(host, port, kind)| self.prober.probe(host, *port, *kind));
            let healthy = join_all(probes).await.into_iter().filter(|ok| *ok).count();

            self.store
                .update_live_lesson_tests(&ll.id, healthy, total)
                .await?;
            debug!(live_lesson_id = %ll.id, healthy, total, "reachability cycle");

            if healthy == total {
                info!(live_lesson_id = %ll.id, total, "all endpoints reachable");
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SchedulerError::Timeout(format!(
                    "{}/{} endpoints reachable when the budget expired",
                    healthy, total
                )));
            }
            tokio::time::sleep(self.config.timeouts.reachability_poll).await;
        }
    }

    /// Runs a configuration job for every endpoint that wants one and
    /// waits for all of them, in parallel. Stale config jobs from a
    /// previous stage are killed first.
    pub(crate) async fn configure_endpoints(
        &self,
        lesson: &Lesson,
        ll: &LiveLesson,
        stage: usize,
        ns_name: &str,
    ) -> Result<()> {
        self.cluster.kill_jobs(ns_name, labels::ROLE_CONFIG).await?;

        let config_asset = lesson
            .stages
            .get(stage)
            .and_then(|s| s.config_asset.clone());
        let curriculum = self.config.curriculum.source();

        let mut job_names = Vec::new();
        for ep in ll
            .endpoints
            .values()
            .filter(|e| e.configuration_type.requires_job())
        {
            let name = naming::config_job_name(&ep.name, stage);
            let mut job_labels = labdock_cluster::Labels::new();
            job_labels.insert(labels::MANAGED.to_string(), labels::MANAGED_VALUE.to_string());
            job_labels.insert(labels::LIVE_LESSON_ID.to_string(), ll.id.clone());
            job_labels.insert(labels::ROLE.to_string(), labels::ROLE_CONFIG.to_string());

            self.cluster
                .create_job(JobSpec {
                    name: name.clone(),
                    namespace: ns_name.to_string(),
                    image: ep.configuration_type.image().to_string(),
                    endpoint_host: ep.name.clone(),
                    stage,
                    config_asset: config_asset.clone(),
                    curriculum: curriculum.clone(),
                    labels: job_labels,
                })
                .await?;
            job_names.push(name);
        }

        if job_names.is_empty() {
            debug!(live_lesson_id = %ll.id, "no endpoints require configuration");
            return Ok(());
        }

        info!(live_lesson_id = %ll.id, jobs = job_names.len(), stage, "running configuration jobs");
        let monitors = job_names.iter().map(|name| self.wait_for_job(ns_name, name));
        collect_first_err(join_all(monitors).await)
    }

    /// Polls one job to completion within the configuration budget.
    pub(crate) async fn wait_for_job(&self, ns_name: &str, job: &str) -> Result<()> {
        let budget = self.config.timeouts.configuration;
        let poll = self.config.timeouts.configuration_poll;
        let wait = async {
            loop {
                match self.cluster.job_status(ns_name, job).await? {
                    JobPhase::Succeeded => {
                        debug!(namespace = %ns_name, job = %job, "job succeeded");
                        return Ok(());
                    }
                    JobPhase::Failed => {
                        return Err(SchedulerError::ConfigurationFailed(format!(
                            "job {job} exited non-zero"
                        )));
                    }
                    JobPhase::Running => tokio::time::sleep(poll).await,
                }
            }
        };
        timed(budget, wait, || format!("job {job} never completed")).await
    }
}

/// Wraps a wait in a wall-clock budget, converting expiry into a Timeout.
async fn timed<F>(budget: Duration, wait: F, describe: impl FnOnce() -> String) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    match tokio::time::timeout(budget, wait).await {
        Ok(result) => result,
        Err(_) => Err(SchedulerError::Timeout(format!(
            "{} within {budget:?}",
            describe()
        ))),
    }
}

fn collect_first_err(results: Vec<Result<()>>) -> Result<()> {
    results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
}
