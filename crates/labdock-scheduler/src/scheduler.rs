//! Scheduler core - shared collaborators, per-id serialisation, and the
//! operation router.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use labdock_cluster::ClusterBackend;
use labdock_core::{
    LessonScheduleRequest, LiveEndpoint, LiveLesson, LiveLessonStatus, LivePresentation,
    OperationType,
};
use labdock_state::{CatalogStore, StateError};

use crate::broadcast::CompletionBroadcaster;
use crate::config::SchedulerConfig;
use crate::error::{Result, SchedulerError};
use crate::probe::ReachabilityProber;
use crate::whitelist::Whitelist;

/// Per-LiveLesson mutex table.
///
/// Handlers for the same id must not interleave their status-changing
/// sections; handlers for different ids share nothing and run fully in
/// parallel.
#[derive(Debug, Default)]
pub(crate) struct IdLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IdLocks {
    pub(crate) async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

/// The lab scheduler.
///
/// Owns no authoritative state of its own: LiveLessons live in the catalog
/// store, idle-age truth lives on namespace labels, and the whitelist is
/// the only in-process mutable set.
pub struct Scheduler {
    pub(crate) config: SchedulerConfig,
    pub(crate) store: Arc<dyn CatalogStore>,
    pub(crate) cluster: Arc<dyn ClusterBackend>,
    pub(crate) prober: Arc<dyn ReachabilityProber>,
    pub(crate) broadcaster: CompletionBroadcaster,
    pub(crate) whitelist: Arc<Whitelist>,
    pub(crate) locks: IdLocks,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn CatalogStore>,
        cluster: Arc<dyn ClusterBackend>,
        prober: Arc<dyn ReachabilityProber>,
        broadcaster: CompletionBroadcaster,
        whitelist: Arc<Whitelist>,
    ) -> Self {
        Self {
            config,
            store,
            cluster,
            prober,
            broadcaster,
            whitelist,
            locks: IdLocks::default(),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn whitelist(&self) -> &Arc<Whitelist> {
        &self.whitelist
    }

    pub fn broadcaster(&self) -> &CompletionBroadcaster {
        &self.broadcaster
    }

    /// Synchronous request validation for the API facade. Rejected
    /// requests mutate nothing.
    pub async fn validate_request(&self, req: &LessonScheduleRequest) -> Result<()> {
        if req.session_id.is_empty() {
            return Err(SchedulerError::Validation(
                "session id cannot be empty".to_string(),
            ));
        }
        let lesson = self
            .store
            .get_lesson(&req.lesson_slug)
            .await
            .map_err(|_| SchedulerError::Validation(format!("unknown lesson: {}", req.lesson_slug)))?;

        let stage_scoped = matches!(
            req.operation,
            OperationType::Create | OperationType::Modify | OperationType::Verify
        );
        if stage_scoped && req.stage >= lesson.stages.len() {
            return Err(SchedulerError::Validation(format!(
                "stage {} out of range for lesson {} ({} stages)",
                req.stage,
                lesson.slug,
                lesson.stages.len()
            )));
        }
        Ok(())
    }

    /// Validates a CREATE and persists the pre-initialised LiveLesson the
    /// handler will drive. Racing initialisations for the same id converge
    /// on the record that won.
    pub async fn initialize_live_lesson(&self, req: &LessonScheduleRequest) -> Result<LiveLesson> {
        self.validate_request(req).await?;
        let lesson = self.store.get_lesson(&req.lesson_slug).await?;

        let mut endpoints = BTreeMap::new();
        for ep in &lesson.endpoints {
            let ports = ep.exposed_ports();
            if ports.is_empty() {
                return Err(SchedulerError::Validation(format!(
                    "endpoint {} must expose at least one port",
                    ep.name
                )));
            }
            endpoints.insert(
                ep.name.clone(),
                LiveEndpoint {
                    name: ep.name.clone(),
                    image: ep.image.clone(),
                    host: String::new(),
                    configuration_type: ep.configuration_type,
                    ports,
                    presentations: ep
                        .presentations
                        .iter()
                        .map(|p| LivePresentation {
                            name: p.name.clone(),
                            port: p.port,
                            kind: p.kind,
                        })
                        .collect(),
                },
            );
        }

        let ll = LiveLesson::new(
            &req.live_lesson_id,
            &req.session_id,
            &lesson.slug,
            req.stage,
            endpoints,
            Utc::now(),
        );
        match self.store.create_live_lesson(ll.clone()).await {
            Ok(()) => Ok(ll),
            Err(StateError::LiveLessonExists(_)) => {
                debug!(live_lesson_id = %req.live_lesson_id, "livelesson already initialised");
                Ok(self.store.get_live_lesson(&req.live_lesson_id).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Routes one dequeued request to its handler and applies the failure
    /// policy: handler-scope errors mark the LiveLesson as errored, while
    /// a record that vanished mid-operation means a concurrent DELETE won
    /// and the handler aborts cleanly.
    pub async fn handle(&self, req: LessonScheduleRequest) {
        debug!(
            operation = ?req.operation,
            live_lesson_id = %req.live_lesson_id,
            stage = req.stage,
            "handling schedule request"
        );

        let result = match req.operation {
            OperationType::Create => self.handle_create(&req).await,
            OperationType::Modify => self.handle_modify(&req).await,
            OperationType::Boop => self.handle_boop(&req).await,
            OperationType::Verify => self.handle_verify(&req).await,
            OperationType::Delete => self.handle_delete(&req).await,
        };

        match result {
            Ok(()) => {}
            Err(e) if e.is_record_gone() => {
                info!(
                    live_lesson_id = %req.live_lesson_id,
                    "livelesson removed mid-operation, aborting cleanly"
                );
            }
            Err(e) => {
                error!(
                    live_lesson_id = %req.live_lesson_id,
                    operation = ?req.operation,
                    error = %e,
                    "schedule request failed"
                );
                if matches!(req.operation, OperationType::Create | OperationType::Modify) {
                    self.mark_failed(&req.live_lesson_id).await;
                }
            }
        }
    }

    async fn mark_failed(&self, id: &str) {
        let _guard = self.locks.lock(id).await;
        if let Err(e) = self.store.update_live_lesson_error(id, true).await {
            debug!(live_lesson_id = %id, error = %e, "unable to flag livelesson as errored");
            return;
        }
        if let Err(e) = self
            .store
            .update_live_lesson_status(id, LiveLessonStatus::Error)
            .await
        {
            debug!(live_lesson_id = %id, error = %e, "unable to set error status");
        }
    }
}
