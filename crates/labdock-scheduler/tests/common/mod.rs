//! Common test utilities for scheduler integration tests.

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use labdock_cluster::MemoryCluster;
use labdock_core::{naming, Lesson, LessonScheduleRequest, LiveLesson, LiveLessonStatus, OperationType};
use labdock_state::{CatalogStore, MemoryStore};
use labdock_scheduler::{
    dispatcher, request_channel, CompletionBroadcaster, GarbageCollector, RequestQueue, Scheduler,
    SchedulerConfig, Whitelist,
};

use fixtures::ScriptedProber;

/// Complete scheduler setup wired against the in-memory backends, with a
/// running dispatcher and budgets shrunk for tests.
pub struct TestScheduler {
    pub scheduler: Arc<Scheduler>,
    pub store: Arc<MemoryStore>,
    pub cluster: Arc<MemoryCluster>,
    pub prober: Arc<ScriptedProber>,
    pub queue: RequestQueue,
    pub whitelist: Arc<Whitelist>,
}

impl TestScheduler {
    /// Creates a scheduler seeded with the given lessons.
    pub fn new(lessons: Vec<Lesson>) -> Self {
        Self::with_config(lessons, fast_config())
    }

    /// Creates a scheduler with a custom configuration.
    pub fn with_config(lessons: Vec<Lesson>, config: SchedulerConfig) -> Self {
        let store = Arc::new(MemoryStore::new(lessons));
        let cluster = Arc::new(MemoryCluster::new());
        let prober = Arc::new(ScriptedProber::new());
        let whitelist = Arc::new(Whitelist::new());

        let scheduler = Arc::new(Scheduler::new(
            config,
            store.clone(),
            cluster.clone(),
            prober.clone(),
            CompletionBroadcaster::default(),
            whitelist.clone(),
        ));

        let (queue, rx) = request_channel();
        tokio::spawn(dispatcher::run(scheduler.clone(), rx));

        Self {
            scheduler,
            store,
            cluster,
            prober,
            queue,
            whitelist,
        }
    }

    /// The garbage collector for this scheduler, driven manually via
    /// `tick()` in tests.
    pub fn collector(&self) -> GarbageCollector {
        GarbageCollector::new(self.scheduler.clone(), self.queue.clone())
    }

    /// Initialises and queues a CREATE, returning the LiveLesson id.
    pub async fn create(&self, lesson_slug: &str, session_id: &str, stage: usize) -> String {
        let id = naming::live_lesson_id(lesson_slug, session_id);
        let req =
            LessonScheduleRequest::new(&id, lesson_slug, session_id, OperationType::Create, stage);
        self.scheduler
            .initialize_live_lesson(&req)
            .await
            .expect("initialise livelesson");
        self.queue.publish(req);
        id
    }

    /// Namespace name backing a LiveLesson under the test instance id.
    pub fn namespace(&self, live_lesson_id: &str) -> String {
        naming::namespace_name(&self.scheduler.config().instance_id, live_lesson_id)
    }

    /// Polls until the LiveLesson reaches the expected status.
    pub async fn wait_for_status(
        &self,
        id: &str,
        status: LiveLessonStatus,
        budget: Duration,
    ) -> LiveLesson {
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            if let Ok(ll) = self.store.get_live_lesson(id).await {
                if ll.status == status {
                    return ll;
                }
                if tokio::time::Instant::now() >= deadline {
                    panic!("livelesson {id} stuck in {:?}, wanted {status:?}", ll.status);
                }
            } else if tokio::time::Instant::now() >= deadline {
                panic!("livelesson {id} missing, wanted {status:?}");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Polls until both the LiveLesson record and its namespace are gone.
    pub async fn wait_deleted(&self, id: &str, budget: Duration) {
        let ns = self.namespace(id);
        let deadline = tokio::time::Instant::now() + budget;
        loop {
            let record_gone = self.store.get_live_lesson(id).await.is_err();
            let ns_gone = !self.cluster.namespace_names().contains(&ns);
            if record_gone && ns_gone {
                return;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!("livelesson {id} not fully deleted (record_gone={record_gone}, ns_gone={ns_gone})");
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Shrunk budgets so failure scenarios complete in tens of milliseconds.
pub fn fast_config() -> SchedulerConfig {
    let mut config = SchedulerConfig::default();
    config.instance_id = "test".to_string();
    config.gc.disable = true;
    config.gc.threshold = Duration::from_millis(500);
    config.gc.failed_threshold = Duration::from_millis(150);
    config.timeouts.pod_ready = Duration::from_millis(500);
    config.timeouts.pod_poll = Duration::from_millis(10);
    config.timeouts.reachability = Duration::from_millis(500);
    config.timeouts.reachability_poll = Duration::from_millis(20);
    config.timeouts.probe = Duration::from_millis(100);
    config.timeouts.configuration = Duration::from_millis(500);
    config.timeouts.configuration_poll = Duration::from_millis(10);
    config.timeouts.namespace_delete = Duration::from_millis(500);
    config.timeouts.namespace_delete_poll = Duration::from_millis(10);
    config
}
