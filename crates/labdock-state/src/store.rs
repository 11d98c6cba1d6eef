//! The catalog store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use labdock_core::{Lesson, LiveEndpoint, LiveLesson, LiveLessonStatus, VerificationTask};

use crate::error::Result;

/// Read/write access to lessons, LiveLessons, and verification tasks.
///
/// Lessons are read-only; LiveLessons and verification tasks are mutated
/// through narrow per-field updates so concurrent handlers never clobber
/// each other's writes with stale whole-record saves.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_lesson(&self, slug: &str) -> Result<Lesson>;

    async fn list_lessons(&self) -> Result<Vec<Lesson>>;

    async fn get_live_lesson(&self, id: &str) -> Result<LiveLesson>;

    /// Persists a fresh LiveLesson. Fails with `LiveLessonExists` if the id
    /// is already present, which is how two racing CREATEs for the same
    /// (lesson, session) pair converge on a single environment.
    async fn create_live_lesson(&self, ll: LiveLesson) -> Result<()>;

    async fn list_live_lessons(&self) -> Result<Vec<LiveLesson>>;

    async fn delete_live_lesson(&self, id: &str) -> Result<()>;

    async fn update_live_lesson_status(&self, id: &str, status: LiveLessonStatus) -> Result<()>;

    async fn update_live_lesson_stage(&self, id: &str, stage: usize) -> Result<()>;

    async fn update_live_lesson_error(&self, id: &str, error: bool) -> Result<()>;

    async fn update_live_lesson_endpoint_ip(&self, id: &str, endpoint: &str, ip: &str)
        -> Result<()>;

    /// Adds or replaces one live endpoint on the record. Used when
    /// provisioning appends endpoints the lesson definition does not carry
    /// (the jupyter lab-guide).
    async fn upsert_live_lesson_endpoint(&self, id: &str, endpoint: LiveEndpoint) -> Result<()>;

    /// Records the outcome of the most recent reachability cycle.
    async fn update_live_lesson_tests(&self, id: &str, healthy: usize, total: usize) -> Result<()>;

    async fn update_live_lesson_interaction(&self, id: &str, when: DateTime<Utc>) -> Result<()>;

    async fn get_verification_task(&self, id: &str) -> Result<VerificationTask>;

    /// Inserts or replaces a verification task.
    async fn put_verification_task(&self, task: VerificationTask) -> Result<()>;

    async fn delete_verification_task(&self, id: &str) -> Result<()>;

    async fn list_verification_tasks(&self) -> Result<Vec<VerificationTask>>;
}
