//! Schedule request envelope and verification task records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The operation a schedule request asks the scheduler to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    /// Provision a new environment and drive it to READY.
    Create,
    /// Reconfigure an existing environment for a new stage.
    Modify,
    /// Refresh the idle timer without changing anything else.
    Boop,
    /// Run the current stage's completeness verification.
    Verify,
    /// Tear the environment down and remove its record.
    Delete,
}

/// A request travelling from the API facade (or the garbage collector) to
/// the scheduler. One request type covers all five operations; fields not
/// meaningful for an operation are simply ignored by its handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonScheduleRequest {
    pub live_lesson_id: String,
    pub lesson_slug: String,
    pub session_id: String,
    pub operation: OperationType,
    /// Target stage, 0-based.
    pub stage: usize,
    pub created_at: DateTime<Utc>,
}

impl LessonScheduleRequest {
    pub fn new(
        live_lesson_id: impl Into<String>,
        lesson_slug: impl Into<String>,
        session_id: impl Into<String>,
        operation: OperationType,
        stage: usize,
    ) -> Self {
        Self {
            live_lesson_id: live_lesson_id.into(),
            lesson_slug: lesson_slug.into(),
            session_id: session_id.into(),
            operation,
            stage,
            created_at: Utc::now(),
        }
    }
}

/// Tracks one in-flight or recently finished stage verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationTask {
    pub live_lesson_id: String,
    pub stage: usize,
    /// True while the verification job is still running.
    pub working: bool,
    pub success: bool,
    pub message: String,
    pub completed_at: Option<DateTime<Utc>>,
}

impl VerificationTask {
    /// Fresh task for a verification that has just been requested.
    pub fn started(live_lesson_id: impl Into<String>, stage: usize) -> Self {
        Self {
            live_lesson_id: live_lesson_id.into(),
            stage,
            working: true,
            success: false,
            message: "Starting verification".to_string(),
            completed_at: None,
        }
    }

    /// Identifier shared with the API facade: `{live_lesson_id}:{stage}`.
    pub fn id(&self) -> String {
        crate::naming::verification_task_id(&self.live_lesson_id, self.stage)
    }

    /// Marks the task finished with the given outcome.
    pub fn complete(&mut self, success: bool, message: impl Into<String>, now: DateTime<Utc>) {
        self.working = false;
        self.success = success;
        self.message = message.into();
        self.completed_at = Some(now);
    }
}
