//! Error types for the scheduler.

use thiserror::Error;

use labdock_cluster::ClusterError;
use labdock_state::StateError;

/// Scheduler errors.
///
/// Handler-scope failures (backend errors, exhausted budgets, failed
/// configuration jobs) mark the LiveLesson as errored and terminate the
/// current operation; they never panic the process.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    /// Malformed request. Surfaced before any state mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A wall-clock budget was exhausted.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A configuration job exited non-zero.
    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    /// Catalog store failure.
    #[error(transparent)]
    State(#[from] StateError),

    /// Cluster backend failure.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl SchedulerError {
    /// Returns true when the LiveLesson record vanished mid-operation,
    /// which handlers treat as a clean abort (a concurrent DELETE won).
    pub const fn is_record_gone(&self) -> bool {
        matches!(self, Self::State(StateError::LiveLessonNotFound(_)))
    }
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
