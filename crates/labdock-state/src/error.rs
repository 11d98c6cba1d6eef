//! Error types for the catalog store.

use thiserror::Error;

/// Catalog store errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// No lesson with the given slug exists in the catalog.
    #[error("lesson not found: {0}")]
    LessonNotFound(String),

    /// No LiveLesson with the given id exists.
    #[error("livelesson not found: {0}")]
    LiveLessonNotFound(String),

    /// A LiveLesson with the given id already exists.
    #[error("livelesson already exists: {0}")]
    LiveLessonExists(String),

    /// No verification task with the given id exists.
    #[error("verification task not found: {0}")]
    VerificationNotFound(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StateError>;
