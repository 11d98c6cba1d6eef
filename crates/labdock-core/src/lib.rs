//! Shared data model for the labdock lab scheduler.
//!
//! This crate defines the catalog types (lessons, endpoints, connections),
//! the live-instance types (LiveLesson and friends), the schedule request
//! envelope, and the deterministic naming conventions every other crate
//! relies on. It carries no runtime machinery of its own.

pub mod lesson;
pub mod live;
pub mod naming;
pub mod request;

pub use lesson::{ConfigurationType, Connection, Endpoint, Lesson, Presentation, PresentationKind, Stage};
pub use live::{LiveEndpoint, LiveLesson, LiveLessonStatus, LivePresentation};
pub use naming::labels;
pub use request::{LessonScheduleRequest, OperationType, VerificationTask};
