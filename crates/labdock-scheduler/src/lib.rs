//! labdock scheduler - request-driven lifecycle management for short-lived
//! lab environments.
//!
//! The scheduler is responsible for:
//!
//! - **Provisioning**: CREATE builds a namespace, networks, pods, services
//!   and ingresses for a lesson, then drives the LiveLesson through
//!   BOOTING and CONFIGURATION into READY
//! - **Stage transitions**: MODIFY re-runs configuration for a new stage
//!   without touching pods
//! - **Liveness**: BOOP refreshes the idle timer; VERIFY runs a stage's
//!   completeness check
//! - **Reclamation**: DELETE tears an environment down; the garbage
//!   collector reaps idle sessions through the same path
//!
//! # Architecture
//!
//! Requests flow facade → [`dispatcher::RequestQueue`] → per-operation
//! handler, each on its own task. The catalog store is authoritative for
//! LiveLesson state; the namespace `lastInteraction` label is
//! authoritative for idle age. Handlers for the same LiveLesson id
//! serialise their status-changing sections on a per-id mutex, so a
//! CREATE immediately followed by a DELETE always nets out to a deleted
//! environment.

pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gc;
pub mod handlers;
pub mod probe;
pub mod scheduler;
pub mod topology;
pub mod verification;
pub mod whitelist;

// Re-export main types
pub use broadcast::{CompletionBroadcaster, LsrCompleted, TOPIC_LSR_COMPLETED};
pub use config::{CurriculumConfig, GcConfig, SchedulerConfig, TimeoutConfig};
pub use dispatcher::{request_channel, RequestQueue};
pub use error::{Result, SchedulerError};
pub use gc::GarbageCollector;
pub use probe::{NetProber, ReachabilityProber};
pub use scheduler::Scheduler;
pub use whitelist::{Whitelist, WhitelistError};
