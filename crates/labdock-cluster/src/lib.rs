//! Cluster backend for the labdock scheduler.
//!
//! The scheduler never talks to an orchestrator directly; it goes through
//! the [`ClusterBackend`] trait. This crate defines that contract, the
//! resource specs travelling across it, and [`MemoryCluster`], a complete
//! in-memory implementation with scriptable pod/job/namespace behaviour.
//! The memory backend is what the binary falls back to when no real
//! orchestrator is wired in, and what every integration test drives - the
//! core is fully exercisable without a cluster.

pub mod backend;
pub mod error;
pub mod memory;
pub mod resources;

pub use backend::ClusterBackend;
pub use error::{ClusterError, Result};
pub use memory::{JobOutcome, MemoryCluster};
pub use resources::{
    network_annotation, CurriculumSource, IngressSpec, JobPhase, JobSpec, Labels, NamespaceRecord,
    NetworkSpec, PodReadiness, PodSpec, ServiceSpec,
};
