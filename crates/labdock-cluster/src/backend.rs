//! The cluster backend contract.

use async_trait::async_trait;

use crate::error::Result;
use crate::resources::{
    IngressSpec, JobPhase, JobSpec, NamespaceRecord, NetworkSpec, PodReadiness, PodSpec,
    ServiceSpec,
};

/// Everything the scheduler asks of a container orchestrator.
///
/// Implementations must be safe to call concurrently from many handler
/// tasks. Creation calls are expected to tolerate AlreadyExists by
/// adopting: an existing namespace counts as already provisioned and an
/// existing pod is returned as-is, so a retried CREATE converges instead
/// of failing.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Creates a namespace, or returns the existing record if one with the
    /// same name is already present.
    async fn create_namespace(&self, ns: NamespaceRecord) -> Result<NamespaceRecord>;

    /// Starts deletion of a namespace. Deletion is asynchronous; callers
    /// poll [`Self::get_namespace`] until it reports NotFound.
    async fn delete_namespace(&self, name: &str) -> Result<()>;

    async fn get_namespace(&self, name: &str) -> Result<NamespaceRecord>;

    /// Lists namespaces carrying the managed marker. Unmanaged namespaces
    /// are never returned, so deletion sweeps cannot touch them.
    async fn list_managed_namespaces(&self) -> Result<Vec<NamespaceRecord>>;

    async fn set_namespace_label(&self, name: &str, key: &str, value: &str) -> Result<()>;

    /// Copies the image-pull secret `secret` from `from_ns` into `to_ns`.
    async fn sync_secret(&self, from_ns: &str, to_ns: &str, secret: &str) -> Result<()>;

    async fn create_network(&self, network: NetworkSpec) -> Result<()>;

    /// Creates a pod, adopting an existing pod of the same name.
    async fn create_pod(&self, pod: PodSpec) -> Result<PodSpec>;

    /// Creates a service for a pod's ports and returns its cluster IP.
    async fn create_service(&self, service: ServiceSpec) -> Result<String>;

    async fn create_ingress(&self, ingress: IngressSpec) -> Result<()>;

    async fn pod_ready(&self, namespace: &str, pod: &str) -> Result<PodReadiness>;

    async fn create_job(&self, job: JobSpec) -> Result<()>;

    async fn job_status(&self, namespace: &str, job: &str) -> Result<JobPhase>;

    /// Terminates every job in `namespace` whose `role` label equals
    /// `role`. Returns how many jobs were killed.
    async fn kill_jobs(&self, namespace: &str, role: &str) -> Result<usize>;

    /// Applies the egress-restricting network policy to a namespace so
    /// that only job pods retain internet access.
    async fn create_network_policy(&self, namespace: &str) -> Result<()>;
}
