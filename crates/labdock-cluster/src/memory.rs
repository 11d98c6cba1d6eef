//! In-memory cluster backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::backend::ClusterBackend;
use crate::error::{ClusterError, Result};
use crate::resources::{
    IngressSpec, JobPhase, JobSpec, NamespaceRecord, NetworkSpec, PodReadiness, PodSpec,
    ServiceSpec,
};

/// Scripted outcome for a job in the memory backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Report Running for `n` status polls, then Succeeded.
    SucceedAfter(u32),
    /// Report Failed on the first status poll.
    Fail,
    /// Report Running forever, forcing the caller's budget to expire.
    Never,
}

#[derive(Debug, Clone)]
struct PodEntry {
    spec: PodSpec,
    status_polls: u32,
}

#[derive(Debug, Clone)]
struct JobEntry {
    spec: JobSpec,
    status_polls: u32,
}

#[derive(Debug, Default)]
struct NsEntry {
    record: Option<NamespaceRecord>,
    pods: HashMap<String, PodEntry>,
    services: HashMap<String, ServiceSpec>,
    service_ips: HashMap<String, String>,
    ingresses: Vec<IngressSpec>,
    networks: HashMap<String, NetworkSpec>,
    jobs: HashMap<String, JobEntry>,
    secrets: Vec<String>,
    network_policy: bool,
    pods_created: u32,
    /// Remaining get-polls before a deleted namespace disappears.
    deleting: Option<u32>,
}

/// A complete in-memory [`ClusterBackend`].
///
/// Behaviour is scriptable per resource so tests can exercise slow-booting
/// pods, failing configuration jobs, and lingering namespace deletion. By
/// default pods are ready on the first poll, jobs succeed on the first
/// poll, and namespaces disappear as soon as deletion starts.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    namespaces: DashMap<String, NsEntry>,
    ip_counter: AtomicU32,
    pod_ready_after: DashMap<String, u32>,
    failed_pods: DashMap<String, ()>,
    job_outcomes: DashMap<String, JobOutcome>,
    namespace_delete_polls: AtomicU32,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(namespace: &str, name: &str) -> String {
        format!("{namespace}/{name}")
    }

    // ── Behaviour scripting ─────────────────────────────────────────

    /// Keep the pod NotReady for `polls` readiness checks.
    pub fn script_pod_ready_after(&self, namespace: &str, pod: &str, polls: u32) {
        self.pod_ready_after.insert(Self::key(namespace, pod), polls);
    }

    /// Report the pod as terminally Failed.
    pub fn script_pod_failure(&self, namespace: &str, pod: &str) {
        self.failed_pods.insert(Self::key(namespace, pod), ());
    }

    /// Overrides the outcome of a named job.
    pub fn script_job_outcome(&self, namespace: &str, job: &str, outcome: JobOutcome) {
        self.job_outcomes.insert(Self::key(namespace, job), outcome);
    }

    /// Makes deleted namespaces linger for `polls` existence checks.
    pub fn script_namespace_delete_polls(&self, polls: u32) {
        self.namespace_delete_polls.store(polls, Ordering::SeqCst);
    }

    // ── Test inspection ─────────────────────────────────────────────

    pub fn namespace_names(&self) -> Vec<String> {
        self.namespaces.iter().map(|e| e.key().clone()).collect()
    }

    pub fn pod_names(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.pods.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn pod(&self, namespace: &str, name: &str) -> Option<PodSpec> {
        self.namespaces
            .get(namespace)?
            .pods
            .get(name)
            .map(|p| p.spec.clone())
    }

    /// How many pods were actually created (adoptions excluded).
    pub fn pods_created(&self, namespace: &str) -> u32 {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.pods_created)
            .unwrap_or(0)
    }

    pub fn service_ip(&self, namespace: &str, name: &str) -> Option<String> {
        self.namespaces
            .get(namespace)?
            .service_ips
            .get(name)
            .cloned()
    }

    pub fn ingresses(&self, namespace: &str) -> Vec<IngressSpec> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.ingresses.clone())
            .unwrap_or_default()
    }

    pub fn network_names(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.networks.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn job_names(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.jobs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_network_policy(&self, namespace: &str) -> bool {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.network_policy)
            .unwrap_or(false)
    }

    pub fn secrets(&self, namespace: &str) -> Vec<String> {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.secrets.clone())
            .unwrap_or_default()
    }

    fn next_cluster_ip(&self) -> String {
        let n = self.ip_counter.fetch_add(1, Ordering::SeqCst);
        format!("10.53.{}.{}", n / 250, n % 250 + 1)
    }
}

#[async_trait]
impl ClusterBackend for MemoryCluster {
    async fn create_namespace(&self, ns: NamespaceRecord) -> Result<NamespaceRecord> {
        let mut entry = self.namespaces.entry(ns.name.clone()).or_default();
        match &entry.record {
            Some(existing) => {
                warn!(namespace = %ns.name, "namespace already exists, treating as provisioned");
                Ok(existing.clone())
            }
            None => {
                info!(namespace = %ns.name, "created namespace");
                entry.record = Some(ns.clone());
                Ok(ns)
            }
        }
    }

    async fn delete_namespace(&self, name: &str) -> Result<()> {
        let mut entry = self
            .namespaces
            .get_mut(name)
            .ok_or_else(|| ClusterError::not_found("namespace", name))?;
        let linger = self.namespace_delete_polls.load(Ordering::SeqCst);
        entry.deleting = Some(linger);
        drop(entry);

        if linger == 0 {
            self.namespaces.remove(name);
        }
        info!(namespace = %name, "namespace deletion started");
        Ok(())
    }

    async fn get_namespace(&self, name: &str) -> Result<NamespaceRecord> {
        let mut remove = false;
        let result = {
            let mut entry = self
                .namespaces
                .get_mut(name)
                .ok_or_else(|| ClusterError::not_found("namespace", name))?;
            match entry.deleting {
                Some(0) => {
                    remove = true;
                    Err(ClusterError::not_found("namespace", name))
                }
                Some(n) => {
                    entry.deleting = Some(n - 1);
                    entry
                        .record
                        .clone()
                        .ok_or_else(|| ClusterError::not_found("namespace", name))
                }
                None => entry
                    .record
                    .clone()
                    .ok_or_else(|| ClusterError::not_found("namespace", name)),
            }
        };
        if remove {
            self.namespaces.remove(name);
        }
        result
    }

    async fn list_managed_namespaces(&self) -> Result<Vec<NamespaceRecord>> {
        Ok(self
            .namespaces
            .iter()
            .filter(|e| e.deleting.is_none())
            .filter_map(|e| e.record.clone())
            .filter(NamespaceRecord::is_managed)
            .collect())
    }

    async fn set_namespace_label(&self, name: &str, key: &str, value: &str) -> Result<()> {
        let mut entry = self
            .namespaces
            .get_mut(name)
            .ok_or_else(|| ClusterError::not_found("namespace", name))?;
        match &mut entry.record {
            Some(record) => {
                record.labels.insert(key.to_string(), value.to_string());
                Ok(())
            }
            None => Err(ClusterError::not_found("namespace", name)),
        }
    }

    async fn sync_secret(&self, _from_ns: &str, to_ns: &str, secret: &str) -> Result<()> {
        let mut entry = self
            .namespaces
            .get_mut(to_ns)
            .ok_or_else(|| ClusterError::not_found("namespace", to_ns))?;
        entry.secrets.push(secret.to_string());
        Ok(())
    }

    async fn create_network(&self, network: NetworkSpec) -> Result<()> {
        let mut entry = self
            .namespaces
            .get_mut(&network.namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", &network.namespace))?;
        debug!(namespace = %network.namespace, network = %network.name, "created network");
        entry.networks.insert(network.name.clone(), network);
        Ok(())
    }

    async fn create_pod(&self, pod: PodSpec) -> Result<PodSpec> {
        let mut entry = self
            .namespaces
            .get_mut(&pod.namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", &pod.namespace))?;
        if let Some(existing) = entry.pods.get(&pod.name) {
            warn!(namespace = %pod.namespace, pod = %pod.name, "pod already exists, adopting");
            return Ok(existing.spec.clone());
        }
        info!(
            namespace = %pod.namespace,
            pod = %pod.name,
            networks = %pod.network_annotation,
            "created pod"
        );
        entry.pods.insert(
            pod.name.clone(),
            PodEntry {
                spec: pod.clone(),
                status_polls: 0,
            },
        );
        entry.pods_created += 1;
        Ok(pod)
    }

    async fn create_service(&self, service: ServiceSpec) -> Result<String> {
        let mut entry = self
            .namespaces
            .get_mut(&service.namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", &service.namespace))?;
        if let Some(existing_ip) = entry.service_ips.get(&service.name) {
            warn!(namespace = %service.namespace, service = %service.name, "service already exists, adopting");
            return Ok(existing_ip.clone());
        }
        let ip = self.next_cluster_ip();
        info!(namespace = %service.namespace, service = %service.name, cluster_ip = %ip, "created service");
        entry.service_ips.insert(service.name.clone(), ip.clone());
        entry.services.insert(service.name.clone(), service);
        Ok(ip)
    }

    async fn create_ingress(&self, ingress: IngressSpec) -> Result<()> {
        let mut entry = self
            .namespaces
            .get_mut(&ingress.namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", &ingress.namespace))?;
        debug!(namespace = %ingress.namespace, ingress = %ingress.name, "created ingress");
        entry.ingresses.push(ingress);
        Ok(())
    }

    async fn pod_ready(&self, namespace: &str, pod: &str) -> Result<PodReadiness> {
        if self.failed_pods.contains_key(&Self::key(namespace, pod)) {
            return Ok(PodReadiness::Failed);
        }
        let mut entry = self
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", namespace))?;
        let pod_entry = entry
            .pods
            .get_mut(pod)
            .ok_or_else(|| ClusterError::not_found("pod", pod))?;
        pod_entry.status_polls += 1;
        let ready_after = self
            .pod_ready_after
            .get(&Self::key(namespace, pod))
            .map(|r| *r)
            .unwrap_or(0);
        if pod_entry.status_polls > ready_after {
            Ok(PodReadiness::Ready)
        } else {
            Ok(PodReadiness::NotReady)
        }
    }

    async fn create_job(&self, job: JobSpec) -> Result<()> {
        let mut entry = self
            .namespaces
            .get_mut(&job.namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", &job.namespace))?;
        info!(namespace = %job.namespace, job = %job.name, "created job");
        entry.jobs.insert(
            job.name.clone(),
            JobEntry {
                spec: job,
                status_polls: 0,
            },
        );
        Ok(())
    }

    async fn job_status(&self, namespace: &str, job: &str) -> Result<JobPhase> {
        let outcome = self
            .job_outcomes
            .get(&Self::key(namespace, job))
            .map(|o| *o)
            .unwrap_or(JobOutcome::SucceedAfter(0));
        let mut entry = self
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", namespace))?;
        let job_entry = entry
            .jobs
            .get_mut(job)
            .ok_or_else(|| ClusterError::not_found("job", job))?;
        job_entry.status_polls += 1;
        Ok(match outcome {
            JobOutcome::Fail => JobPhase::Failed,
            JobOutcome::Never => JobPhase::Running,
            JobOutcome::SucceedAfter(n) if job_entry.status_polls > n => JobPhase::Succeeded,
            JobOutcome::SucceedAfter(_) => JobPhase::Running,
        })
    }

    async fn kill_jobs(&self, namespace: &str, role: &str) -> Result<usize> {
        let mut entry = self
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", namespace))?;
        let before = entry.jobs.len();
        entry.jobs.retain(|_, j| {
            j.spec.labels.get(labdock_core::labels::ROLE).map(String::as_str) != Some(role)
        });
        let killed = before - entry.jobs.len();
        if killed > 0 {
            info!(namespace = %namespace, role = %role, killed, "killed jobs");
        }
        Ok(killed)
    }

    async fn create_network_policy(&self, namespace: &str) -> Result<()> {
        let mut entry = self
            .namespaces
            .get_mut(namespace)
            .ok_or_else(|| ClusterError::not_found("namespace", namespace))?;
        entry.network_policy = true;
        debug!(namespace = %namespace, "applied egress-restricting network policy");
        Ok(())
    }
}
