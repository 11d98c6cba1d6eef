//! Resource specs travelling across the cluster backend boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Label map carried by every managed object.
pub type Labels = BTreeMap<String, String>;

/// A namespace as seen through the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub name: String,
    pub labels: Labels,
}

impl NamespaceRecord {
    /// Reads a label value, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Returns true if this namespace carries the managed marker.
    pub fn is_managed(&self) -> bool {
        self.label(labdock_core::labels::MANAGED) == Some(labdock_core::labels::MANAGED_VALUE)
    }
}

/// Where pods and jobs source the curriculum directory from.
///
/// The local variant mounts a host path through a copying init step; the
/// git variant clones a pinned branch in an init container. Either way the
/// container sees the same mounted directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurriculumSource {
    Git { remote: String, branch: String },
    HostPath { dir: String },
}

/// A pod to create in a LiveLesson's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodSpec {
    pub name: String,
    pub namespace: String,
    pub image: String,
    /// Union of the endpoint's declared ports. Never empty: a pod with no
    /// exposed port cannot be reached and is rejected up front.
    pub ports: Vec<u16>,
    /// Networks this pod attaches to, serialised into the annotation the
    /// CNI plugin reads.
    pub networks: Vec<String>,
    pub network_annotation: String,
    pub curriculum: CurriculumSource,
    /// Pods sharing an affinity key are pinned to one host, so per-lesson
    /// networks can stay on local bridges.
    pub affinity_key: String,
    pub labels: Labels,
}

/// Pod readiness as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodReadiness {
    Ready,
    NotReady,
    /// The pod entered a terminal failure state and will never become
    /// ready.
    Failed,
}

/// A service exposing a pod's ports inside the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub namespace: String,
    pub ports: Vec<u16>,
    pub labels: Labels,
}

/// An ingress exposing one http presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressSpec {
    pub name: String,
    pub namespace: String,
    pub endpoint: String,
    pub presentation: String,
    pub port: u16,
    pub labels: Labels,
}

/// A per-connection virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub namespace: String,
    pub subnet: Option<String>,
    pub labels: Labels,
}

/// A one-shot configuration or verification job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub namespace: String,
    pub image: String,
    /// Hostname of the endpoint the job targets.
    pub endpoint_host: String,
    pub stage: usize,
    pub config_asset: Option<String>,
    pub curriculum: CurriculumSource,
    /// Carries the `role` label (`config` or `verify`) used by
    /// [`crate::ClusterBackend::kill_jobs`].
    pub labels: Labels,
}

/// Completion state of a one-shot job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Running,
    Succeeded,
    /// The job exited non-zero.
    Failed,
}

#[derive(Serialize)]
struct NetworkAnnotation<'a> {
    name: &'a str,
}

/// JSON annotation listing a pod's network attachments, in the format the
/// CNI meta-plugin expects.
pub fn network_annotation(networks: &[String]) -> String {
    let entries: Vec<NetworkAnnotation<'_>> = networks
        .iter()
        .map(|n| NetworkAnnotation { name: n })
        .collect();
    // Serialising borrowed strings cannot fail.
    serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_annotation_format() {
        let nets = vec!["vqfx1-vqfx2-net".to_string(), "vqfx2-vqfx3-net".to_string()];
        assert_eq!(
            network_annotation(&nets),
            r#"[{"name":"vqfx1-vqfx2-net"},{"name":"vqfx2-vqfx3-net"}]"#
        );
        assert_eq!(network_annotation(&[]), "[]");
    }

    #[test]
    fn managed_marker_requires_exact_value() {
        let mut ns = NamespaceRecord {
            name: "prod-x-ns".to_string(),
            labels: Labels::new(),
        };
        assert!(!ns.is_managed());

        ns.labels
            .insert(labdock_core::labels::MANAGED.to_string(), "no".to_string());
        assert!(!ns.is_managed());

        ns.labels.insert(
            labdock_core::labels::MANAGED.to_string(),
            labdock_core::labels::MANAGED_VALUE.to_string(),
        );
        assert!(ns.is_managed());
    }
}
