//! Configuration types for the scheduler.

use std::time::Duration;

use serde::Deserialize;

use labdock_cluster::CurriculumSource;

/// Scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Namespace prefix distinguishing this scheduler instance. Required;
    /// the binary refuses to start with an empty value.
    pub instance_id: String,
    /// Where pods and jobs source the curriculum from.
    pub curriculum: CurriculumConfig,
    /// Apply the egress-restricting network policy once configuration has
    /// finished, so only job pods retain internet access afterwards. Off
    /// by default.
    pub allow_egress: bool,
    /// Namespace holding the image-pull secret to sync into each lesson
    /// namespace.
    pub secrets_namespace: String,
    /// Name of the image-pull secret.
    pub pull_cred_name: String,
    /// Delete every managed namespace on boot. Destructive - a crash-loop
    /// restart with this enabled wipes all running lessons - so it must be
    /// switched on deliberately.
    pub nuke_on_start: bool,
    pub gc: GcConfig,
    pub timeouts: TimeoutConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            instance_id: "labdock".to_string(),
            curriculum: CurriculumConfig::default(),
            allow_egress: false,
            secrets_namespace: "labdock-system".to_string(),
            pull_cred_name: "pull-creds".to_string(),
            nuke_on_start: false,
            gc: GcConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

/// Curriculum source configuration.
///
/// With `local` set, lesson content is mounted from `dir` on the host;
/// otherwise an init container clones `repo_remote` at `repo_branch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CurriculumConfig {
    pub local: bool,
    pub dir: String,
    pub repo_remote: String,
    pub repo_branch: String,
}

impl Default for CurriculumConfig {
    fn default() -> Self {
        Self {
            local: false,
            dir: "/curriculum".to_string(),
            repo_remote: "https://github.com/labdock/curriculum.git".to_string(),
            repo_branch: "main".to_string(),
        }
    }
}

impl CurriculumConfig {
    /// Resolves the volume source handed to pods and jobs.
    pub fn source(&self) -> CurriculumSource {
        if self.local {
            CurriculumSource::HostPath {
                dir: self.dir.clone(),
            }
        } else {
            CurriculumSource::Git {
                remote: self.repo_remote.clone(),
                branch: self.repo_branch.clone(),
            }
        }
    }
}

/// Garbage collection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GcConfig {
    /// Idle age after which a healthy session is reaped.
    #[serde(with = "serde_duration_secs")]
    pub threshold: Duration,
    /// Idle age for sessions stuck in the error state.
    #[serde(with = "serde_duration_secs")]
    pub failed_threshold: Duration,
    /// Tick interval.
    #[serde(with = "serde_duration_secs")]
    pub interval: Duration,
    /// Disable the collector entirely. Meant for tests only.
    pub disable: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            threshold: Duration::from_secs(30 * 60),
            failed_threshold: Duration::from_secs(10 * 60),
            interval: Duration::from_secs(60),
            disable: false,
        }
    }
}

/// Wall-clock budgets and polling cadences for cluster operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-pod readiness budget.
    #[serde(with = "serde_duration_secs")]
    pub pod_ready: Duration,
    #[serde(with = "serde_duration_secs")]
    pub pod_poll: Duration,
    /// Whole-lesson reachability budget.
    #[serde(with = "serde_duration_secs")]
    pub reachability: Duration,
    #[serde(with = "serde_duration_secs")]
    pub reachability_poll: Duration,
    /// Per-probe connect timeout.
    #[serde(with = "serde_duration_secs")]
    pub probe: Duration,
    /// Per-job configuration budget.
    #[serde(with = "serde_duration_secs")]
    pub configuration: Duration,
    #[serde(with = "serde_duration_secs")]
    pub configuration_poll: Duration,
    /// Namespace-deletion budget.
    #[serde(with = "serde_duration_secs")]
    pub namespace_delete: Duration,
    #[serde(with = "serde_duration_secs")]
    pub namespace_delete_poll: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            pod_ready: Duration::from_secs(300),
            pod_poll: Duration::from_secs(1),
            reachability: Duration::from_secs(600),
            reachability_poll: Duration::from_secs(1),
            probe: Duration::from_secs(2),
            configuration: Duration::from_secs(600),
            configuration_poll: Duration::from_secs(5),
            namespace_delete: Duration::from_secs(120),
            namespace_delete_poll: Duration::from_secs(5),
        }
    }
}

/// Serde helper for Duration as seconds.
mod serde_duration_secs {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.instance_id, "labdock");
        assert!(!config.allow_egress);
        assert!(!config.nuke_on_start);
        assert_eq!(config.gc.interval, Duration::from_secs(60));
        assert_eq!(config.timeouts.pod_ready, Duration::from_secs(300));
        assert_eq!(config.timeouts.reachability, Duration::from_secs(600));
        assert_eq!(config.timeouts.namespace_delete, Duration::from_secs(120));
    }

    #[test]
    fn curriculum_source_resolution() {
        let mut curriculum = CurriculumConfig::default();
        assert!(matches!(curriculum.source(), CurriculumSource::Git { .. }));

        curriculum.local = true;
        curriculum.dir = "/antidote".to_string();
        match curriculum.source() {
            CurriculumSource::HostPath { dir } => assert_eq!(dir, "/antidote"),
            other => panic!("expected host path, got {other:?}"),
        }
    }

    #[test]
    fn durations_deserialise_from_seconds() {
        let config: GcConfig = serde_json::from_str(
            r#"{"threshold": 120, "failed_threshold": 30, "interval": 10, "disable": true}"#,
        )
        .unwrap();
        assert_eq!(config.threshold, Duration::from_secs(120));
        assert_eq!(config.failed_threshold, Duration::from_secs(30));
        assert_eq!(config.interval, Duration::from_secs(10));
        assert!(config.disable);
    }
}
