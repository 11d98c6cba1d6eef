//! Live per-session instance types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lesson::{ConfigurationType, PresentationKind};

/// A running per-session instance of a lesson stage.
///
/// The catalog store is the single source of truth for these records; the
/// scheduler reads and mutates them per request and keeps no authoritative
/// in-memory copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveLesson {
    /// Deterministic id: `{lesson_slug}-{session_id}`.
    pub id: String,
    pub session_id: String,
    pub lesson_slug: String,
    /// 0-based index into the lesson's stages.
    pub current_stage: usize,
    pub status: LiveLessonStatus,
    /// Set when provisioning or configuration failed terminally.
    pub error: bool,
    /// Probes that passed in the most recent reachability cycle.
    pub healthy_tests: usize,
    /// Probes performed in the most recent reachability cycle.
    pub total_tests: usize,
    /// Live endpoints keyed by endpoint name. Owned exclusively by this
    /// record.
    pub endpoints: BTreeMap<String, LiveEndpoint>,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
}

impl LiveLesson {
    /// Pre-initialised record for a fresh CREATE, before any cluster
    /// resources exist.
    pub fn new(
        id: impl Into<String>,
        session_id: impl Into<String>,
        lesson_slug: impl Into<String>,
        stage: usize,
        endpoints: BTreeMap<String, LiveEndpoint>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            lesson_slug: lesson_slug.into(),
            current_stage: stage,
            status: LiveLessonStatus::InitialBoot,
            error: false,
            healthy_tests: 0,
            total_tests: 0,
            endpoints,
            created_at: now,
            last_interaction_at: now,
        }
    }

    /// Total reachability probes a full cycle performs: one per
    /// presentation across all endpoints.
    pub fn presentation_count(&self) -> usize {
        self.endpoints.values().map(|e| e.presentations.len()).sum()
    }
}

/// Lifecycle status of a LiveLesson.
///
/// The happy path is monotonic: InitialBoot → Booting → Configuration →
/// Ready. MODIFY re-enters Configuration; Error is terminal for the current
/// operation and reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveLessonStatus {
    InitialBoot,
    Booting,
    Configuration,
    Ready,
    Error,
}

impl LiveLessonStatus {
    /// Returns true if the environment is serving learners.
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// A provisioned endpoint inside a LiveLesson.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveEndpoint {
    pub name: String,
    pub image: String,
    /// Cluster IP of the backing service, assigned during provisioning.
    /// Empty until the service exists.
    #[serde(default)]
    pub host: String,
    pub configuration_type: ConfigurationType,
    pub ports: Vec<u16>,
    pub presentations: Vec<LivePresentation>,
}

/// A presentation with its resolved port on the live endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivePresentation {
    pub name: String,
    pub port: u16,
    pub kind: PresentationKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_endpoint(name: &str, presentations: usize) -> LiveEndpoint {
        LiveEndpoint {
            name: name.to_string(),
            image: "labdock/vqfx".to_string(),
            host: String::new(),
            configuration_type: ConfigurationType::None,
            ports: vec![22],
            presentations: (0..presentations)
                .map(|i| LivePresentation {
                    name: format!("p{i}"),
                    port: 22,
                    kind: PresentationKind::Ssh,
                })
                .collect(),
        }
    }

    #[test]
    fn new_live_lesson_starts_in_initial_boot() {
        let ll = LiveLesson::new("bgp-basics-s1", "s1", "bgp-basics", 0, BTreeMap::new(), Utc::now());
        assert_eq!(ll.status, LiveLessonStatus::InitialBoot);
        assert!(!ll.error);
        assert_eq!(ll.healthy_tests, 0);
        assert_eq!(ll.created_at, ll.last_interaction_at);
    }

    #[test]
    fn presentation_count_sums_across_endpoints() {
        let mut endpoints = BTreeMap::new();
        endpoints.insert("a".to_string(), live_endpoint("a", 2));
        endpoints.insert("b".to_string(), live_endpoint("b", 1));
        let ll = LiveLesson::new("id", "s1", "slug", 0, endpoints, Utc::now());
        assert_eq!(ll.presentation_count(), 3);
    }
}
