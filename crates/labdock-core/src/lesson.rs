//! Immutable lesson catalog types.

use serde::{Deserialize, Serialize};

/// A lesson definition as loaded from the curriculum catalog.
///
/// Lessons are immutable once loaded; the scheduler only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Unique, URL-safe identifier (e.g. `bgp-basics`).
    pub slug: String,
    /// Human-readable title.
    pub name: String,
    /// Ordered stages. A lesson always has at least one stage; stage
    /// indices are 0-based.
    pub stages: Vec<Stage>,
    /// Named container roles backing the lesson topology.
    pub endpoints: Vec<Endpoint>,
    /// Virtual links between endpoints.
    pub connections: Vec<Connection>,
    /// Slugs of lessons a learner should complete first.
    #[serde(default)]
    pub prereqs: Vec<String>,
}

impl Lesson {
    /// Looks up an endpoint definition by name.
    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.name == name)
    }

    /// Returns true if any stage presents its lab guide through a Jupyter
    /// notebook, which requires an extra guide endpoint at provision time.
    pub fn uses_jupyter_lab_guide(&self) -> bool {
        self.stages.iter().any(|s| s.jupyter_lab_guide)
    }

    /// Network names an endpoint participates in, in connection order.
    pub fn member_networks(&self, endpoint: &str) -> Vec<String> {
        self.connections
            .iter()
            .filter(|c| c.a == endpoint || c.b == endpoint)
            .map(Connection::network_name)
            .collect()
    }
}

/// One ordered step within a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Markdown lab guide shown to the learner.
    pub lab_guide: String,
    /// Present the guide as a Jupyter notebook instead of markdown.
    #[serde(default)]
    pub jupyter_lab_guide: bool,
    /// Whether this stage offers a completeness verification check.
    #[serde(default)]
    pub verify_completeness: bool,
    /// Per-stage configuration asset handed to configuration jobs.
    #[serde(default)]
    pub config_asset: Option<String>,
}

/// A container role inside a lesson (device, utility, blackbox, lab guide).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub name: String,
    pub image: String,
    /// Ports exposed beyond those implied by presentations.
    #[serde(default)]
    pub additional_ports: Vec<u16>,
    #[serde(default)]
    pub configuration_type: ConfigurationType,
    #[serde(default)]
    pub presentations: Vec<Presentation>,
}

impl Endpoint {
    /// The deduplicated union of additional ports and presentation ports,
    /// in first-seen order. Every pod exposes exactly this set.
    pub fn exposed_ports(&self) -> Vec<u16> {
        let mut ports = Vec::new();
        for &p in self
            .additional_ports
            .iter()
            .chain(self.presentations.iter().map(|pr| &pr.port))
        {
            if !ports.contains(&p) {
                ports.push(p);
            }
        }
        ports
    }
}

/// How an endpoint gets configured when a stage begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigurationType {
    /// No configuration job runs for this endpoint.
    #[default]
    None,
    Ansible,
    Python,
    Napalm,
}

impl ConfigurationType {
    /// Returns true if a configuration job must run for this endpoint.
    pub const fn requires_job(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Image executing this configuration flavour.
    pub const fn image(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Ansible => "labdock/config-ansible",
            Self::Python => "labdock/config-python",
            Self::Napalm => "labdock/config-napalm",
        }
    }
}

/// A user-facing protocol surface exposed by an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub name: String,
    pub port: u16,
    pub kind: PresentationKind,
}

/// Protocol spoken on a presentation port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentationKind {
    Http,
    Ssh,
    Vnc,
}

/// A virtual link between two endpoints, optionally carrying a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub a: String,
    pub b: String,
    #[serde(default)]
    pub subnet: Option<String>,
}

impl Connection {
    /// Deterministic network name for this connection.
    pub fn network_name(&self) -> String {
        crate::naming::network_name(&self.a, &self.b)
    }
}
