//! Test fixtures for scheduler integration tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use labdock_core::{
    ConfigurationType, Connection, Endpoint, Lesson, Presentation, PresentationKind, Stage,
};
use labdock_scheduler::ReachabilityProber;

/// Builder for lesson definitions.
pub struct LessonBuilder {
    slug: String,
    stages: Vec<Stage>,
    endpoints: Vec<Endpoint>,
    connections: Vec<Connection>,
}

impl LessonBuilder {
    pub fn new(slug: &str) -> Self {
        Self {
            slug: slug.to_string(),
            stages: vec![],
            endpoints: vec![],
            connections: vec![],
        }
    }

    /// Adds a plain stage.
    pub fn with_stage(mut self) -> Self {
        self.stages.push(Stage {
            lab_guide: format!("stage{}.md", self.stages.len()),
            jupyter_lab_guide: false,
            verify_completeness: false,
            config_asset: None,
        });
        self
    }

    /// Adds a stage offering a completeness verification.
    pub fn with_verified_stage(mut self) -> Self {
        self.stages.push(Stage {
            lab_guide: format!("stage{}.md", self.stages.len()),
            jupyter_lab_guide: false,
            verify_completeness: true,
            config_asset: None,
        });
        self
    }

    /// Adds a jupyter-guided stage.
    pub fn with_jupyter_stage(mut self) -> Self {
        self.stages.push(Stage {
            lab_guide: format!("stage{}.ipynb", self.stages.len()),
            jupyter_lab_guide: true,
            verify_completeness: false,
            config_asset: None,
        });
        self
    }

    /// Adds a device endpoint with one ssh presentation on port 22.
    pub fn with_ssh_endpoint(mut self, name: &str, configuration: ConfigurationType) -> Self {
        self.endpoints.push(Endpoint {
            name: name.to_string(),
            image: "labdock/vqfx".to_string(),
            additional_ports: vec![],
            configuration_type: configuration,
            presentations: vec![Presentation {
                name: "cli".to_string(),
                port: 22,
                kind: PresentationKind::Ssh,
            }],
        });
        self
    }

    /// Adds a utility endpoint with one http presentation.
    pub fn with_http_endpoint(mut self, name: &str, port: u16) -> Self {
        self.endpoints.push(Endpoint {
            name: name.to_string(),
            image: "labdock/utility".to_string(),
            additional_ports: vec![],
            configuration_type: ConfigurationType::None,
            presentations: vec![Presentation {
                name: "web".to_string(),
                port,
                kind: PresentationKind::Http,
            }],
        });
        self
    }

    pub fn with_connection(mut self, a: &str, b: &str) -> Self {
        self.connections.push(Connection {
            a: a.to_string(),
            b: b.to_string(),
            subnet: None,
        });
        self
    }

    pub fn build(self) -> Lesson {
        Lesson {
            name: self.slug.clone(),
            slug: self.slug,
            stages: self.stages,
            endpoints: self.endpoints,
            connections: self.connections,
            prereqs: vec![],
        }
    }
}

/// The two-router lesson used by most scenarios: `vqfx1` and `vqfx2`,
/// one connection, one ssh presentation each, napalm configuration.
pub fn bgp_basics() -> Lesson {
    LessonBuilder::new("bgp-basics")
        .with_stage()
        .with_stage()
        .with_ssh_endpoint("vqfx1", ConfigurationType::Napalm)
        .with_ssh_endpoint("vqfx2", ConfigurationType::Napalm)
        .with_connection("vqfx1", "vqfx2")
        .build()
}

/// Scriptable prober. Everything is reachable unless told otherwise.
#[derive(Debug, Default)]
pub struct ScriptedProber {
    fail_all: AtomicBool,
    unreachable_ports: Mutex<HashSet<u16>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every probe fail, as if no endpoint ever came up.
    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Makes probes against one port fail.
    pub fn set_port_unreachable(&self, port: u16) {
        self.unreachable_ports.lock().unwrap().insert(port);
    }
}

#[async_trait]
impl ReachabilityProber for ScriptedProber {
    async fn probe(&self, _host: &str, port: u16, _kind: PresentationKind) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return false;
        }
        !self.unreachable_ports.lock().unwrap().contains(&port)
    }
}
