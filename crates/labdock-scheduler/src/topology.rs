//! Cluster topology construction for CREATE.
//!
//! Builds everything a LiveLesson needs, in dependency order: namespace,
//! image-pull secret, the optional jupyter lab-guide endpoint, one network
//! per connection, then per endpoint a pod (pinned to a single host with
//! the rest of the lesson), a service when ports are exposed, and an
//! ingress per http presentation.

use chrono::Utc;
use tracing::{info, instrument, warn};

use labdock_cluster::{
    network_annotation, IngressSpec, Labels, NamespaceRecord, NetworkSpec, PodSpec, ServiceSpec,
};
use labdock_core::lesson::ConfigurationType;
use labdock_core::{labels, Lesson, LessonScheduleRequest, LiveEndpoint, LivePresentation, PresentationKind};

use crate::error::Result;
use crate::scheduler::Scheduler;

/// Endpoint name reserved for the jupyter lab guide.
pub const JUPYTER_ENDPOINT: &str = "jupyterlabguide";
const JUPYTER_IMAGE: &str = "labdock/jupyter";
const JUPYTER_PORT: u16 = 8888;

impl Scheduler {
    /// Creates the full cluster topology for a LiveLesson and returns the
    /// names of the pods it created, for the readiness wait that follows.
    #[instrument(skip_all, fields(live_lesson_id = %req.live_lesson_id, namespace = %ns_name))]
    pub(crate) async fn build_topology(
        &self,
        lesson: &Lesson,
        req: &LessonScheduleRequest,
        ns_name: &str,
    ) -> Result<Vec<String>> {
        self.cluster
            .create_namespace(NamespaceRecord {
                name: ns_name.to_string(),
                labels: self.namespace_labels(req),
            })
            .await?;

        if let Err(e) = self
            .cluster
            .sync_secret(
                &self.config.secrets_namespace,
                ns_name,
                &self.config.pull_cred_name,
            )
            .await
        {
            // Ingress-backed presentations may not come up without the pull
            // secret, but the lesson itself can still boot.
            warn!(namespace = %ns_name, error = %e, "unable to sync image-pull secret");
        }

        if lesson.uses_jupyter_lab_guide() {
            self.store
                .upsert_live_lesson_endpoint(&req.live_lesson_id, jupyter_guide_endpoint())
                .await?;
        }

        // Reload so the provisioning loop below sees any appended
        // endpoints; the store copy stays authoritative.
        let ll = self.store.get_live_lesson(&req.live_lesson_id).await?;

        for connection in &lesson.connections {
            self.cluster
                .create_network(NetworkSpec {
                    name: connection.network_name(),
                    namespace: ns_name.to_string(),
                    subnet: connection.subnet.clone(),
                    labels: self.object_labels(req),
                })
                .await?;
        }

        let curriculum = self.config.curriculum.source();
        let mut pod_names = Vec::with_capacity(ll.endpoints.len());

        for ep in ll.endpoints.values() {
            let networks = lesson.member_networks(&ep.name);
            let mut pod_labels = self.object_labels(req);
            pod_labels.insert(labels::POD_NAME.to_string(), ep.name.clone());

            let pod = self
                .cluster
                .create_pod(PodSpec {
                    name: ep.name.clone(),
                    namespace: ns_name.to_string(),
                    image: ep.image.clone(),
                    ports: ep.ports.clone(),
                    network_annotation: network_annotation(&networks),
                    networks,
                    curriculum: curriculum.clone(),
                    affinity_key: req.live_lesson_id.clone(),
                    labels: pod_labels,
                })
                .await?;
            pod_names.push(pod.name.clone());

            if !ep.ports.is_empty() {
                let cluster_ip = self
                    .cluster
                    .create_service(ServiceSpec {
                        name: ep.name.clone(),
                        namespace: ns_name.to_string(),
                        ports: ep.ports.clone(),
                        labels: self.object_labels(req),
                    })
                    .await?;
                self.store
                    .update_live_lesson_endpoint_ip(&req.live_lesson_id, &ep.name, &cluster_ip)
                    .await?;
            }

            for presentation in &ep.presentations {
                if presentation.kind == PresentationKind::Http {
                    self.cluster
                        .create_ingress(IngressSpec {
                            name: format!("{}-{}", ep.name, presentation.name),
                            namespace: ns_name.to_string(),
                            endpoint: ep.name.clone(),
                            presentation: presentation.name.clone(),
                            port: presentation.port,
                            labels: self.object_labels(req),
                        })
                        .await?;
                }
            }
        }

        info!(
            namespace = %ns_name,
            pods = pod_names.len(),
            networks = lesson.connections.len(),
            "topology created"
        );
        Ok(pod_names)
    }

    /// Labels stamped on every created object.
    pub(crate) fn object_labels(&self, req: &LessonScheduleRequest) -> Labels {
        let mut l = Labels::new();
        l.insert(labels::MANAGED.to_string(), labels::MANAGED_VALUE.to_string());
        l.insert(labels::LIVE_LESSON_ID.to_string(), req.live_lesson_id.clone());
        l.insert(labels::SESSION_ID.to_string(), req.session_id.clone());
        l.insert(labels::LESSON_SLUG.to_string(), req.lesson_slug.clone());
        l
    }

    /// Namespace labels: the common object labels plus the instance marker
    /// and the timestamps the garbage collector reads.
    fn namespace_labels(&self, req: &LessonScheduleRequest) -> Labels {
        let now = Utc::now().to_rfc3339();
        let mut l = self.object_labels(req);
        l.insert(labels::INSTANCE_ID.to_string(), self.config.instance_id.clone());
        l.insert(labels::CREATED.to_string(), now.clone());
        l.insert(labels::LAST_INTERACTION.to_string(), now);
        l
    }
}

fn jupyter_guide_endpoint() -> LiveEndpoint {
    LiveEndpoint {
        name: JUPYTER_ENDPOINT.to_string(),
        image: JUPYTER_IMAGE.to_string(),
        host: String::new(),
        configuration_type: ConfigurationType::None,
        ports: vec![JUPYTER_PORT],
        presentations: vec![LivePresentation {
            name: "web".to_string(),
            port: JUPYTER_PORT,
            kind: PresentationKind::Http,
        }],
    }
}
