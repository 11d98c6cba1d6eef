//! Deterministic naming conventions and mandatory label keys.
//!
//! Every name the scheduler derives is a pure function of its inputs, so
//! repeated derivation always yields identical strings. The garbage
//! collector and startup reclamation filter strictly on the `managed`
//! label; nothing created outside these conventions is ever touched.

/// Label keys and values stamped on every cluster object the scheduler
/// creates.
pub mod labels {
    /// Marks an object as owned by this system. Deletion paths filter on
    /// this label exclusively.
    pub const MANAGED: &str = "managed";
    /// The only value ever written for [`MANAGED`].
    pub const MANAGED_VALUE: &str = "yes";
    pub const LIVE_LESSON_ID: &str = "liveLessonId";
    pub const SESSION_ID: &str = "sessionId";
    pub const LESSON_SLUG: &str = "lessonSlug";
    pub const INSTANCE_ID: &str = "instanceId";
    /// RFC 3339 creation timestamp on namespaces.
    pub const CREATED: &str = "created";
    /// RFC 3339 last-interaction timestamp on namespaces. Canonical source
    /// for GC idle-age computation.
    pub const LAST_INTERACTION: &str = "lastInteraction";
    /// Job role: [`ROLE_CONFIG`] or [`ROLE_VERIFY`].
    pub const ROLE: &str = "role";
    pub const ROLE_CONFIG: &str = "config";
    pub const ROLE_VERIFY: &str = "verify";
    pub const POD_NAME: &str = "podName";
}

/// LiveLesson id for a (lesson, session) pair: `{lesson_slug}-{session_id}`.
pub fn live_lesson_id(lesson_slug: &str, session_id: &str) -> String {
    format!("{lesson_slug}-{session_id}")
}

/// Namespace backing a LiveLesson: `{instance_id}-{live_lesson_id}-ns`.
pub fn namespace_name(instance_id: &str, live_lesson_id: &str) -> String {
    format!("{instance_id}-{live_lesson_id}-ns")
}

/// Network backing a connection: `{a}-{b}-net`.
pub fn network_name(a: &str, b: &str) -> String {
    format!("{a}-{b}-net")
}

/// Verification task id: `{live_lesson_id}:{stage}`.
pub fn verification_task_id(live_lesson_id: &str, stage: usize) -> String {
    format!("{live_lesson_id}:{stage}")
}

/// Name of the one-shot job configuring `endpoint` for `stage`.
pub fn config_job_name(endpoint: &str, stage: usize) -> String {
    format!("config-{endpoint}-{stage}")
}

/// Name of the one-shot job verifying `stage` completeness.
pub fn verify_job_name(stage: usize) -> String {
    format!("verify-{stage}")
}
