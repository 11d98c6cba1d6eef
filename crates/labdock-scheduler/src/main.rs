//! labdock scheduler binary.
//!
//! Wires the catalog store, cluster backend, prober, and background tasks
//! together and runs the dispatch loop.

use std::sync::Arc;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use labdock_cluster::MemoryCluster;
use labdock_state::MemoryStore;

use labdock_scheduler::{
    dispatcher, request_channel, verification, CompletionBroadcaster, GarbageCollector, NetProber,
    Scheduler, SchedulerConfig, Whitelist,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("labdock_scheduler=info".parse()?),
        )
        .init();

    info!("labdock scheduler starting");

    let config: SchedulerConfig = Figment::new()
        .merge(Toml::file("labdock.toml"))
        .merge(Env::prefixed("LABDOCK_").split("_"))
        .extract()?;

    if config.instance_id.is_empty() {
        return Err("instance_id must be set".into());
    }
    info!(instance_id = %config.instance_id, "configuration loaded");

    // No external catalog or orchestrator is wired in this build; both
    // fall back to their in-memory providers.
    warn!("no curriculum catalog wired, starting with an empty lesson catalog");
    let store = Arc::new(MemoryStore::new(vec![]));
    let cluster = Arc::new(MemoryCluster::new());
    let prober = Arc::new(NetProber::new(config.timeouts.probe));
    let broadcaster = CompletionBroadcaster::default();
    let whitelist = Arc::new(Whitelist::new());

    let scheduler = Arc::new(Scheduler::new(
        config.clone(),
        store.clone(),
        cluster,
        prober,
        broadcaster,
        whitelist,
    ));

    let (queue, rx) = request_channel();
    let collector = GarbageCollector::new(scheduler.clone(), queue.clone());

    if config.nuke_on_start {
        let reclaimed = collector.nuke_from_orbit().await?;
        info!(reclaimed, "boot-time reclamation finished");
    }

    if config.gc.disable {
        warn!("garbage collection disabled");
    } else {
        info!(
            threshold_secs = config.gc.threshold.as_secs(),
            interval_secs = config.gc.interval.as_secs(),
            "garbage collector starting"
        );
        tokio::spawn(collector.run());
    }

    tokio::spawn(verification::run_verification_sweeper(store));

    info!("dispatcher running");
    dispatcher::run(scheduler, rx).await;

    Ok(())
}
