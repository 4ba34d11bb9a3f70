#![deny(unused)]
//! wardend - container lifecycle daemon
//!
//! Loads configuration, builds the resource pools and script backend,
//! resumes every container left in the depot by a previous run, and then
//! serves until interrupted.

use std::sync::Arc;

use warden_container::{resume_depot, ContainerContext, ContainerRegistry, Pools, ScriptBackend};
use warden_core::config::WardenConfig;
use warden_core::telemetry::configure_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/default".to_string());
    let config = WardenConfig::load(&config_path)?;

    configure_tracing(&config.logging)?;

    tracing::info!(config = %config_path, "Starting wardend v{}", env!("CARGO_PKG_VERSION"));

    // =========================================================================
    // Depot and pools
    // =========================================================================
    std::fs::create_dir_all(&config.server.container_depot_path)?;

    let pools = Pools::from_config(&config)?;
    tracing::info!(
        networks = pools.network.available(),
        ports = pools.port.available(),
        users = pools.user.available(),
        "Resource pools initialized"
    );

    // =========================================================================
    // Containers
    // =========================================================================
    let backend = Arc::new(ScriptBackend::new(&config.server.container_script_path));
    let registry = Arc::new(ContainerRegistry::new());
    let ctx = ContainerContext::new(&config.server, pools, backend, registry.clone());

    let resumed = resume_depot(&ctx)?;
    tracing::info!(
        depot = %ctx.depot_path.display(),
        resumed = resumed.len(),
        registered = registry.len(),
        grace_time = ?ctx.grace_time,
        "Container depot ready"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!(live = registry.len(), "Shutting down");

    Ok(())
}
