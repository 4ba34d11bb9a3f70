//! Lifecycle backend contract.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{Network, UserId};

/// Environment handed to the create step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEnv {
    pub id: String,
    pub host_address: Ipv4Addr,
    pub container_address: Ipv4Addr,
    pub user_id: UserId,
    pub rootfs_path: PathBuf,
}

impl CreateEnv {
    pub fn new(id: impl Into<String>, network: Network, user_id: UserId, rootfs_path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            host_address: network.host_address(),
            container_address: network.container_address(),
            user_id,
            rootfs_path: rootfs_path.into(),
        }
    }

    /// Key/value pairs as exported to the create step.
    pub fn vars(&self) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.id.clone()),
            ("network_host_ip", self.host_address.to_string()),
            ("network_container_ip", self.container_address.to_string()),
            ("user_uid", self.user_id.to_string()),
            ("rootfs_path", self.rootfs_path.display().to_string()),
        ]
    }
}

/// Performs the sandboxing mechanics of each lifecycle step.
///
/// Every step runs against the container's working directory and only
/// reports success or failure.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Build the container in `container_path`.
    async fn create(&self, container_path: &Path, env: &CreateEnv) -> Result<()>;

    /// Start the container's processes.
    async fn start(&self, container_path: &Path) -> Result<()>;

    /// Stop the container; `kill` skips the graceful shutdown window.
    async fn stop(&self, container_path: &Path, kill: bool) -> Result<()>;

    /// Tear down everything the create step built.
    async fn destroy(&self, container_path: &Path) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_env_vars() {
        let env = CreateEnv::new(
            "1a2b",
            Network(Ipv4Addr::new(10, 254, 0, 8)),
            UserId(10003),
            "/var/warden/rootfs",
        );
        let vars = env.vars();
        assert!(vars.contains(&("id", "1a2b".to_string())));
        assert!(vars.contains(&("network_host_ip", "10.254.0.9".to_string())));
        assert!(vars.contains(&("network_container_ip", "10.254.0.10".to_string())));
        assert!(vars.contains(&("user_uid", "10003".to_string())));
        assert!(vars.contains(&("rootfs_path", "/var/warden/rootfs".to_string())));
    }
}
