//! Acquisition and release of a container's pooled resources.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use warden_core::config::WardenConfig;
use warden_core::pool::{NetworkPool, PortPool, UserPool};
use warden_core::{Error, Network, Port, ResourcePool, Result, UserId};

/// The three pools shared by every container.
#[derive(Clone)]
pub struct Pools {
    pub network: Arc<dyn ResourcePool<Network>>,
    pub port: Arc<dyn ResourcePool<Port>>,
    pub user: Arc<dyn ResourcePool<UserId>>,
}

impl Pools {
    pub fn new(
        network: Arc<dyn ResourcePool<Network>>,
        port: Arc<dyn ResourcePool<Port>>,
        user: Arc<dyn ResourcePool<UserId>>,
    ) -> Self {
        Self {
            network,
            port,
            user,
        }
    }

    /// In-memory pools sized from configuration.
    pub fn from_config(config: &WardenConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(NetworkPool::networks(
                config.network.pool_start_address,
                config.network.pool_size,
            )?),
            Arc::new(PortPool::ports(config.port.pool_start_port, config.port.pool_size)?),
            Arc::new(UserPool::user_ids(config.user.pool_start_uid, config.user.pool_size)?),
        ))
    }
}

impl std::fmt::Debug for Pools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pools")
            .field("network_available", &self.network.available())
            .field("port_available", &self.port.available())
            .field("user_available", &self.user.available())
            .finish()
    }
}

/// Resource bindings exclusively owned by one container.
///
/// Each binding is either fully held or absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    pub network: Option<Network>,
    #[serde(default)]
    pub ports: Vec<Port>,
    pub user_id: Option<UserId>,
}

impl Resources {
    /// Bind one value of each kind.
    ///
    /// Bindings already present (restored from a snapshot) are taken out of
    /// their pool's free set instead, so no other container can receive them.
    /// Exhaustion of the network or user pool fails the whole call; the
    /// user pool is not touched when the network pool is exhausted.
    pub fn acquire(&mut self, pools: &Pools) -> Result<()> {
        match self.network {
            Some(network) => {
                if !pools.network.remove(&network) {
                    tracing::debug!(%network, "Network already out of the free set");
                }
            }
            None => {
                let network = pools
                    .network
                    .acquire()
                    .ok_or_else(|| Error::resource_exhausted("network"))?;
                self.network = Some(network);
            }
        }

        for port in &self.ports {
            pools.port.remove(port);
        }

        match self.user_id {
            Some(user_id) => {
                if !pools.user.remove(&user_id) {
                    tracing::debug!(%user_id, "User ID already out of the free set");
                }
            }
            None => {
                let user_id = pools
                    .user
                    .acquire()
                    .ok_or_else(|| Error::resource_exhausted("user ID"))?;
                self.user_id = Some(user_id);
            }
        }

        Ok(())
    }

    /// Return every binding to its pool. Safe to call repeatedly.
    pub fn release(&mut self, pools: &Pools) {
        if let Some(network) = self.network.take() {
            pools.network.release(network);
        }

        for port in self.ports.drain(..) {
            pools.port.release(port);
        }

        if let Some(user_id) = self.user_id.take() {
            pools.user.release(user_id);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.network.is_none() && self.ports.is_empty() && self.user_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn pools(networks: u32, users: u32) -> Pools {
        Pools::new(
            Arc::new(NetworkPool::networks(Ipv4Addr::new(10, 254, 0, 0), networks).unwrap()),
            Arc::new(PortPool::ports(61000, 8).unwrap()),
            Arc::new(UserPool::user_ids(10000, users).unwrap()),
        )
    }

    #[test]
    fn test_acquire_binds_fresh_values() {
        let pools = pools(2, 2);
        let mut resources = Resources::default();
        resources.acquire(&pools).unwrap();

        assert_eq!(resources.network, Some(Network(Ipv4Addr::new(10, 254, 0, 0))));
        assert_eq!(resources.user_id, Some(UserId(10000)));
        assert!(resources.ports.is_empty());
        assert_eq!(pools.network.available(), 1);
        assert_eq!(pools.user.available(), 1);
    }

    #[test]
    fn test_network_exhaustion_leaves_user_pool_untouched() {
        let pools = pools(0, 2);
        let mut resources = Resources::default();

        let err = resources.acquire(&pools).unwrap_err();
        assert_eq!(err.to_string(), "Cannot acquire network");
        assert!(resources.is_empty());
        assert_eq!(pools.user.available(), 2);
    }

    #[test]
    fn test_user_exhaustion_is_reported() {
        let pools = pools(1, 0);
        let mut resources = Resources::default();

        let err = resources.acquire(&pools).unwrap_err();
        assert!(matches!(err, Error::ResourceExhausted(_)));
        // The network binding is kept and released with the rest
        resources.release(&pools);
        assert_eq!(pools.network.available(), 1);
    }

    #[test]
    fn test_restored_bindings_are_removed_from_pools() {
        let pools = pools(4, 4);
        let mut resources = Resources {
            network: Some(Network(Ipv4Addr::new(10, 254, 0, 8))),
            ports: vec![Port(61003), Port(61005)],
            user_id: Some(UserId(10002)),
        };
        resources.acquire(&pools).unwrap();

        assert_eq!(pools.network.available(), 3);
        assert_eq!(pools.port.available(), 6);
        assert_eq!(pools.user.available(), 3);
        assert!(!pools.network.remove(&Network(Ipv4Addr::new(10, 254, 0, 8))));
        assert!(!pools.user.remove(&UserId(10002)));
        assert!(!pools.port.remove(&Port(61003)));
    }

    #[test]
    fn test_release_then_acquire_does_not_leak() {
        let pools = pools(2, 2);
        let before = (pools.network.available(), pools.user.available());

        let mut first = Resources::default();
        first.acquire(&pools).unwrap();
        first.release(&pools);
        first.release(&pools);
        assert!(first.is_empty());

        let mut second = Resources::default();
        second.acquire(&pools).unwrap();
        second.release(&pools);

        assert_eq!(before, (pools.network.available(), pools.user.available()));
    }
}
