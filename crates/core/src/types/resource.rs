use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

// =============================================================================
// Pooled Resource Handles
// =============================================================================

/// Network allocation handed out by the network pool.
///
/// Identified by its base address; the host-side and container-side
/// addresses sit at offsets +1 and +2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Network(pub Ipv4Addr);

impl Network {
    /// Address at `offset` from the base of this allocation.
    pub fn add(&self, offset: u32) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.0).wrapping_add(offset))
    }

    /// Host-side end of the container's link.
    pub fn host_address(&self) -> Ipv4Addr {
        self.add(1)
    }

    /// Container-side end of the container's link.
    pub fn container_address(&self) -> Ipv4Addr {
        self.add(2)
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host port handed out by the port pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(pub u16);

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric user identity handed out by the user pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_derived_addresses() {
        let net = Network(Ipv4Addr::new(10, 254, 0, 252));
        assert_eq!(net.host_address(), Ipv4Addr::new(10, 254, 0, 253));
        assert_eq!(net.container_address(), Ipv4Addr::new(10, 254, 0, 254));
        assert_eq!(net.add(4), Ipv4Addr::new(10, 254, 1, 0));
    }

    #[test]
    fn test_handles_serialize_transparently() {
        let net = Network(Ipv4Addr::new(10, 0, 0, 4));
        assert_eq!(serde_json::to_string(&net).unwrap(), "\"10.0.0.4\"");
        assert_eq!(serde_json::to_string(&Port(61001)).unwrap(), "61001");
        assert_eq!(serde_json::to_string(&UserId(10001)).unwrap(), "10001");
    }
}
