use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WardenConfig {
    pub server: ServerConfig,
    pub network: NetworkPoolConfig,
    pub port: PortPoolConfig,
    pub user: UserPoolConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Parent of every container's working directory.
    pub container_depot_path: PathBuf,
    /// Directory holding `create.sh`.
    pub container_script_path: PathBuf,
    pub container_rootfs_path: PathBuf,
    /// Default idle grace time, in seconds.
    pub container_grace_time: u64,
}

impl ServerConfig {
    pub fn grace_time(&self) -> Duration {
        Duration::from_secs(self.container_grace_time)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            container_depot_path: "/tmp/warden/containers".into(),
            container_script_path: "/opt/warden/skeleton".into(),
            container_rootfs_path: "/opt/warden/rootfs".into(),
            container_grace_time: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NetworkPoolConfig {
    pub pool_start_address: Ipv4Addr,
    /// Number of /30 blocks.
    pub pool_size: u32,
}

impl Default for NetworkPoolConfig {
    fn default() -> Self {
        Self {
            pool_start_address: Ipv4Addr::new(10, 254, 0, 0),
            pool_size: 256,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PortPoolConfig {
    pub pool_start_port: u16,
    pub pool_size: u16,
}

impl Default for PortPoolConfig {
    fn default() -> Self {
        Self {
            pool_start_port: 61000,
            pool_size: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UserPoolConfig {
    pub pool_start_uid: u32,
    pub pool_size: u32,
}

impl Default for UserPoolConfig {
    fn default() -> Self {
        Self {
            pool_start_uid: 10000,
            pool_size: 256,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl WardenConfig {
    /// Load from an optional file, then apply `WARDEN__SECTION__KEY` overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();

        let s = Config::builder()
            .add_source(File::with_name(&path).required(false))
            // Map WARDEN__SERVER__CONTAINER_GRACE_TIME=60 to server.container_grace_time
            .add_source(Environment::with_prefix("WARDEN").separator("__"))
            .build()
            .map_err(|e| Error::config(e.to_string()))?;

        let cfg: Self = s
            .try_deserialize()
            .map_err(|e| Error::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.container_grace_time == 0 {
            return Err(Error::config("server.container_grace_time must be positive"));
        }
        if self.network.pool_size == 0 {
            return Err(Error::config("network.pool_size must be positive"));
        }
        let network_end = self
            .network
            .pool_size
            .checked_mul(crate::pool::NETWORK_BLOCK_SIZE)
            .and_then(|span| u32::from(self.network.pool_start_address).checked_add(span));
        if network_end.is_none() {
            return Err(Error::config("network pool range overflows IPv4"));
        }
        if self.port.pool_size == 0 {
            return Err(Error::config("port.pool_size must be positive"));
        }
        if self.port.pool_start_port.checked_add(self.port.pool_size).is_none() {
            return Err(Error::config("port pool range overflows u16"));
        }
        if self.user.pool_size == 0 {
            return Err(Error::config("user.pool_size must be positive"));
        }
        if self.user.pool_start_uid.checked_add(self.user.pool_size).is_none() {
            return Err(Error::config("user pool range overflows u32"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = WardenConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.server.grace_time(), Duration::from_secs(300));
    }

    #[test]
    fn test_validate_rejects_bad_ranges() {
        let mut cfg = WardenConfig::default();
        cfg.port.pool_start_port = 65000;
        assert!(cfg.validate().is_err());

        let mut cfg = WardenConfig::default();
        cfg.server.container_grace_time = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = WardenConfig::default();
        cfg.network.pool_start_address = Ipv4Addr::new(255, 255, 255, 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\ncontainer_depot_path = \"/srv/depot\"\ncontainer_grace_time = 30\n\n[user]\npool_size = 8"
        )
        .unwrap();

        let cfg = WardenConfig::load(file.path()).unwrap();
        assert_eq!(cfg.server.container_depot_path, PathBuf::from("/srv/depot"));
        assert_eq!(cfg.server.container_grace_time, 30);
        assert_eq!(cfg.user.pool_size, 8);
        assert_eq!(cfg.user.pool_start_uid, 10000);
        assert_eq!(cfg.port.pool_start_port, 61000);
    }
}
