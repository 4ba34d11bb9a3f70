//! Backend that drives the container skeleton scripts.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use warden_core::{Backend, CreateEnv, Error, Result};

/// Runs `create.sh` from the script directory, and `start.sh`, `stop.sh`
/// and `destroy.sh` from the container's own directory.
#[derive(Debug, Clone)]
pub struct ScriptBackend {
    script_path: PathBuf,
}

impl ScriptBackend {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
        }
    }
}

#[async_trait]
impl Backend for ScriptBackend {
    async fn create(&self, container_path: &Path, env: &CreateEnv) -> Result<()> {
        let mut cmd = Command::new(self.script_path.join("create.sh"));
        cmd.arg(container_path).env_clear().envs(env.vars());
        run_script("create", cmd).await
    }

    async fn start(&self, container_path: &Path) -> Result<()> {
        let mut cmd = Command::new(container_path.join("start.sh"));
        cmd.current_dir(container_path);
        run_script("start", cmd).await
    }

    async fn stop(&self, container_path: &Path, kill: bool) -> Result<()> {
        let mut cmd = Command::new(container_path.join("stop.sh"));
        cmd.current_dir(container_path);
        // Don't wait for a graceful stop
        if kill {
            cmd.args(["-w", "0"]);
        }
        run_script("stop", cmd).await
    }

    async fn destroy(&self, container_path: &Path) -> Result<()> {
        let mut cmd = Command::new(container_path.join("destroy.sh"));
        cmd.current_dir(container_path);
        run_script("destroy", cmd).await
    }
}

async fn run_script(step: &str, mut cmd: Command) -> Result<()> {
    let output = cmd
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::backend(step, format!("unable to run script: {}", e)))?;

    if output.status.success() {
        tracing::debug!(step, "Backend step succeeded");
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let last_line = stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output");

    tracing::warn!(step, status = %output.status, stderr = %last_line, "Backend step failed");
    Err(Error::backend(step, format!("{}: {}", output.status, last_line)))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::os::unix::fs::PermissionsExt;
    use warden_core::{Network, UserId};

    fn write_script(path: &Path, body: &str) {
        std::fs::write(path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    // One test so script files are never written while another test forks.
    #[tokio::test]
    async fn test_script_backend_steps() {
        let root = tempfile::tempdir().unwrap();
        let skeleton = root.path().join("skeleton");
        let container = root.path().join("depot").join("c1");
        std::fs::create_dir_all(&skeleton).unwrap();
        std::fs::create_dir_all(&container).unwrap();

        write_script(
            &skeleton.join("create.sh"),
            "env | sort > \"$1/create.env\"",
        );
        write_script(&container.join("start.sh"), "touch started");
        write_script(&container.join("stop.sh"), "echo \"$@\" > stop.args");
        write_script(
            &container.join("destroy.sh"),
            "echo 'cgroup busy' >&2\nexit 3",
        );

        let backend = ScriptBackend::new(&skeleton);
        let env = CreateEnv::new(
            "c1",
            Network(Ipv4Addr::new(10, 254, 0, 4)),
            UserId(10007),
            "/opt/rootfs",
        );

        backend.create(&container, &env).await.unwrap();
        let exported = std::fs::read_to_string(container.join("create.env")).unwrap();
        assert!(exported.contains("id=c1"));
        assert!(exported.contains("network_host_ip=10.254.0.5"));
        assert!(exported.contains("network_container_ip=10.254.0.6"));
        assert!(exported.contains("user_uid=10007"));
        assert!(exported.contains("rootfs_path=/opt/rootfs"));

        backend.start(&container).await.unwrap();
        assert!(container.join("started").exists());

        backend.stop(&container, true).await.unwrap();
        let args = std::fs::read_to_string(container.join("stop.args")).unwrap();
        assert_eq!(args.trim(), "-w 0");

        backend.stop(&container, false).await.unwrap();
        let args = std::fs::read_to_string(container.join("stop.args")).unwrap();
        assert_eq!(args.trim(), "");

        let err = backend.destroy(&container).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("destroy"), "{}", message);
        assert!(message.contains("cgroup busy"), "{}", message);

        let missing = ScriptBackend::new(root.path().join("nowhere"));
        assert!(missing.create(&container, &env).await.is_err());
    }
}
