//! Mock implementations of core traits for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::{
    traits::{Backend, CreateEnv},
    Error, Result,
};

// =============================================================================
// Mock Backend
// =============================================================================

/// Lifecycle step as seen by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendStep {
    Create,
    Start,
    Stop,
    Destroy,
}

impl std::fmt::Display for BackendStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendStep::Create => write!(f, "create"),
            BackendStep::Start => write!(f, "start"),
            BackendStep::Stop => write!(f, "stop"),
            BackendStep::Destroy => write!(f, "destroy"),
        }
    }
}

/// One recorded backend invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendCall {
    pub step: BackendStep,
    pub container_path: PathBuf,
    pub kill: bool,
    pub env: Option<CreateEnv>,
}

/// Side effect run against the container path after a successful step.
pub type StepHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// Backend that records every step instead of running scripts.
///
/// A successful create lays out `tmp/` and `etc/` under the container path,
/// as the real create script does.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    failures: Mutex<HashSet<BackendStep>>,
    delays: Mutex<HashMap<BackendStep, Duration>>,
    hooks: Mutex<HashMap<BackendStep, StepHook>>,
}

impl std::fmt::Debug for MockBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("calls", &self.calls)
            .field("failures", &self.failures)
            .field("delays", &self.delays)
            .finish_non_exhaustive()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `step` fail.
    pub fn fail_on(&self, step: BackendStep) {
        self.failures.lock().unwrap().insert(step);
    }

    /// Let `step` succeed again.
    pub fn clear_failure(&self, step: BackendStep) {
        self.failures.lock().unwrap().remove(&step);
    }

    /// Make `step` take `delay` before completing.
    pub fn delay(&self, step: BackendStep, delay: Duration) {
        self.delays.lock().unwrap().insert(step, delay);
    }

    /// Run `hook` on the container path whenever `step` succeeds.
    pub fn on_success(&self, step: BackendStep, hook: impl Fn(&Path) + Send + Sync + 'static) {
        self.hooks.lock().unwrap().insert(step, Arc::new(hook));
    }

    /// All invocations so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Steps invoked so far, in order.
    pub fn steps(&self) -> Vec<BackendStep> {
        self.calls.lock().unwrap().iter().map(|c| c.step).collect()
    }

    async fn run(&self, call: BackendCall) -> Result<()> {
        let step = call.step;
        let path = call.container_path.clone();
        self.calls.lock().unwrap().push(call);

        let delay = self.delays.lock().unwrap().get(&step).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failures.lock().unwrap().contains(&step) {
            return Err(Error::backend(step.to_string(), "exit status 1: mock failure"));
        }

        let hook = self.hooks.lock().unwrap().get(&step).cloned();
        if let Some(hook) = hook {
            hook(&path);
        }
        Ok(())
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn create(&self, container_path: &Path, env: &CreateEnv) -> Result<()> {
        self.run(BackendCall {
            step: BackendStep::Create,
            container_path: container_path.to_path_buf(),
            kill: false,
            env: Some(env.clone()),
        })
        .await?;

        std::fs::create_dir_all(container_path.join("tmp"))?;
        std::fs::create_dir_all(container_path.join("etc"))?;
        Ok(())
    }

    async fn start(&self, container_path: &Path) -> Result<()> {
        self.run(BackendCall {
            step: BackendStep::Start,
            container_path: container_path.to_path_buf(),
            kill: false,
            env: None,
        })
        .await
    }

    async fn stop(&self, container_path: &Path, kill: bool) -> Result<()> {
        self.run(BackendCall {
            step: BackendStep::Stop,
            container_path: container_path.to_path_buf(),
            kill,
            env: None,
        })
        .await
    }

    async fn destroy(&self, container_path: &Path) -> Result<()> {
        self.run(BackendCall {
            step: BackendStep::Destroy,
            container_path: container_path.to_path_buf(),
            kill: false,
            env: None,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Network, UserId};
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_mock_backend_records_and_lays_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c1");
        let backend = MockBackend::new();
        let env = CreateEnv::new("c1", Network(Ipv4Addr::new(10, 0, 0, 0)), UserId(1), "/rootfs");

        backend.create(&path, &env).await.unwrap();
        backend.start(&path).await.unwrap();
        backend.stop(&path, true).await.unwrap();

        assert!(path.join("tmp").is_dir());
        assert!(path.join("etc").is_dir());
        assert_eq!(
            backend.steps(),
            vec![BackendStep::Create, BackendStep::Start, BackendStep::Stop]
        );
        assert!(backend.calls()[2].kill);
    }

    #[tokio::test]
    async fn test_mock_backend_failure() {
        let backend = MockBackend::new();
        backend.fail_on(BackendStep::Destroy);

        let err = backend.destroy(Path::new("/nowhere")).await.unwrap_err();
        assert!(err.to_string().contains("destroy"));

        backend.clear_failure(BackendStep::Destroy);
        backend.destroy(Path::new("/nowhere")).await.unwrap();
        assert_eq!(backend.steps().len(), 2);
    }

    #[tokio::test]
    async fn test_hook_runs_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let backend = MockBackend::new();
        backend.on_success(BackendStep::Stop, |path| {
            std::fs::write(path.join("stopped"), b"").unwrap();
        });

        backend.fail_on(BackendStep::Stop);
        assert!(backend.stop(dir.path(), false).await.is_err());
        assert!(!dir.path().join("stopped").exists());

        backend.clear_failure(BackendStep::Stop);
        backend.stop(dir.path(), false).await.unwrap();
        assert!(dir.path().join("stopped").exists());
    }
}
