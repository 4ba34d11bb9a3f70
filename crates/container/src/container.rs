//! The container entity and the worker that owns it.
//!
//! Every container is driven by exactly one worker task. Requests reach the
//! worker through a bounded inbox and are handled one at a time, so the
//! container's state, bindings and snapshot are never touched concurrently.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn, Instrument, Span};

use warden_core::config::ServerConfig;
use warden_core::{
    Backend, CreateEnv, CreateRequest, CreateResponse, DestroyResponse, Error, RequestPayload,
    Response, Result, State, StopRequest, StopResponse,
};

use crate::id::next_id;
use crate::idle::IdleTimer;
use crate::machine::{self, Transition};
use crate::registry::ContainerRegistry;
use crate::request::Request;
use crate::resources::{Pools, Resources};
use crate::snapshot;

// =============================================================================
// Context
// =============================================================================

/// Process-wide collaborators shared by every container.
#[derive(Clone)]
pub struct ContainerContext {
    pub depot_path: PathBuf,
    pub rootfs_path: PathBuf,
    pub grace_time: Duration,
    pub pools: Pools,
    pub backend: Arc<dyn Backend>,
    pub registry: Arc<ContainerRegistry>,
}

impl ContainerContext {
    pub fn new(
        server: &ServerConfig,
        pools: Pools,
        backend: Arc<dyn Backend>,
        registry: Arc<ContainerRegistry>,
    ) -> Self {
        Self {
            depot_path: server.container_depot_path.clone(),
            rootfs_path: server.container_rootfs_path.clone(),
            grace_time: server.grace_time(),
            pools,
            backend,
            registry,
        }
    }

    /// Working directory of the container with `handle`.
    pub fn container_path(&self, handle: &str) -> PathBuf {
        self.depot_path.join(handle)
    }
}

// =============================================================================
// Container
// =============================================================================

/// A container's identity, lifecycle state and resource bindings.
///
/// This is also the snapshot format written to `etc/snapshot.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub handle: String,
    pub state: State,
    pub idle_timeout: Duration,
    #[serde(flatten)]
    pub resources: Resources,
}

impl Container {
    /// A fresh `Born` container whose handle is its id.
    pub fn new(id: impl Into<String>, idle_timeout: Duration) -> Self {
        let id = id.into();
        Self {
            handle: id.clone(),
            id,
            state: State::Born,
            idle_timeout,
            resources: Resources::default(),
        }
    }

    /// Start a worker for a brand new container and return its reference.
    ///
    /// Unless a request arrives within the configured grace time the
    /// container destroys itself.
    pub fn launch(ctx: &ContainerContext) -> ContainerRef {
        Self::new(next_id(), ctx.grace_time).spawn(ctx)
    }

    /// Rebuild a container from its snapshot and start its worker.
    ///
    /// The restored bindings are taken out of the pools before the worker
    /// starts. `Active` and `Stopped` containers are registered again.
    pub fn resume(ctx: &ContainerContext, snapshot_path: &Path) -> Result<ContainerRef> {
        let mut container: Container = snapshot::load(snapshot_path)?;

        if container.state.is_terminal() {
            return Err(Error::persistence(format!(
                "snapshot of {} records a destroyed container",
                container.handle
            )));
        }

        let dir_name = snapshot_path
            .parent()
            .and_then(Path::parent)
            .and_then(Path::file_name);
        if dir_name != Some(OsStr::new(&container.handle)) {
            return Err(Error::persistence(format!(
                "snapshot handle {} does not match {}",
                container.handle,
                snapshot_path.display()
            )));
        }

        if !ctx.registry.claim(&container.handle, &container.id) {
            return Err(Error::invalid_request(format!(
                "handle {} is already in use",
                container.handle
            )));
        }

        if let Err(e) = container.resources.acquire(&ctx.pools) {
            container.resources.release(&ctx.pools);
            ctx.registry.release_claim(&container.handle, &container.id);
            return Err(e);
        }

        let state = container.state;
        let handle = container.handle.clone();
        let container_ref = container.spawn(ctx);

        if state.is_registered() {
            ctx.registry.register(handle.clone(), container_ref.clone());
        }

        info!(id = %container_ref.id(), handle = %handle, %state, "Container resumed");
        Ok(container_ref)
    }

    /// Start the worker that owns this container.
    pub fn spawn(self, ctx: &ContainerContext) -> ContainerRef {
        let (inbox_tx, inbox_rx) = mpsc::channel(1);
        let (exited_tx, exited_rx) = watch::channel(false);

        let container_ref = ContainerRef {
            id: Arc::from(self.id.as_str()),
            inbox: inbox_tx,
            exited: exited_rx,
        };

        let span = tracing::info_span!("container", id = %self.id, handle = %self.handle);
        let worker = ContainerWorker {
            container: self,
            ctx: ctx.clone(),
            inbox: inbox_rx,
            this: container_ref.clone(),
            span: span.clone(),
            exited: exited_tx,
        };

        tokio::spawn(worker.run().instrument(span));
        container_ref
    }
}

// =============================================================================
// Reference
// =============================================================================

/// Cloneable handle for sending requests to a container's worker.
#[derive(Debug, Clone)]
pub struct ContainerRef {
    id: Arc<str>,
    inbox: mpsc::Sender<Request>,
    exited: watch::Receiver<bool>,
}

impl ContainerRef {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deliver a request to the worker.
    ///
    /// Waits while the worker is busy. If the worker no longer accepts
    /// requests the request is answered with `NotAccepting` instead.
    pub async fn execute(&self, request: Request) {
        if let Err(mpsc::error::SendError(mut request)) = self.inbox.send(request).await {
            request.write_error(Error::NotAccepting);
        }
    }

    /// Deliver a request and wait for its reply.
    pub async fn call(&self, payload: impl Into<RequestPayload>) -> Result<Response> {
        let (request, reply) = Request::new(payload);
        self.execute(request).await;
        reply
            .await
            .map_err(|_| Error::internal("container dropped the request unanswered"))?
    }

    /// Whether the worker still accepts requests.
    pub fn is_accepting(&self) -> bool {
        !self.inbox.is_closed()
    }

    /// Wait until the worker has exited.
    pub async fn wait_exit(&self) {
        let mut exited = self.exited.clone();
        let _ = exited.wait_for(|exited| *exited).await;
    }

    #[cfg(test)]
    pub(crate) fn detached(id: &str) -> (Self, mpsc::Receiver<Request>) {
        let (inbox, rx) = mpsc::channel(1);
        let (_, exited) = watch::channel(true);
        let container_ref = Self {
            id: Arc::from(id),
            inbox,
            exited,
        };
        (container_ref, rx)
    }
}

// =============================================================================
// Worker
// =============================================================================

struct ContainerWorker {
    container: Container,
    ctx: ContainerContext,
    inbox: mpsc::Receiver<Request>,
    this: ContainerRef,
    span: Span,
    exited: watch::Sender<bool>,
}

impl ContainerWorker {
    async fn run(mut self) {
        let mut idle = IdleTimer::start(self.container.idle_timeout);
        let mut fatal = false;

        loop {
            tokio::select! {
                _ = idle.fired() => {
                    debug!(state = %self.container.state, "Idle timeout elapsed");
                    break;
                }
                request = self.inbox.recv() => {
                    let Some(mut request) = request else { break };

                    // Keep the timer from firing until the reply is written
                    idle.add_ref();
                    if let Some(done) = request.completion() {
                        let idle = idle.handle();
                        tokio::spawn(async move {
                            let _ = done.await;
                            idle.release_ref();
                        });
                    }

                    if let Err(e) = self.run_request(request).await {
                        error!(error = %e, "Stopping container worker");
                        fatal = true;
                        break;
                    }

                    idle.set_duration(self.container.idle_timeout);
                }
            }
        }

        idle.stop();
        self.stop_accepting();

        if !fatal && !self.container.state.is_terminal() {
            match self.destroy().await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => error!(error = %e, "Error destroying idle container"),
                Err(e) => warn!(error = %e, "Error destroying idle container"),
            }
        }

        let _ = self.exited.send(true);
    }

    /// Close the inbox and turn away anything still queued.
    fn stop_accepting(&mut self) {
        self.inbox.close();
        while let Ok(mut request) = self.inbox.try_recv() {
            request.write_error(Error::NotAccepting);
        }
    }

    /// Handle one request and write its reply.
    ///
    /// Returns an error only when the worker must stop.
    async fn run_request(&mut self, mut request: Request) -> Result<()> {
        let started = Instant::now();
        let payload = request.payload().clone();

        let result = match machine::transition(self.container.state, &payload) {
            Ok(Transition::Create(req)) => {
                let dirty = self.mark_dirty();
                let outcome = self.create(req).await;
                let clean = self.mark_clean();
                settle(outcome, clean, dirty)
            }
            Ok(Transition::Stop(req)) => {
                let dirty = self.mark_dirty();
                let outcome = self.stop(req).await;
                let clean = self.mark_clean();
                settle(outcome, clean, dirty)
            }
            Ok(Transition::Destroy) => {
                let dirty = self.mark_dirty();
                let outcome = self
                    .destroy()
                    .await
                    .map(|()| Response::Destroy(DestroyResponse {}));
                settle(outcome, Ok(()), dirty)
            }
            Err(e) => Err(e),
        };

        let fatal = match &result {
            Err(Error::Fatal(msg)) => Some(msg.clone()),
            _ => None,
        };

        match result {
            Ok(response) => request.write_response(response),
            Err(e) => {
                debug!(kind = %request.kind(), error = %e, "Request failed");
                request.write_error(e);
            }
        }
        debug!(kind = %request.kind(), took = ?started.elapsed(), "Request serviced");

        match fatal {
            Some(msg) => Err(Error::fatal(msg)),
            None => Ok(()),
        }
    }

    async fn create(&mut self, req: &CreateRequest) -> Result<Response> {
        let handle = match req.handle() {
            Some(handle) if handle != self.container.handle => {
                validate_handle(handle)?;
                // An earlier attempt may already have built under its handle
                if self.container.handle != self.container.id {
                    return Err(Error::invalid_request(format!(
                        "container is bound to handle {}",
                        self.container.handle
                    )));
                }
                handle.to_string()
            }
            _ => self.container.handle.clone(),
        };

        self.claim(&handle)?;

        if let Err(e) = self.container.resources.acquire(&self.ctx.pools) {
            if handle != self.container.handle {
                self.ctx.registry.release_claim(&handle, &self.container.id);
            }
            return Err(e);
        }

        if handle != self.container.handle {
            self.span.record("handle", handle.as_str());
            self.container.handle = handle;
        }
        if let Some(grace_time) = req.grace_time() {
            self.container.idle_timeout = grace_time;
        }

        let (Some(network), Some(user_id)) = (
            self.container.resources.network,
            self.container.resources.user_id,
        ) else {
            return Err(Error::internal("bindings missing after acquire"));
        };

        let path = self.path();
        let env = CreateEnv::new(
            self.container.id.clone(),
            network,
            user_id,
            self.ctx.rootfs_path.clone(),
        );
        self.ctx.backend.create(&path, &env).await?;
        self.ctx.backend.start(&path).await?;

        self.container.state = State::Active;
        self.ctx
            .registry
            .register(self.container.handle.clone(), self.this.clone());

        info!(%network, %user_id, "Container active");
        Ok(Response::Create(CreateResponse {
            handle: self.container.handle.clone(),
        }))
    }

    async fn stop(&mut self, req: &StopRequest) -> Result<Response> {
        let path = self.path();

        if req.background {
            let backend = self.ctx.backend.clone();
            let kill = req.kill;
            tokio::spawn(
                async move {
                    if let Err(e) = backend.stop(&path, kill).await {
                        warn!(error = %e, "Background stop failed");
                    }
                }
                .instrument(self.span.clone()),
            );
        } else {
            self.ctx.backend.stop(&path, req.kill).await?;
        }

        self.container.state = State::Stopped;
        info!(kill = req.kill, background = req.background, "Container stopped");
        Ok(Response::Stop(StopResponse {}))
    }

    async fn destroy(&mut self) -> Result<()> {
        let path = self.path();
        // Nothing to tear down if create never produced a working directory
        if path.exists() {
            self.ctx.backend.destroy(&path).await?;
        }

        self.container.state = State::Destroyed;
        self.ctx
            .registry
            .unregister(&self.container.handle, &self.container.id);
        self.container.resources.release(&self.ctx.pools);

        match std::fs::remove_dir_all(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::fatal(format!(
                    "unable to remove {}: {}",
                    path.display(),
                    e
                )))
            }
        }

        info!("Container destroyed");
        Ok(())
    }

    /// Take ownership of `handle` and its working directory.
    fn claim(&self, handle: &str) -> Result<()> {
        if !self.ctx.registry.claim(handle, &self.container.id) {
            return Err(Error::invalid_request(format!(
                "handle {} is already in use",
                handle
            )));
        }

        // A directory under a new handle was left by someone else
        if handle != self.container.handle && self.ctx.container_path(handle).exists() {
            self.ctx.registry.release_claim(handle, &self.container.id);
            return Err(Error::invalid_request(format!(
                "working directory for {} already exists",
                handle
            )));
        }
        Ok(())
    }

    fn mark_dirty(&self) -> Result<()> {
        snapshot::mark_dirty(&self.path())
    }

    fn mark_clean(&self) -> Result<()> {
        snapshot::mark_clean(&self.path(), &self.container)
    }

    fn path(&self) -> PathBuf {
        self.ctx.container_path(&self.container.handle)
    }
}

/// Operation errors win over snapshot errors; a clean failure wins over a
/// dirty failure.
fn settle(outcome: Result<Response>, clean: Result<()>, dirty: Result<()>) -> Result<Response> {
    let response = outcome?;
    clean?;
    dirty?;
    Ok(response)
}

/// Handles name a directory directly under the depot.
fn validate_handle(handle: &str) -> Result<()> {
    if handle == "." || handle == ".." || handle.contains(['/', '\\', '\0']) {
        return Err(Error::invalid_request(format!("invalid handle {:?}", handle)));
    }
    Ok(())
}
