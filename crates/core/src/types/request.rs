use serde::{Deserialize, Serialize};
use std::time::Duration;

// =============================================================================
// Request Payloads
// =============================================================================

/// Create a container: acquire resources, run the create and start steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Handle override; the generated id is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    /// Idle grace time override, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_time: Option<u64>,
}

impl CreateRequest {
    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }

    pub fn with_grace_time(mut self, secs: u64) -> Self {
        self.grace_time = Some(secs);
        self
    }

    /// Handle override, ignoring an empty string.
    pub fn handle(&self) -> Option<&str> {
        self.handle.as_deref().filter(|h| !h.is_empty())
    }

    pub fn grace_time(&self) -> Option<Duration> {
        self.grace_time.map(Duration::from_secs)
    }
}

/// Stop a running container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopRequest {
    /// Skip the graceful shutdown window.
    #[serde(default)]
    pub kill: bool,
    /// Reply as soon as the stop step is launched.
    #[serde(default)]
    pub background: bool,
}

/// Destroy a container and remove its working directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyRequest {}

/// Discriminated request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestPayload {
    Create(CreateRequest),
    Stop(StopRequest),
    Destroy(DestroyRequest),
}

impl RequestPayload {
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestPayload::Create(_) => RequestKind::Create,
            RequestPayload::Stop(_) => RequestKind::Stop,
            RequestPayload::Destroy(_) => RequestKind::Destroy,
        }
    }
}

impl From<CreateRequest> for RequestPayload {
    fn from(req: CreateRequest) -> Self {
        RequestPayload::Create(req)
    }
}

impl From<StopRequest> for RequestPayload {
    fn from(req: StopRequest) -> Self {
        RequestPayload::Stop(req)
    }
}

impl From<DestroyRequest> for RequestPayload {
    fn from(req: DestroyRequest) -> Self {
        RequestPayload::Destroy(req)
    }
}

/// Request kind, without its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Create,
    Stop,
    Destroy,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Create => write!(f, "create"),
            RequestKind::Stop => write!(f, "stop"),
            RequestKind::Destroy => write!(f, "destroy"),
        }
    }
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub handle: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopResponse {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyResponse {}

/// Successful reply to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Create(CreateResponse),
    Stop(StopResponse),
    Destroy(DestroyResponse),
}
