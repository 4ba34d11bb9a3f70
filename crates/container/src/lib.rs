#![deny(unused)]
//! Per-container lifecycle management for Warden.
//!
//! Each container is owned by a single worker task that serializes its
//! requests, drives the Born -> Active -> Stopped -> Destroyed lifecycle
//! through a [`warden_core::Backend`], binds pooled network, port and user
//! resources, persists a resumable snapshot, and destroys the container once
//! it has been idle for its grace time.

pub mod backend;
pub mod container;
pub mod id;
pub mod idle;
pub mod machine;
pub mod registry;
pub mod request;
pub mod resources;
pub mod resume;
pub mod snapshot;

pub use backend::ScriptBackend;
pub use container::{Container, ContainerContext, ContainerRef};
pub use registry::ContainerRegistry;
pub use request::{Request, ResponseReceiver};
pub use resources::{Pools, Resources};
pub use resume::resume_depot;
