#![deny(unused)]
//! Core types, traits, and error definitions for Warden.
//!
//! This crate provides the building blocks shared by the container manager
//! and the daemon: lifecycle states, pooled resource handles, request
//! payloads, the pool and backend contracts, and the ambient configuration
//! and tracing setup.

pub mod config;
pub mod error;
pub mod mocks;
pub mod pool;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
