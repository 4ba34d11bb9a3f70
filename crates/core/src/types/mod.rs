//! Core type definitions for Warden.
//!
//! Broken down into submodules:
//! - `state`: container lifecycle states
//! - `resource`: pooled resource handles
//! - `request`: request payloads and responses

pub mod request;
pub mod resource;
pub mod state;

pub use request::*;
pub use resource::*;
pub use state::*;
