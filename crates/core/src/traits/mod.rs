//! Contracts for the collaborators a container drives.
//!
//! - `pool`: exclusively-assignable resource pools (ResourcePool)
//! - `backend`: external lifecycle steps (Backend)

pub mod backend;
pub mod pool;

pub use backend::*;
pub use pool::*;
