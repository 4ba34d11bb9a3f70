//! Process-wide registry of live containers, keyed by handle.
//!
//! Besides the registered containers, the registry records which container
//! owns each handle. A handle is claimed when a container first commits to
//! it and stays claimed until that container is destroyed, so no two live
//! containers ever share a working directory.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::container::ContainerRef;

/// Containers that have reached `Active` and not yet `Destroyed`.
#[derive(Debug, Default)]
pub struct ContainerRegistry {
    containers: DashMap<String, ContainerRef>,
    claims: DashMap<String, String>,
}

impl ContainerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: impl Into<String>, container: ContainerRef) {
        let handle = handle.into();
        if let Some(previous) = self.containers.insert(handle.clone(), container) {
            tracing::warn!(handle = %handle, replaced = %previous.id(), "Handle registered twice");
        }
    }

    /// Remove `handle` and its claim if they still belong to the container with `id`.
    pub fn unregister(&self, handle: &str, id: &str) -> bool {
        self.release_claim(handle, id);
        self.containers
            .remove_if(handle, |_, container| container.id() == id)
            .is_some()
    }

    /// Claim `handle` for the container with `id`.
    ///
    /// Succeeds when the handle is free or already claimed by `id`.
    pub fn claim(&self, handle: &str, id: &str) -> bool {
        match self.claims.entry(handle.to_string()) {
            Entry::Occupied(owner) => owner.get() == id,
            Entry::Vacant(slot) => {
                slot.insert(id.to_string());
                true
            }
        }
    }

    /// Give up a claim held by `id`.
    pub fn release_claim(&self, handle: &str, id: &str) -> bool {
        self.claims.remove_if(handle, |_, owner| owner == id).is_some()
    }

    pub fn is_claimed(&self, handle: &str) -> bool {
        self.claims.contains_key(handle)
    }

    pub fn get(&self, handle: &str) -> Option<ContainerRef> {
        self.containers.get(handle).map(|r| r.value().clone())
    }

    pub fn contains(&self, handle: &str) -> bool {
        self.containers.contains_key(handle)
    }

    pub fn handles(&self) -> Vec<String> {
        self.containers.iter().map(|r| r.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
