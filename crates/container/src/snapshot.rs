//! Snapshot dirty/clean protocol.
//!
//! A container is resumable exactly when `<container>/etc/snapshot.json`
//! exists. The file is removed before every state-mutating operation and
//! rewritten after it. Writes go through a temp file in `<container>/tmp`
//! and an atomic rename, so a reader never sees a partial snapshot.

use serde::{de::DeserializeOwned, Serialize};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use warden_core::{Error, Result};

/// Location of the snapshot for a container directory.
pub fn snapshot_path(container_path: &Path) -> PathBuf {
    container_path.join("etc").join("snapshot.json")
}

/// Remove the snapshot, marking the container as not resumable.
///
/// An already absent snapshot counts as dirty.
pub fn mark_dirty(container_path: &Path) -> Result<()> {
    match std::fs::remove_file(snapshot_path(container_path)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "Unable to remove snapshot");
            Err(Error::persistence(format!("Unable to remove snapshot: {}", e)))
        }
    }
}

/// Persist `value` as the container's snapshot.
pub fn mark_clean<T: Serialize>(container_path: &Path, value: &T) -> Result<()> {
    let tmp_dir = container_path.join("tmp");

    let mut file = tempfile::Builder::new()
        .prefix("snapshot")
        .tempfile_in(&tmp_dir)
        .map_err(|e| {
            tracing::warn!(error = %e, "Unable to create snapshot file");
            Error::persistence(format!("Unable to create snapshot file: {}", e))
        })?;

    {
        let mut writer = BufWriter::new(file.as_file_mut());
        serde_json::to_writer(&mut writer, value).map_err(|e| {
            tracing::warn!(error = %e, "Unable to encode snapshot");
            Error::persistence(format!("Unable to encode snapshot: {}", e))
        })?;
        writer.flush().map_err(|e| {
            tracing::warn!(error = %e, "Unable to flush snapshot");
            Error::persistence(format!("Unable to flush snapshot: {}", e))
        })?;
    }

    file.as_file().sync_all().map_err(|e| {
        tracing::warn!(error = %e, "Unable to sync snapshot");
        Error::persistence(format!("Unable to sync snapshot: {}", e))
    })?;

    // Not written in place: only a rename can replace it atomically
    file.persist(snapshot_path(container_path)).map_err(|e| {
        tracing::warn!(error = %e.error, "Unable to rename snapshot in place");
        Error::persistence(format!("Unable to rename snapshot in place: {}", e.error))
    })?;

    Ok(())
}

/// Read a snapshot written by [`mark_clean`].
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read(path)
        .map_err(|e| Error::persistence(format!("Unable to read snapshot {}: {}", path.display(), e)))?;
    Ok(serde_json::from_slice(&content)?)
}
