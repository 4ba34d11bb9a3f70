//! Restart recovery: resume every container found in the depot.

use tracing::{info, warn};

use warden_core::{Error, Result};

use crate::container::{Container, ContainerContext, ContainerRef};
use crate::snapshot;

/// Resume each container directory in the depot that holds a snapshot.
///
/// Directories without a snapshot were mid-operation when the previous
/// process stopped and are left alone. A missing depot resumes nothing.
pub fn resume_depot(ctx: &ContainerContext) -> Result<Vec<ContainerRef>> {
    let entries = match std::fs::read_dir(&ctx.depot_path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Error::config(format!(
                "unable to read depot {}: {}",
                ctx.depot_path.display(),
                e
            )))
        }
    };

    let mut resumed = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let path = entry.path();
        let snapshot = snapshot::snapshot_path(&path);
        if !snapshot.exists() {
            warn!(path = %path.display(), "Container is not resumable");
            continue;
        }

        match Container::resume(ctx, &snapshot) {
            Ok(container) => resumed.push(container),
            Err(e) => warn!(path = %path.display(), error = %e, "Unable to resume container"),
        }
    }

    info!(count = resumed.len(), "Depot resumed");
    Ok(resumed)
}
