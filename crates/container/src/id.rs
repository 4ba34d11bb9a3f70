//! Container id generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static NEXT_ID: OnceLock<AtomicU64> = OnceLock::new();

/// Next container id, as lowercase hex.
///
/// The counter is seeded once per process from wall-clock microseconds, so
/// fresh ids do not collide with ids restored from a previous run, and then
/// increments monotonically.
pub fn next_id() -> String {
    let counter = NEXT_ID.get_or_init(|| {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(1);
        AtomicU64::new(seed)
    });
    format!("{:x}", counter.fetch_add(1, Ordering::Relaxed))
}
