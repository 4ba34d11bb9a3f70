//! In-memory resource pools.
//!
//! A single free-list implementation backs all three pools; the
//! constructors only differ in how they enumerate the managed range.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::net::Ipv4Addr;
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};
use crate::traits::ResourcePool;
use crate::types::{Network, Port, UserId};

/// Addresses covered by one network allocation (a /30).
pub const NETWORK_BLOCK_SIZE: u32 = 4;

#[derive(Debug)]
struct FreeList<T> {
    queue: VecDeque<T>,
    free: HashSet<T>,
}

/// FIFO pool over a fixed set of values.
///
/// Released values go to the back of the queue so a value just returned by
/// one container is the last to be handed to the next.
#[derive(Debug)]
pub struct FreeListPool<T> {
    managed: HashSet<T>,
    inner: Mutex<FreeList<T>>,
}

impl<T> FreeListPool<T>
where
    T: Copy + Eq + Hash,
{
    /// Create a pool whose free set initially holds every value.
    pub fn new(values: impl IntoIterator<Item = T>) -> Self {
        let mut queue = VecDeque::new();
        let mut free = HashSet::new();
        for value in values {
            if free.insert(value) {
                queue.push_back(value);
            }
        }

        Self {
            managed: free.clone(),
            inner: Mutex::new(FreeList { queue, free }),
        }
    }

    /// Number of values the pool manages, free or bound.
    pub fn capacity(&self) -> usize {
        self.managed.len()
    }

    /// Whether `value` belongs to this pool's range.
    pub fn contains(&self, value: &T) -> bool {
        self.managed.contains(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FreeList<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> ResourcePool<T> for FreeListPool<T>
where
    T: Copy + Eq + Hash + Send + Sync,
{
    fn acquire(&self) -> Option<T> {
        let mut inner = self.lock();
        let value = inner.queue.pop_front()?;
        inner.free.remove(&value);
        Some(value)
    }

    fn remove(&self, value: &T) -> bool {
        let mut inner = self.lock();
        if !inner.free.remove(value) {
            return false;
        }
        inner.queue.retain(|v| v != value);
        true
    }

    fn release(&self, value: T) {
        if !self.managed.contains(&value) {
            tracing::warn!("Ignoring release of a value outside the pool range");
            return;
        }

        let mut inner = self.lock();
        if inner.free.insert(value) {
            inner.queue.push_back(value);
        }
    }

    fn available(&self) -> usize {
        self.lock().queue.len()
    }
}

/// Pool of /30 network allocations.
pub type NetworkPool = FreeListPool<Network>;

/// Pool of host ports.
pub type PortPool = FreeListPool<Port>;

/// Pool of numeric user identities.
pub type UserPool = FreeListPool<UserId>;

impl FreeListPool<Network> {
    /// `size` consecutive /30 blocks starting at `start`.
    pub fn networks(start: Ipv4Addr, size: u32) -> Result<Self> {
        let base = u32::from(start);
        if base % NETWORK_BLOCK_SIZE != 0 {
            return Err(Error::config(format!(
                "network pool start {} is not aligned to a /30",
                start
            )));
        }
        let span = size
            .checked_mul(NETWORK_BLOCK_SIZE)
            .and_then(|span| base.checked_add(span));
        if span.is_none() {
            return Err(Error::config(format!(
                "network pool of {} blocks from {} overflows IPv4",
                size, start
            )));
        }

        Ok(Self::new(
            (0..size).map(|i| Network(Ipv4Addr::from(base + i * NETWORK_BLOCK_SIZE))),
        ))
    }
}

impl FreeListPool<Port> {
    /// `size` consecutive ports starting at `start`.
    pub fn ports(start: u16, size: u16) -> Result<Self> {
        let end = start.checked_add(size).ok_or_else(|| {
            Error::config(format!("port pool of {} from {} overflows u16", size, start))
        })?;
        Ok(Self::new((start..end).map(Port)))
    }
}

impl FreeListPool<UserId> {
    /// `size` consecutive user ids starting at `start`.
    pub fn user_ids(start: u32, size: u32) -> Result<Self> {
        let end = start.checked_add(size).ok_or_else(|| {
            Error::config(format!("user pool of {} from {} overflows u32", size, start))
        })?;
        Ok(Self::new((start..end).map(UserId)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_acquire_until_exhausted() {
        let pool = UserPool::user_ids(10000, 2).unwrap();
        assert_eq!(pool.acquire(), Some(UserId(10000)));
        assert_eq!(pool.acquire(), Some(UserId(10001)));
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_release_is_fifo_and_never_duplicates() {
        let pool = PortPool::ports(61000, 3).unwrap();
        let first = pool.acquire().unwrap();

        pool.release(first);
        pool.release(first);
        assert_eq!(pool.available(), 3);

        assert_eq!(pool.acquire(), Some(Port(61001)));
        assert_eq!(pool.acquire(), Some(Port(61002)));
        assert_eq!(pool.acquire(), Some(first));
        assert_eq!(pool.acquire(), None);
    }

    #[test]
    fn test_remove_exact_value() {
        let pool = UserPool::user_ids(10000, 3).unwrap();
        assert!(pool.remove(&UserId(10001)));
        assert!(!pool.remove(&UserId(10001)));
        assert!(!pool.remove(&UserId(99)));
        assert_eq!(pool.available(), 2);

        assert_eq!(pool.acquire(), Some(UserId(10000)));
        assert_eq!(pool.acquire(), Some(UserId(10002)));
    }

    #[test]
    fn test_release_outside_range_is_ignored() {
        let pool = UserPool::user_ids(10000, 1).unwrap();
        pool.release(UserId(5));
        assert_eq!(pool.available(), 1);
        assert!(!pool.contains(&UserId(5)));
    }

    #[test]
    fn test_network_blocks() {
        let pool = NetworkPool::networks(Ipv4Addr::new(10, 254, 0, 0), 2).unwrap();
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.acquire(), Some(Network(Ipv4Addr::new(10, 254, 0, 0))));
        assert_eq!(pool.acquire(), Some(Network(Ipv4Addr::new(10, 254, 0, 4))));

        assert!(NetworkPool::networks(Ipv4Addr::new(10, 254, 0, 1), 2).is_err());
        assert!(NetworkPool::networks(Ipv4Addr::new(255, 255, 255, 0), 1024).is_err());
        assert!(PortPool::ports(65000, 1000).is_err());
    }

    #[test]
    fn test_concurrent_acquire_hands_out_distinct_values() {
        let pool = Arc::new(UserPool::user_ids(20000, 64).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let mut got = Vec::new();
                    while let Some(uid) = pool.acquire() {
                        got.push(uid);
                    }
                    got
                })
            })
            .collect();

        let mut all: Vec<UserId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 64);
    }
}
