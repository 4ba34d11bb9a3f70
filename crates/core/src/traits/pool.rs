//! Resource pool contract.

/// Pool of exclusively-assignable values.
///
/// A value is either free (owned by the pool) or bound to exactly one
/// container. Every call is atomic with respect to concurrent callers.
pub trait ResourcePool<T>: Send + Sync {
    /// Take any free value, or `None` when the pool is exhausted.
    fn acquire(&self) -> Option<T>;

    /// Take a specific value out of the free set.
    ///
    /// Used when resuming a container whose snapshot already records the
    /// binding. Returns `false` if the value was not free.
    fn remove(&self, value: &T) -> bool;

    /// Return a value to the free set.
    fn release(&self, value: T);

    /// Number of free values.
    fn available(&self) -> usize;
}
