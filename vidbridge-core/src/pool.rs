//! Reusable byte-buffer pool.
//!
//! Stages process one frame every few milliseconds; allocating payload
//! storage per frame would dominate the data path. The pool keeps at most
//! one spare buffer per power-of-two size class and hands out storage with
//! `len == capacity` so callers can index it directly.
//!
//! Ownership discipline: the pool owns all storage it has ever leased. A
//! [`Buffer`](crate::buffer::Buffer) borrows one lease at a time and must
//! return it via [`BufferPool::release`] before reuse; [`BufferPool::drain`]
//! is called from every stage `close()` path.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A pool of reusable byte buffers, one spare per size class.
pub struct BufferPool {
    /// Spare storage keyed by size class (next power of two).
    spares: HashMap<usize, Vec<u8>>,
    /// Leases currently held by callers.
    outstanding: usize,
    /// Total buffers allocated (for statistics).
    total_allocated: usize,
}

impl BufferPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self {
            spares: HashMap::new(),
            outstanding: 0,
            total_allocated: 0,
        }
    }

    fn size_class(capacity: usize) -> usize {
        capacity.max(1).next_power_of_two()
    }

    /// Acquire storage of at least `min_capacity` bytes.
    ///
    /// The spare of the matching size class is reused only when its
    /// capacity covers the request; an undersized spare is discarded and a
    /// fresh allocation made in its place.
    pub fn acquire(&mut self, min_capacity: usize) -> Vec<u8> {
        self.outstanding += 1;
        let class = Self::size_class(min_capacity);
        if let Some(spare) = self.spares.remove(&class) {
            if spare.len() >= min_capacity {
                return spare;
            }
            // Undersized spare: dropped here, replaced by the allocation below.
        }
        self.total_allocated += 1;
        vec![0u8; class]
    }

    /// Return storage to the pool.
    ///
    /// The most recently released buffer wins its size class; a previous
    /// spare of the same class is dropped.
    pub fn release(&mut self, storage: Vec<u8>) {
        self.outstanding = self.outstanding.saturating_sub(1);
        let class = Self::size_class(storage.len());
        self.spares.insert(class, storage);
    }

    /// Release every held spare back to the system allocator.
    pub fn drain(&mut self) {
        self.spares.clear();
    }

    /// Number of spare buffers currently held.
    pub fn available(&self) -> usize {
        self.spares.len()
    }

    /// Number of leases currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Total number of allocations performed.
    pub fn total_allocated(&self) -> usize {
        self.total_allocated
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A thread-safe buffer pool shared between a stage and its callers.
pub struct SharedBufferPool {
    inner: Arc<Mutex<BufferPool>>,
}

impl SharedBufferPool {
    /// Create a new shared pool.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufferPool::new())),
        }
    }

    /// Acquire storage of at least `min_capacity` bytes.
    pub fn acquire(&self, min_capacity: usize) -> Vec<u8> {
        self.inner.lock().acquire(min_capacity)
    }

    /// Return storage to the pool.
    pub fn release(&self, storage: Vec<u8>) {
        self.inner.lock().release(storage);
    }

    /// Release every held spare.
    pub fn drain(&self) {
        self.inner.lock().drain();
    }

    /// Number of spare buffers currently held.
    pub fn available(&self) -> usize {
        self.inner.lock().available()
    }

    /// Number of leases currently outstanding.
    pub fn outstanding(&self) -> usize {
        self.inner.lock().outstanding()
    }

    /// Total number of allocations performed.
    pub fn total_allocated(&self) -> usize {
        self.inner.lock().total_allocated()
    }
}

impl Default for SharedBufferPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SharedBufferPool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_release_reuse() {
        let mut pool = BufferPool::new();
        let buf = pool.acquire(1000);
        assert!(buf.len() >= 1000);
        assert_eq!(pool.total_allocated(), 1);
        assert_eq!(pool.outstanding(), 1);

        pool.release(buf);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.outstanding(), 0);

        let _again = pool.acquire(1000);
        assert_eq!(pool.total_allocated(), 1); // Reused
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_one_spare_per_size_class() {
        let mut pool = BufferPool::new();
        let a = pool.acquire(1000);
        let b = pool.acquire(1000);
        pool.release(a);
        pool.release(b); // Same class: replaces the first spare
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_undersized_spare_discarded() {
        let mut pool = BufferPool::new();
        // A 600-byte release lands in the 1024 class but cannot serve a
        // 1000-byte request.
        pool.release(vec![0u8; 600]);
        let buf = pool.acquire(1000);
        assert!(buf.len() >= 1000);
        assert_eq!(pool.total_allocated(), 1);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_distinct_size_classes() {
        let mut pool = BufferPool::new();
        pool.release(vec![0u8; 512]);
        pool.release(vec![0u8; 4096]);
        assert_eq!(pool.available(), 2);

        let small = pool.acquire(512);
        assert_eq!(small.len(), 512);
        assert_eq!(pool.total_allocated(), 0);
    }

    #[test]
    fn test_drain_empties_pool() {
        let mut pool = BufferPool::new();
        let buf = pool.acquire(64);
        pool.release(buf);
        assert_eq!(pool.available(), 1);

        pool.drain();
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_shared_pool() {
        let pool = SharedBufferPool::new();
        let pool2 = pool.clone();

        let buf = pool.acquire(128);
        assert_eq!(pool2.outstanding(), 1);
        pool2.release(buf);
        assert_eq!(pool.available(), 1);
    }
}
