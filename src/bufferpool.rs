//! Reusable pixel buffers, keyed by capacity.
//!
//! Every tile write and read allocates a same-shaped byte buffer; instead of
//! letting the allocator churn through them, a small pool of recently
//! freed buffers is kept per capacity and handed back out: a cache of
//! same-shaped byte ranges behind a `Mutex`, capped in how many are kept,
//! keyed by allocation size instead of content hash, since a buffer pool
//! has nothing to deduplicate, only to recycle.

use std::collections::HashMap;
use std::sync::Mutex;

/// Buffers smaller than this are left to the normal allocator — the
/// bookkeeping cost of pooling isn't worth it for tiny allocations.
const RECYCLE_MIN_SIZE: usize = 4096;

/// At most this many buffers are kept per capacity bucket.
const POOL_SIZE_PER_CAPACITY: usize = 3;

/// A pool of reusable `Vec<u8>` buffers, bucketed by capacity.
///
/// Disabled outright on 32-bit hosts: address space is tight enough there
/// that holding onto freed buffers for later reuse is a net loss.
pub struct BufferPool {
    #[cfg(target_pointer_width = "64")]
    buckets: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            #[cfg(target_pointer_width = "64")]
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Always allocates a fresh zero-filled buffer of exactly `len` bytes,
    /// bypassing the pool. For short-lived buffers too small to be worth
    /// the bookkeeping of recycling.
    pub fn get_small(&self, len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    /// Get a zero-filled buffer of exactly `len` bytes, reusing a pooled
    /// allocation of the same capacity if one is available.
    pub fn get_large(&self, len: usize) -> Vec<u8> {
        #[cfg(target_pointer_width = "64")]
        {
            if len >= RECYCLE_MIN_SIZE {
                if let Some(mut buf) = self.take_pooled(len) {
                    buf.clear();
                    buf.resize(len, 0);
                    return buf;
                }
            }
        }
        vec![0u8; len]
    }

    /// Offer a buffer back to the pool for future reuse. Buffers below the
    /// recycling threshold are dropped; a bucket already at capacity evicts
    /// its oldest entry to make room for the incoming one.
    pub fn recycle(&self, buf: Vec<u8>) {
        #[cfg(target_pointer_width = "64")]
        {
            let capacity = buf.capacity();
            if capacity < RECYCLE_MIN_SIZE {
                return;
            }
            let mut buckets = self.buckets.lock().unwrap();
            let bucket = buckets.entry(capacity).or_default();
            if bucket.len() >= POOL_SIZE_PER_CAPACITY {
                bucket.remove(0);
            }
            bucket.push(buf);
        }
        #[cfg(not(target_pointer_width = "64"))]
        {
            drop(buf);
        }
    }

    #[cfg(target_pointer_width = "64")]
    fn take_pooled(&self, len: usize) -> Option<Vec<u8>> {
        let mut buckets = self.buckets.lock().unwrap();
        buckets.get_mut(&len).and_then(|bucket| bucket.pop())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_large_returns_zeroed_buffer_of_requested_len() {
        let pool = BufferPool::new();
        let buf = pool.get_large(8192);
        assert_eq!(buf.len(), 8192);
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_get_small_always_allocates_fresh() {
        let pool = BufferPool::new();
        let buf = pool.get_small(8192);
        let ptr = buf.as_ptr();
        pool.recycle(buf);
        // get_small never consults the pool, even though a buffer of this
        // capacity was just recycled.
        let buf2 = pool.get_small(8192);
        assert_ne!(buf2.as_ptr(), ptr);
    }

    #[test]
    fn test_small_buffers_bypass_pool() {
        let pool = BufferPool::new();
        let buf = pool.get_large(16);
        assert_eq!(buf.len(), 16);
        pool.recycle(buf);
        // A fresh request still works regardless of whether it was pooled.
        let buf2 = pool.get_large(16);
        assert_eq!(buf2.len(), 16);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_recycled_buffer_is_reused() {
        let pool = BufferPool::new();
        let buf = pool.get_large(8192);
        let ptr = buf.as_ptr();
        pool.recycle(buf);
        let buf2 = pool.get_large(8192);
        assert_eq!(buf2.as_ptr(), ptr);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_pool_caps_per_capacity() {
        let pool = BufferPool::new();
        for _ in 0..5 {
            pool.recycle(vec![0u8; 8192]);
        }
        let bucket_len = pool.buckets.lock().unwrap().get(&8192).map(|b| b.len()).unwrap_or(0);
        assert!(bucket_len <= POOL_SIZE_PER_CAPACITY);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_overflow_evicts_oldest_not_newest() {
        let pool = BufferPool::new();
        // Fill the bucket with 3 distinct buffers, then push a 4th — the
        // oldest (first pushed) should be the one evicted, not the newest.
        for _ in 0..POOL_SIZE_PER_CAPACITY {
            pool.recycle(vec![0u8; 4096]);
        }
        let newest = vec![7u8; 4096];
        let newest_ptr = newest.as_ptr();
        pool.recycle(newest);

        let bucket = pool.buckets.lock().unwrap();
        let bucket = bucket.get(&4096).unwrap();
        assert_eq!(bucket.len(), POOL_SIZE_PER_CAPACITY);
        assert!(bucket.iter().any(|b| b.as_ptr() == newest_ptr));
    }
}
