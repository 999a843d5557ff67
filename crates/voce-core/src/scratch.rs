//! Lock-free bounded scratch buffers for the audio thread.
//!
//! Every render stage that needs block-sized working memory checks a span
//! out of this pool and returns it on scope exit. Checkout is a single
//! compare-exchange per slot; nothing blocks and nothing allocates after
//! construction. When the pool runs dry the caller gets `None` and is
//! expected to skip the stage for the block.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config;

struct Slot<T> {
    in_use: AtomicBool,
    data: UnsafeCell<Box<[T]>>,
}

// The in_use flag hands out exclusive access to data; see ScratchGuard.
unsafe impl<T: Send> Sync for Slot<T> {}

impl<T: Copy + Default> Slot<T> {
    fn new(capacity: usize) -> Self {
        Self {
            in_use: AtomicBool::new(false),
            data: UnsafeCell::new(vec![T::default(); capacity].into_boxed_slice()),
        }
    }
}

/// Bounded pool of float and integer scratch buffers.
pub struct ScratchPool {
    buffers: Vec<Slot<f32>>,
    index_buffers: Vec<Slot<i64>>,
    capacity: usize,
}

impl ScratchPool {
    /// Build a pool whose buffers each hold `block_capacity` elements.
    pub fn new(block_capacity: usize) -> Self {
        Self::with_counts(
            block_capacity,
            config::SCRATCH_BUFFERS,
            config::SCRATCH_INDEX_BUFFERS,
        )
    }

    pub fn with_counts(block_capacity: usize, buffers: usize, index_buffers: usize) -> Self {
        Self {
            buffers: (0..buffers).map(|_| Slot::new(block_capacity)).collect(),
            index_buffers: (0..index_buffers)
                .map(|_| Slot::new(block_capacity))
                .collect(),
            capacity: block_capacity,
        }
    }

    /// Buffer length each checkout can serve.
    pub fn block_capacity(&self) -> usize {
        self.capacity
    }

    /// Check out a float span of `frames` elements. Contents are
    /// unspecified; fill before reading.
    pub fn get_buffer(&self, frames: usize) -> Option<ScratchGuard<'_>> {
        if frames > self.capacity {
            return None;
        }
        for slot in &self.buffers {
            if slot
                .in_use
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(ScratchGuard { slot, frames });
            }
        }
        None
    }

    /// Check out an integer span of `frames` elements.
    pub fn get_index_buffer(&self, frames: usize) -> Option<IndexGuard<'_>> {
        if frames > self.capacity {
            return None;
        }
        for slot in &self.index_buffers {
            if slot
                .in_use
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(IndexGuard { slot, frames });
            }
        }
        None
    }
}

/// RAII checkout of a float scratch span.
pub struct ScratchGuard<'a> {
    slot: &'a Slot<f32>,
    frames: usize,
}

impl Deref for ScratchGuard<'_> {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &[f32] {
        // Exclusive: the in_use flag was won by this guard.
        unsafe { &(&*self.slot.data.get())[..self.frames] }
    }
}

impl DerefMut for ScratchGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [f32] {
        unsafe { &mut (&mut *self.slot.data.get())[..self.frames] }
    }
}

impl Drop for ScratchGuard<'_> {
    fn drop(&mut self) {
        self.slot.in_use.store(false, Ordering::Release);
    }
}

/// RAII checkout of an integer scratch span.
pub struct IndexGuard<'a> {
    slot: &'a Slot<i64>,
    frames: usize,
}

impl Deref for IndexGuard<'_> {
    type Target = [i64];

    #[inline]
    fn deref(&self) -> &[i64] {
        unsafe { &(&*self.slot.data.get())[..self.frames] }
    }
}

impl DerefMut for IndexGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [i64] {
        unsafe { &mut (&mut *self.slot.data.get())[..self.frames] }
    }
}

impl Drop for IndexGuard<'_> {
    fn drop(&mut self) {
        self.slot.in_use.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_and_release() {
        let pool = ScratchPool::with_counts(64, 2, 1);

        {
            let mut a = pool.get_buffer(64).expect("first checkout");
            let b = pool.get_buffer(32).expect("second checkout");
            assert!(pool.get_buffer(16).is_none(), "pool should be dry");

            a.fill(1.0);
            assert_eq!(a.len(), 64);
            assert_eq!(b.len(), 32);
        }

        // Both released on drop.
        let _c = pool.get_buffer(64).expect("released slot reusable");
        let _d = pool.get_buffer(64).expect("released slot reusable");
    }

    #[test]
    fn test_oversized_request_refused() {
        let pool = ScratchPool::with_counts(64, 2, 1);
        assert!(pool.get_buffer(65).is_none());
        assert!(pool.get_index_buffer(65).is_none());
    }

    #[test]
    fn test_index_buffer() {
        let pool = ScratchPool::with_counts(16, 1, 1);
        let mut idx = pool.get_index_buffer(8).expect("index checkout");
        idx.fill(7);
        assert!(idx.iter().all(|&x| x == 7));
        assert!(pool.get_index_buffer(8).is_none());
    }

    #[test]
    fn test_release_on_early_return() {
        let pool = ScratchPool::with_counts(16, 1, 0);

        fn stage(pool: &ScratchPool) -> Option<()> {
            let _span = pool.get_buffer(16)?;
            // Early exit path still releases the span.
            None
        }

        assert!(stage(&pool).is_none());
        assert!(pool.get_buffer(16).is_some());
    }
}
