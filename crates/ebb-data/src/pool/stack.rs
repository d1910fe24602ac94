// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A fixed-capacity pool over raw storage with LIFO slot reuse.

use super::{PoolHandle, PoolStats, ResourcePool, UninitHandle};
use ebb_core::config::PoolConfig;
use ebb_core::error::PoolError;
use std::ops::{Index, IndexMut};

/// A fixed-capacity pool that always hands out the most recently released
/// slot first.
///
/// Reusing the hottest slot keeps call patterns that repeatedly request and
/// release a handful of objects (transient command lists, scratch buffers)
/// inside the same cache lines. Slots are raw storage: a value exists only
/// between a request and its release, and callers may construct and destroy
/// values themselves through [`request_unconstructed`](Self::request_unconstructed)
/// and [`release_no_destruction`](Self::release_no_destruction).
#[derive(Debug)]
pub struct SimpleStackPool<T> {
    inner: ResourcePool<T>,
}

impl<T> SimpleStackPool<T> {
    /// Creates a pool of exactly `capacity` slots.
    pub fn new(capacity: u32) -> Result<Self, PoolError> {
        Ok(Self {
            inner: ResourcePool::with_config(PoolConfig::fixed(capacity))?,
        })
    }

    /// Returns the total number of slots.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Returns the number of slots currently handed out.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if no slot is handed out.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of free slots.
    pub fn available(&self) -> usize {
        self.inner.available()
    }

    /// Returns a snapshot of the pool's occupancy.
    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    /// Moves `value` into the most recently released slot.
    ///
    /// Fails with [`PoolError::Exhausted`] when every slot is in use.
    pub fn request(&mut self, value: T) -> Result<PoolHandle<T>, PoolError> {
        self.inner.request(value)
    }

    /// Builds the value only once a slot has been secured.
    pub fn request_with<F>(&mut self, make: F) -> Result<PoolHandle<T>, PoolError>
    where
        F: FnOnce() -> T,
    {
        self.inner.request_with(make)
    }

    /// Reserves a slot without constructing a value.
    pub fn request_unconstructed(&mut self) -> Result<UninitHandle<T>, PoolError> {
        self.inner.request_unconstructed()
    }

    /// Constructs `value` in a reserved slot.
    pub fn construct(&mut self, slot: UninitHandle<T>, value: T) -> PoolHandle<T> {
        self.inner.construct(slot, value)
    }

    /// Drops the value and returns the slot to the top of the free stack.
    pub fn release(&mut self, handle: PoolHandle<T>) {
        self.inner.release(handle);
    }

    /// Moves the value out and returns the slot to the top of the free stack.
    pub fn take(&mut self, handle: PoolHandle<T>) -> Option<T> {
        self.inner.take(handle)
    }

    /// Frees the slot without dropping its value.
    pub fn release_no_destruction(&mut self, handle: PoolHandle<T>) {
        self.inner.release_no_destruction(handle);
    }

    /// Frees a slot that was never constructed.
    pub fn release_unconstructed(&mut self, slot: UninitHandle<T>) {
        self.inner.release_unconstructed(slot);
    }

    /// Frees every slot without running destructors.
    pub fn release_all(&mut self) {
        self.inner.release_all();
    }

    /// Returns the value of a live slot.
    pub fn get(&self, handle: PoolHandle<T>) -> Option<&T> {
        self.inner.get(handle)
    }

    /// Returns the value of a live slot mutably.
    pub fn get_mut(&mut self, handle: PoolHandle<T>) -> Option<&mut T> {
        self.inner.get_mut(handle)
    }

    /// # Safety
    ///
    /// `handle` must have been issued by this pool and its slot must be live.
    pub unsafe fn get_unchecked(&self, handle: PoolHandle<T>) -> &T {
        self.inner.get_unchecked(handle)
    }

    /// # Safety
    ///
    /// `handle` must have been issued by this pool and its slot must be live.
    pub unsafe fn get_unchecked_mut(&mut self, handle: PoolHandle<T>) -> &mut T {
        self.inner.get_unchecked_mut(handle)
    }

    /// Iterates over every live slot in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle<T>, &T)> + '_ {
        self.inner.iter()
    }
}

impl<T> Index<PoolHandle<T>> for SimpleStackPool<T> {
    type Output = T;

    fn index(&self, handle: PoolHandle<T>) -> &T {
        &self.inner[handle]
    }
}

impl<T> IndexMut<PoolHandle<T>> for SimpleStackPool<T> {
    fn index_mut(&mut self, handle: PoolHandle<T>) -> &mut T {
        &mut self.inner[handle]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_released_slots_come_back_in_reverse_order() {
        let mut pool = SimpleStackPool::new(3).unwrap();
        let a = pool.request(1).unwrap();
        let b = pool.request(2).unwrap();
        let c = pool.request(3).unwrap();

        pool.release(a);
        pool.release(b);
        pool.release(c);

        let again: Vec<_> = (0..3).map(|i| pool.request(i).unwrap()).collect();
        assert_eq!(again, vec![c, b, a]);
    }

    #[test]
    fn test_most_recent_release_is_reused_immediately() {
        let mut pool = SimpleStackPool::new(8).unwrap();
        let handles: Vec<_> = (0..8).map(|i| pool.request(i).unwrap()).collect();
        for &handle in handles.iter().rev() {
            pool.release(handle);
        }
        // Slot 0 was released last.
        let scratch = pool.request(100).unwrap();
        assert_eq!(scratch.index(), 0);
        pool.release(scratch);
        assert_eq!(pool.request(200).unwrap().index(), 0);
    }

    #[test]
    fn test_never_grows() {
        let mut pool = SimpleStackPool::new(2).unwrap();
        pool.request(()).unwrap();
        pool.request(()).unwrap();
        assert_eq!(
            pool.request(()).unwrap_err(),
            PoolError::Exhausted { capacity: 2 }
        );
        assert_eq!(pool.capacity(), 2);
        assert_eq!(SimpleStackPool::<u8>::new(0).unwrap_err(), PoolError::ZeroCapacity);
    }

    #[test]
    fn test_live_handles_never_alias() {
        let mut pool = SimpleStackPool::new(16).unwrap();
        let mut live = Vec::new();
        for round in 0..64u32 {
            if round % 3 == 2 {
                let handle = live.remove((round as usize * 7) % live.len());
                pool.release(handle);
            } else if pool.available() > 0 {
                live.push(pool.request(round).unwrap());
            }
            for (i, a) in live.iter().enumerate() {
                for b in &live[i + 1..] {
                    assert_ne!(a.as_ptr(), b.as_ptr());
                }
            }
        }
    }

    #[test]
    fn test_construct_in_place() {
        let mut pool = SimpleStackPool::<[f32; 4]>::new(1).unwrap();
        let slot = pool.request_unconstructed().unwrap();
        let handle = pool.construct(slot, [1.0, 0.0, 0.0, 1.0]);
        pool[handle][1] = 0.5;
        assert_eq!(pool.get(handle), Some(&[1.0, 0.5, 0.0, 1.0]));
        assert_eq!(pool.take(handle), Some([1.0, 0.5, 0.0, 1.0]));
        assert!(pool.is_empty());
    }
}
