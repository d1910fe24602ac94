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

//! A growable pool with LIFO reuse and stable slot addresses.

use super::arena::{SlotArena, SlotState};
use super::consistency::ConsistencyTracker;
use super::{PoolHandle, PoolStats, UninitHandle};
use ebb_core::config::PoolConfig;
use ebb_core::error::PoolError;
use ebb_core::memory;
use std::any::type_name;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

/// A pool of `T` slots that grows by appending chunks.
///
/// Growth never moves existing slots: a handle or address obtained from
/// [`request`](Self::request) stays valid for as long as the pool lives, no
/// matter how many chunks are added afterwards. Released slots are reused in
/// LIFO order, so the most recently released slot is the next one handed out.
///
/// # Example
///
/// ```rust
/// use ebb_core::config::PoolConfig;
/// use ebb_data::pool::ResourcePool;
///
/// let mut textures = ResourcePool::with_config(PoolConfig::growable(2)).unwrap();
/// let albedo = textures.request("albedo.png").unwrap();
/// let normal = textures.request("normal.png").unwrap();
/// let address = albedo.as_ptr();
///
/// // The third request appends a chunk, existing slots stay where they were.
/// let roughness = textures.request("roughness.png").unwrap();
/// assert_eq!(textures.chunk_count(), 2);
/// assert_eq!(albedo.as_ptr(), address);
/// assert_eq!(textures[albedo], "albedo.png");
///
/// textures.release(normal);
/// assert_eq!(textures.len(), 2);
/// # let _ = roughness;
/// ```
pub struct ResourcePool<T> {
    arena: SlotArena<T>,
    /// Free slot indices, used as a stack.
    free: Vec<u32>,
    config: PoolConfig,
    tracker: ConsistencyTracker,
}

impl<T> ResourcePool<T> {
    /// Creates a pool with the default [`PoolConfig`].
    pub fn new() -> Self {
        Self::build(PoolConfig::default())
    }

    /// Creates a pool that starts with `capacity` slots and grows in chunks of
    /// the same size.
    pub fn with_capacity(capacity: u32) -> Self {
        Self::build(PoolConfig::growable(capacity))
    }

    /// Creates a pool from an explicit configuration.
    ///
    /// Fails with [`PoolError::ZeroCapacity`] for a fixed pool without slots.
    pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
        if config.initial_capacity == 0 && !config.growth.can_grow() {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self::build(config))
    }

    pub(crate) fn build(config: PoolConfig) -> Self {
        let mut pool = Self {
            arena: SlotArena::new(),
            free: Vec::new(),
            config,
            tracker: ConsistencyTracker::default(),
        };
        if config.initial_capacity > 0 {
            pool.add_chunk(config.initial_capacity);
        }
        memory::record_pool_created();
        log::debug!(
            "Created ResourcePool<{}> with {} slots, growth {:?}",
            type_name::<T>(),
            config.initial_capacity,
            config.growth
        );
        pool
    }

    /// Returns the configuration the pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Returns the number of slots backed by storage.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity() as usize
    }

    /// Returns the number of slots currently handed out.
    #[inline]
    pub fn len(&self) -> usize {
        self.arena.in_use() as usize
    }

    /// Returns `true` if no slot is handed out.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arena.in_use() == 0
    }

    /// Returns the number of slots that can be requested without growing.
    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Returns the number of backing chunks.
    pub fn chunk_count(&self) -> usize {
        self.arena.chunk_count()
    }

    /// Returns a snapshot of the pool's occupancy.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity(),
            in_use: self.len(),
            chunks: self.chunk_count(),
        }
    }

    /// Moves `value` into a free slot and returns its handle.
    ///
    /// Grows the pool if every slot is in use and the growth policy allows it;
    /// otherwise fails with [`PoolError::Exhausted`] and drops `value`.
    pub fn request(&mut self, value: T) -> Result<PoolHandle<T>, PoolError> {
        let index = self.acquire_slot()?;
        let ptr = self.arena.construct(index, value);
        Ok(PoolHandle::new(index, ptr))
    }

    /// Like [`request`](Self::request), but only builds the value once a slot
    /// has been secured.
    pub fn request_with<F>(&mut self, make: F) -> Result<PoolHandle<T>, PoolError>
    where
        F: FnOnce() -> T,
    {
        let index = self.acquire_slot()?;
        let ptr = self.arena.construct(index, make());
        Ok(PoolHandle::new(index, ptr))
    }

    /// Reserves a slot without constructing a value in it.
    pub fn request_unconstructed(&mut self) -> Result<UninitHandle<T>, PoolError> {
        let index = self.acquire_slot()?;
        Ok(UninitHandle::new(index, self.arena.slot_ptr(index)))
    }

    /// Constructs `value` in a slot reserved by
    /// [`request_unconstructed`](Self::request_unconstructed).
    ///
    /// # Panics
    ///
    /// Panics if `slot` was not issued by this pool.
    pub fn construct(&mut self, slot: UninitHandle<T>, value: T) -> PoolHandle<T> {
        assert!(
            self.arena.owns(slot.index, slot.ptr),
            "unconstructed slot {} was not issued by this pool",
            slot.index
        );
        let ptr = self.arena.construct(slot.index, value);
        PoolHandle::new(slot.index, ptr)
    }

    /// Drops the value of a live slot but keeps the slot reserved, so a new
    /// value can be constructed at the same address.
    pub fn destroy_in_place(&mut self, handle: PoolHandle<T>) -> Option<UninitHandle<T>> {
        if !self.owns(handle.index, handle.ptr) {
            return None;
        }
        let destroyed = self.arena.destroy(handle.index);
        debug_assert!(destroyed, "slot {} is not live", handle.index);
        destroyed.then(|| UninitHandle::new(handle.index, handle.ptr))
    }

    /// Drops the slot's value and returns the slot to the free list.
    ///
    /// Releasing a slot twice is a programmer error, caught in debug builds
    /// and always caught with the `consistency-check` feature.
    pub fn release(&mut self, handle: PoolHandle<T>) {
        self.check_release(handle.index, handle.ptr);
        if !self.owns(handle.index, handle.ptr) {
            return;
        }
        let destroyed = self.arena.destroy(handle.index);
        debug_assert!(destroyed, "slot {} released twice", handle.index);
        if destroyed {
            self.free_slot(handle.index);
        }
    }

    /// Moves the value out of the slot and returns the slot to the free list.
    ///
    /// Returns `None` if the slot is not live.
    pub fn take(&mut self, handle: PoolHandle<T>) -> Option<T> {
        self.check_release(handle.index, handle.ptr);
        if !self.owns(handle.index, handle.ptr) {
            return None;
        }
        let value = self.arena.take(handle.index)?;
        self.free_slot(handle.index);
        Some(value)
    }

    /// Returns the slot to the free list without running the value's destructor.
    ///
    /// The value is leaked. Use this when the caller already moved the value
    /// out through the slot's address.
    pub fn release_no_destruction(&mut self, handle: PoolHandle<T>) {
        self.check_release(handle.index, handle.ptr);
        if !self.owns(handle.index, handle.ptr) {
            return;
        }
        let forgotten = self.arena.forget(handle.index);
        debug_assert!(forgotten, "slot {} released twice", handle.index);
        if forgotten {
            self.free_slot(handle.index);
        }
    }

    /// Returns a slot that was never constructed to the free list.
    pub fn release_unconstructed(&mut self, slot: UninitHandle<T>) {
        self.check_release(slot.index, slot.ptr);
        if !self.owns(slot.index, slot.ptr) {
            return;
        }
        let reserved = self.arena.state(slot.index) == SlotState::Reserved;
        debug_assert!(reserved, "slot {} is not reserved", slot.index);
        if reserved {
            self.free_slot(slot.index);
        }
    }

    /// Returns every slot to the free list at once.
    ///
    /// Destructors are not run: values still live in the pool are leaked.
    pub fn release_all(&mut self) {
        let released = self.arena.in_use() as usize;
        self.arena.forget_all();
        self.free.clear();
        self.free.extend((0..self.arena.capacity()).rev());
        self.tracker.clear();
        memory::record_slots_released(released);
        log::trace!(
            "ResourcePool<{}>: released all {released} slots",
            type_name::<T>()
        );
    }

    /// Returns `true` if `handle` refers to a live slot of this pool.
    pub fn contains(&self, handle: PoolHandle<T>) -> bool {
        self.arena.owns(handle.index, handle.ptr) && self.arena.get(handle.index).is_some()
    }

    /// Returns the value of a live slot.
    #[inline]
    pub fn get(&self, handle: PoolHandle<T>) -> Option<&T> {
        if !self.owns(handle.index, handle.ptr) {
            return None;
        }
        self.arena.get(handle.index)
    }

    /// Returns the value of a live slot mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle<T>) -> Option<&mut T> {
        if !self.owns(handle.index, handle.ptr) {
            return None;
        }
        self.arena.get_mut(handle.index)
    }

    /// Returns the value of a slot without checking that it is live.
    ///
    /// # Safety
    ///
    /// `handle` must have been issued by this pool and its slot must be live.
    #[inline]
    pub unsafe fn get_unchecked(&self, handle: PoolHandle<T>) -> &T {
        self.arena.get_unchecked(handle.index)
    }

    /// Mutable counterpart of [`get_unchecked`](Self::get_unchecked).
    ///
    /// # Safety
    ///
    /// `handle` must have been issued by this pool and its slot must be live.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, handle: PoolHandle<T>) -> &mut T {
        self.arena.get_unchecked_mut(handle.index)
    }

    /// Recovers the handle of a live slot from its address.
    pub fn handle_from_ptr(&self, ptr: *const T) -> Option<PoolHandle<T>> {
        let index = self.arena.index_of_ptr(ptr)?;
        self.arena
            .get(index)
            .map(|_| PoolHandle::new(index, self.arena.slot_ptr(index)))
    }

    /// Recovers the reservation of an unconstructed slot from its address.
    pub(crate) fn uninit_from_ptr(&self, ptr: *const T) -> Option<UninitHandle<T>> {
        let index = self.arena.index_of_ptr(ptr)?;
        (self.arena.state(index) == SlotState::Reserved)
            .then(|| UninitHandle::new(index, self.arena.slot_ptr(index)))
    }

    /// Iterates over every live slot in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle<T>, &T)> + '_ {
        self.arena
            .iter()
            .map(move |(index, value)| (PoolHandle::new(index, self.arena.slot_ptr(index)), value))
    }

    #[inline]
    fn owns(&self, index: u32, ptr: NonNull<T>) -> bool {
        let owned = self.arena.owns(index, ptr);
        debug_assert!(owned, "handle {index} was not issued by this pool");
        owned
    }

    /// Runs before any ownership or state check, so that the tracker sees
    /// repeated and foreign releases.
    #[inline]
    fn check_release(&mut self, index: u32, ptr: NonNull<T>) {
        self.tracker.on_release(ptr.as_ptr() as usize, index);
    }

    fn acquire_slot(&mut self) -> Result<u32, PoolError> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.grow()?;
                self.free.pop().ok_or(PoolError::Exhausted {
                    capacity: self.capacity(),
                })?
            }
        };
        self.arena.reserve(index);
        self.tracker
            .on_request(self.arena.slot_ptr(index).as_ptr() as usize, index);
        memory::record_slot_requested();
        Ok(index)
    }

    fn free_slot(&mut self, index: u32) {
        self.arena.free(index);
        self.free.push(index);
        memory::record_slots_released(1);
    }

    fn grow(&mut self) -> Result<(), PoolError> {
        let capacity = self.arena.capacity();
        let next = self
            .config
            .growth
            .next_chunk_size(capacity)
            .filter(|&size| size > 0 && capacity.checked_add(size).is_some());

        match next {
            Some(size) => {
                self.add_chunk(size);
                Ok(())
            }
            None => {
                memory::record_exhaustion();
                log::warn!(
                    "ResourcePool<{}> exhausted: all {capacity} slots are in use",
                    type_name::<T>()
                );
                Err(PoolError::Exhausted {
                    capacity: capacity as usize,
                })
            }
        }
    }

    fn add_chunk(&mut self, size: u32) {
        let first = self.arena.add_chunk(size);
        // Reversed so that lower indices are handed out first.
        self.free.extend((first..first + size).rev());
    }
}

impl<T> Default for ResourcePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ResourcePool<T> {
    fn drop(&mut self) {
        memory::record_slots_released(self.arena.in_use() as usize);
    }
}

impl<T> Index<PoolHandle<T>> for ResourcePool<T> {
    type Output = T;

    fn index(&self, handle: PoolHandle<T>) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("pool slot {} is not live", handle.index),
        }
    }
}

impl<T> IndexMut<PoolHandle<T>> for ResourcePool<T> {
    fn index_mut(&mut self, handle: PoolHandle<T>) -> &mut T {
        let index = handle.index;
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("pool slot {index} is not live"),
        }
    }
}

impl<T> fmt::Debug for ResourcePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("type", &type_name::<T>())
            .field("stats", &self.stats())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::config::GrowthPolicy;
    use std::rc::Rc;

    #[test]
    fn test_requests_are_handed_out_in_index_order() {
        let mut pool = ResourcePool::with_capacity(4);
        let handles: Vec<_> = (0..4).map(|i| pool.request(i).unwrap()).collect();
        let indices: Vec<_> = handles.iter().map(|h| h.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_growth_preserves_addresses() {
        let mut pool = ResourcePool::with_config(PoolConfig::growable(2)).unwrap();
        let first = pool.request(String::from("first")).unwrap();
        let address = first.as_ptr();

        let later: Vec<_> = (0..50).map(|i| pool.request(i.to_string()).unwrap()).collect();
        assert!(pool.chunk_count() > 1);
        assert_eq!(first.as_ptr(), address);
        assert_eq!(pool[first], "first");
        for (i, handle) in later.iter().enumerate() {
            assert_eq!(pool[*handle], i.to_string());
        }
    }

    #[test]
    fn test_doubling_growth() {
        let config = PoolConfig::fixed(2).with_growth(GrowthPolicy::Doubling);
        let mut pool = ResourcePool::with_config(config).unwrap();
        for i in 0..5 {
            pool.request(i).unwrap();
        }
        // 2 -> 4 -> 8
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.chunk_count(), 3);
    }

    #[test]
    fn test_fixed_pool_exhaustion() {
        let mut pool = ResourcePool::with_config(PoolConfig::fixed(1)).unwrap();
        let handle = pool.request(1u8).unwrap();
        assert_eq!(
            pool.request(2u8).unwrap_err(),
            PoolError::Exhausted { capacity: 1 }
        );
        pool.release(handle);
        assert!(pool.request(3u8).is_ok());
    }

    #[test]
    fn test_zero_capacity_fixed_pool_is_rejected() {
        assert_eq!(
            ResourcePool::<u8>::with_config(PoolConfig::fixed(0)).unwrap_err(),
            PoolError::ZeroCapacity
        );
        // A growable pool may start empty.
        let mut pool = ResourcePool::with_config(PoolConfig::growable(0)).unwrap();
        assert_eq!(pool.capacity(), 0);
        pool.request(1u8).unwrap();
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn test_lifo_reuse() {
        let mut pool = ResourcePool::with_capacity(3);
        let a = pool.request('a').unwrap();
        let b = pool.request('b').unwrap();
        let c = pool.request('c').unwrap();
        pool.release(a);
        pool.release(b);
        pool.release(c);

        let order: Vec<_> = (0..3).map(|_| pool.request('x').unwrap().index()).collect();
        assert_eq!(order, vec![c.index(), b.index(), a.index()]);
    }

    #[test]
    fn test_release_runs_destructor_and_take_does_not() {
        let tracker = Rc::new(());
        let mut pool = ResourcePool::with_capacity(2);
        let released = pool.request(Rc::clone(&tracker)).unwrap();
        let taken = pool.request(Rc::clone(&tracker)).unwrap();
        assert_eq!(Rc::strong_count(&tracker), 3);

        pool.release(released);
        assert_eq!(Rc::strong_count(&tracker), 2);

        let value = pool.take(taken).unwrap();
        assert_eq!(Rc::strong_count(&tracker), 2);
        drop(value);
        assert_eq!(Rc::strong_count(&tracker), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_unconstructed_round_trip() {
        let mut pool = ResourcePool::<Vec<u32>>::with_capacity(2);
        let slot = pool.request_unconstructed().unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.iter().next().is_none());

        let handle = pool.construct(slot, vec![1, 2, 3]);
        assert_eq!(pool[handle], vec![1, 2, 3]);

        let slot = pool.destroy_in_place(handle).unwrap();
        assert!(!pool.contains(handle));
        pool.release_unconstructed(slot);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_release_no_destruction_leaks() {
        let tracker = Rc::new(());
        let mut pool = ResourcePool::with_capacity(1);
        let handle = pool.request(Rc::clone(&tracker)).unwrap();
        pool.release_no_destruction(handle);
        assert!(pool.is_empty());
        assert_eq!(Rc::strong_count(&tracker), 2);
    }

    #[test]
    fn test_release_all() {
        let mut pool = ResourcePool::with_capacity(4);
        for i in 0..4 {
            pool.request(i).unwrap();
        }
        pool.release_all();
        assert!(pool.is_empty());
        assert_eq!(pool.available(), 4);
        assert_eq!(pool.request(9).unwrap().index(), 0);
    }

    #[test]
    fn test_drop_releases_live_values() {
        let tracker = Rc::new(());
        {
            let mut pool = ResourcePool::with_capacity(2);
            pool.request(Rc::clone(&tracker)).unwrap();
            pool.request(Rc::clone(&tracker)).unwrap();
        }
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_handle_from_ptr() {
        let mut pool = ResourcePool::with_capacity(2);
        let handle = pool.request(5u64).unwrap();
        assert_eq!(pool.handle_from_ptr(handle.as_ptr()), Some(handle));
        pool.release(handle);
        assert_eq!(pool.handle_from_ptr(handle.as_ptr()), None);
    }

    #[test]
    fn test_iter_and_mutation() {
        let mut pool = ResourcePool::with_capacity(3);
        let a = pool.request(1).unwrap();
        let b = pool.request(2).unwrap();
        let c = pool.request(3).unwrap();
        pool.release(b);
        *pool.get_mut(a).unwrap() += 10;
        pool[c] *= 2;

        let values: Vec<_> = pool.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![11, 6]);
        assert_eq!(pool.stats().in_use, 2);
    }

    #[test]
    #[cfg(all(debug_assertions, not(feature = "consistency-check")))]
    #[should_panic(expected = "released twice")]
    fn test_double_release_is_caught_in_debug() {
        let mut pool = ResourcePool::with_capacity(1);
        let handle = pool.request(0).unwrap();
        pool.release(handle);
        pool.release(handle);
    }

    #[test]
    #[cfg(all(debug_assertions, not(feature = "consistency-check")))]
    #[should_panic(expected = "not issued by this pool")]
    fn test_foreign_handle_is_caught_in_debug() {
        let mut first = ResourcePool::with_capacity(1);
        let mut second = ResourcePool::with_capacity(1);
        let handle = first.request(0).unwrap();
        second.request(0).unwrap();
        second.release(handle);
    }

    #[test]
    #[cfg(feature = "consistency-check")]
    #[should_panic(expected = "is not live in this pool")]
    fn test_tracker_catches_double_release() {
        let mut pool = ResourcePool::with_capacity(2);
        let handle = pool.request(0).unwrap();
        pool.release(handle);
        pool.release(handle);
    }

    #[test]
    #[cfg(feature = "consistency-check")]
    #[should_panic(expected = "is not live in this pool")]
    fn test_tracker_catches_take_after_release_no_destruction() {
        let mut pool = ResourcePool::with_capacity(2);
        let handle = pool.request(String::from("kept")).unwrap();
        pool.release_no_destruction(handle);
        pool.take(handle);
    }

    #[test]
    #[cfg(feature = "consistency-check")]
    #[should_panic(expected = "is not live in this pool")]
    fn test_tracker_catches_foreign_handle() {
        let mut first = ResourcePool::with_capacity(1);
        let mut second = ResourcePool::with_capacity(1);
        let handle = first.request(0).unwrap();
        second.request(0).unwrap();
        second.release(handle);
    }

    #[test]
    #[cfg(feature = "consistency-check")]
    fn test_tracker_follows_release_all() {
        let mut pool = ResourcePool::with_capacity(2);
        let a = pool.request(1).unwrap();
        pool.request(2).unwrap();
        pool.release(a);
        pool.release_all();
        assert_eq!(pool.tracker.len(), 0);
        let b = pool.request(3).unwrap();
        assert_eq!(pool.tracker.len(), 1);
        pool.release(b);
        assert_eq!(pool.tracker.len(), 0);
    }
}
