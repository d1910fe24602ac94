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

//! A fixed-capacity pool of eagerly constructed values.

use super::consistency::ConsistencyTracker;
use super::{PoolHandle, PoolStats};
use crate::bit_vector::BitVector;
use ebb_core::error::PoolError;
use ebb_core::memory;
use std::any::type_name;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

/// A fixed-capacity pool whose slots always hold a valid `T`.
///
/// Every slot is default-constructed when the pool is created, and
/// reconstructed with `T::default()` each time it is requested, so a request
/// always observes a fresh value. Released slots are queued and reused in
/// FIFO order, which spreads writes over the whole pool.
pub struct SimplePool<T: Default> {
    slots: Box<[T]>,
    /// Free slot indices, oldest release first.
    free: VecDeque<u32>,
    /// One bit per slot, set while the slot is handed out.
    in_use: BitVector<'static>,
    tracker: ConsistencyTracker,
}

impl<T: Default> SimplePool<T> {
    /// Creates a pool of `capacity` default-constructed slots.
    pub fn new(capacity: u32) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let slots: Box<[T]> = (0..capacity).map(|_| T::default()).collect();
        // One bit per slot is always a valid width.
        let in_use = BitVector::from_elem(1, 0, capacity as usize)
            .unwrap_or_else(|_| unreachable!());

        memory::record_pool_created();
        memory::record_chunk_allocated(capacity as usize * mem::size_of::<T>());
        log::debug!(
            "Created SimplePool<{}> with {capacity} slots",
            type_name::<T>()
        );

        Ok(Self {
            slots,
            free: (0..capacity).collect(),
            in_use,
            tracker: ConsistencyTracker::default(),
        })
    }

    /// Returns the total number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of slots currently handed out.
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns `true` if no slot is handed out.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.free.len() == self.slots.len()
    }

    /// Returns the number of free slots.
    #[inline]
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Returns a snapshot of the pool's occupancy.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity(),
            in_use: self.len(),
            chunks: 1,
        }
    }

    /// Hands out the oldest free slot, reset to `T::default()`.
    ///
    /// Fails with [`PoolError::Exhausted`] when every slot is in use.
    pub fn request(&mut self) -> Result<PoolHandle<T>, PoolError> {
        let Some(index) = self.free.pop_front() else {
            memory::record_exhaustion();
            log::warn!(
                "SimplePool<{}> exhausted: all {} slots are in use",
                type_name::<T>(),
                self.capacity()
            );
            return Err(PoolError::Exhausted {
                capacity: self.capacity(),
            });
        };

        self.in_use.set(index as usize, 1);
        let slot = &mut self.slots[index as usize];
        *slot = T::default();
        let ptr = NonNull::from(slot);
        self.tracker.on_request(ptr.as_ptr() as usize, index);
        memory::record_slot_requested();
        Ok(PoolHandle::new(index, ptr))
    }

    /// Returns the slot to the back of the free queue.
    ///
    /// The value is left in place and replaced on the slot's next request.
    pub fn release(&mut self, handle: PoolHandle<T>) {
        self.tracker.on_release(handle.as_ptr() as usize, handle.index());
        if !self.owns(handle) {
            return;
        }
        let live = self.in_use.get(handle.index() as usize) == 1;
        debug_assert!(live, "slot {} released twice", handle.index());
        if live {
            self.in_use.set(handle.index() as usize, 0);
            self.free.push_back(handle.index());
            memory::record_slots_released(1);
        }
    }

    /// Returns every slot to the free queue.
    ///
    /// Values are not dropped here; each slot is reconstructed when it is next
    /// requested.
    pub fn release_all(&mut self) {
        let released = self.len();
        self.free.clear();
        self.free.extend(0..self.slots.len() as u32);
        self.in_use.fill(0);
        self.tracker.clear();
        memory::record_slots_released(released);
    }

    /// Returns `true` if `handle` refers to a slot of this pool that is handed out.
    pub fn contains(&self, handle: PoolHandle<T>) -> bool {
        self.slot_address(handle.index()) == Some(handle.as_ptr())
            && self.in_use.get(handle.index() as usize) == 1
    }

    /// Returns the value of a handed-out slot.
    pub fn get(&self, handle: PoolHandle<T>) -> Option<&T> {
        if !self.owns(handle) || self.in_use.get(handle.index() as usize) == 0 {
            return None;
        }
        Some(&self.slots[handle.index() as usize])
    }

    /// Returns the value of a handed-out slot mutably.
    pub fn get_mut(&mut self, handle: PoolHandle<T>) -> Option<&mut T> {
        if !self.owns(handle) || self.in_use.get(handle.index() as usize) == 0 {
            return None;
        }
        Some(&mut self.slots[handle.index() as usize])
    }

    /// Iterates over every handed-out slot in index order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle<T>, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(move |(index, _)| self.in_use.get(*index) == 1)
            .map(|(index, value)| (PoolHandle::new(index as u32, NonNull::from(value)), value))
    }

    fn slot_address(&self, index: u32) -> Option<*mut T> {
        self.slots
            .get(index as usize)
            .map(|slot| slot as *const T as *mut T)
    }

    #[inline]
    fn owns(&self, handle: PoolHandle<T>) -> bool {
        let owned = self.slot_address(handle.index()) == Some(handle.as_ptr());
        debug_assert!(owned, "handle {} was not issued by this pool", handle.index());
        owned
    }
}

impl<T: Default> Drop for SimplePool<T> {
    fn drop(&mut self) {
        memory::record_slots_released(self.len());
        memory::record_storage_freed(self.slots.len() * mem::size_of::<T>());
    }
}

impl<T: Default> Index<PoolHandle<T>> for SimplePool<T> {
    type Output = T;

    fn index(&self, handle: PoolHandle<T>) -> &T {
        match self.get(handle) {
            Some(value) => value,
            None => panic!("pool slot {} is not handed out", handle.index()),
        }
    }
}

impl<T: Default> IndexMut<PoolHandle<T>> for SimplePool<T> {
    fn index_mut(&mut self, handle: PoolHandle<T>) -> &mut T {
        let index = handle.index();
        match self.get_mut(handle) {
            Some(value) => value,
            None => panic!("pool slot {index} is not handed out"),
        }
    }
}

impl<T: Default> fmt::Debug for SimplePool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimplePool")
            .field("type", &type_name::<T>())
            .field("stats", &self.stats())
            .finish()
    }
}
