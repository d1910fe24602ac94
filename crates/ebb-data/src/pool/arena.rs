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

//! Chunked raw slot storage shared by the stack and resource pools.

use crate::bit_vector::BitVector;
use ebb_core::memory;
use std::collections::BTreeMap;
use std::mem::{self, MaybeUninit};
use std::ptr::NonNull;

/// Lifecycle state of a single slot, stored two bits per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub(crate) enum SlotState {
    /// On the free list; memory is uninitialized.
    Free = 0,
    /// Handed out but not constructed, or destroyed and not yet freed.
    Reserved = 1,
    /// Holds an initialized value.
    Live = 2,
}

impl SlotState {
    const BITS: u32 = 2;

    #[inline]
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => SlotState::Free,
            1 => SlotState::Reserved,
            _ => SlotState::Live,
        }
    }
}

/// Raw, chunked storage for `T` values.
///
/// Chunks are allocated once and never moved or resized, so the address of a
/// slot is stable for the lifetime of the arena. The arena tracks which slots
/// hold initialized values and drops them when it is dropped.
pub(crate) struct SlotArena<T> {
    /// Every chunk ever allocated, in allocation order.
    chunks: Vec<NonNull<[MaybeUninit<T>]>>,
    /// Address of every slot, indexed by slot index.
    slots: Vec<NonNull<T>>,
    /// Start address of every non-empty chunk, mapped to the index of its
    /// first slot and its length.
    chunk_starts: BTreeMap<usize, (u32, usize)>,
    /// Packed `SlotState` of every slot.
    states: BitVector<'static>,
    /// Number of slots that are not `Free`.
    in_use: u32,
}

// The arena owns its values exactly like a `Vec<T>` would.
unsafe impl<T: Send> Send for SlotArena<T> {}
unsafe impl<T: Sync> Sync for SlotArena<T> {}

impl<T> SlotArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            chunks: Vec::new(),
            slots: Vec::new(),
            chunk_starts: BTreeMap::new(),
            // Two bits is a valid width, this cannot fail.
            states: BitVector::from_bits_per_element(SlotState::BITS)
                .unwrap_or_else(|_| unreachable!()),
            in_use: 0,
        }
    }

    /// Number of slots backed by storage.
    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Number of slots that are reserved or live.
    #[inline]
    pub(crate) fn in_use(&self) -> u32 {
        self.in_use
    }

    #[inline]
    pub(crate) fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Allocates a chunk of `size` slots and returns the index of its first slot.
    pub(crate) fn add_chunk(&mut self, size: u32) -> u32 {
        let first = self.capacity();
        let chunk: Box<[MaybeUninit<T>]> = (0..size).map(|_| MaybeUninit::uninit()).collect();
        let chunk = NonNull::from(Box::leak(chunk));

        let base = chunk.as_ptr() as *mut MaybeUninit<T>;
        self.slots.reserve(size as usize);
        for offset in 0..size as usize {
            // SAFETY: `offset` is within the chunk that was just allocated.
            let slot = unsafe { NonNull::new_unchecked(base.add(offset) as *mut T) };
            self.slots.push(slot);
        }
        for _ in 0..size {
            // Owned storage always grows, this cannot fail.
            let _ = self.states.push(SlotState::Free as u32);
        }
        if size > 0 && mem::size_of::<T>() > 0 {
            self.chunk_starts.insert(base as usize, (first, size as usize));
        }
        self.chunks.push(chunk);

        memory::record_chunk_allocated(size as usize * mem::size_of::<T>());
        log::trace!(
            "SlotArena<{}>: allocated chunk #{} of {size} slots (capacity now {})",
            std::any::type_name::<T>(),
            self.chunks.len(),
            self.capacity()
        );
        first
    }

    #[inline]
    pub(crate) fn state(&self, index: u32) -> SlotState {
        SlotState::from_bits(self.states.get(index as usize))
    }

    #[inline]
    fn set_state(&mut self, index: u32, state: SlotState) {
        self.states.set(index as usize, state as u32);
    }

    /// Returns the stable address of slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not backed by storage.
    #[inline]
    pub(crate) fn slot_ptr(&self, index: u32) -> NonNull<T> {
        self.slots[index as usize]
    }

    /// Returns `true` if `index` exists and `ptr` is that slot's address.
    #[inline]
    pub(crate) fn owns(&self, index: u32, ptr: NonNull<T>) -> bool {
        self.slots.get(index as usize) == Some(&ptr)
    }

    /// Maps a slot address back to its index in `O(log chunks)`.
    pub(crate) fn index_of_ptr(&self, ptr: *const T) -> Option<u32> {
        let size = mem::size_of::<T>();
        if size == 0 {
            return None;
        }
        let addr = ptr as usize;
        let (&start, &(first, len)) = self.chunk_starts.range(..=addr).next_back()?;
        let offset = addr - start;
        if offset % size != 0 || offset / size >= len {
            return None;
        }
        Some(first + (offset / size) as u32)
    }

    /// Marks a free slot as reserved.
    #[inline]
    pub(crate) fn reserve(&mut self, index: u32) {
        debug_assert_eq!(self.state(index), SlotState::Free, "slot {index} is not free");
        self.set_state(index, SlotState::Reserved);
        self.in_use += 1;
    }

    /// Moves `value` into a reserved slot.
    #[inline]
    pub(crate) fn construct(&mut self, index: u32, value: T) -> NonNull<T> {
        assert_eq!(
            self.state(index),
            SlotState::Reserved,
            "slot {index} is not reserved"
        );
        let ptr = self.slot_ptr(index);
        // SAFETY: the slot is reserved, so it holds no value that could leak or alias.
        unsafe { ptr.as_ptr().write(value) };
        self.set_state(index, SlotState::Live);
        ptr
    }

    /// Moves the value out of a live slot, leaving it reserved.
    #[inline]
    pub(crate) fn take(&mut self, index: u32) -> Option<T> {
        if self.state(index) != SlotState::Live {
            return None;
        }
        self.set_state(index, SlotState::Reserved);
        // SAFETY: the slot was live, and is now reserved so the value is read once.
        Some(unsafe { self.slot_ptr(index).as_ptr().read() })
    }

    /// Drops the value of a live slot in place, leaving it reserved.
    #[inline]
    pub(crate) fn destroy(&mut self, index: u32) -> bool {
        if self.state(index) != SlotState::Live {
            return false;
        }
        self.set_state(index, SlotState::Reserved);
        // SAFETY: the slot was live and its state no longer claims a value.
        unsafe { self.slot_ptr(index).as_ptr().drop_in_place() };
        true
    }

    /// Marks a live slot as reserved without dropping its value.
    #[inline]
    pub(crate) fn forget(&mut self, index: u32) -> bool {
        if self.state(index) != SlotState::Live {
            return false;
        }
        self.set_state(index, SlotState::Reserved);
        true
    }

    /// Returns a reserved slot to the free state.
    #[inline]
    pub(crate) fn free(&mut self, index: u32) {
        debug_assert_eq!(
            self.state(index),
            SlotState::Reserved,
            "slot {index} is not reserved"
        );
        self.set_state(index, SlotState::Free);
        self.in_use -= 1;
    }

    /// Marks every slot free without running any destructor.
    pub(crate) fn forget_all(&mut self) {
        for index in 0..self.capacity() {
            self.set_state(index, SlotState::Free);
        }
        self.in_use = 0;
    }

    #[inline]
    pub(crate) fn get(&self, index: u32) -> Option<&T> {
        if (index as usize) < self.slots.len() && self.state(index) == SlotState::Live {
            // SAFETY: live slots hold an initialized value.
            Some(unsafe { self.slot_ptr(index).as_ref() })
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        if (index as usize) < self.slots.len() && self.state(index) == SlotState::Live {
            // SAFETY: live slots hold an initialized value and `self` is borrowed mutably.
            Some(unsafe { self.slot_ptr(index).as_mut() })
        } else {
            None
        }
    }

    /// # Safety
    ///
    /// Slot `index` must be live.
    #[inline]
    pub(crate) unsafe fn get_unchecked(&self, index: u32) -> &T {
        debug_assert_eq!(self.state(index), SlotState::Live);
        self.slots.get_unchecked(index as usize).as_ref()
    }

    /// # Safety
    ///
    /// Slot `index` must be live.
    #[inline]
    pub(crate) unsafe fn get_unchecked_mut(&mut self, index: u32) -> &mut T {
        debug_assert_eq!(self.state(index), SlotState::Live);
        &mut *self.slots.get_unchecked(index as usize).as_ptr()
    }

    /// Iterates over every live slot in index order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        (0..self.capacity()).filter_map(move |index| self.get(index).map(|value| (index, value)))
    }
}

impl<T> Drop for SlotArena<T> {
    fn drop(&mut self) {
        if mem::needs_drop::<T>() {
            for index in 0..self.capacity() {
                self.destroy(index);
            }
        }

        let mut bytes = 0;
        for chunk in self.chunks.drain(..) {
            bytes += chunk.len() * mem::size_of::<T>();
            // SAFETY: every chunk came from `Box::leak` in `add_chunk` and is freed once.
            drop(unsafe { Box::from_raw(chunk.as_ptr()) });
        }
        memory::record_storage_freed(bytes);
    }
}
