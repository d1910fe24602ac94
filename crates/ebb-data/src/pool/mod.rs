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

//! Fixed-capacity and growable slot pools with O(1) request and release.
//!
//! Every pool hands out [`PoolHandle`]s: opaque, copyable IDs that carry the
//! slot index and the slot's address. The address of a slot never changes for
//! the lifetime of the pool, even when a growable pool acquires more storage,
//! so managers can keep handles in their own tables indefinitely.
//!
//! Three flavours are provided:
//!
//! - [`SimplePool`]: fixed capacity, slots default-constructed up front and
//!   reconstructed on every request, FIFO reuse.
//! - [`SimpleStackPool`]: fixed capacity, raw storage, LIFO reuse. Values are
//!   constructed in place on request and the caller may opt out of
//!   construction and destruction entirely.
//! - [`ResourcePool`]: like [`SimpleStackPool`] but grows by appending new
//!   chunks according to a [`GrowthPolicy`](ebb_core::config::GrowthPolicy).
//!
//! # Preconditions
//!
//! Releasing a slot twice, or releasing a handle issued by another pool, is a
//! programmer error. Both are caught by debug assertions. In release builds
//! a repeated release is ignored and a foreign handle is either ignored or
//! panics on an out-of-range index; memory safety is never at stake. Enable the
//! `consistency-check` feature to also track every live slot address in a set.

mod arena;
mod consistency;
mod resource;
mod simple;
mod stack;

pub use resource::ResourcePool;
pub use simple::SimplePool;
pub use stack::SimpleStackPool;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr::NonNull;

/// A handle to a live slot of a pool.
///
/// Handles are plain IDs: copying or dropping one has no effect on the pool,
/// and reading the slot goes through the pool that issued it.
pub struct PoolHandle<T> {
    index: u32,
    ptr: NonNull<T>,
}

// The handle never dereferences its pointer; it is only an address tag.
unsafe impl<T> Send for PoolHandle<T> {}
unsafe impl<T> Sync for PoolHandle<T> {}

impl<T> PoolHandle<T> {
    pub(crate) fn new(index: u32, ptr: NonNull<T>) -> Self {
        Self { index, ptr }
    }

    /// Returns the index of the slot inside its pool.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the stable address of the slot.
    ///
    /// The pointer stays valid for as long as the pool is alive, but it only
    /// points to an initialized `T` while the slot is live. Reading or writing
    /// through it while the pool is borrowed is undefined behaviour.
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> Clone for PoolHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolHandle<T> {}

impl<T> PartialEq for PoolHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.ptr == other.ptr
    }
}

impl<T> Eq for PoolHandle<T> {}

impl<T> Hash for PoolHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.ptr.hash(state);
    }
}

impl<T> fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("index", &self.index)
            .field("ptr", &self.ptr)
            .finish()
    }
}

/// A reserved slot whose value has not been constructed yet.
///
/// Obtained from `request_unconstructed` and consumed either by `construct`,
/// which turns it into a [`PoolHandle`], or by `release_unconstructed`.
/// Dropping it without doing either keeps the slot reserved until the pool's
/// next `release_all`.
#[must_use = "an unconstructed slot stays reserved until it is constructed or released"]
pub struct UninitHandle<T> {
    index: u32,
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

unsafe impl<T> Send for UninitHandle<T> {}
unsafe impl<T> Sync for UninitHandle<T> {}

impl<T> UninitHandle<T> {
    pub(crate) fn new(index: u32, ptr: NonNull<T>) -> Self {
        Self {
            index,
            ptr,
            _marker: PhantomData,
        }
    }

    /// Returns the index of the reserved slot.
    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the address the value will be constructed at.
    #[inline]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }
}

impl<T> fmt::Debug for UninitHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UninitHandle")
            .field("index", &self.index)
            .field("ptr", &self.ptr)
            .finish()
    }
}

/// A snapshot of a single pool's occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of slots backed by storage.
    pub capacity: usize,
    /// Slots currently handed out (live or reserved).
    pub in_use: usize,
    /// Number of backing chunks.
    pub chunks: usize,
}

impl PoolStats {
    /// Number of slots that can be requested without growing.
    pub fn available(&self) -> usize {
        self.capacity - self.in_use
    }
}
