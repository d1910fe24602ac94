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

//! A process-wide, type-keyed pool allocator for single elements.
//!
//! Every [`SingleElementPoolAllocator<T>`] draws from the same pool of raw `T`
//! slots. The pools live in a global registry keyed by [`TypeId`] which is
//! created on first use and never torn down: once a pool exists for a type,
//! it stays alive until the process exits. Each thread keeps its own copy of
//! the registry entries it has resolved, so the registry lock is taken at most
//! once per type per thread. Allocation and deallocation only lock the pool of
//! the type involved.

use crate::pool::{PoolStats, ResourcePool};
use ahash::AHashMap;
use ebb_core::config::{GrowthPolicy, PoolConfig};
use ebb_core::error::AllocError;
use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

/// Number of slots added each time a shared pool runs out.
const NODE_CHUNK_SIZE: u32 = 256;

/// A pool that only ever holds reserved, unconstructed slots.
struct RawPool<T>(ResourcePool<T>);

// No `T` value is ever stored in a `RawPool`, only uninitialized memory.
unsafe impl<T> Send for RawPool<T> {}

type SharedPool = &'static (dyn Any + Send + Sync);

/// Global registry of shared pools, keyed by element type.
static SHARED_POOLS: OnceLock<Mutex<AHashMap<TypeId, SharedPool>>> = OnceLock::new();

fn shared_pools() -> MutexGuard<'static, AHashMap<TypeId, SharedPool>> {
    SHARED_POOLS
        .get_or_init(|| Mutex::new(AHashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

thread_local! {
    /// Registry entries already resolved by this thread.
    static LOCAL_POOLS: RefCell<AHashMap<TypeId, SharedPool>> = RefCell::new(AHashMap::new());
}

fn shared_pool<T: 'static>() -> &'static Mutex<RawPool<T>> {
    let id = TypeId::of::<T>();
    let cached = LOCAL_POOLS
        .try_with(|local| local.borrow().get(&id).copied())
        .ok()
        .flatten();
    let pool = match cached {
        Some(pool) => pool,
        None => {
            let pool = register_shared_pool::<T>();
            // Thread-local storage is gone during thread teardown; skip caching then.
            let _ = LOCAL_POOLS.try_with(|local| local.borrow_mut().insert(id, pool));
            pool
        }
    };
    match pool.downcast_ref::<Mutex<RawPool<T>>>() {
        Some(pool) => pool,
        None => unreachable!("shared pool registered under the wrong type"),
    }
}

fn register_shared_pool<T: 'static>() -> SharedPool {
    let mut pools = shared_pools();
    *pools.entry(TypeId::of::<T>()).or_insert_with(|| {
        log::debug!(
            "Creating shared single-element pool for {}",
            type_name::<T>()
        );
        let config = PoolConfig {
            initial_capacity: 0,
            growth: GrowthPolicy::Chunked {
                chunk_size: NODE_CHUNK_SIZE,
            },
        };
        let raw = RawPool(ResourcePool::<T>::build(config));
        let pool: SharedPool = Box::leak(Box::new(Mutex::new(raw)));
        pool
    })
}

/// Returns the number of element types that own a shared pool.
pub fn registered_pool_count() -> usize {
    shared_pools().len()
}

/// An allocator that hands out storage for exactly one `T` at a time.
///
/// All allocators of the same `T` share one pool, so storage released through
/// one allocator is reused by every other. Requests for more than one element
/// fail with [`AllocError::MultiElementRequest`]: this allocator is meant for
/// node-based containers (trees, lists, maps) that allocate node by node.
///
/// # Example
///
/// ```rust
/// use ebb_data::allocators::SingleElementPoolAllocator;
///
/// struct Node {
///     key: u32,
/// }
///
/// let allocator = SingleElementPoolAllocator::<Node>::new();
/// let node = allocator.allocate(1).unwrap();
/// unsafe {
///     node.as_ptr().write(Node { key: 7 });
///     assert_eq!((*node.as_ptr()).key, 7);
///     node.as_ptr().drop_in_place();
///     allocator.deallocate(node, 1);
/// }
/// assert!(allocator.allocate(2).is_err());
/// ```
pub struct SingleElementPoolAllocator<T: 'static> {
    pool: &'static Mutex<RawPool<T>>,
}

impl<T: 'static> SingleElementPoolAllocator<T> {
    /// Returns an allocator backed by the shared pool of `T`, creating the pool
    /// on first use.
    pub fn new() -> Self {
        Self {
            pool: shared_pool::<T>(),
        }
    }

    fn lock(&self) -> MutexGuard<'static, RawPool<T>> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates uninitialized storage for one `T`.
    ///
    /// `count` must be 1. The returned memory is not initialized and must be
    /// given back through [`deallocate`](Self::deallocate).
    pub fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        if count != 1 {
            return Err(AllocError::MultiElementRequest { requested: count });
        }
        if mem::size_of::<T>() == 0 {
            return Ok(NonNull::dangling());
        }
        let slot = self.lock().0.request_unconstructed()?;
        // SAFETY: slot addresses are never null.
        Ok(unsafe { NonNull::new_unchecked(slot.as_ptr()) })
    }

    /// Returns storage obtained from [`allocate`](Self::allocate) to the pool.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on an allocator of the same `T`, must not
    /// have been deallocated already, and any value written to it must already
    /// have been dropped or moved out.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        debug_assert_eq!(count, 1, "single-element allocator freed {count} elements");
        if mem::size_of::<T>() == 0 {
            return;
        }
        let mut pool = self.lock();
        let slot = pool.0.uninit_from_ptr(ptr.as_ptr());
        debug_assert!(
            slot.is_some(),
            "{ptr:?} was not allocated by the {} pool",
            type_name::<T>()
        );
        if let Some(slot) = slot {
            pool.0.release_unconstructed(slot);
        }
    }

    /// Returns a snapshot of the shared pool's occupancy.
    pub fn stats(&self) -> PoolStats {
        self.lock().0.stats()
    }
}

impl<T: 'static> Default for SingleElementPoolAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Clone for SingleElementPoolAllocator<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for SingleElementPoolAllocator<T> {}

// Every allocator of a type shares the same pool, so any one can free what
// another allocated.
impl<T: 'static> PartialEq for SingleElementPoolAllocator<T> {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T: 'static> Eq for SingleElementPoolAllocator<T> {}

impl<T: 'static> fmt::Debug for SingleElementPoolAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleElementPoolAllocator")
            .field("type", &type_name::<T>())
            .finish()
    }
}

/// An owning pointer to a `T` stored in the shared single-element pool.
///
/// Behaves like a `Box<T>` whose allocation is recycled through the pool of
/// `T` instead of the global allocator.
pub struct PooledBox<T: 'static> {
    ptr: NonNull<T>,
    allocator: SingleElementPoolAllocator<T>,
    _marker: PhantomData<T>,
}

unsafe impl<T: Send + 'static> Send for PooledBox<T> {}
unsafe impl<T: Sync + 'static> Sync for PooledBox<T> {}

impl<T: 'static> PooledBox<T> {
    /// Moves `value` into a slot of the shared pool.
    pub fn new(value: T) -> Result<Self, AllocError> {
        Self::new_in(value, SingleElementPoolAllocator::new())
    }

    /// Moves `value` into a slot obtained from `allocator`.
    pub fn new_in(value: T, allocator: SingleElementPoolAllocator<T>) -> Result<Self, AllocError> {
        let ptr = allocator.allocate(1)?;
        // SAFETY: `ptr` is fresh storage for exactly one `T`.
        unsafe { ptr.as_ptr().write(value) };
        Ok(Self {
            ptr,
            allocator,
            _marker: PhantomData,
        })
    }

    /// Moves the value out and returns its slot to the pool.
    pub fn into_inner(boxed: Self) -> T {
        let ptr = boxed.ptr;
        let allocator = boxed.allocator;
        mem::forget(boxed);
        // SAFETY: the value is read exactly once, then its storage is released.
        unsafe {
            let value = ptr.as_ptr().read();
            allocator.deallocate(ptr, 1);
            value
        }
    }

    /// Returns the address of the pooled value.
    pub fn as_ptr(boxed: &Self) -> *const T {
        boxed.ptr.as_ptr()
    }
}

impl<T: 'static> Deref for PooledBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the slot holds an initialized value for the box's lifetime.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: 'static> DerefMut for PooledBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the box uniquely owns its slot.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: 'static> Drop for PooledBox<T> {
    fn drop(&mut self) {
        // SAFETY: the value is dropped once, then its storage is released.
        unsafe {
            self.ptr.as_ptr().drop_in_place();
            self.allocator.deallocate(self.ptr, 1);
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for PooledBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
