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

//! # EBB Data
//!
//! Index-stable containers backing the engine's resource managers:
//!
//! - [`bit_vector`]: packed arrays of 1 to 32 bit elements.
//! - [`pool`]: slot pools with stable addresses and O(1) request and release.
//! - [`allocators`]: type-keyed single-element pools and a pool registry.
//! - [`unordered_vec`]: dense arrays whose removed slots are recycled.

#![warn(missing_docs)]

pub mod allocators;
pub mod bit_vector;
pub mod pool;
pub mod unordered_vec;

pub use allocators::{PoolRegistry, PooledBox, SingleElementPoolAllocator};
pub use bit_vector::BitVector;
pub use pool::{PoolHandle, PoolStats, ResourcePool, SimplePool, SimpleStackPool, UninitHandle};
pub use unordered_vec::{IndexRemap, Sentinel, SentinelVec, UnorderedVec};
