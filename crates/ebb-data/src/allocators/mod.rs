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

//! Allocators that draw single objects from type-keyed pools.
//!
//! - [`SingleElementPoolAllocator`] shares one process-wide pool per concrete
//!   type, for node-based containers that allocate one element at a time.
//! - [`PooledBox`] is an owning pointer whose storage comes from that pool.
//! - [`PoolRegistry`] is the explicit, non-global counterpart: a type map of
//!   pools owned by whoever creates it.

mod registry;
mod single_element;

pub use registry::PoolRegistry;
pub use single_element::{registered_pool_count, PooledBox, SingleElementPoolAllocator};
