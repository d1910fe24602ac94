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

//! Configuration for growable pools.
//!
//! A [`PoolConfig`] can be built in code or loaded from a RON document, which
//! lets managers tune their pools without recompiling:
//!
//! ```rust
//! use ebb_core::config::{GrowthPolicy, PoolConfig};
//!
//! let config = PoolConfig::from_ron_str("(initial_capacity: 16, growth: Chunked(chunk_size: 8))")
//!     .unwrap();
//! assert_eq!(config.initial_capacity, 16);
//! assert_eq!(config.growth, GrowthPolicy::Chunked { chunk_size: 8 });
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of slots reserved up front by a pool.
pub const DEFAULT_INITIAL_CAPACITY: u32 = 64;

/// Default size of each chunk appended by a [`GrowthPolicy::Chunked`] pool.
pub const DEFAULT_CHUNK_SIZE: u32 = 64;

/// Describes how a pool acquires more slots once every slot is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrowthPolicy {
    /// The pool never grows. Requests beyond capacity fail.
    Fixed,
    /// Each growth appends one chunk of `chunk_size` slots.
    Chunked {
        /// Number of slots in every new chunk.
        chunk_size: u32,
    },
    /// Each growth appends a chunk as large as the whole pool, doubling it.
    Doubling,
}

impl GrowthPolicy {
    /// Returns `true` if the policy allows the pool to grow.
    pub fn can_grow(&self) -> bool {
        !matches!(self, GrowthPolicy::Fixed)
    }

    /// Computes the size of the next chunk for a pool currently holding
    /// `current_capacity` slots. Returns `None` for [`GrowthPolicy::Fixed`].
    pub fn next_chunk_size(&self, current_capacity: u32) -> Option<u32> {
        match *self {
            GrowthPolicy::Fixed => None,
            GrowthPolicy::Chunked { chunk_size } => Some(chunk_size),
            GrowthPolicy::Doubling => Some(current_capacity.max(1)),
        }
    }
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        GrowthPolicy::Chunked {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Configuration of a pool: how many slots it starts with and how it grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of slots allocated when the pool is created.
    pub initial_capacity: u32,
    /// What happens once every slot is in use.
    pub growth: GrowthPolicy,
}

impl PoolConfig {
    /// A pool of exactly `capacity` slots that never grows.
    pub fn fixed(capacity: u32) -> Self {
        Self {
            initial_capacity: capacity,
            growth: GrowthPolicy::Fixed,
        }
    }

    /// A pool starting at `capacity` slots that grows in chunks of the same size.
    pub fn growable(capacity: u32) -> Self {
        Self {
            initial_capacity: capacity,
            growth: GrowthPolicy::Chunked {
                chunk_size: capacity.max(1),
            },
        }
    }

    /// Returns a copy of this config with a different growth policy.
    pub fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    /// Parses and validates a config written in RON.
    pub fn from_ron_str(source: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the config describes a pool that can hold at least one slot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let GrowthPolicy::Chunked { chunk_size: 0 } = self.growth {
            return Err(ConfigError::Invalid(
                "chunked growth requires a non-zero chunk_size".to_owned(),
            ));
        }
        if self.initial_capacity == 0 && !self.growth.can_grow() {
            return Err(ConfigError::Invalid(
                "a fixed pool requires a non-zero initial_capacity".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            growth: GrowthPolicy::default(),
        }
    }
}
