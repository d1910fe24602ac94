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

//! Defines the hierarchy of error types for the resource-management containers.
//!
//! Only recoverable conditions are represented here. Precondition violations
//! (double release, removing a tombstoned index, oversized bit values) are
//! programmer errors and are caught by debug assertions instead.

use thiserror::Error;

/// An error raised while creating or growing a packed `BitVector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitVectorError {
    /// The requested element width is outside of `1..=32`.
    #[error("invalid bit width {requested}: elements must be between 1 and 32 bits wide")]
    InvalidBitWidth {
        /// The width that was requested.
        requested: u32,
    },
    /// The number of distinct values cannot be represented with 32 bits.
    #[error("{count} distinct values cannot be packed into 32 bits")]
    TooManyValues {
        /// The value count that was requested.
        count: u64,
    },
    /// An externally supplied buffer cannot hold the requested elements.
    #[error("external buffer too small: {required_bytes} bytes required, {available_bytes} available")]
    ExternalBufferTooSmall {
        /// Bytes needed for the operation.
        required_bytes: usize,
        /// Bytes provided by the caller's buffer.
        available_bytes: usize,
    },
}

/// An error related to requesting slots from a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Every slot is in use and the pool is not allowed to grow.
    #[error("pool exhausted: all {capacity} slots are in use")]
    Exhausted {
        /// The capacity of the pool at the time of the request.
        capacity: usize,
    },
    /// A fixed-capacity pool was created without any slots.
    #[error("a fixed-capacity pool requires at least one slot")]
    ZeroCapacity,
}

/// An error raised by the single-element pool allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The allocator only hands out one element at a time.
    #[error("single-element allocator cannot allocate {requested} elements at once")]
    MultiElementRequest {
        /// The element count that was requested.
        requested: usize,
    },
    /// The underlying pool refused the request.
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// An error raised while loading a [`PoolConfig`](crate::config::PoolConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The RON source could not be parsed.
    #[error("failed to parse pool config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    /// The configuration parsed but describes an unusable pool.
    #[error("invalid pool config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_descriptive() {
        let err = BitVectorError::InvalidBitWidth { requested: 33 };
        assert_eq!(
            err.to_string(),
            "invalid bit width 33: elements must be between 1 and 32 bits wide"
        );

        let err = PoolError::Exhausted { capacity: 4 };
        assert_eq!(err.to_string(), "pool exhausted: all 4 slots are in use");
    }

    #[test]
    fn test_pool_error_converts_into_alloc_error() {
        let err: AllocError = PoolError::ZeroCapacity.into();
        assert_eq!(err, AllocError::Pool(PoolError::ZeroCapacity));
        // Transparent errors forward the inner message.
        assert_eq!(err.to_string(), PoolError::ZeroCapacity.to_string());
    }
}
