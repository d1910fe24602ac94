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

//! A type map of pools for explicit dependency injection.
//!
//! The [`PoolRegistry`] is the non-global way to share pools between the
//! managers of a subsystem: whoever owns the registry decides its lifetime
//! and passes it to the code that needs pools, and adding a new resource type
//! never requires a new field anywhere.

use crate::pool::ResourcePool;
use ahash::AHashMap;
use ebb_core::config::PoolConfig;
use ebb_core::error::PoolError;
use std::any::{type_name, Any, TypeId};

/// A registry of [`ResourcePool`]s keyed by element type.
///
/// # Example
///
/// ```rust
/// use ebb_data::allocators::PoolRegistry;
///
/// struct Mesh { vertex_count: u32 }
///
/// let mut registry = PoolRegistry::new();
/// let handle = registry
///     .pool_mut_or_create::<Mesh>()
///     .request(Mesh { vertex_count: 36 })
///     .unwrap();
///
/// let meshes = registry.pool::<Mesh>().unwrap();
/// assert_eq!(meshes[handle].vertex_count, 36);
/// ```
#[derive(Default)]
pub struct PoolRegistry {
    pools: AHashMap<TypeId, Box<dyn Any + Send>>,
    default_config: PoolConfig,
}

impl PoolRegistry {
    /// Creates an empty registry whose pools use the default [`PoolConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry whose pools are created with `config`.
    ///
    /// Fails with [`PoolError::ZeroCapacity`] if `config` describes a fixed pool
    /// without slots.
    pub fn with_default_config(config: PoolConfig) -> Result<Self, PoolError> {
        if config.initial_capacity == 0 && !config.growth.can_grow() {
            return Err(PoolError::ZeroCapacity);
        }
        Ok(Self {
            pools: AHashMap::new(),
            default_config: config,
        })
    }

    /// Returns the configuration used for lazily created pools.
    pub fn default_config(&self) -> &PoolConfig {
        &self.default_config
    }

    /// Registers `pool` as the pool of `T`, returning the pool it replaces.
    pub fn insert<T: Send + 'static>(&mut self, pool: ResourcePool<T>) -> Option<ResourcePool<T>> {
        self.pools
            .insert(TypeId::of::<T>(), Box::new(pool))
            .and_then(|previous| previous.downcast::<ResourcePool<T>>().ok())
            .map(|previous| *previous)
    }

    /// Returns the pool of `T`, if one has been registered.
    #[must_use]
    pub fn pool<T: Send + 'static>(&self) -> Option<&ResourcePool<T>> {
        self.pools
            .get(&TypeId::of::<T>())
            .and_then(|pool| pool.downcast_ref::<ResourcePool<T>>())
    }

    /// Returns the pool of `T` mutably, if one has been registered.
    pub fn pool_mut<T: Send + 'static>(&mut self) -> Option<&mut ResourcePool<T>> {
        self.pools
            .get_mut(&TypeId::of::<T>())
            .and_then(|pool| pool.downcast_mut::<ResourcePool<T>>())
    }

    /// Returns the pool of `T`, creating it with the registry's default config
    /// on first use.
    pub fn pool_mut_or_create<T: Send + 'static>(&mut self) -> &mut ResourcePool<T> {
        let config = self.default_config;
        let pool = self.pools.entry(TypeId::of::<T>()).or_insert_with(|| {
            log::debug!("PoolRegistry: creating pool for {}", type_name::<T>());
            Box::new(ResourcePool::<T>::build(config))
        });
        match pool.downcast_mut::<ResourcePool<T>>() {
            Some(pool) => pool,
            None => unreachable!("pool registered under the wrong type"),
        }
    }

    /// Removes and returns the pool of `T`.
    pub fn remove<T: Send + 'static>(&mut self) -> Option<ResourcePool<T>> {
        self.pools
            .remove(&TypeId::of::<T>())
            .and_then(|pool| pool.downcast::<ResourcePool<T>>().ok())
            .map(|pool| *pool)
    }

    /// Returns `true` if a pool of `T` is registered.
    #[must_use]
    pub fn contains<T: 'static>(&self) -> bool {
        self.pools.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered pools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pools.len()
    }

    /// Returns `true` if no pools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebb_core::config::GrowthPolicy;

    struct FakeTexture {
        width: u32,
    }

    struct FakeShader {
        name: String,
    }

    #[test]
    fn test_pools_are_created_once_per_type() {
        let mut registry = PoolRegistry::new();
        let a = registry
            .pool_mut_or_create::<FakeTexture>()
            .request(FakeTexture { width: 256 })
            .unwrap();
        let b = registry
            .pool_mut_or_create::<FakeTexture>()
            .request(FakeTexture { width: 512 })
            .unwrap();

        assert_eq!(registry.len(), 1);
        let textures = registry.pool::<FakeTexture>().unwrap();
        assert_eq!(textures.len(), 2);
        assert_eq!(textures[a].width, 256);
        assert_eq!(textures[b].width, 512);
    }

    #[test]
    fn test_multiple_pool_types() {
        let mut registry = PoolRegistry::new();
        registry.pool_mut_or_create::<FakeTexture>();
        registry
            .pool_mut_or_create::<FakeShader>()
            .request(FakeShader {
                name: "forward".to_string(),
            })
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains::<FakeTexture>());
        assert!(registry.contains::<FakeShader>());
        let (_, shader) = registry.pool::<FakeShader>().unwrap().iter().next().unwrap();
        assert_eq!(shader.name, "forward");
    }

    #[test]
    fn test_missing_pool_returns_none() {
        let mut registry = PoolRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.pool::<FakeTexture>().is_none());
        assert!(registry.pool_mut::<FakeTexture>().is_none());
        assert!(registry.remove::<FakeTexture>().is_none());
    }

    #[test]
    fn test_insert_replaces_and_remove_returns() {
        let mut registry = PoolRegistry::new();
        assert!(registry
            .insert(ResourcePool::<FakeTexture>::with_capacity(4))
            .is_none());
        let previous = registry
            .insert(ResourcePool::<FakeTexture>::with_capacity(8))
            .unwrap();
        assert_eq!(previous.capacity(), 4);

        let removed = registry.remove::<FakeTexture>().unwrap();
        assert_eq!(removed.capacity(), 8);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_default_config_is_applied() {
        let config = PoolConfig::fixed(2).with_growth(GrowthPolicy::Fixed);
        let mut registry = PoolRegistry::with_default_config(config).unwrap();
        let pool = registry.pool_mut_or_create::<u32>();
        pool.request(1).unwrap();
        pool.request(2).unwrap();
        assert!(pool.request(3).is_err());

        assert_eq!(
            PoolRegistry::with_default_config(PoolConfig::fixed(0)).err(),
            Some(PoolError::ZeroCapacity)
        );
    }
}
