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

// EBB Sandbox
// Drives the containers the way the resource managers use them.

use std::fs;

use anyhow::{Context, Result};
use ebb_core::config::PoolConfig;
use ebb_core::memory;
use ebb_data::allocators::PooledBox;
use ebb_data::bit_vector::BitVector;
use ebb_data::pool::{PoolHandle, ResourcePool};
use ebb_data::unordered_vec::UnorderedVec;

#[derive(Debug)]
struct Primitive {
    name: &'static str,
    vertex_count: u32,
}

#[derive(Debug)]
struct Texture {
    width: u32,
    height: u32,
}

/// A node of a small scene tree whose storage comes from a type-keyed pool.
#[derive(Debug)]
struct SceneNode {
    name: String,
    children: Vec<PooledBox<SceneNode>>,
}

fn load_config() -> Result<PoolConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            let source = fs::read_to_string(&path)
                .with_context(|| format!("failed to read pool config from {path}"))?;
            let config = PoolConfig::from_ron_str(&source)
                .with_context(|| format!("invalid pool config in {path}"))?;
            log::info!("Loaded pool config from {path}: {config:?}");
            Ok(config)
        }
        None => Ok(PoolConfig::growable(4)),
    }
}

fn run_primitive_registry() {
    let mut primitives = UnorderedVec::new();
    let quad = primitives.add(Primitive {
        name: "quad",
        vertex_count: 4,
    });
    let cube = primitives.add(Primitive {
        name: "cube",
        vertex_count: 24,
    });
    primitives.remove(quad);
    let sphere = primitives.add(Primitive {
        name: "sphere",
        vertex_count: 482,
    });
    log::info!("Primitive 'sphere' reused id {sphere} (cube keeps id {cube})");

    for (id, primitive) in primitives.iter_indexed() {
        log::info!(
            "  primitive #{id}: {} ({} vertices)",
            primitive.name,
            primitive.vertex_count
        );
    }

    primitives.remove(sphere);
    let remap = primitives.shrink_to_fit(true);
    log::info!("Compacted primitive registry: {remap:?}");
}

fn run_texture_pool(config: PoolConfig) -> Result<()> {
    let mut textures = ResourcePool::with_config(config)?;
    let handles: Vec<PoolHandle<Texture>> = (0..10u32)
        .map(|level| {
            textures.request(Texture {
                width: 1024 >> level,
                height: 1024 >> level,
            })
        })
        .collect::<Result<_, _>>()?;

    let stats = textures.stats();
    log::info!(
        "Texture pool: {} in use, {} slots over {} chunk(s)",
        stats.in_use,
        stats.capacity,
        stats.chunks
    );

    for handle in handles.iter().step_by(2) {
        if let Some(texture) = textures.take(*handle) {
            log::debug!("Released {}x{} texture", texture.width, texture.height);
        }
    }
    log::info!("Texture pool after eviction: {} in use", textures.len());
    Ok(())
}

fn run_binding_mask() -> Result<()> {
    // Eight descriptor slots, each in one of five binding states.
    let mut mask = BitVector::from_value_count(5)?;
    for state in [0, 4, 2, 1, 3, 0, 4, 2] {
        mask.push(state)?;
    }
    mask.set(1, 3);
    log::info!(
        "Binding mask: {} bits per slot, {} bytes, states {:?}",
        mask.bits_per_element(),
        mask.stored_byte_count(),
        mask.iter().collect::<Vec<_>>()
    );
    Ok(())
}

fn run_scene_tree() -> Result<()> {
    let mut root = PooledBox::new(SceneNode {
        name: "root".to_string(),
        children: Vec::new(),
    })?;
    for index in 0..3 {
        root.children.push(PooledBox::new(SceneNode {
            name: format!("child-{index}"),
            children: Vec::new(),
        })?);
    }
    log::info!(
        "Scene tree '{}' with children {:?}",
        root.name,
        root.children.iter().map(|child| child.name.as_str()).collect::<Vec<_>>()
    );
    Ok(())
}

fn log_telemetry() {
    let stats = memory::get_pool_memory_stats();
    log::info!("--- Pool telemetry ---");
    log::info!("  pools created:    {}", stats.total_pools_created);
    log::info!("  live slots:       {} (peak {})", stats.live_slots, stats.peak_live_slots);
    log::info!(
        "  requests:         {} ({} released)",
        stats.total_requests,
        stats.total_releases
    );
    log::info!("  chunks allocated: {}", stats.total_chunks_allocated);
    log::info!("  reserved bytes:   {}", stats.reserved_bytes);
    log::info!("  exhaustions:      {}", stats.total_exhaustions);
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    run_primitive_registry();
    run_texture_pool(config)?;
    run_binding_mask()?;
    run_scene_tree()?;
    log_telemetry();
    Ok(())
}
