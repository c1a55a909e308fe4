//! Radial Layout Engine
//!
//! Places entities on a ring and stacks each entity's sample records into
//! floors of blocks inside its building.
//! - Entity i of n sits at angle 2π·i/n on a circle of fixed radius
//! - Building height is the record count scaled and clamped to [min, max]
//! - Sample records fill a cols × rows grid per floor, then grow upward;
//!   the roof rises with them when the floors outgrow the clamped height
//!
//! Everything here is a pure function of its input: running the layout twice
//! on the same entity list gives bit-identical placements.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::model::Entity;

/// Layout tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Radius of the ring buildings sit on
    pub ring_radius: f32,
    /// Height added per record before clamping
    pub height_per_record: f32,
    pub min_height: f32,
    pub max_height: f32,
    pub records_per_floor: usize,
    pub columns: usize,
    pub floor_height: f32,
    pub base_floor_height: f32,
    pub block_size: f32,
    /// Distance between neighbouring block centers on a floor
    pub block_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            ring_radius: 30.0,
            height_per_record: 0.1,
            min_height: 2.0,
            max_height: 10.0,
            records_per_floor: 9,
            columns: 3,
            floor_height: 1.2,
            base_floor_height: 0.5,
            block_size: 0.8,
            block_spacing: 1.0,
        }
    }
}

impl LayoutConfig {
    /// Repair tunables that would make the layout degenerate
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();

        self.records_per_floor = self.records_per_floor.max(1);
        self.columns = self.columns.clamp(1, self.records_per_floor);

        if !self.height_per_record.is_finite() || self.height_per_record < 0.0 {
            self.height_per_record = defaults.height_per_record;
        }
        if !self.min_height.is_finite() || self.min_height < 0.0 {
            self.min_height = 0.0;
        }
        if !self.max_height.is_finite() {
            self.max_height = defaults.max_height.max(self.min_height);
        }
        if self.min_height > self.max_height {
            std::mem::swap(&mut self.min_height, &mut self.max_height);
        }
        for v in [
            &mut self.ring_radius,
            &mut self.floor_height,
            &mut self.base_floor_height,
            &mut self.block_size,
            &mut self.block_spacing,
        ] {
            if !v.is_finite() || *v < 0.0 {
                *v = 0.0;
            }
        }
        self
    }

    /// Rows of blocks per floor
    pub fn rows(&self) -> usize {
        self.records_per_floor.div_ceil(self.columns.max(1))
    }
}

/// Where an entity's building stands
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub entity_index: usize,
    /// Angle on the ring, radians
    pub angle: f32,
    /// Center of the building's base
    pub position: Vec3,
    pub structure_height: f32,
}

/// Where one sample record's block sits
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubBlockPlacement {
    pub record_index: usize,
    /// Grid coordinate on its floor, centered on the building axis
    pub grid_offset: Vec2,
    pub floor: usize,
    /// Center of the block
    pub world_position: Vec3,
}

/// Place every entity on the ring
pub fn place(entities: &[Entity], config: &LayoutConfig) -> Vec<Placement> {
    let total = entities.len();
    entities
        .iter()
        .enumerate()
        .map(|(i, entity)| placement_for(i, total, entity.record_count, config))
        .collect()
}

/// Placement of entity `index` of `total`; `total` must be non-zero
pub fn placement_for(index: usize, total: usize, record_count: u64, config: &LayoutConfig) -> Placement {
    let angle = ring_angle(index, total);
    Placement {
        entity_index: index,
        angle,
        position: Vec3::new(
            config.ring_radius * angle.cos(),
            0.0,
            config.ring_radius * angle.sin(),
        ),
        structure_height: structure_height(record_count, config),
    }
}

/// Angle of slot `index` among `total` evenly spaced slots
pub fn ring_angle(index: usize, total: usize) -> f32 {
    if total == 0 {
        return 0.0;
    }
    TAU * index as f32 / total as f32
}

/// Building height for a record count, clamped to `[min_height, max_height]`
pub fn structure_height(record_count: u64, config: &LayoutConfig) -> f32 {
    let raw = record_count as f32 * config.height_per_record;
    // max/min rather than clamp: never panics on odd bounds
    raw.max(config.min_height).min(config.max_height)
}

/// Height of the roof over `sample_count` stacked blocks: the structure
/// height, raised when the top floor of blocks would poke through it
pub fn roof_height(structure_height: f32, sample_count: usize, config: &LayoutConfig) -> f32 {
    if sample_count == 0 {
        return structure_height;
    }
    let top_floor = (sample_count - 1) / config.records_per_floor.max(1);
    let top = config.base_floor_height + top_floor as f32 * config.floor_height + config.block_size;
    structure_height.max(top)
}

/// Block placements for every sample record of an entity
pub fn sub_blocks(entity: &Entity, placement: &Placement, config: &LayoutConfig) -> Vec<SubBlockPlacement> {
    (0..entity.sample_records.len())
        .map(|j| sub_block(j, placement.position, config))
        .collect()
}

/// Block placement for record `record_index` inside a building at `origin`
pub fn sub_block(record_index: usize, origin: Vec3, config: &LayoutConfig) -> SubBlockPlacement {
    let per_floor = config.records_per_floor.max(1);
    let cols = config.columns.max(1);

    let floor = record_index / per_floor;
    let slot = record_index % per_floor;

    let center_x = (cols - 1) as f32 / 2.0;
    let center_z = (config.rows().max(1) - 1) as f32 / 2.0;
    let grid_offset = Vec2::new(
        (slot % cols) as f32 - center_x,
        (slot / cols) as f32 - center_z,
    );

    let y = config.base_floor_height + floor as f32 * config.floor_height + config.block_size / 2.0;

    SubBlockPlacement {
        record_index,
        grid_offset,
        floor,
        world_position: origin
            + Vec3::new(
                grid_offset.x * config.block_spacing,
                y,
                grid_offset.y * config.block_spacing,
            ),
    }
}

/// Width and depth of a building, large enough for every block slot
pub fn building_footprint(config: &LayoutConfig) -> Vec2 {
    let cols = config.columns.max(1) as f32;
    let rows = config.rows().max(1) as f32;
    let fit = |n: f32| (n * config.block_spacing).max((n - 1.0) * config.block_spacing + config.block_size);
    Vec2::new(fit(cols), fit(rows))
}
