//! Entity visuals
//!
//! Flat arena holding one `EntityVisual` per entity and one `BlockInstance`
//! per sample record. Blocks refer to their owner by index only. The whole
//! arena is rebuilt on refresh; a generation counter lets holders of old
//! block handles notice they are stale.

use glam::{Quat, Vec2, Vec3};
use std::ops::Range;
use tracing::debug;

use crate::animation::AnimationConfig;
use crate::color::{self, Color};
use crate::layout::{self, LayoutConfig, Placement, SubBlockPlacement};
use crate::model::{Entity, Record, RecordId};
use crate::picking::{Candidate, PickTarget};

/// Index of a block in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    /// Rotation about the vertical axis, radians
    pub yaw: f32,
    pub scale: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlight {
    pub started_at: f64,
    pub until: f64,
}

impl Highlight {
    /// Pulse strength in [0, 1]: rises and falls once over the duration
    fn pulse(&self, now: f64) -> f32 {
        let span = self.until - self.started_at;
        if span <= 0.0 {
            return 0.0;
        }
        let progress = ((now - self.started_at) / span).clamp(0.0, 1.0);
        (progress * std::f64::consts::PI).sin() as f32
    }
}

/// One sample record rendered as a block
#[derive(Debug, Clone)]
pub struct BlockInstance {
    /// Owning entity, index into the visuals
    pub entity: usize,
    pub record_index: usize,
    pub record_id: RecordId,
    pub placement: SubBlockPlacement,
    pub base_color: Color,
    pub transform: Transform,
    pub highlight: Option<Highlight>,
    pulse: f32,
}

impl BlockInstance {
    pub fn color(&self, config: &AnimationConfig) -> Color {
        color::brighten(self.base_color, self.pulse * config.highlight_brightness)
    }

    #[cfg(test)]
    pub fn is_highlighted(&self) -> bool {
        self.highlight.is_some()
    }
}

/// Visual subtree of one entity: building, label and its blocks
#[derive(Debug, Clone)]
pub struct EntityVisual {
    pub name: String,
    pub label: String,
    pub placement: Placement,
    /// Top of the structure, at least as high as its top floor of blocks
    pub roof_height: f32,
    pub color: Color,
    /// Width and depth of the building
    pub footprint: Vec2,
    /// Current sway of the whole structure, radians
    pub yaw: f32,
    pub blocks: Range<usize>,
}

impl EntityVisual {
    /// Apply idle motion at time `t` (seconds) to the structure and its blocks.
    /// Each block is phase shifted by its index so the floors never pulse in
    /// unison.
    pub fn update(&mut self, blocks: &mut [BlockInstance], t: f64, config: &AnimationConfig) {
        self.yaw = (t * config.sway_speed as f64).sin() as f32 * config.sway_amplitude;
        let sway = Quat::from_rotation_y(self.yaw);
        let origin = self.placement.position;

        for block in blocks {
            let phase = block.record_index as f64;
            let local = block.placement.world_position - origin;
            let bob = (t * config.float_speed as f64 + phase).sin() as f32 * config.float_amplitude;

            block.transform.position = origin + sway * local + Vec3::Y * bob;
            block.transform.yaw = (t * config.spin_speed as f64 + phase) as f32 + self.yaw;

            block.pulse = block.highlight.map(|h| h.pulse(t)).unwrap_or(0.0);
            block.transform.scale = 1.0 + (config.highlight_scale - 1.0) * block.pulse;
        }
    }

    /// Point just above the roof where the label hangs
    pub fn label_position(&self) -> Vec3 {
        self.placement.position + Vec3::Y * (self.roof_height + 1.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    entities: Vec<Entity>,
    visuals: Vec<EntityVisual>,
    blocks: Vec<BlockInstance>,
    block_size: f32,
    generation: u64,
}

impl SceneGraph {
    pub fn build(entities: Vec<Entity>, config: &LayoutConfig) -> Self {
        let mut graph = Self::default();
        graph.rebuild(entities, config);
        graph
    }

    /// Replace the whole scene with a fresh layout of `entities`
    pub fn rebuild(&mut self, entities: Vec<Entity>, config: &LayoutConfig) {
        let placements = layout::place(&entities, config);
        let footprint = layout::building_footprint(config);

        let mut visuals = Vec::with_capacity(entities.len());
        let mut blocks = Vec::new();

        for (entity, placement) in entities.iter().zip(placements) {
            let start = blocks.len();
            for sub in layout::sub_blocks(entity, &placement, config) {
                let record = &entity.sample_records[sub.record_index];
                blocks.push(BlockInstance {
                    entity: placement.entity_index,
                    record_index: sub.record_index,
                    record_id: RecordId::of(record, sub.record_index),
                    placement: sub,
                    base_color: color::block_color(record),
                    transform: Transform {
                        position: sub.world_position,
                        yaw: 0.0,
                        scale: 1.0,
                    },
                    highlight: None,
                    pulse: 0.0,
                });
            }

            visuals.push(EntityVisual {
                name: entity.name.clone(),
                label: format!("{} ({})", entity.name, entity.record_count),
                roof_height: layout::roof_height(placement.structure_height, entity.sample_records.len(), config),
                placement,
                color: color::base_color(&entity.name),
                footprint,
                yaw: 0.0,
                blocks: start..blocks.len(),
            });
        }

        self.entities = entities;
        self.visuals = visuals;
        self.blocks = blocks;
        self.block_size = config.block_size;
        self.generation += 1;

        debug!(
            "Scene rebuilt: generation={} entities={} blocks={}",
            self.generation,
            self.visuals.len(),
            self.blocks.len()
        );
    }

    /// Dispose every visual. Handles from before become stale.
    pub fn clear(&mut self) {
        if self.visuals.is_empty() && self.blocks.is_empty() && self.entities.is_empty() {
            return;
        }
        self.entities.clear();
        self.visuals.clear();
        self.blocks.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn visuals(&self) -> &[EntityVisual] {
        &self.visuals
    }

    pub fn blocks(&self) -> &[BlockInstance] {
        &self.blocks
    }

    pub fn block(&self, handle: BlockHandle) -> Option<&BlockInstance> {
        self.blocks.get(handle.0)
    }

    pub fn visual_index(&self, name: &str) -> Option<usize> {
        self.visuals.iter().position(|v| v.name == name)
    }

    /// Record behind a block, if the handle is still valid
    pub fn record(&self, handle: BlockHandle) -> Option<(&Entity, &Record)> {
        let block = self.block(handle)?;
        let entity = self.entities.get(block.entity)?;
        let record = entity.sample_records.get(block.record_index)?;
        Some((entity, record))
    }

    /// Idle motion for every visual at time `t`
    pub fn update(&mut self, t: f64, config: &AnimationConfig) {
        for visual in &mut self.visuals {
            let range = visual.blocks.clone();
            visual.update(&mut self.blocks[range], t, config);
        }
    }

    /// Current boxes of every block; buildings are never pickable
    pub fn intersectable_objects(&self) -> Vec<Candidate> {
        let half = self.block_size / 2.0;
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, block)| Candidate {
                handle: BlockHandle(i),
                target: PickTarget::Block {
                    entity: block.entity,
                    record: block.record_index,
                },
                center: block.transform.position,
                half_extents: Vec3::splat(half * block.transform.scale),
                yaw: block.transform.yaw,
            })
            .collect()
    }

    /// Start the highlight pulse on a picked block. Returns false for a
    /// handle that no longer exists.
    pub fn on_pick(&mut self, handle: BlockHandle, now: f64, config: &AnimationConfig) -> bool {
        match self.blocks.get_mut(handle.0) {
            Some(block) => {
                block.highlight = Some(Highlight {
                    started_at: now,
                    until: now + config.highlight_duration,
                });
                true
            }
            None => false,
        }
    }

    /// End the highlight on a block. Returns false for a stale handle.
    pub fn revert_highlight(&mut self, handle: BlockHandle) -> bool {
        match self.blocks.get_mut(handle.0) {
            Some(block) => {
                block.highlight = None;
                block.pulse = 0.0;
                block.transform.scale = 1.0;
                true
            }
            None => false,
        }
    }
}
