//! Pointer picking
//!
//! Turns a pixel coordinate into a world-space ray through the current camera
//! and finds the nearest block it hits. Only blocks are ever tested: the
//! buildings are large and would shadow the blocks inside them.

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::camera::{CameraController, PointerRelease};
use crate::model::{Record, RecordId};
use crate::visual::{BlockHandle, SceneGraph};

/// Picking tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PickingConfig {
    /// A press/release pair that travelled further than this (pixels) was a
    /// camera drag, not a click
    pub drag_threshold: f32,
}

impl Default for PickingConfig {
    fn default() -> Self {
        Self { drag_threshold: 4.0 }
    }
}

/// What a scene object stands for when picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickTarget {
    Building { entity: usize },
    Block { entity: usize, record: usize },
}

/// A pickable oriented box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub handle: BlockHandle,
    pub target: PickTarget,
    pub center: Vec3,
    pub half_extents: Vec3,
    /// Rotation about the vertical axis, radians
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length
    pub dir: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub handle: BlockHandle,
    pub target: PickTarget,
    /// Ray parameter of the hit, world units
    pub distance: f32,
}

/// Pixel size of the drawing surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// A resolved pick, handed to the HUD/editor
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PickEvent {
    #[serde(rename = "entityId")]
    pub entity_id: String,
    #[serde(rename = "recordId")]
    pub record_id: RecordId,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PickResult {
    Hit(PickEvent),
    #[default]
    NoHit,
}

impl PickResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, PickResult::Hit(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct PickingService {
    config: PickingConfig,
}

impl PickingService {
    pub fn new(config: PickingConfig) -> Self {
        Self { config }
    }

    /// Nearest candidate under the pixel `(x, y)` (top-left origin)
    pub fn pick(
        &self,
        x: f32,
        y: f32,
        viewport: Viewport,
        camera: &CameraController,
        candidates: &[Candidate],
    ) -> Option<PickHit> {
        if candidates.is_empty() {
            return None;
        }
        let ray = ray_from_screen(x, y, viewport, camera)?;
        nearest_hit(&ray, candidates)
    }

    /// Pick at the end of a press/release pair, unless it was a drag
    pub fn pick_release(
        &self,
        release: &PointerRelease,
        viewport: Viewport,
        camera: &CameraController,
        candidates: &[Candidate],
    ) -> Option<PickHit> {
        if !(release.travelled <= self.config.drag_threshold) {
            debug!(
                "Pick suppressed: pointer travelled {:.1}px (threshold {:.1}px)",
                release.travelled, self.config.drag_threshold
            );
            return None;
        }
        self.pick(release.position.x, release.position.y, viewport, camera, candidates)
    }

    /// Turn a hit into the event the HUD sees. Only blocks carry record
    /// identity; anything else is no hit.
    pub fn resolve(&self, hit: Option<PickHit>, scene: &SceneGraph) -> PickResult {
        let Some(hit) = hit else {
            return PickResult::NoHit;
        };
        match hit.target {
            PickTarget::Block { .. } => match (scene.block(hit.handle), scene.record(hit.handle)) {
                (Some(block), Some((entity, record))) => PickResult::Hit(PickEvent {
                    entity_id: entity.name.clone(),
                    record_id: block.record_id.clone(),
                    record: record.clone(),
                }),
                _ => PickResult::NoHit,
            },
            PickTarget::Building { .. } => PickResult::NoHit,
        }
    }
}

/// World-space ray through pixel `(x, y)`; `None` for a degenerate viewport
pub fn ray_from_screen(x: f32, y: f32, viewport: Viewport, camera: &CameraController) -> Option<Ray> {
    if !viewport.is_valid() || !x.is_finite() || !y.is_finite() {
        return None;
    }
    let ndc = Vec2::new(2.0 * x / viewport.width - 1.0, 1.0 - 2.0 * y / viewport.height);
    let inverse = camera.view_projection(viewport.aspect()).inverse();

    let near = inverse.project_point3(ndc.extend(-1.0));
    let far = inverse.project_point3(ndc.extend(1.0));
    let dir = (far - near).try_normalize()?;
    Some(Ray { origin: near, dir })
}

/// Closest hit along the ray; equal distances go to the lower handle
pub fn nearest_hit(ray: &Ray, candidates: &[Candidate]) -> Option<PickHit> {
    let mut best: Option<PickHit> = None;
    for c in candidates {
        let Some(t) = ray_hits_box(ray, c) else {
            continue;
        };
        let closer = match best {
            None => true,
            Some(b) => t.total_cmp(&b.distance).then(c.handle.cmp(&b.handle)).is_lt(),
        };
        if closer {
            best = Some(PickHit {
                handle: c.handle,
                target: c.target,
                distance: t,
            });
        }
    }
    best
}

/// Ray against a box rotated about Y: move the ray into the box frame, then
/// run the slab test
pub fn ray_hits_box(ray: &Ray, candidate: &Candidate) -> Option<f32> {
    let inverse = Quat::from_rotation_y(-candidate.yaw);
    let origin = inverse * (ray.origin - candidate.center);
    let dir = inverse * ray.dir;
    ray_aabb_hit_t(origin, dir, -candidate.half_extents, candidate.half_extents)
}

/// Slab-method ray/AABB intersection, returns the entry parameter (or the
/// exit parameter when the origin is inside)
pub fn ray_aabb_hit_t(origin: Vec3, dir: Vec3, min: Vec3, max: Vec3) -> Option<f32> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let (o, d) = (origin[axis], dir[axis]);
        if d == 0.0 {
            if o < min[axis] || o > max[axis] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (mut t0, mut t1) = ((min[axis] - o) * inv, (max[axis] - o) * inv);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max {
            return None;
        }
    }

    if t_max < 0.0 {
        return None;
    }
    Some(if t_min >= 0.0 { t_min } else { t_max })
}
