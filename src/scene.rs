//! Scene context
//!
//! One explicit object owns everything a running scene needs: the entity
//! arena, the camera, picking, the frame scheduler and the pick callback.
//! Nothing is global, so independent scenes can live side by side.

use glam::{Vec2, Vec3};
use tracing::{debug, info, warn};

use crate::animation::{AnimationScheduler, TimerId};
use crate::camera::{CameraController, CameraKey, CameraMode};
use crate::config::Config;
use crate::model::{self, Entity, EntitySummary};
use crate::picking::{PickEvent, PickHit, PickResult, PickTarget, PickingService, Viewport};
use crate::visual::{BlockHandle, SceneGraph};

/// Receives pick events once the highlight has played out
pub type PickHandler = Box<dyn FnMut(&PickEvent)>;

/// A pick waiting for its block's highlight to finish
struct PendingPick {
    timer: TimerId,
    block: BlockHandle,
    event: PickEvent,
}

pub struct SceneContext {
    config: Config,
    graph: SceneGraph,
    camera: CameraController,
    picking: PickingService,
    scheduler: AnimationScheduler,
    viewport: Viewport,
    on_pick: Option<PickHandler>,
    pending: Vec<PendingPick>,
    last_pick: PickResult,
    /// Time of the latest tick, seconds
    clock: f64,
}

impl SceneContext {
    pub fn new(config: Config) -> Self {
        let config = config.normalized();
        Self {
            graph: SceneGraph::default(),
            camera: CameraController::new(config.camera.clone()),
            picking: PickingService::new(config.picking.clone()),
            scheduler: AnimationScheduler::new(),
            viewport: Viewport::new(1.0, 1.0),
            on_pick: None,
            pending: Vec::new(),
            last_pick: PickResult::NoHit,
            clock: 0.0,
            config,
        }
    }

    /// Lay out `entities` and start the frame loop
    pub fn mount(&mut self, entities: Vec<Entity>) {
        self.refresh(entities);
        self.scheduler.start();
    }

    pub fn set_pick_handler(&mut self, handler: PickHandler) {
        self.on_pick = Some(handler);
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::new(width, height);
    }

    /// Full relayout with a new entity list. Pending highlight reverts
    /// belong to the old visuals and are dropped.
    pub fn refresh(&mut self, entities: Vec<Entity>) {
        let cancelled = self.scheduler.cancel_all();
        self.pending.clear();
        if cancelled > 0 {
            debug!("Refresh dropped {} pending highlight reverts", cancelled);
        }
        self.graph.rebuild(entities, &self.config.layout);
        self.last_pick = PickResult::NoHit;
        info!(
            "Scene refreshed: {} entities, {} blocks, {} records total",
            self.graph.visuals().len(),
            self.graph.blocks().len(),
            self.total_records()
        );
    }

    /// A new entity was created upstream; relayout with the updated list
    pub fn acknowledge_created(&mut self, entities: Vec<Entity>) {
        info!("Entity creation acknowledged, refreshing");
        self.refresh(entities);
    }

    /// Point the camera at an entity's building. Returns false for an
    /// unknown name.
    pub fn focus_entity(&mut self, name: &str) -> bool {
        let Some(entity) = self.graph.visual_index(name) else {
            warn!("Cannot focus unknown entity '{}'", name);
            return false;
        };
        self.focus(PickTarget::Building { entity })
    }

    /// Point the camera at a building (half way up) or at a block's current
    /// position. Returns false when the target is not in the scene.
    pub fn focus(&mut self, target: PickTarget) -> bool {
        let point = match target {
            PickTarget::Building { entity } => self
                .graph
                .visuals()
                .get(entity)
                .map(|v| v.placement.position + Vec3::Y * (v.placement.structure_height / 2.0)),
            PickTarget::Block { entity, record } => self.graph.visuals().get(entity).and_then(|v| {
                self.graph.blocks()[v.blocks.clone()]
                    .iter()
                    .find(|b| b.record_index == record)
                    .map(|b| b.transform.position)
            }),
        };
        let Some(point) = point else {
            debug!("Focus target {:?} is not in the scene", target);
            return false;
        };
        self.camera.focus(point);
        info!("Focused {:?} at {:?}", target, point);
        true
    }

    pub fn summaries(&self) -> Vec<EntitySummary> {
        self.graph.entities().iter().map(Entity::summary).collect()
    }

    pub fn total_records(&self) -> u64 {
        model::total_records(self.graph.entities())
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.camera.pointer_down(Vec2::new(x, y));
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.camera.pointer_move(Vec2::new(x, y));
    }

    /// Release from anywhere. Picks unless the press turned into a drag.
    pub fn pointer_up(&mut self, x: f32, y: f32) -> PickResult {
        let Some(release) = self.camera.pointer_up(Vec2::new(x, y)) else {
            return PickResult::NoHit;
        };
        let candidates = self.graph.intersectable_objects();
        let hit = self
            .picking
            .pick_release(&release, self.viewport, &self.camera, &candidates);
        self.select(hit)
    }

    pub fn pointer_cancel(&mut self) {
        self.camera.pointer_cancel();
    }

    /// Pick at a pixel directly, without click/drag gating
    pub fn pick_at(&mut self, x: f32, y: f32) -> PickResult {
        let candidates = self.graph.intersectable_objects();
        let hit = self.picking.pick(x, y, self.viewport, &self.camera, &candidates);
        self.select(hit)
    }

    pub fn wheel(&mut self, delta: f32) {
        self.camera.wheel(delta);
    }

    pub fn key(&mut self, key: CameraKey) {
        self.camera.key(key);
    }

    pub fn toggle_free_look(&mut self) -> CameraMode {
        let mode = match self.camera.mode() {
            CameraMode::Orbit => CameraMode::FreeLook,
            CameraMode::FreeLook => CameraMode::Orbit,
        };
        self.camera.set_mode(mode);
        info!("Camera mode: {:?}", mode);
        mode
    }

    /// One render tick at time `now` (seconds)
    pub fn tick(&mut self, now: f64) {
        if !self.scheduler.is_running() {
            return;
        }
        self.clock = now;
        self.camera.tick();

        let generation = self.graph.generation();
        for timer in self.scheduler.advance(now, &mut self.graph, &self.config.animation) {
            let Some(pos) = self.pending.iter().position(|p| p.timer == timer.id) else {
                continue;
            };
            let PendingPick { event, .. } = self.pending.swap_remove(pos);
            if timer.generation != generation || !self.graph.revert_highlight(timer.block) {
                debug!("Skipping highlight revert for disposed block {:?}", timer.block);
                continue;
            }
            if let Some(handler) = self.on_pick.as_mut() {
                handler(&event);
            }
        }
    }

    /// Stop the loop, cancel timers and dispose the visuals. Safe to call
    /// twice and before `mount`.
    pub fn teardown(&mut self) {
        let was_running = self.scheduler.is_running();
        self.scheduler.teardown();
        self.pending.clear();
        self.camera.pointer_cancel();
        self.graph.clear();
        self.last_pick = PickResult::NoHit;
        if was_running {
            info!("Scene torn down");
        }
    }

    #[cfg(test)]
    pub fn is_mounted(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn camera(&self) -> &CameraController {
        &self.camera
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn last_pick(&self) -> &PickResult {
        &self.last_pick
    }

    #[cfg(test)]
    pub fn pending_highlights(&self) -> usize {
        self.scheduler.pending()
    }

    /// Resolve a hit, start its highlight and queue the revert
    fn select(&mut self, hit: Option<PickHit>) -> PickResult {
        let result = self.picking.resolve(hit, &self.graph);
        if let (Some(hit), PickResult::Hit(event)) = (hit, &result) {
            info!("Picked {}/{}", event.entity_id, event.record_id);
            if self.graph.on_pick(hit.handle, self.clock, &self.config.animation) {
                // A block picked again restarts its highlight; the earlier
                // revert must not cut the new one short
                if let Some(pos) = self.pending.iter().position(|p| p.block == hit.handle) {
                    let stale = self.pending.swap_remove(pos);
                    self.scheduler.cancel(stale.timer);
                    debug!("Highlight on {:?} restarted", hit.handle);
                }
                let due = self.clock + self.config.animation.highlight_duration;
                let timer = self.scheduler.schedule(hit.handle, self.graph.generation(), due);
                self.pending.push(PendingPick {
                    timer,
                    block: hit.handle,
                    event: event.clone(),
                });
            }
        }
        self.last_pick = result.clone();
        result
    }
}

impl Drop for SceneContext {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraConfig;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn records(n: usize) -> Vec<crate::model::Record> {
        (0..n)
            .map(|i| json!({ "id": i, "email": format!("u{}@x.io", i) }).as_object().cloned().unwrap())
            .collect()
    }

    fn entities() -> Vec<Entity> {
        vec![
            Entity::new("users", 8).with_samples(records(8)),
            Entity::new("posts", 120).with_samples(records(12)),
        ]
    }

    fn mounted() -> SceneContext {
        let config = Config {
            camera: CameraConfig {
                rotate_sensitivity: 0.0005,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut scene = SceneContext::new(config);
        scene.set_viewport(800.0, 600.0);
        scene.mount(entities());
        scene
    }

    /// Pixel (top-left origin) where a world point lands
    fn project(scene: &SceneContext, world: Vec3) -> Vec2 {
        let vp = scene.viewport();
        let clip = scene.camera().view_projection(vp.aspect()).project_point3(world);
        Vec2::new((clip.x + 1.0) / 2.0 * vp.width, (1.0 - clip.y) / 2.0 * vp.height)
    }

    /// Pixel over a front-row block of `users` (nothing sits between it and
    /// the camera), with the camera aimed at the building
    fn aim_at_users(scene: &mut SceneContext) -> Vec2 {
        assert!(scene.focus_entity("users"));
        let block = scene.graph().blocks()[7].transform.position;
        project(scene, block)
    }

    fn collect_picks(scene: &mut SceneContext) -> Rc<RefCell<Vec<PickEvent>>> {
        let picks = Rc::new(RefCell::new(Vec::new()));
        let sink = picks.clone();
        scene.set_pick_handler(Box::new(move |event: &PickEvent| sink.borrow_mut().push(event.clone())));
        picks
    }

    #[test]
    fn test_click_over_block_picks() {
        let mut scene = mounted();
        let p = aim_at_users(&mut scene);

        scene.pointer_down(p.x, p.y);
        scene.pointer_move(p.x + 1.0, p.y);
        let result = scene.pointer_up(p.x + 1.0, p.y);

        match result {
            PickResult::Hit(event) => assert_eq!(event.entity_id, "users"),
            PickResult::NoHit => panic!("click over a block must pick"),
        }
        assert!(scene.last_pick().is_hit());
    }

    #[test]
    fn test_drag_over_block_does_not_pick() {
        let mut scene = mounted();
        let p = aim_at_users(&mut scene);

        scene.pointer_down(p.x, p.y);
        for step in 1..=10 {
            scene.pointer_move(p.x + 5.0 * step as f32, p.y);
        }
        let result = scene.pointer_up(p.x, p.y);
        assert_eq!(result, PickResult::NoHit);
        assert_eq!(scene.pending_highlights(), 0);
    }

    #[test]
    fn test_pick_in_empty_space() {
        let mut scene = mounted();
        assert!(scene.focus_entity("users"));
        assert_eq!(scene.pick_at(1.0, 1.0), PickResult::NoHit);
    }

    #[test]
    fn test_callback_fires_after_highlight() {
        let mut scene = mounted();
        let picks = collect_picks(&mut scene);
        let p = aim_at_users(&mut scene);

        scene.tick(0.0);
        assert!(scene.pick_at(p.x, p.y).is_hit());
        assert_eq!(scene.pending_highlights(), 1);
        assert!(picks.borrow().is_empty());

        let duration = scene.config().animation.highlight_duration;
        scene.tick(duration / 2.0);
        assert!(picks.borrow().is_empty());
        assert!(scene.graph().blocks().iter().any(|b| b.is_highlighted()));

        scene.tick(duration + 0.01);
        assert_eq!(picks.borrow().len(), 1);
        assert_eq!(picks.borrow()[0].entity_id, "users");
        assert!(scene.graph().blocks().iter().all(|b| !b.is_highlighted()));
    }

    #[test]
    fn test_repick_restarts_highlight() {
        let mut scene = mounted();
        let picks = collect_picks(&mut scene);
        let p = aim_at_users(&mut scene);
        let duration = scene.config().animation.highlight_duration;

        scene.tick(0.0);
        assert!(scene.pick_at(p.x, p.y).is_hit());
        scene.tick(0.2);
        assert!(scene.pick_at(p.x, p.y).is_hit());
        assert_eq!(scene.pending_highlights(), 1);

        // the first pick's deadline has passed, the second one's has not
        scene.tick(duration + 0.01);
        assert!(scene.graph().blocks().iter().any(|b| b.is_highlighted()));
        assert!(picks.borrow().is_empty());

        scene.tick(0.2 + duration + 0.01);
        assert!(scene.graph().blocks().iter().all(|b| !b.is_highlighted()));
        assert_eq!(picks.borrow().len(), 1);
    }

    #[test]
    fn test_teardown_cancels_pending_highlight() {
        let mut scene = mounted();
        let picks = collect_picks(&mut scene);
        let p = aim_at_users(&mut scene);
        assert!(scene.pick_at(p.x, p.y).is_hit());

        scene.teardown();
        scene.teardown();
        scene.tick(100.0);
        assert!(picks.borrow().is_empty());
        assert!(!scene.is_mounted());
        assert!(scene.graph().blocks().is_empty());
    }

    #[test]
    fn test_refresh_drops_stale_highlight() {
        let mut scene = mounted();
        let picks = collect_picks(&mut scene);
        let p = aim_at_users(&mut scene);
        assert!(scene.pick_at(p.x, p.y).is_hit());

        scene.refresh(vec![Entity::new("solo", 3)]);
        scene.tick(100.0);
        assert!(picks.borrow().is_empty());
        assert_eq!(scene.graph().visuals().len(), 1);
    }

    #[test]
    fn test_teardown_before_mount() {
        let mut scene = SceneContext::new(Config::default());
        scene.teardown();
        scene.teardown();
        scene.tick(1.0);
        assert!(!scene.is_mounted());
    }

    #[test]
    fn test_refresh_tolerates_length_changes() {
        let mut scene = mounted();
        let mut longer = entities();
        longer.push(Entity::new("orders", 40));
        longer.push(Entity::new("events", 9000));
        scene.refresh(longer);
        assert_eq!(scene.graph().visuals().len(), 4);
        scene.refresh(Vec::new());
        assert!(scene.graph().visuals().is_empty());
        assert_eq!(scene.pick_at(400.0, 300.0), PickResult::NoHit);
    }

    #[test]
    fn test_summaries_and_total() {
        let scene = mounted();
        let summaries = scene.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[1].name, "posts");
        assert_eq!(scene.total_records(), 128);
    }

    #[test]
    fn test_focus_unknown_entity() {
        let mut scene = mounted();
        let before = *scene.camera().state();
        assert!(!scene.focus_entity("nope"));
        assert_eq!(*scene.camera().state(), before);
    }

    #[test]
    fn test_focus_block_and_missing_targets() {
        let mut scene = mounted();
        let block = scene.graph().blocks()[11].transform.position;
        assert!(scene.focus(PickTarget::Block { entity: 1, record: 3 }));
        assert_eq!(scene.camera().state().target, block);

        let before = *scene.camera().state();
        assert!(!scene.focus(PickTarget::Block { entity: 0, record: 99 }));
        assert!(!scene.focus(PickTarget::Building { entity: 9 }));
        assert_eq!(*scene.camera().state(), before);
    }

    #[test]
    fn test_acknowledge_created_relayouts() {
        let mut scene = mounted();
        let mut updated = entities();
        updated.push(Entity::new("comments", 3));
        scene.acknowledge_created(updated);
        assert!(scene.graph().visual_index("comments").is_some());
        assert_eq!(scene.total_records(), 131);
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut a = mounted();
        let b = mounted();
        a.wheel(1e6);
        a.focus_entity("posts");
        assert_ne!(a.camera().state(), b.camera().state());
    }
}
