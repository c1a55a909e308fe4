//! Orbit camera controller
//!
//! Keeps yaw/pitch/radius around a look-at target and updates them from
//! pointer drags, wheel and key steps. Every input is clamped, never
//! rejected. After each change the eye position is recomputed from the
//! spherical coordinates.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI, TAU};

/// Camera tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub min_radius: f32,
    pub max_radius: f32,
    pub initial_radius: f32,
    pub initial_yaw: f32,
    pub initial_pitch: f32,
    /// Pitch is kept within ±max_pitch
    pub max_pitch: f32,
    /// Radians per pixel of drag
    pub rotate_sensitivity: f32,
    /// Radius change per wheel unit
    pub zoom_sensitivity: f32,
    pub key_yaw_step: f32,
    pub key_height_step: f32,
    pub max_target_height: f32,
    /// Per-tick velocity multiplier in free-look mode
    pub damping: f32,
    /// Velocities below this snap to zero
    pub velocity_epsilon: f32,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            min_radius: 8.0,
            max_radius: 120.0,
            initial_radius: 60.0,
            initial_yaw: 0.0,
            initial_pitch: 0.45,
            max_pitch: 1.4,
            rotate_sensitivity: 0.005,
            zoom_sensitivity: 0.05,
            key_yaw_step: 0.05,
            key_height_step: 0.5,
            max_target_height: 20.0,
            damping: 0.9,
            velocity_epsilon: 1e-4,
            fov_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl CameraConfig {
    /// Repair tunables so every clamp below has a valid range
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if !self.min_radius.is_finite() || self.min_radius <= 0.0 {
            self.min_radius = defaults.min_radius;
        }
        if !self.max_radius.is_finite() {
            self.max_radius = defaults.max_radius;
        }
        if self.min_radius > self.max_radius {
            std::mem::swap(&mut self.min_radius, &mut self.max_radius);
        }
        if !self.max_pitch.is_finite() {
            self.max_pitch = defaults.max_pitch;
        }
        // stay short of the poles so look_at keeps a valid up vector
        self.max_pitch = self.max_pitch.abs().min(FRAC_PI_2 - 0.01);
        for (value, default) in [
            (&mut self.rotate_sensitivity, defaults.rotate_sensitivity),
            (&mut self.zoom_sensitivity, defaults.zoom_sensitivity),
            (&mut self.key_yaw_step, defaults.key_yaw_step),
            (&mut self.key_height_step, defaults.key_height_step),
        ] {
            if !value.is_finite() || *value < 0.0 {
                *value = default;
            }
        }
        for (value, default) in [
            (&mut self.initial_radius, defaults.initial_radius),
            (&mut self.initial_yaw, defaults.initial_yaw),
            (&mut self.initial_pitch, defaults.initial_pitch),
        ] {
            if !value.is_finite() {
                *value = default;
            }
        }
        if !self.max_target_height.is_finite() || self.max_target_height < 0.0 {
            self.max_target_height = 0.0;
        }
        if !self.damping.is_finite() {
            self.damping = defaults.damping;
        }
        self.damping = self.damping.clamp(0.0, 0.999);
        if !self.velocity_epsilon.is_finite() || self.velocity_epsilon <= 0.0 {
            self.velocity_epsilon = defaults.velocity_epsilon;
        }
        if !self.fov_degrees.is_finite() || self.fov_degrees <= 1.0 || self.fov_degrees >= 179.0 {
            self.fov_degrees = defaults.fov_degrees;
        }
        if !(self.near > 0.0 && self.far > self.near) {
            self.near = defaults.near;
            self.far = defaults.far;
        }
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub yaw: f32,
    pub pitch: f32,
    pub radius: f32,
    pub target: Vec3,
    /// World position, derived from the fields above
    pub eye: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    /// Drags rotate the camera directly
    #[default]
    Orbit,
    /// Drags add angular velocity that damps out over ticks
    FreeLook,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        origin: Vec2,
        last: Vec2,
        /// Path length covered since pointer-down, pixels
        travelled: f32,
    },
}

/// Summary of a finished pointer-down/up pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerRelease {
    pub position: Vec2,
    pub travelled: f32,
}

/// Discrete movement keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraKey {
    YawLeft,
    YawRight,
    Raise,
    Lower,
    Reset,
}

#[derive(Debug, Clone)]
pub struct CameraController {
    config: CameraConfig,
    state: CameraState,
    drag: DragState,
    mode: CameraMode,
    /// Angular velocity (yaw, pitch) per tick, free-look only
    velocity: Vec2,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let config = config.normalized();
        let mut controller = Self {
            state: CameraState {
                yaw: 0.0,
                pitch: 0.0,
                radius: config.min_radius,
                target: Vec3::ZERO,
                eye: Vec3::ZERO,
            },
            config,
            drag: DragState::Idle,
            mode: CameraMode::Orbit,
            velocity: Vec2::ZERO,
        };
        controller.reset();
        controller
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> &CameraState {
        &self.state
    }

    #[cfg(test)]
    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.drag, DragState::Dragging { .. })
    }

    pub fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CameraMode) {
        self.mode = mode;
        self.velocity = Vec2::ZERO;
    }

    #[cfg(test)]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Back to the configured starting view
    pub fn reset(&mut self) {
        self.state.target = Vec3::ZERO;
        self.velocity = Vec2::ZERO;
        self.orbit_to(
            self.config.initial_yaw,
            self.config.initial_pitch,
            self.config.initial_radius,
        );
    }

    /// Set all three spherical coordinates at once, clamped
    pub fn orbit_to(&mut self, yaw: f32, pitch: f32, radius: f32) {
        if yaw.is_finite() {
            self.state.yaw = wrap_angle(yaw);
        }
        if pitch.is_finite() {
            self.state.pitch = pitch.clamp(-self.config.max_pitch, self.config.max_pitch);
        }
        if radius.is_finite() {
            self.state.radius = radius.clamp(self.config.min_radius, self.config.max_radius);
        }
        self.recompute();
    }

    /// Re-point the camera at `point`
    pub fn focus(&mut self, point: Vec3) {
        if !point.is_finite() {
            return;
        }
        self.state.target = Vec3::new(
            point.x,
            point.y.clamp(0.0, self.config.max_target_height),
            point.z,
        );
        self.recompute();
    }

    pub fn pointer_down(&mut self, position: Vec2) {
        self.drag = DragState::Dragging {
            origin: position,
            last: position,
            travelled: 0.0,
        };
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        let DragState::Dragging { origin, last, travelled } = self.drag else {
            return;
        };
        let delta = position - last;
        if !delta.is_finite() {
            return;
        }
        self.drag = DragState::Dragging {
            origin,
            last: position,
            travelled: travelled + delta.length(),
        };
        self.rotate(delta);
    }

    /// Finish a drag. Accepts releases from anywhere; returns `None` when no
    /// press was in progress.
    pub fn pointer_up(&mut self, position: Vec2) -> Option<PointerRelease> {
        if !self.is_dragging() {
            return None;
        }
        self.pointer_move(position);
        let DragState::Dragging { travelled, .. } = self.drag else {
            return None;
        };
        self.drag = DragState::Idle;
        Some(PointerRelease { position, travelled })
    }

    /// The pointer went away without a release
    pub fn pointer_cancel(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Zoom; works whether or not a drag is in progress
    pub fn wheel(&mut self, delta: f32) {
        if !delta.is_finite() {
            return;
        }
        let radius = self.state.radius + delta * self.config.zoom_sensitivity;
        // a huge finite delta can still overflow to ±inf; clamp handles both
        self.state.radius = if radius.is_nan() {
            self.state.radius
        } else {
            radius.clamp(self.config.min_radius, self.config.max_radius)
        };
        self.recompute();
    }

    pub fn key(&mut self, key: CameraKey) {
        match key {
            CameraKey::YawLeft => self.state.yaw = wrap_angle(self.state.yaw + self.config.key_yaw_step),
            CameraKey::YawRight => self.state.yaw = wrap_angle(self.state.yaw - self.config.key_yaw_step),
            CameraKey::Raise => self.step_height(self.config.key_height_step),
            CameraKey::Lower => self.step_height(-self.config.key_height_step),
            CameraKey::Reset => {
                self.reset();
                return;
            }
        }
        self.recompute();
    }

    /// Per-frame update: applies and damps free-look velocity
    pub fn tick(&mut self) {
        if self.velocity == Vec2::ZERO {
            return;
        }
        self.apply_rotation(self.velocity);
        self.velocity *= self.config.damping;
        if self.velocity.x.abs() < self.config.velocity_epsilon {
            self.velocity.x = 0.0;
        }
        if self.velocity.y.abs() < self.config.velocity_epsilon {
            self.velocity.y = 0.0;
        }
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.state.eye, self.state.target, Vec3::Y)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        Mat4::perspective_rh_gl(
            self.config.fov_degrees.to_radians(),
            aspect,
            self.config.near,
            self.config.far,
        )
    }

    pub fn view_projection(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    fn rotate(&mut self, delta: Vec2) {
        let angular = Vec2::new(-delta.x, delta.y) * self.config.rotate_sensitivity;
        match self.mode {
            CameraMode::Orbit => self.apply_rotation(angular),
            CameraMode::FreeLook => self.velocity += angular,
        }
    }

    fn apply_rotation(&mut self, angular: Vec2) {
        if !angular.is_finite() {
            return;
        }
        self.state.yaw = wrap_angle(self.state.yaw + angular.x);
        self.state.pitch = (self.state.pitch + angular.y).clamp(-self.config.max_pitch, self.config.max_pitch);
        self.recompute();
    }

    fn step_height(&mut self, step: f32) {
        self.state.target.y = (self.state.target.y + step).clamp(0.0, self.config.max_target_height);
    }

    fn recompute(&mut self) {
        let s = &mut self.state;
        let (sin_yaw, cos_yaw) = s.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = s.pitch.sin_cos();
        s.eye = s.target + Vec3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * s.radius;
    }
}

/// Wrap an angle into [-π, π)
fn wrap_angle(a: f32) -> f32 {
    let wrapped = (a + PI).rem_euclid(TAU) - PI;
    // rounding in the shift can land exactly on the excluded end
    if wrapped >= PI {
        -PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> CameraController {
        CameraController::new(CameraConfig::default())
    }

    fn assert_radius_in_bounds(c: &CameraController) {
        let r = c.state().radius;
        assert!(r >= c.config().min_radius && r <= c.config().max_radius, "radius {}", r);
    }

    #[test]
    fn test_initial_eye_matches_spherical() {
        let mut c = controller();
        c.orbit_to(0.0, 0.0, 10.0);
        assert!(c.state().eye.distance(Vec3::new(0.0, 0.0, 10.0)) < 1e-5);
        c.orbit_to(FRAC_PI_2, 0.0, 10.0);
        assert!(c.state().eye.distance(Vec3::new(10.0, 0.0, 0.0)) < 1e-4);
    }

    #[test]
    fn test_radius_clamped_under_extreme_scrolls() {
        let mut c = controller();
        for delta in [1e9, -1e9, f32::MAX, -f32::MAX, f32::INFINITY, f32::NAN, 3.0, -0.5, f32::MIN_POSITIVE] {
            c.wheel(delta);
            assert_radius_in_bounds(&c);
        }
        c.wheel(1e9);
        assert_eq!(c.state().radius, c.config().max_radius);
        c.wheel(-1e9);
        assert_eq!(c.state().radius, c.config().min_radius);
    }

    #[test]
    fn test_wheel_works_while_dragging() {
        let mut c = controller();
        let before = c.state().radius;
        c.pointer_down(Vec2::new(10.0, 10.0));
        c.wheel(20.0);
        assert!(c.state().radius > before);
        assert!(c.is_dragging());
    }

    #[test]
    fn test_drag_updates_yaw_and_pitch() {
        let mut c = controller();
        c.orbit_to(0.0, 0.0, 30.0);
        c.pointer_move(Vec2::new(100.0, 0.0));
        assert_eq!(c.state().yaw, 0.0, "moves without a press are ignored");

        c.pointer_down(Vec2::new(0.0, 0.0));
        c.pointer_move(Vec2::new(10.0, 4.0));
        let s = c.config().rotate_sensitivity;
        assert!((c.state().yaw - (-10.0 * s)).abs() < 1e-6);
        assert!((c.state().pitch - 4.0 * s).abs() < 1e-6);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut c = controller();
        c.pointer_down(Vec2::ZERO);
        c.pointer_move(Vec2::new(0.0, 1e6));
        assert_eq!(c.state().pitch, c.config().max_pitch);
        c.pointer_move(Vec2::new(0.0, -1e6));
        assert_eq!(c.state().pitch, -c.config().max_pitch);
    }

    #[test]
    fn test_release_reports_travel_and_returns_to_idle() {
        let mut c = controller();
        assert!(c.pointer_up(Vec2::ZERO).is_none());

        c.pointer_down(Vec2::new(0.0, 0.0));
        c.pointer_move(Vec2::new(30.0, 40.0));
        let release = c.pointer_up(Vec2::new(0.0, 0.0)).unwrap();
        assert!((release.travelled - 100.0).abs() < 1e-3);
        assert_eq!(c.drag_state(), DragState::Idle);
    }

    #[test]
    fn test_cancel_never_sticks_in_dragging() {
        let mut c = controller();
        c.pointer_down(Vec2::ZERO);
        c.pointer_cancel();
        assert!(!c.is_dragging());
        assert!(c.pointer_up(Vec2::ZERO).is_none());
    }

    #[test]
    fn test_keys_step_yaw_and_height() {
        let mut c = controller();
        let yaw = c.state().yaw;
        c.key(CameraKey::YawLeft);
        assert!((c.state().yaw - (yaw + c.config().key_yaw_step)).abs() < 1e-6);

        for _ in 0..1000 {
            c.key(CameraKey::Raise);
        }
        assert_eq!(c.state().target.y, c.config().max_target_height);
        for _ in 0..1000 {
            c.key(CameraKey::Lower);
        }
        assert_eq!(c.state().target.y, 0.0);

        c.key(CameraKey::Reset);
        assert_eq!(c.state().radius, c.config().initial_radius);
    }

    #[test]
    fn test_focus_moves_target_and_eye() {
        let mut c = controller();
        let offset = c.state().eye - c.state().target;
        c.focus(Vec3::new(30.0, 1.0, 0.0));
        assert_eq!(c.state().target, Vec3::new(30.0, 1.0, 0.0));
        assert!((c.state().eye - c.state().target - offset).length() < 1e-4);
    }

    #[test]
    fn test_free_look_velocity_decays_to_zero() {
        let mut c = controller();
        c.set_mode(CameraMode::FreeLook);
        c.pointer_down(Vec2::ZERO);
        c.pointer_move(Vec2::new(40.0, 0.0));
        assert_ne!(c.velocity(), Vec2::ZERO);

        let yaw_before = c.state().yaw;
        let mut ticks = 0;
        while c.velocity() != Vec2::ZERO {
            c.tick();
            ticks += 1;
            assert!(ticks < 10_000, "velocity never settled");
        }
        assert_ne!(c.state().yaw, yaw_before);
    }

    #[test]
    fn test_yaw_wraps() {
        let mut c = controller();
        c.orbit_to(3.0 * PI, 0.0, 20.0);
        assert!(c.state().yaw >= -PI && c.state().yaw < PI);
    }

    #[test]
    fn test_wrap_angle_excludes_pi() {
        let mut angles = vec![PI, -PI, TAU, -TAU, 3.0 * PI, -3.0 * PI, 0.0, -0.0];
        for base in [-PI, PI] {
            let bits = base.to_bits();
            for offset in 0..64u32 {
                angles.push(f32::from_bits(bits + offset));
                angles.push(f32::from_bits(bits - offset));
            }
        }
        for a in angles {
            let w = wrap_angle(a);
            assert!((-PI..PI).contains(&w), "wrap_angle({:e}) = {:e}", a, w);
        }
    }

    #[test]
    fn test_yaw_stays_in_range_near_minus_pi() {
        let mut c = controller();
        let just_below = f32::from_bits((-PI).to_bits() + 1);
        c.orbit_to(just_below, 0.0, 20.0);
        assert!(c.state().yaw >= -PI && c.state().yaw < PI, "yaw {}", c.state().yaw);
    }

    #[test]
    fn test_non_finite_tunables_keep_camera_finite() {
        let config = CameraConfig {
            rotate_sensitivity: f32::NAN,
            zoom_sensitivity: f32::NAN,
            key_yaw_step: f32::INFINITY,
            key_height_step: f32::NEG_INFINITY,
            initial_yaw: f32::NAN,
            initial_radius: f32::INFINITY,
            ..Default::default()
        };
        let mut c = CameraController::new(config);
        c.key(CameraKey::YawLeft);
        c.key(CameraKey::Raise);
        c.wheel(1.0);
        c.pointer_down(Vec2::ZERO);
        c.pointer_move(Vec2::new(25.0, 10.0));

        let s = c.state();
        assert!(s.yaw.is_finite() && s.pitch.is_finite() && s.radius.is_finite());
        assert!(s.eye.is_finite() && s.target.is_finite());
        assert_radius_in_bounds(&c);
        assert!(c.config().key_yaw_step.is_finite());
        assert!(c.config().zoom_sensitivity >= 0.0);
    }

    #[test]
    fn test_normalized_fixes_inverted_radius() {
        let config = CameraConfig {
            min_radius: 50.0,
            max_radius: 5.0,
            damping: 3.0,
            ..Default::default()
        }
        .normalized();
        assert!(config.min_radius < config.max_radius);
        assert!(config.damping < 1.0);
    }
}
