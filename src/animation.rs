//! Frame-loop scheduling
//!
//! The scene runs on one cooperative render tick. The scheduler owns the
//! loop handle, drives idle motion each tick and keeps the deadlines for
//! highlight reverts. Teardown clears both and is safe to repeat.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::visual::{BlockHandle, SceneGraph};

/// Idle motion and highlight tunables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Angular frequency of the building sway, rad/s
    pub sway_speed: f32,
    /// Peak building sway, radians
    pub sway_amplitude: f32,
    pub float_speed: f32,
    pub float_amplitude: f32,
    /// Block spin, rad/s
    pub spin_speed: f32,
    /// Seconds a picked block stays highlighted
    pub highlight_duration: f64,
    /// Peak scale of the highlight pulse
    pub highlight_scale: f32,
    /// How far the highlight pushes the color toward white
    pub highlight_brightness: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            sway_speed: 0.5,
            sway_amplitude: 0.05,
            float_speed: 1.5,
            float_amplitude: 0.1,
            spin_speed: 0.4,
            highlight_duration: 0.3,
            highlight_scale: 1.4,
            highlight_brightness: 0.4,
        }
    }
}

impl AnimationConfig {
    /// Replace tunables that would push NaN or infinities into transforms
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        for (value, default) in [
            (&mut self.sway_speed, defaults.sway_speed),
            (&mut self.sway_amplitude, defaults.sway_amplitude),
            (&mut self.float_speed, defaults.float_speed),
            (&mut self.float_amplitude, defaults.float_amplitude),
            (&mut self.spin_speed, defaults.spin_speed),
        ] {
            if !value.is_finite() || *value < 0.0 {
                *value = default;
            }
        }
        if !self.highlight_duration.is_finite() || self.highlight_duration < 0.0 {
            self.highlight_duration = 0.0;
        }
        if !self.highlight_scale.is_finite() || self.highlight_scale <= 0.0 {
            self.highlight_scale = defaults.highlight_scale;
        }
        self.highlight_brightness = if self.highlight_brightness.is_finite() {
            self.highlight_brightness.clamp(0.0, 1.0)
        } else {
            defaults.highlight_brightness
        };
        self
    }
}

/// Handle of the running frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// A pending highlight revert
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timer {
    pub id: TimerId,
    pub due_at: f64,
    pub block: BlockHandle,
    /// Scene generation the block handle belongs to
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct AnimationScheduler {
    frame: Option<FrameHandle>,
    next_id: u64,
    timers: Vec<Timer>,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the frame loop; returns the existing handle if already running
    pub fn start(&mut self) -> FrameHandle {
        if let Some(handle) = self.frame {
            return handle;
        }
        let handle = FrameHandle(self.bump());
        debug!("Frame loop started: {:?}", handle);
        self.frame = Some(handle);
        handle
    }

    pub fn is_running(&self) -> bool {
        self.frame.is_some()
    }

    /// Clear the loop handle; returns whether a loop was running
    pub fn stop(&mut self) -> bool {
        self.frame.take().is_some()
    }

    pub fn schedule(&mut self, block: BlockHandle, generation: u64, due_at: f64) -> TimerId {
        let id = TimerId(self.bump());
        self.timers.push(Timer {
            id,
            due_at,
            block,
            generation,
        });
        id
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Drop every pending timer; returns how many were dropped
    pub fn cancel_all(&mut self) -> usize {
        let n = self.timers.len();
        self.timers.clear();
        n
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.timers.len()
    }

    /// Remove and return timers due at `now`, earliest first
    pub fn due(&mut self, now: f64) -> Vec<Timer> {
        let (mut fired, pending): (Vec<Timer>, Vec<Timer>) =
            self.timers.drain(..).partition(|t| t.due_at <= now);
        self.timers = pending;
        fired.sort_by(|a, b| a.due_at.total_cmp(&b.due_at).then(a.id.0.cmp(&b.id.0)));
        fired
    }

    /// One render tick: advance idle motion, then hand back due timers.
    /// Does nothing while the loop is stopped.
    pub fn advance(&mut self, now: f64, scene: &mut SceneGraph, config: &AnimationConfig) -> Vec<Timer> {
        if !self.is_running() {
            return Vec::new();
        }
        scene.update(now, config);
        self.due(now)
    }

    /// Stop the loop and cancel every timer. Safe to call repeatedly and
    /// before `start`.
    pub fn teardown(&mut self) {
        let was_running = self.stop();
        let cancelled = self.cancel_all();
        if was_running || cancelled > 0 {
            debug!("Scheduler torn down, {} timers cancelled", cancelled);
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}
