//! Marble Run - a musical marble run sandbox
//!
//! Core modules:
//! - `sim`: Scene state, physics wrapper, collision dispatch, per-frame tick
//! - `history`: Undo/redo snapshot stacks
//! - `persistence`: Scene JSON import/export
//! - `camera` / `input` / `editor`: Pan/zoom, drag gestures, user commands
//! - `audio`: Notes, instruments and the Web Audio synth
//! - `renderer`: Screen-space vertex lists for an external rasterizer
//! - `platform`: Browser bindings

pub mod audio;
pub mod camera;
pub mod editor;
pub mod history;
pub mod input;
pub mod persistence;
pub mod platform;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use editor::Editor;
pub use history::History;
pub use settings::{QualityPreset, Settings};

use glam::Vec2;

/// Sandbox configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 4;

    /// World units (pixels) per physics meter
    pub const PIXELS_PER_METER: f32 = 50.0;
    /// Standard gravity in m/s², scaled by the scene's gravity multiplier
    pub const EARTH_GRAVITY: f32 = 9.81;

    /// Default scene parameters
    pub const DEFAULT_GRAVITY: f32 = 1.0;
    pub const DEFAULT_BOUNCE: f32 = 0.6;
    pub const DEFAULT_INSTRUMENT: &str = "marimba";
    pub const DEFAULT_NOTE: &str = "C4";

    /// Ball defaults
    pub const BALL_RADIUS: f32 = 10.0;
    /// Extra reach (pixels) when matching a ball to a placeholder, covering
    /// meter/pixel rounding at the moment the shapes start touching
    pub const PLACEHOLDER_REACH_SLACK: f32 = 0.5;
    /// Trail points kept per ball
    pub const TRAIL_LENGTH: usize = 24;

    /// Structural limits (silently enforced)
    pub const MAX_SPAWNERS: usize = 5;
    pub const MAX_BALLS_PER_SPAWNER: usize = 3;

    /// Undo history depth
    pub const HISTORY_CAPACITY: usize = 50;

    /// Bar defaults
    pub const BAR_WIDTH: f32 = 160.0;
    pub const BAR_HEIGHT: f32 = 16.0;
    pub const MIN_BAR_SIZE: f32 = 8.0;
    /// Glow multiplier remaining after one second
    pub const GLOW_DECAY_PER_SEC: f32 = 0.05;
    /// Corrective torque per radian of seesaw deviation
    pub const SEESAW_STIFFNESS: f32 = 4.0;

    /// Particles
    pub const MAX_PARTICLES: usize = 512;
    pub const HIT_BURST: usize = 8;
    pub const PLACEHOLDER_BURST: usize = 16;

    /// Distance beyond the view (or content) at which balls are culled
    pub const CULL_MARGIN: f32 = 400.0;
}

/// Normalized angle to [-π, π]; in-range angles are returned untouched and
/// non-finite input comes back non-finite
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if (-PI..=PI).contains(&angle) {
        return angle;
    }
    (angle + PI).rem_euclid(TAU) - PI
}

/// Rotate a vector by `angle` radians
#[inline]
pub fn rotate(v: Vec2, angle: f32) -> Vec2 {
    Vec2::from_angle(angle).rotate(v)
}

/// Express a world point in a body's local frame
#[inline]
pub fn to_local(point: Vec2, origin: Vec2, angle: f32) -> Vec2 {
    rotate(point - origin, -angle)
}
