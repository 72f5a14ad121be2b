//! Simulation module
//!
//! Scene state, the physics wrapper and the per-tick update. Nothing here
//! touches rendering or the platform:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Physics bodies are owned by entities and released through the scene

pub mod collision;
pub mod physics;
pub mod scene;
pub mod schedule;
pub mod state;
pub mod tick;

pub use collision::{ContactClass, classify, dispatch};
pub use physics::{PhysicsWorld, RawContact};
pub use scene::{Item, ItemRecord, Scene, SceneEvent};
pub use schedule::DeferredQueue;
pub use state::{
    Ball, Bar, BarGeometry, BarShape, BarState, Bounds, Color, EntityId, EntityRef, Particle,
    Placeholder, Spawner, TrailPoint, palette,
};
pub use tick::{TickInput, tick};
