//! Scene entities and their local state
//!
//! Positions of balls and seesaw planks are owned by their physics bodies;
//! everything else a renderer or the history needs lives here.

use glam::Vec2;
use rand::Rng;
use rapier2d::prelude::RigidBodyHandle;
use serde::{Deserialize, Serialize};

use super::physics::BarBody;
use crate::audio::{Instrument, Note};
use crate::consts::*;

/// Stable identifier handed out by the scene
pub type EntityId = u32;

/// Linear RGBA color
pub type Color = [f32; 4];

/// Colors for scene elements
pub mod palette {
    use super::Color;

    pub const NEUTRAL: Color = [0.55, 0.58, 0.66, 1.0];
    pub const BALL: Color = [0.95, 0.95, 0.98, 1.0];
    pub const PLACEHOLDER: Color = [0.85, 0.85, 0.9, 0.45];
    pub const SPAWNER: Color = [0.3, 0.85, 0.55, 1.0];
    pub const SELECTION: Color = [1.0, 0.85, 0.2, 1.0];

    /// Accent colors picked at random when a bar is first hit
    pub const ACCENTS: [Color; 8] = [
        [1.0, 0.36, 0.42, 1.0],
        [1.0, 0.62, 0.2, 1.0],
        [1.0, 0.87, 0.3, 1.0],
        [0.45, 0.9, 0.45, 1.0],
        [0.25, 0.85, 0.9, 1.0],
        [0.35, 0.55, 1.0, 1.0],
        [0.7, 0.45, 1.0, 1.0],
        [1.0, 0.45, 0.85, 1.0],
    ];
}

/// Logical owner of a physics body
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityRef {
    Ball(EntityId),
    Bar(EntityId),
    Placeholder(EntityId),
}

/// Axis-aligned world rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn expand(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    pub fn include(&self, point: Vec2) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Trail point for ball rendering
#[derive(Debug, Clone, Copy)]
pub struct TrailPoint {
    pub pos: Vec2,
    pub speed: f32,
}

/// A live, simulated ball
#[derive(Debug)]
pub struct Ball {
    pub id: EntityId,
    pub radius: f32,
    pub color: Color,
    /// Spawner that emitted this ball (None for placeholder-born balls)
    pub spawner: Option<EntityId>,
    /// Trail history for rendering (newest first)
    pub trail: Vec<TrailPoint>,
    pub(crate) body: RigidBodyHandle,
}

impl Ball {
    pub(crate) fn new(
        id: EntityId,
        body: RigidBodyHandle,
        radius: f32,
        color: Color,
        spawner: Option<EntityId>,
    ) -> Self {
        Self {
            id,
            radius,
            color,
            spawner,
            trail: Vec::with_capacity(TRAIL_LENGTH),
            body,
        }
    }

    /// Record a position to the trail, keeping at most `max_len` points
    pub fn record_trail(&mut self, pos: Vec2, speed: f32, max_len: usize) {
        self.trail.insert(0, TrailPoint { pos, speed });
        self.trail.truncate(max_len);
    }

    pub fn clear_trail(&mut self) {
        self.trail.clear();
    }
}

/// Bar shape kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarShape {
    #[default]
    Rect,
    Circle,
    Triangle,
    Seesaw,
    Curve,
}

impl BarShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarShape::Rect => "rect",
            BarShape::Circle => "circle",
            BarShape::Triangle => "triangle",
            BarShape::Seesaw => "seesaw",
            BarShape::Curve => "curve",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rect" | "rectangle" | "bar" => Some(BarShape::Rect),
            "circle" => Some(BarShape::Circle),
            "triangle" => Some(BarShape::Triangle),
            "seesaw" => Some(BarShape::Seesaw),
            "curve" | "ramp" => Some(BarShape::Curve),
            _ => None,
        }
    }
}

const CURVE_SEGMENTS: usize = 12;
const CIRCLE_SEGMENTS: usize = 24;

/// Bar size and outline parameters, in bar-local space (y points down)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarGeometry {
    pub width: f32,
    pub height: f32,
    pub shape: BarShape,
    /// Bulge of the top edge as a fraction of a quarter width (positive = up)
    pub curvature_top: f32,
    /// Bulge of the bottom edge, same convention
    pub curvature_bottom: f32,
}

impl Default for BarGeometry {
    fn default() -> Self {
        Self::new(BarShape::Rect, BAR_WIDTH, BAR_HEIGHT)
    }
}

impl BarGeometry {
    pub fn new(shape: BarShape, width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            shape,
            curvature_top: 0.0,
            curvature_bottom: 0.0,
        }
        .clamped()
    }

    pub fn with_curvature(mut self, top: f32, bottom: f32) -> Self {
        self.curvature_top = top;
        self.curvature_bottom = bottom;
        self.clamped()
    }

    /// Enforce minimum size and sane curvature
    pub fn clamped(mut self) -> Self {
        self.width = self.width.max(MIN_BAR_SIZE);
        self.height = self.height.max(MIN_BAR_SIZE);
        if self.shape == BarShape::Circle {
            self.height = self.width;
        }
        self.curvature_top = self.curvature_top.clamp(-1.0, 1.0);
        self.curvature_bottom = self.curvature_bottom.clamp(-1.0, 1.0);
        self
    }

    /// Whether the outline is built from curved edges
    pub fn is_curved(&self) -> bool {
        match self.shape {
            BarShape::Curve => true,
            BarShape::Rect => self.curvature_top != 0.0 || self.curvature_bottom != 0.0,
            _ => false,
        }
    }

    /// Half extents of the bounding box (before curvature)
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width, self.height) * 0.5
    }

    fn bulge(&self, curvature: f32, x: f32) -> f32 {
        let u = 2.0 * x / self.width;
        curvature * self.width * 0.25 * (1.0 - u * u)
    }

    fn top_edge(&self, x: f32) -> f32 {
        -self.height * 0.5 - self.bulge(self.curvature_top, x)
    }

    fn bottom_edge(&self, x: f32) -> f32 {
        self.height * 0.5 - self.bulge(self.curvature_bottom, x)
    }

    fn curve_xs(&self) -> impl Iterator<Item = f32> + '_ {
        (0..=CURVE_SEGMENTS)
            .map(move |i| -self.width * 0.5 + self.width * i as f32 / CURVE_SEGMENTS as f32)
    }

    /// Closed outline polygon in local space
    pub fn outline(&self) -> Vec<Vec2> {
        let half = self.half_extents();
        match self.shape {
            BarShape::Circle => (0..CIRCLE_SEGMENTS)
                .map(|i| {
                    let a = std::f32::consts::TAU * i as f32 / CIRCLE_SEGMENTS as f32;
                    Vec2::new(a.cos(), a.sin()) * half.x
                })
                .collect(),
            BarShape::Triangle => vec![
                Vec2::new(-half.x, half.y),
                Vec2::new(0.0, -half.y),
                Vec2::new(half.x, half.y),
            ],
            _ if self.is_curved() => {
                let mut points: Vec<Vec2> =
                    self.curve_xs().map(|x| Vec2::new(x, self.top_edge(x))).collect();
                let bottom: Vec<Vec2> =
                    self.curve_xs().map(|x| Vec2::new(x, self.bottom_edge(x))).collect();
                points.extend(bottom.into_iter().rev());
                points
            }
            _ => vec![
                Vec2::new(-half.x, -half.y),
                Vec2::new(half.x, -half.y),
                Vec2::new(half.x, half.y),
                Vec2::new(-half.x, half.y),
            ],
        }
    }

    /// Convex pieces that together cover the outline
    ///
    /// Curved bars become one quad per segment; every other shape is a single
    /// convex polygon.
    pub fn convex_parts(&self) -> Vec<Vec<Vec2>> {
        if !self.is_curved() {
            return vec![self.outline()];
        }
        let xs: Vec<f32> = self.curve_xs().collect();
        xs.windows(2)
            .map(|pair| {
                let (x0, x1) = (pair[0], pair[1]);
                vec![
                    Vec2::new(x0, self.top_edge(x0)),
                    Vec2::new(x1, self.top_edge(x1)),
                    Vec2::new(x1, self.bottom_edge(x1)),
                    Vec2::new(x0, self.bottom_edge(x0)),
                ]
            })
            .collect()
    }

    /// Point-in-shape test in local space
    pub fn contains_local(&self, p: Vec2) -> bool {
        if self.shape == BarShape::Circle {
            return p.length() <= self.width * 0.5;
        }
        self.convex_parts()
            .iter()
            .any(|part| point_in_convex(part, p))
    }
}

/// Point-in-convex-polygon test that accepts either winding
pub fn point_in_convex(polygon: &[Vec2], p: Vec2) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for (i, a) in polygon.iter().enumerate() {
        let b = polygon[(i + 1) % polygon.len()];
        let cross = (b - *a).perp_dot(p - *a);
        if cross.abs() < f32::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Bar activation state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BarState {
    /// Never hit since placement or last reset
    Dormant,
    /// Hit at least once; keeps its accent color until reset
    Activated { color: Color },
}

/// A user-placed obstacle
#[derive(Debug)]
pub struct Bar {
    pub id: EntityId,
    /// Placed position (seesaws pivot here)
    pub pos: Vec2,
    /// Placed angle (the seesaw rest angle)
    pub angle: f32,
    pub geometry: BarGeometry,
    pub note: Note,
    /// Per-bar override of the scene instrument
    pub instrument: Option<Instrument>,
    /// Bar breaks after this many hits
    pub max_hits: Option<u32>,
    pub hits: u32,
    pub state: BarState,
    /// Render intensity, 1.0 on hit, decays toward 0
    pub glow: f32,
    pub(crate) body: BarBody,
}

impl Bar {
    /// Current display color
    pub fn color(&self) -> Color {
        match self.state {
            BarState::Dormant => palette::NEUTRAL,
            BarState::Activated { color } => color,
        }
    }

    pub fn is_activated(&self) -> bool {
        matches!(self.state, BarState::Activated { .. })
    }

    pub fn is_seesaw(&self) -> bool {
        matches!(self.body, BarBody::Seesaw(_))
    }

    /// Register a ball hit; picks an accent color on the first hit only
    pub fn hit<R: Rng>(&mut self, rng: &mut R) -> Color {
        if self.state == BarState::Dormant {
            let color = palette::ACCENTS[rng.random_range(0..palette::ACCENTS.len())];
            self.state = BarState::Activated { color };
        }
        self.glow = 1.0;
        self.hits = self.hits.saturating_add(1);
        self.color()
    }

    /// Back to dormant; the physics body is kept
    pub fn reset(&mut self) {
        self.state = BarState::Dormant;
        self.glow = 0.0;
        self.hits = 0;
    }

    pub fn decay_glow(&mut self, dt: f32) {
        if self.glow > 0.0 {
            self.glow *= GLOW_DECAY_PER_SEC.powf(dt);
            if self.glow < 0.01 {
                self.glow = 0.0;
            }
        }
    }

    /// Whether the hit limit has been reached
    pub fn is_spent(&self) -> bool {
        self.max_hits.is_some_and(|max| self.hits >= max)
    }
}

/// A dormant ball waiting to be knocked awake
#[derive(Debug)]
pub struct Placeholder {
    pub id: EntityId,
    pub pos: Vec2,
    pub radius: f32,
    pub focused: bool,
    pub(crate) sensor: RigidBodyHandle,
}

/// Ball emitter
#[derive(Debug, Clone, PartialEq)]
pub struct Spawner {
    pub id: EntityId,
    pub pos: Vec2,
    /// Radius of emitted balls
    pub radius: f32,
    /// Delay before emitting in a timed sequence
    pub delay_ms: u32,
}

/// A particle for visual effects
#[derive(Debug, Clone)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub color: Color,
    pub life: f32, // 0-1, decreases over time
    pub size: f32,
}
