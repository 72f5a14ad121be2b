//! Pointer gestures and bar handles
//!
//! Screen events are mapped into world space by the editor; this module
//! holds the in-progress gesture and the handle geometry it hit-tests.

use glam::Vec2;

use crate::rotate;
use crate::sim::{Bar, BarGeometry, Bounds, EntityId, Item};

/// Rotation snap step with shift held (15°)
pub const ROTATE_SNAP: f32 = std::f32::consts::PI / 12.0;
/// Handle hit radius in screen pixels
pub const HANDLE_RADIUS: f32 = 8.0;
/// Distance of the rotate handle above a bar, in screen pixels
pub const ROTATE_HANDLE_GAP: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    /// Toggle selection, marquee on empty space, snap rotation
    pub shift: bool,
}

/// Which bar handle the pointer grabbed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Resize,
    Rotate,
}

/// Drag in progress
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Dragging the view (screen coordinates)
    Pan { last: Vec2 },
    /// Dragging the selection; each item keeps its starting position
    Move {
        grab: Vec2,
        items: Vec<(Item, Vec2)>,
        moved: bool,
    },
    /// Dragging a bar's corner; size is symmetric about the center
    Resize {
        bar: EntityId,
        pos: Vec2,
        angle: f32,
        geometry: BarGeometry,
    },
    /// Dragging a bar's rotate handle around its center
    Rotate { bar: EntityId, pos: Vec2 },
    /// Rubber-band selection (world coordinates)
    Marquee { start: Vec2, current: Vec2 },
}

impl Gesture {
    /// Whether finishing this gesture changed the scene
    pub fn edits_scene(&self) -> bool {
        match self {
            Gesture::Move { moved, .. } => *moved,
            Gesture::Resize { .. } | Gesture::Rotate { .. } => true,
            _ => false,
        }
    }

    pub fn marquee_bounds(&self) -> Option<Bounds> {
        match self {
            Gesture::Marquee { start, current } => Some(Bounds::new(*start, *current)),
            _ => None,
        }
    }
}

/// World position of a bar's resize handle (bottom-right corner)
pub fn resize_handle(bar: &Bar) -> Vec2 {
    bar.pos + rotate(bar.geometry.half_extents(), bar.angle)
}

/// World position of a bar's rotate handle, a fixed screen gap above the top edge
pub fn rotate_handle(bar: &Bar, zoom: f32) -> Vec2 {
    let up = bar.geometry.half_extents().y + ROTATE_HANDLE_GAP / zoom;
    bar.pos + rotate(Vec2::new(0.0, -up), bar.angle)
}

/// Handle under a world point, if any
pub fn handle_at(bar: &Bar, world: Vec2, zoom: f32) -> Option<Handle> {
    let reach = HANDLE_RADIUS / zoom;
    if rotate_handle(bar, zoom).distance(world) <= reach {
        Some(Handle::Rotate)
    } else if resize_handle(bar).distance(world) <= reach {
        Some(Handle::Resize)
    } else {
        None
    }
}

/// Angle of a rotate drag; the handle sits straight above the center
pub fn drag_angle(center: Vec2, pointer: Vec2, snap: bool) -> f32 {
    let d = pointer - center;
    let angle = d.y.atan2(d.x) + std::f32::consts::FRAC_PI_2;
    let angle = crate::normalize_angle(angle);
    if snap { snap_angle(angle, ROTATE_SNAP) } else { angle }
}

/// Round to the nearest multiple of `step`
pub fn snap_angle(angle: f32, step: f32) -> f32 {
    if step <= 0.0 {
        return angle;
    }
    (angle / step).round() * step
}

/// Geometry after dragging the resize handle to a bar-local point
pub fn resized(geometry: &BarGeometry, local: Vec2) -> BarGeometry {
    BarGeometry {
        width: local.x.abs() * 2.0,
        height: local.y.abs() * 2.0,
        ..*geometry
    }
    .clamped()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::MIN_BAR_SIZE;
    use crate::sim::BarShape;

    #[test]
    fn test_snap_angle() {
        assert_eq!(snap_angle(0.1, ROTATE_SNAP), 0.0);
        assert!((snap_angle(0.2, ROTATE_SNAP) - ROTATE_SNAP).abs() < 1e-6);
        assert_eq!(snap_angle(0.3, 0.0), 0.3);
    }

    #[test]
    fn test_drag_angle_straight_up_is_zero() {
        let a = drag_angle(Vec2::ZERO, Vec2::new(0.0, -50.0), false);
        assert!(a.abs() < 1e-6);
        let right = drag_angle(Vec2::ZERO, Vec2::new(50.0, 0.0), false);
        assert!((right - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn test_resized_respects_minimum_and_circle() {
        let rect = BarGeometry::new(BarShape::Rect, 100.0, 20.0);
        let g = resized(&rect, Vec2::new(-70.0, 1.0));
        assert_eq!(g.width, 140.0);
        assert_eq!(g.height, MIN_BAR_SIZE);

        let circle = BarGeometry::new(BarShape::Circle, 40.0, 40.0);
        let g = resized(&circle, Vec2::new(30.0, 5.0));
        assert_eq!((g.width, g.height), (60.0, 60.0));
    }

    #[test]
    fn test_edits_scene() {
        assert!(!Gesture::Idle.edits_scene());
        assert!(!Gesture::Move { grab: Vec2::ZERO, items: vec![], moved: false }.edits_scene());
        assert!(Gesture::Rotate { bar: 1, pos: Vec2::ZERO }.edits_scene());
    }
}
