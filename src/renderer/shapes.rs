//! Triangle-list generation for 2D primitives
//!
//! Every function appends to a caller-owned buffer in screen space.

use glam::Vec2;
use std::f32::consts::PI;

use super::vertex::Vertex;
use crate::sim::{Color, TrailPoint};

/// Speed (px/s) at which trails reach their hottest color
const TRAIL_HOT_SPEED: f32 = 900.0;

fn push_tri(out: &mut Vec<Vertex>, a: Vec2, b: Vec2, c: Vec2, color: Color) {
    out.push(Vertex::new(a.x, a.y, color));
    out.push(Vertex::new(b.x, b.y, color));
    out.push(Vertex::new(c.x, c.y, color));
}

/// Tint a color toward white by speed, fading alpha
fn trail_color(base: Color, speed: f32, alpha: f32) -> Color {
    let t = (speed / TRAIL_HOT_SPEED).clamp(0.0, 1.0) * 0.5;
    [
        base[0] + (1.0 - base[0]) * t,
        base[1] + (1.0 - base[1]) * t,
        base[2] + (1.0 - base[2]) * t,
        base[3] * alpha,
    ]
}

/// Tapered ribbon through a ball's trail (newest point first)
///
/// Trail points are in world space; `to_screen` maps them.
pub fn ball_trail(
    out: &mut Vec<Vertex>,
    trail: &[TrailPoint],
    to_screen: impl Fn(Vec2) -> Vec2,
    radius: f32,
    color: Color,
) {
    if trail.len() < 2 {
        return;
    }
    let len = trail.len() as f32;

    for i in 0..trail.len() - 1 {
        let (p1, p2) = (&trail[i], &trail[i + 1]);
        let (s1, s2) = (to_screen(p1.pos), to_screen(p2.pos));
        let t1 = i as f32 / len;
        let t2 = (i + 1) as f32 / len;

        let width1 = radius * (1.0 - t1 * 0.7);
        let width2 = radius * (1.0 - t2 * 0.7);
        let color1 = trail_color(color, p1.speed, (1.0 - t1) * 0.6);
        let color2 = trail_color(color, p2.speed, (1.0 - t2) * 0.6);

        let dir = (s2 - s1).normalize_or_zero();
        let perp = dir.perp();

        let v1a = s1 + perp * width1;
        let v1b = s1 - perp * width1;
        let v2a = s2 + perp * width2;
        let v2b = s2 - perp * width2;

        out.push(Vertex::new(v1a.x, v1a.y, color1));
        out.push(Vertex::new(v1b.x, v1b.y, color1));
        out.push(Vertex::new(v2a.x, v2a.y, color2));

        out.push(Vertex::new(v2a.x, v2a.y, color2));
        out.push(Vertex::new(v1b.x, v1b.y, color1));
        out.push(Vertex::new(v2b.x, v2b.y, color2));
    }
}

/// Filled circle
pub fn circle(out: &mut Vec<Vertex>, center: Vec2, radius: f32, color: Color, segments: u32) {
    let segments = segments.max(3);
    for i in 0..segments {
        let theta1 = (i as f32 / segments as f32) * 2.0 * PI;
        let theta2 = ((i + 1) as f32 / segments as f32) * 2.0 * PI;
        push_tri(
            out,
            center,
            center + Vec2::from_angle(theta1) * radius,
            center + Vec2::from_angle(theta2) * radius,
            color,
        );
    }
}

/// Hollow circle
pub fn ring(
    out: &mut Vec<Vertex>,
    center: Vec2,
    inner_radius: f32,
    outer_radius: f32,
    color: Color,
    segments: u32,
) {
    let segments = segments.max(3);
    for i in 0..segments {
        let d1 = Vec2::from_angle((i as f32 / segments as f32) * 2.0 * PI);
        let d2 = Vec2::from_angle(((i + 1) as f32 / segments as f32) * 2.0 * PI);

        let inner1 = center + d1 * inner_radius;
        let outer1 = center + d1 * outer_radius;
        let inner2 = center + d2 * inner_radius;
        let outer2 = center + d2 * outer_radius;

        push_tri(out, inner1, outer1, inner2, color);
        push_tri(out, inner2, outer1, outer2, color);
    }
}

/// Filled convex polygon as a triangle fan
pub fn convex_polygon(out: &mut Vec<Vertex>, points: &[Vec2], color: Color) {
    if points.len() < 3 {
        return;
    }
    for pair in points[1..].windows(2) {
        push_tri(out, points[0], pair[0], pair[1], color);
    }
}

/// Closed outline of constant screen width
pub fn outline(out: &mut Vec<Vertex>, points: &[Vec2], width: f32, color: Color) {
    let n = points.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        line(out, points[i], points[(i + 1) % n], width, color);
    }
}

/// Thick line segment
pub fn line(out: &mut Vec<Vertex>, a: Vec2, b: Vec2, width: f32, color: Color) {
    let perp = (b - a).normalize_or_zero().perp() * (width * 0.5);
    push_tri(out, a + perp, a - perp, b + perp, color);
    push_tri(out, b + perp, a - perp, b - perp, color);
}

/// Axis-aligned filled rectangle
pub fn rect(out: &mut Vec<Vertex>, min: Vec2, max: Vec2, color: Color) {
    push_tri(out, min, Vec2::new(max.x, min.y), max, color);
    push_tri(out, min, max, Vec2::new(min.x, max.y), color);
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Color = [1.0; 4];

    #[test]
    fn test_circle_vertex_count() {
        let mut out = Vec::new();
        circle(&mut out, Vec2::ZERO, 10.0, WHITE, 16);
        assert_eq!(out.len(), 16 * 3);
        assert!(out.iter().all(|v| Vec2::from(v.position).length() <= 10.0 + 1e-4));
    }

    #[test]
    fn test_polygon_fan() {
        let mut out = Vec::new();
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];
        convex_polygon(&mut out, &square, WHITE);
        assert_eq!(out.len(), 6);
        convex_polygon(&mut out, &square[..2], WHITE);
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn test_trail_needs_two_points() {
        let mut out = Vec::new();
        let point = |x: f32| TrailPoint {
            pos: Vec2::new(x, 0.0),
            speed: 100.0,
        };
        ball_trail(&mut out, &[point(0.0)], |p| p, 5.0, WHITE);
        assert!(out.is_empty());
        ball_trail(&mut out, &[point(0.0), point(1.0), point(2.0)], |p| p * 2.0, 5.0, WHITE);
        assert_eq!(out.len(), 12);
    }
}
