//! Screen-space geometry for an external rasterizer
//!
//! `DrawList::build` walks the editor's scene against its camera and emits a
//! flat triangle list. Consumers upload `as_bytes()` as-is.

pub mod shapes;
pub mod vertex;

use glam::Vec2;

pub use vertex::{Vertex, colors};

use crate::editor::Editor;
use crate::input;
use crate::rotate;
use crate::sim::{Bar, Color, Item, palette};

const CIRCLE_SEGMENTS: u32 = 20;
const OUTLINE_WIDTH: f32 = 2.0;

/// One frame's triangles
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub vertices: Vec<Vertex>,
}

/// Bar color brightened by its glow
fn glow_color(base: Color, glow: f32) -> Color {
    let t = glow.clamp(0.0, 1.0) * 0.6;
    [
        base[0] + (1.0 - base[0]) * t,
        base[1] + (1.0 - base[1]) * t,
        base[2] + (1.0 - base[2]) * t,
        base[3],
    ]
}

fn with_alpha(mut color: Color, alpha: f32) -> Color {
    color[3] *= alpha;
    color
}

impl DrawList {
    pub fn build(editor: &Editor) -> Self {
        let mut list = DrawList {
            vertices: Vec::with_capacity(4096),
        };
        let scene = editor.scene();
        let camera = &editor.camera;
        let zoom = camera.zoom;
        let to_screen = |p: Vec2| camera.world_to_screen(p);

        for spawner in scene.spawners() {
            let center = to_screen(spawner.pos);
            let r = spawner.radius * zoom;
            shapes::ring(&mut list.vertices, center, r, r + 3.0, palette::SPAWNER, CIRCLE_SEGMENTS);
        }

        for placeholder in scene.placeholders() {
            let center = to_screen(placeholder.pos);
            let r = placeholder.radius * zoom;
            shapes::circle(&mut list.vertices, center, r, palette::PLACEHOLDER, CIRCLE_SEGMENTS);
            if placeholder.focused {
                shapes::ring(&mut list.vertices, center, r + 2.0, r + 4.0, palette::SELECTION, CIRCLE_SEGMENTS);
            }
        }

        for bar in scene.bars() {
            let (pos, angle) = scene.bar_pose(bar.id).unwrap_or((bar.pos, bar.angle));
            let color = glow_color(bar.color(), bar.glow);
            for part in bar.geometry.convex_parts() {
                let points: Vec<Vec2> = part
                    .iter()
                    .map(|p| to_screen(pos + rotate(*p, angle)))
                    .collect();
                shapes::convex_polygon(&mut list.vertices, &points, color);
            }
        }

        for ball in scene.balls() {
            shapes::ball_trail(&mut list.vertices, &ball.trail, to_screen, ball.radius * zoom, ball.color);
            if let Some(pos) = scene.ball_position(ball.id) {
                shapes::circle(&mut list.vertices, to_screen(pos), ball.radius * zoom, ball.color, CIRCLE_SEGMENTS);
            }
        }

        for particle in scene.particles() {
            let color = with_alpha(particle.color, particle.life.clamp(0.0, 1.0));
            shapes::circle(&mut list.vertices, to_screen(particle.pos), particle.size * zoom, color, 6);
        }

        list.selection(editor);
        list
    }

    fn selection(&mut self, editor: &Editor) {
        let scene = editor.scene();
        let camera = &editor.camera;
        let to_screen = |p: Vec2| camera.world_to_screen(p);

        for item in editor.selection() {
            match item {
                Item::Bar(id) => {
                    if let Some(bar) = scene.bar(*id) {
                        let points: Vec<Vec2> = bar
                            .geometry
                            .outline()
                            .iter()
                            .map(|p| to_screen(bar.pos + rotate(*p, bar.angle)))
                            .collect();
                        shapes::outline(&mut self.vertices, &points, OUTLINE_WIDTH, palette::SELECTION);
                    }
                }
                Item::Spawner(id) => {
                    if let Some(s) = scene.spawner(*id) {
                        let r = s.radius * camera.zoom + 5.0;
                        shapes::ring(&mut self.vertices, to_screen(s.pos), r, r + OUTLINE_WIDTH, palette::SELECTION, CIRCLE_SEGMENTS);
                    }
                }
                // Focus ring is drawn with the placeholder
                Item::Placeholder(_) => {}
            }
        }

        if let [Item::Bar(id)] = editor.selection() {
            if let Some(bar) = scene.bar(*id) {
                self.handles(bar, editor);
            }
        }

        if let Some(area) = editor.gesture().marquee_bounds() {
            shapes::rect(&mut self.vertices, to_screen(area.min), to_screen(area.max), colors::MARQUEE);
        }
    }

    fn handles(&mut self, bar: &Bar, editor: &Editor) {
        let camera = &editor.camera;
        let size = input::HANDLE_RADIUS * 0.75;
        let resize = camera.world_to_screen(input::resize_handle(bar));
        let rotate_at = camera.world_to_screen(input::rotate_handle(bar, camera.zoom));
        let top = camera.world_to_screen(bar.pos + rotate(Vec2::new(0.0, -bar.geometry.height * 0.5), bar.angle));

        shapes::rect(&mut self.vertices, resize - Vec2::splat(size), resize + Vec2::splat(size), colors::HANDLE);
        shapes::line(&mut self.vertices, top, rotate_at, 1.0, colors::HANDLE);
        shapes::circle(&mut self.vertices, rotate_at, size, colors::HANDLE, 12);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Raw vertex bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Vertex data as interleaved floats
    pub fn as_floats(&self) -> &[f32] {
        bytemuck::cast_slice(&self.vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::BarShape;

    #[test]
    fn test_empty_scene_draws_nothing() {
        let editor = Editor::default();
        assert!(DrawList::build(&editor).is_empty());
    }

    #[test]
    fn test_selected_bar_has_handles() {
        let mut editor = Editor::default();
        editor.add_bar(Vec2::ZERO, BarShape::Rect);
        let selected = DrawList::build(&editor).len();
        editor.clear_selection();
        let plain = DrawList::build(&editor).len();
        assert!(selected > plain);
        assert_eq!(plain, 6); // one quad
    }

    #[test]
    fn test_bytes_match_vertices() {
        let mut editor = Editor::default();
        editor.add_spawner(Vec2::ZERO);
        let list = DrawList::build(&editor);
        assert_eq!(list.as_bytes().len(), list.len() * Vertex::STRIDE);
        assert_eq!(list.as_floats().len(), list.len() * 6);
    }
}
