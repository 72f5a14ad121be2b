//! Pan/zoom view onto the infinite canvas
//!
//! `offset` is the world point under the screen's top-left corner.

use glam::Vec2;

use crate::sim::Bounds;

pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub offset: Vec2,
    pub zoom: f32,
    /// Screen size in pixels
    pub viewport: Vec2,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec2::new(1280.0, 720.0))
    }
}

impl Camera {
    /// Camera centered on the world origin
    pub fn new(viewport: Vec2) -> Self {
        Self {
            offset: -viewport * 0.5,
            zoom: 1.0,
            viewport,
        }
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        screen / self.zoom + self.offset
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        (world - self.offset) * self.zoom
    }

    /// Move the view by a screen-space drag
    pub fn pan_by(&mut self, screen_delta: Vec2) {
        self.offset -= screen_delta / self.zoom;
    }

    /// Scale by `factor`, keeping the world point under `anchor` fixed
    pub fn zoom_at(&mut self, anchor: Vec2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world = self.screen_to_world(anchor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.offset = world - anchor / self.zoom;
    }

    pub fn resize(&mut self, viewport: Vec2) {
        let center = self.screen_to_world(self.viewport * 0.5);
        self.viewport = viewport;
        self.center_on(center);
    }

    pub fn center_on(&mut self, world: Vec2) {
        self.offset = world - self.viewport * 0.5 / self.zoom;
    }

    /// Zoom and center so `bounds` fits with a margin
    pub fn fit(&mut self, bounds: Bounds, margin: f32) {
        let size = (bounds.max - bounds.min + Vec2::splat(margin * 2.0)).max(Vec2::ONE);
        let zoom = (self.viewport / size).min_element();
        self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        self.center_on((bounds.min + bounds.max) * 0.5);
    }

    /// World rectangle currently on screen
    pub fn visible_bounds(&self) -> Bounds {
        Bounds::new(self.offset, self.offset + self.viewport / self.zoom)
    }
}
