//! Vertex types for 2D rendering

use bytemuck::{Pod, Zeroable};

/// Simple 2D vertex with position and color
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    /// Bytes between consecutive vertices
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();
    /// Byte offset of `color` (after the two position floats)
    pub const COLOR_OFFSET: usize = std::mem::size_of::<[f32; 2]>();

    pub const fn new(x: f32, y: f32, color: [f32; 4]) -> Self {
        Self {
            position: [x, y],
            color,
        }
    }
}

/// Editor overlay colors
pub mod colors {
    pub const HANDLE: [f32; 4] = [1.0, 1.0, 1.0, 0.9];
    pub const MARQUEE: [f32; 4] = [0.4, 0.7, 1.0, 0.25];
}
