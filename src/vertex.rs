use bytemuck::{Pod, Zeroable};

use crate::color::Color;
use crate::geom::{Matrix2D, Point};

/// The vertex layout shared by every mesh style. Colors are premultiplied.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex {
    /// Attribute bindings handed to the GPU layer on every draw.
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2, 2 => Float32x4];

    pub const SIZE: usize = std::mem::size_of::<Vertex>();

    pub fn new(x: f32, y: f32, u: f32, v: f32, color: Color) -> Self {
        Self {
            position: [x, y],
            tex_coords: [u, v],
            color: color.premultiplied(),
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::SIZE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    pub(crate) fn transformed(mut self, matrix: &Matrix2D) -> Self {
        let point = matrix.transform_point(Point::new(self.position[0], self.position[1]));
        self.position = [point.x, point.y];
        self
    }

    pub(crate) fn scale_alpha(&mut self, alpha: f32) {
        for channel in &mut self.color {
            *channel *= alpha;
        }
    }
}
