//! The GPU resource layer consumed by batches and the painter.
//!
//! Backends own buffers, compiled programs, sampler state and framebuffers. Program caches live
//! inside each backend instance.

mod recording;
mod wgpu_backend;

pub use recording::{GpuCommand, RecordedDraw, RecordingBackend};
pub use wgpu_backend::{WgpuBackend, WgpuBackendConfig};

use crate::blend::BlendMode;
use crate::color::Color;
use crate::error::BackendError;
use crate::id::{BufferHandle, ProgramHandle, TextureId};
use crate::render_state::RenderTargetOptions;
use crate::style::{SamplerState, StyleType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// How often the contents of a buffer are expected to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Static,
    Dynamic,
}

/// Identifies one program variant: a style type, with or without a sampled texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub style_type: StyleType,
    pub textured: bool,
}

impl ProgramKey {
    pub fn name(&self) -> String {
        let variant = if self.textured { "textured" } else { "colored" };
        format!("style{}.{}", self.style_type.0, variant)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    TriangleList,
}

/// Scissor rectangle in target pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One indexed draw.
#[derive(Debug, Clone)]
pub struct DrawCall<'a> {
    pub primitive: PrimitiveType,
    pub program: ProgramHandle,
    pub vertex_buffer: BufferHandle,
    pub index_buffer: BufferHandle,
    /// Layout of `vertex_buffer`, as given by the mesh style.
    pub vertex_format: wgpu::VertexBufferLayout<'a>,
    pub index_count: u32,
    pub texture: Option<TextureId>,
    /// Column-major model-view-projection matrix.
    pub mvp: [f32; 16],
    pub alpha: f32,
}

pub trait GpuBackend {
    fn create_buffer(&mut self, kind: BufferKind, size: u64, usage: BufferUsage) -> BufferHandle;

    /// Writes `bytes` at the start of `buffer`, which must be at least that large.
    fn upload_buffer(&mut self, buffer: BufferHandle, bytes: &[u8]);

    fn dispose_buffer(&mut self, buffer: BufferHandle);

    /// Compiles the program for `key` on first use and returns the cached handle afterwards.
    fn program(&mut self, key: &ProgramKey) -> ProgramHandle;

    fn draw(&mut self, call: &DrawCall<'_>);

    fn set_sampler_state(&mut self, texture: TextureId, sampler: SamplerState);

    fn reset_sampler_state(&mut self, texture: TextureId);

    fn set_blend_mode(&mut self, blend_mode: BlendMode);

    /// Directs subsequent draws to `target`, or to the back buffer for `None`.
    fn bind_framebuffer(
        &mut self,
        target: Option<TextureId>,
        options: RenderTargetOptions,
    ) -> Result<(), BackendError>;

    fn set_scissor_rect(&mut self, rect: Option<ScissorRect>);

    /// Pixel size of a registered texture.
    fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)>;

    fn configure_back_buffer(&mut self, width: u32, height: u32);

    /// Clears the bound target. `alpha` multiplies the alpha channel of `color`.
    fn clear(&mut self, color: Color, alpha: f32);

    fn present(&mut self) -> Result<(), BackendError>;
}
