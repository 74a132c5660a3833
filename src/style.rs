//! Mesh styles: the rendering technique of a mesh.
//!
//! A style decides which program draws a mesh and which sampler state its texture uses. Batching
//! only compares styles by [`StyleType`] tag plus texture, never by behaviour.

use crate::backend::{GpuBackend, ProgramKey};
use crate::id::TextureId;
use crate::vertex::Vertex;

/// Small integer tag identifying a rendering technique. Keys the batch pool and program variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleType(pub u16);

impl StyleType {
    /// Flat colored or textured triangles, the built-in technique.
    pub const BASIC: StyleType = StyleType(0);
}

impl Default for StyleType {
    fn default() -> Self {
        Self::BASIC
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureSmoothing {
    None,
    #[default]
    Bilinear,
    Trilinear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerState {
    pub smoothing: TextureSmoothing,
    pub repeat: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeshStyle {
    pub style_type: StyleType,
    pub texture: Option<TextureId>,
    pub sampler: SamplerState,
}

impl MeshStyle {
    pub fn untextured(style_type: StyleType) -> Self {
        Self {
            style_type,
            texture: None,
            sampler: SamplerState::default(),
        }
    }

    pub fn textured(style_type: StyleType, texture: TextureId, sampler: SamplerState) -> Self {
        Self {
            style_type,
            texture: Some(texture),
            sampler,
        }
    }

    /// True if meshes of both styles can be drawn with one call.
    pub fn can_batch_with(&self, other: &MeshStyle) -> bool {
        if self.style_type != other.style_type {
            return false;
        }

        match (self.texture, other.texture) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b && self.sampler == other.sampler,
            _ => false,
        }
    }

    pub fn vertex_format(&self) -> wgpu::VertexBufferLayout<'static> {
        Vertex::layout()
    }

    pub fn program_key(&self) -> ProgramKey {
        ProgramKey {
            style_type: self.style_type,
            textured: self.texture.is_some(),
        }
    }

    pub(crate) fn before_draw(&self, gpu: &mut dyn GpuBackend) {
        if let Some(texture) = self.texture {
            gpu.set_sampler_state(texture, self.sampler);
        }
    }

    pub(crate) fn after_draw(&self, gpu: &mut dyn GpuBackend) {
        if let Some(texture) = self.texture {
            gpu.reset_sampler_state(texture);
        }
    }
}
