use thiserror::Error;

use crate::id::TextureId;

/// Failures reported by a [`GpuBackend`](crate::GpuBackend).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to create surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),
    #[error("no suitable adapter: {0}")]
    AdapterRequest(#[from] wgpu::RequestAdapterError),
    #[error("failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("failed to acquire surface texture: {0}")]
    SurfaceAcquisition(#[from] wgpu::SurfaceError),
    #[error("texture {0} is not registered")]
    UnknownTexture(TextureId),
    #[error("framebuffer for texture {target} is incomplete: {reason}")]
    FramebufferIncomplete { target: TextureId, reason: String },
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("tessellation failed: {0:?}")]
    Tessellation(#[from] lyon::tessellation::TessellationError),
    #[error("index {index} refers past the {num_vertices} vertices of the mesh")]
    IndexOutOfRange { index: u16, num_vertices: usize },
    #[error("mesh has {0} vertices, more than 16-bit indices can address")]
    TooManyVertices(usize),
}

#[derive(Debug, Error)]
pub enum PainterError {
    #[error("only untextured, axis-aligned rectangular masks are supported")]
    UnsupportedMask,
    #[error(transparent)]
    Backend(#[from] BackendError),
}
