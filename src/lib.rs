//! Draw-call batching and a frame-coherent render cache for 2D scene graphs.
//!
//! A scene traversal feeds meshes to a [`Painter`]. The painter bakes them into as few
//! [`MeshBatch`]es as possible, flushing only when the render state changes in a way a batch
//! cannot absorb, and records every batch so unchanged subtrees can be replayed next frame with
//! [`Painter::draw_from_cache`] instead of being transformed again.

pub use wgpu;

mod backend;
mod batch;
mod blend;
mod color;
mod config;
mod error;
pub mod geom;
mod id;
mod mesh;
mod painter;
mod render_state;
mod style;
mod vertex;

pub use backend::{
    BufferKind, BufferUsage, DrawCall, GpuBackend, GpuCommand, PrimitiveType, ProgramKey,
    RecordedDraw, RecordingBackend, ScissorRect, WgpuBackend, WgpuBackendConfig,
};
pub use batch::{
    BatchId, BatchListener, BatchProcessor, BatchToken, MeshBatch, MeshBatchPool, MAX_NUM_VERTICES,
};
pub use blend::BlendMode;
pub use color::Color;
pub use config::{PainterConfig, Viewport};
pub use error::{BackendError, MeshError, PainterError};
pub use id::{BufferHandle, NodeId, ProgramHandle, TextureId};
pub use mesh::{Mesh, MeshSource, MeshSubset};
pub use painter::{CacheInvalidator, FrameStats, Mask, Painter};
pub use render_state::{Detached, DrawRequired, RenderState, RenderTargetOptions};
pub use style::{MeshStyle, SamplerState, StyleType, TextureSmoothing};
pub use vertex::Vertex;
