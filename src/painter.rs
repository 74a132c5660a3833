//! The painter coordinates scene traversal, batching, the render cache and the GPU.
//!
//! A frame looks like this:
//!
//! ```
//! use quilt::{Color, Mesh, Painter, PainterConfig, RecordingBackend, Viewport};
//! use quilt::geom::rect;
//!
//! let mut painter = Painter::new(RecordingBackend::new(), PainterConfig::default());
//! painter.configure_back_buffer(Viewport::new(320.0, 240.0));
//!
//! painter.next_frame();
//! painter.clear(Color::BLACK, 1.0);
//! painter.push_state(None);
//! painter.batch_mesh(&Mesh::quad(rect(0.0, 0.0, 10.0, 10.0), Color::WHITE), None);
//! painter.pop_state(None);
//! painter.finish_frame(&mut |_: quilt::NodeId| {});
//! painter.present().unwrap();
//!
//! assert_eq!(painter.backend().draw_count(), 1);
//! ```
//!
//! Three batch processors back the render cache. `curr` records the cacheable part of this
//! frame, `prev` holds what `curr` recorded last frame and is read by
//! [`draw_from_cache`](Painter::draw_from_cache), and `speculative` takes work that must not be
//! replayed (anything drawn with caching disabled or after [`finish_frame`](Painter::finish_frame)).

mod cache;
mod drawing;
mod frame;
mod masking;
mod state;
mod stats;

pub use masking::Mask;
pub use stats::FrameStats;

use smallvec::SmallVec;

use crate::backend::{GpuBackend, ScissorRect};
use crate::batch::{BatchProcessor, BatchToken, MeshBatch};
use crate::blend::BlendMode;
use crate::config::{PainterConfig, Viewport};
use crate::error::PainterError;
use crate::geom::{Matrix2D, Matrix3D, Rect};
use crate::id::{NodeId, TextureId};
use crate::mesh::{MeshSource, MeshSubset};
use crate::render_state::{RenderState, RenderTargetOptions};

/// Receives the objects excluded from the cache during a frame, so it can mark them (and their
/// ancestors) for a full redraw.
pub trait CacheInvalidator {
    fn exclude_from_cache(&mut self, node: NodeId);
}

impl<F> CacheInvalidator for F
where
    F: FnMut(NodeId),
{
    fn exclude_from_cache(&mut self, node: NodeId) {
        self(node)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Active {
    #[default]
    Cache,
    Speculative,
}

#[derive(Debug, Default)]
struct BatchProcessors {
    curr: BatchProcessor,
    prev: BatchProcessor,
    speculative: BatchProcessor,
    active: Active,
}

impl BatchProcessors {
    fn active(&self) -> &BatchProcessor {
        match self.active {
            Active::Cache => &self.curr,
            Active::Speculative => &self.speculative,
        }
    }

    fn active_mut(&mut self) -> &mut BatchProcessor {
        match self.active {
            Active::Cache => &mut self.curr,
            Active::Speculative => &mut self.speculative,
        }
    }

    /// Last frame's cache alongside the processor replayed batches are written to.
    fn replay_pair(&mut self) -> (&BatchProcessor, &mut BatchProcessor) {
        let active = match self.active {
            Active::Cache => &mut self.curr,
            Active::Speculative => &mut self.speculative,
        };
        (&self.prev, active)
    }

    fn finish_batch<B: GpuBackend>(&mut self, state: &RenderState, output: &mut Output<B>) {
        self.active_mut()
            .finish_batch(&mut |batch: &mut MeshBatch| output.draw_batch(state, batch));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AppliedTarget {
    target: Option<TextureId>,
    options: RenderTargetOptions,
}

/// The backend plus everything known about the state last applied to it.
struct Output<B> {
    backend: B,
    actual_blend_mode: Option<BlendMode>,
    actual_target: Option<AppliedTarget>,
    /// `None` until a scissor has been applied on the current target.
    actual_scissor: Option<Option<ScissorRect>>,
    back_buffer_size: (u32, u32),
    draw_count: usize,
    stats: FrameStats,
}

impl<B> Output<B> {
    fn new(backend: B) -> Self {
        Self {
            backend,
            actual_blend_mode: None,
            actual_target: None,
            actual_scissor: None,
            back_buffer_size: (0, 0),
            draw_count: 0,
            stats: FrameStats::default(),
        }
    }
}

/// A draw-required listener that flushes the active processor into `output`.
fn flush_on_change<'a, B: GpuBackend>(
    processors: &'a mut BatchProcessors,
    output: &'a mut Output<B>,
) -> impl FnMut(&RenderState) + 'a {
    move |state: &RenderState| processors.finish_batch(state, output)
}

pub struct Painter<B: GpuBackend> {
    output: Output<B>,
    processors: BatchProcessors,
    state: RenderState,
    state_stack: Vec<RenderState>,
    state_stack_pos: usize,
    clip_rect_stack: SmallVec<[Rect; 8]>,
    cache_exclusions: Vec<NodeId>,
    viewport: Viewport,
    stage_projection: Matrix3D,
    frame_id: u32,
    last_frame_stats: FrameStats,
    config: PainterConfig,
}

impl<B: GpuBackend> Painter<B> {
    pub fn new(backend: B, config: PainterConfig) -> Self {
        let processors = BatchProcessors {
            active: if config.cache_enabled {
                Active::Cache
            } else {
                Active::Speculative
            },
            ..BatchProcessors::default()
        };

        Self {
            output: Output::new(backend),
            processors,
            state: RenderState::new(),
            state_stack: Vec::with_capacity(config.state_stack_capacity),
            state_stack_pos: 0,
            clip_rect_stack: SmallVec::new(),
            cache_exclusions: Vec::new(),
            viewport: Viewport::new(0.0, 0.0),
            stage_projection: Matrix3D::identity(),
            frame_id: 0,
            last_frame_stats: FrameStats::default(),
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.output.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.output.backend
    }

    pub fn config(&self) -> &PainterConfig {
        &self.config
    }

    /// The current render state. Mutate it through the painter so that flushes happen.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Draw calls issued since the frame started.
    pub fn draw_count(&self) -> usize {
        self.output.draw_count
    }

    pub fn frame_stats(&self) -> &FrameStats {
        &self.output.stats
    }

    pub fn last_frame_stats(&self) -> &FrameStats {
        &self.last_frame_stats
    }

    /// The position the next batched mesh will be written to in the active processor.
    pub fn fill_token(&self) -> BatchToken {
        self.processors.active().fill_token()
    }
}
