use super::*;
use crate::geom::orthographic_projection;
use crate::render_state::Detached;

impl<B: GpuBackend> Painter<B> {
    /// Resizes the back buffer and points the stage projection at `viewport`.
    pub fn configure_back_buffer(&mut self, viewport: Viewport) {
        let (width, height) = viewport.physical_size();
        self.viewport = viewport;
        self.output.back_buffer_size = (width, height);
        self.output.backend.configure_back_buffer(width, height);

        self.stage_projection =
            orthographic_projection(viewport.x, viewport.y, viewport.width, viewport.height);
        self.set_projection_matrix(self.stage_projection);

        tracing::debug!(
            "back buffer configured to {width}x{height} for a {}x{} stage",
            viewport.width,
            viewport.height
        );
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Starts a frame. What the cache processor recorded last frame becomes replayable through
    /// [`draw_from_cache`](Self::draw_from_cache), and all state is reset.
    pub fn next_frame(&mut self) {
        self.frame_id = self.frame_id.wrapping_add(1);

        let Painter {
            processors,
            output,
            config,
            frame_id,
            ..
        } = self;

        if is_trim_frame(*frame_id, config.trim_current_interval) {
            tracing::debug!("trimming cache batch pool on frame {frame_id}");
            processors.curr.trim(&mut output.backend);
        }
        if is_trim_frame(*frame_id, config.trim_speculative_interval) {
            tracing::debug!("trimming speculative batch pool on frame {frame_id}");
            processors.speculative.trim(&mut output.backend);
        }

        std::mem::swap(&mut processors.curr, &mut processors.prev);
        processors.curr.clear();
        processors.speculative.clear();
        processors.active = if config.cache_enabled {
            Active::Cache
        } else {
            Active::Speculative
        };

        output.actual_target = None;
        output.actual_blend_mode = None;
        output.actual_scissor = None;
        output.draw_count = 0;
        self.last_frame_stats = std::mem::take(&mut self.output.stats);

        self.clip_rect_stack.clear();
        self.cache_exclusions.clear();
        self.state_stack_pos = 0;
        self.state.reset();
        self.state
            .set_projection_matrix(self.stage_projection, &mut Detached);
    }

    /// Ends the cacheable part of the frame. Anything drawn afterwards goes to the speculative
    /// processor, and the objects excluded from the cache are handed to `invalidator`.
    pub fn finish_frame(&mut self, invalidator: &mut impl CacheInvalidator) {
        self.finish_mesh_batch();
        self.processors.active = Active::Speculative;

        for node in self.cache_exclusions.drain(..) {
            invalidator.exclude_from_cache(node);
        }
    }

    /// Draws whatever is pending and shows the back buffer.
    pub fn present(&mut self) -> Result<(), PainterError> {
        self.finish_mesh_batch();
        self.set_render_target(None, RenderTargetOptions::default());
        self.output.apply_render_target(&self.state);

        self.output.backend.present()?;
        Ok(())
    }

    /// Releases the GPU buffers of every batch.
    pub fn dispose(&mut self) {
        let Painter {
            processors, output, ..
        } = self;
        for processor in [
            &mut processors.curr,
            &mut processors.prev,
            &mut processors.speculative,
        ] {
            processor.dispose(&mut output.backend);
        }
    }
}

fn is_trim_frame(frame_id: u32, interval: u32) -> bool {
    interval > 0 && frame_id % interval == 0
}
