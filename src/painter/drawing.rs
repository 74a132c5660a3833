use super::*;
use crate::color::Color;
use crate::geom::{intersect_rects, project_point, rect, Point};

impl<B: GpuBackend> Output<B> {
    /// Draws a finished batch with the target and clip of `state`.
    pub(super) fn draw_batch(&mut self, state: &RenderState, batch: &mut MeshBatch) {
        if batch.is_empty() {
            return;
        }

        self.prepare_to_draw(state, batch.blend_mode());

        // Batched vertices are already in stage space.
        let mvp = *state.projection_matrix();
        batch.render(&mut self.backend, &mvp, 1.0);

        self.draw_count += 1;
        self.stats.draw_calls += 1;
    }

    pub(super) fn prepare_to_draw(&mut self, state: &RenderState, blend_mode: BlendMode) {
        self.apply_blend_mode(blend_mode);
        self.apply_render_target(state);
        self.apply_clip_rect(state);
    }

    fn apply_blend_mode(&mut self, blend_mode: BlendMode) {
        if self.actual_blend_mode != Some(blend_mode) {
            self.backend.set_blend_mode(blend_mode);
            self.actual_blend_mode = Some(blend_mode);
            self.stats.blend_mode_changes += 1;
        }
    }

    pub(super) fn apply_render_target(&mut self, state: &RenderState) {
        let wanted = AppliedTarget {
            target: state.render_target(),
            options: state.render_target_options(),
        };
        if self.actual_target == Some(wanted) {
            return;
        }

        let applied = match self.backend.bind_framebuffer(wanted.target, wanted.options) {
            Ok(()) => wanted,
            Err(error) => {
                tracing::warn!("{error}, drawing to the back buffer instead");
                let fallback = AppliedTarget {
                    target: None,
                    options: RenderTargetOptions::default(),
                };
                if let Err(error) = self.backend.bind_framebuffer(None, fallback.options) {
                    tracing::warn!("failed to bind the back buffer: {error}");
                }
                fallback
            }
        };

        self.actual_target = Some(applied);
        self.actual_scissor = None;
        self.stats.render_target_changes += 1;
    }

    fn apply_clip_rect(&mut self, state: &RenderState) {
        let scissor = state.clip_rect().map(|clip| self.scissor_rect(state, clip));
        if self.actual_scissor != Some(scissor) {
            self.backend.set_scissor_rect(scissor);
            self.actual_scissor = Some(scissor);
            self.stats.scissor_changes += 1;
        }
    }

    /// Projects `clip` into pixels of the bound target.
    fn scissor_rect(&self, state: &RenderState, clip: &Rect) -> ScissorRect {
        let (width, height) = self
            .actual_target
            .and_then(|applied| applied.target)
            .and_then(|texture| self.backend.texture_size(texture))
            .unwrap_or(self.back_buffer_size);
        let (width_f, height_f) = (width as f32, height as f32);

        let projection = state.projection_matrix();
        let top_left = project_point(projection, clip.min);
        let bottom_right = project_point(projection, clip.max);

        let x0 = (top_left.x * 0.5 + 0.5) * width_f;
        let y0 = (0.5 - top_left.y * 0.5) * height_f;
        let x1 = (bottom_right.x * 0.5 + 0.5) * width_f;
        let y1 = (0.5 - bottom_right.y * 0.5) * height_f;

        let projected = Rect::from_points([Point::new(x0, y0), Point::new(x1, y1)]);
        let visible = intersect_rects(&projected, &rect(0.0, 0.0, width_f, height_f));

        let scissor = ScissorRect {
            x: visible.min.x.round() as u32,
            y: visible.min.y.round() as u32,
            width: visible.width().round() as u32,
            height: visible.height().round() as u32,
        };

        if scissor.width < 1 || scissor.height < 1 {
            tracing::warn!(
                "clip rect {:?}..{:?} covers no pixels of the target, using a 1x1 scissor",
                clip.min,
                clip.max
            );
            return ScissorRect {
                x: 0,
                y: 0,
                width: 1,
                height: 1,
            };
        }

        scissor
    }
}

impl<B: GpuBackend> Painter<B> {
    /// Adds `subset` of `mesh` (all of it for `None`) to the active processor using the current
    /// state. The previous batch is drawn first if the mesh cannot join it.
    pub fn batch_mesh<M>(&mut self, mesh: &M, subset: Option<MeshSubset>)
    where
        M: MeshSource + ?Sized,
    {
        let Painter {
            state,
            processors,
            output,
            ..
        } = self;
        let state = &*state;

        output.stats.meshes_batched += 1;
        processors.active_mut().add_mesh(
            mesh,
            Some(state),
            subset,
            false,
            &mut |batch: &mut MeshBatch| output.draw_batch(state, batch),
        );
    }

    /// Draws the open batch of the active processor.
    pub fn finish_mesh_batch(&mut self) {
        self.processors.finish_batch(&self.state, &mut self.output);
    }

    /// Applies blend mode, render target and clip rect of the current state to the backend,
    /// skipping whatever is already in effect.
    pub fn prepare_to_draw(&mut self) {
        self.output
            .prepare_to_draw(&self.state, self.state.blend_mode());
    }

    /// Clears the current render target. Pending meshes are drawn first.
    pub fn clear(&mut self, color: Color, alpha: f32) {
        self.finish_mesh_batch();
        self.output.apply_render_target(&self.state);
        self.output.backend.clear(color, alpha);
    }
}
