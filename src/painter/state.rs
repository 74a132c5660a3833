use super::*;
use crate::render_state::Detached;

impl<B: GpuBackend> Painter<B> {
    /// Saves the current state. `token`, if given, receives the current batch position.
    pub fn push_state(&mut self, token: Option<&mut BatchToken>) {
        if let Some(token) = token {
            *token = self.processors.active().fill_token();
        }

        if self.state_stack_pos == self.state_stack.len() {
            self.state_stack.push(self.state.clone());
        } else {
            self.state_stack[self.state_stack_pos].copy_from(&self.state, &mut Detached);
        }
        self.state_stack_pos += 1;
    }

    /// Restores the most recently saved state, flushing if it differs incompatibly. `token`, if
    /// given, receives the batch position after the restore.
    ///
    /// Panics if nothing was pushed.
    pub fn pop_state(&mut self, token: Option<&mut BatchToken>) {
        if self.state_stack_pos == 0 {
            panic!("cannot pop empty state stack");
        }
        self.state_stack_pos -= 1;

        let Painter {
            state,
            state_stack,
            processors,
            output,
            state_stack_pos,
            ..
        } = self;
        state.copy_from(
            &state_stack[*state_stack_pos],
            &mut flush_on_change(processors, output),
        );

        if let Some(token) = token {
            *token = self.processors.active().fill_token();
        }
    }

    /// Resets the current state to the most recently saved one without popping it.
    ///
    /// Panics if nothing was pushed.
    pub fn restore_state(&mut self) {
        if self.state_stack_pos == 0 {
            panic!("cannot restore from empty state stack");
        }

        let Painter {
            state,
            state_stack,
            processors,
            output,
            state_stack_pos,
            ..
        } = self;
        state.copy_from(
            &state_stack[*state_stack_pos - 1],
            &mut flush_on_change(processors, output),
        );
    }

    /// Prepends `transform`, multiplies alpha by `alpha` and applies `blend_mode` unless it is
    /// `Auto`.
    pub fn set_state_to(&mut self, transform: Option<&Matrix2D>, alpha: f32, blend_mode: BlendMode) {
        if let Some(transform) = transform {
            self.state.transform_modelview_matrix(transform);
        }
        if alpha != 1.0 {
            self.state.scale_alpha(alpha);
        }
        self.set_blend_mode(blend_mode);
    }

    pub fn state_stack_depth(&self) -> usize {
        self.state_stack_pos
    }

    pub fn set_blend_mode(&mut self, blend_mode: BlendMode) {
        let Painter {
            state,
            processors,
            output,
            ..
        } = self;
        state.set_blend_mode(blend_mode, &mut flush_on_change(processors, output));
    }

    pub fn set_clip_rect(&mut self, clip_rect: Option<Rect>) {
        let Painter {
            state,
            processors,
            output,
            ..
        } = self;
        state.set_clip_rect(clip_rect, &mut flush_on_change(processors, output));
    }

    pub fn set_render_target(&mut self, target: Option<TextureId>, options: RenderTargetOptions) {
        let Painter {
            state,
            processors,
            output,
            ..
        } = self;
        state.set_render_target(target, options, &mut flush_on_change(processors, output));
    }

    pub fn set_projection_matrix(&mut self, projection: Matrix3D) {
        let Painter {
            state,
            processors,
            output,
            ..
        } = self;
        state.set_projection_matrix(projection, &mut flush_on_change(processors, output));
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.state.set_alpha(alpha);
    }

    pub fn transform_modelview_matrix(&mut self, matrix: &Matrix2D) {
        self.state.transform_modelview_matrix(matrix);
    }

    pub fn set_modelview_matrix(&mut self, matrix: Matrix2D) {
        self.state.set_modelview_matrix(matrix);
    }
}
