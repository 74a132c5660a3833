//! The render state: everything that affects how the next mesh is drawn.
//!
//! Changes that cannot coexist with an in-progress batch (blend mode, clip rect, render target,
//! projection) notify a [`DrawRequired`] listener before the new value is committed. Alpha and
//! the modelview matrix are baked into vertices while batching and never notify.

use std::fmt;

use crate::blend::BlendMode;
use crate::geom::{Matrix2D, Matrix3D, Rect};
use crate::id::TextureId;

/// Receives the state as it was right before an incompatible change is committed.
pub trait DrawRequired {
    fn draw_required(&mut self, state: &RenderState);
}

impl<F> DrawRequired for F
where
    F: FnMut(&RenderState),
{
    fn draw_required(&mut self, state: &RenderState) {
        self(state)
    }
}

/// Listener for states that back nothing in flight, e.g. saved stack slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl DrawRequired for Detached {
    fn draw_required(&mut self, _state: &RenderState) {}
}

/// Packed render target options: antialiasing level in the low four bits, depth and stencil in
/// bit four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderTargetOptions(u8);

impl RenderTargetOptions {
    const ANTIALIASING_MASK: u8 = 0x0f;
    const DEPTH_AND_STENCIL: u8 = 0x10;

    pub fn new(antialiasing: u8, depth_and_stencil: bool) -> Self {
        let mut bits = antialiasing.min(Self::ANTIALIASING_MASK);
        if depth_and_stencil {
            bits |= Self::DEPTH_AND_STENCIL;
        }
        Self(bits)
    }

    pub fn antialiasing(self) -> u8 {
        self.0 & Self::ANTIALIASING_MASK
    }

    pub fn depth_and_stencil(self) -> bool {
        self.0 & Self::DEPTH_AND_STENCIL != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    alpha: f32,
    blend_mode: BlendMode,
    modelview: Matrix2D,
    projection: Matrix3D,
    clip_rect: Option<Rect>,
    render_target: Option<TextureId>,
    render_target_options: RenderTargetOptions,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            blend_mode: BlendMode::Normal,
            modelview: Matrix2D::identity(),
            projection: Matrix3D::identity(),
            clip_rect: None,
            render_target: None,
            render_target_options: RenderTargetOptions::default(),
        }
    }
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the defaults without notifying anyone.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copies every field of `other`. Notifies `listener` once beforehand if a field that
    /// invalidates the in-progress batch differs.
    pub fn copy_from(&mut self, other: &RenderState, listener: &mut impl DrawRequired) {
        let requires_draw = self.blend_mode != other.blend_mode
            || self.render_target != other.render_target
            || self.render_target_options != other.render_target_options
            || self.clip_rect != other.clip_rect
            || self.projection != other.projection;

        if requires_draw {
            listener.draw_required(self);
        }

        self.clone_from(other);
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha;
    }

    pub fn scale_alpha(&mut self, factor: f32) {
        self.alpha *= factor;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// `Auto` is ignored.
    pub fn set_blend_mode(&mut self, blend_mode: BlendMode, listener: &mut impl DrawRequired) {
        if blend_mode != BlendMode::Auto && blend_mode != self.blend_mode {
            listener.draw_required(self);
            self.blend_mode = blend_mode;
        }
    }

    pub fn modelview_matrix(&self) -> &Matrix2D {
        &self.modelview
    }

    pub fn set_modelview_matrix(&mut self, matrix: Matrix2D) {
        self.modelview = matrix;
    }

    /// Prepends `matrix`: it is applied to vertices before the current modelview.
    pub fn transform_modelview_matrix(&mut self, matrix: &Matrix2D) {
        self.modelview = matrix.then(&self.modelview);
    }

    pub fn set_modelview_matrices_to_identity(&mut self) {
        self.modelview = Matrix2D::identity();
    }

    pub fn projection_matrix(&self) -> &Matrix3D {
        &self.projection
    }

    pub fn set_projection_matrix(&mut self, projection: Matrix3D, listener: &mut impl DrawRequired) {
        if projection != self.projection {
            listener.draw_required(self);
            self.projection = projection;
        }
    }

    /// Modelview followed by projection, computed on every call.
    pub fn mvp_matrix_3d(&self) -> Matrix3D {
        self.modelview.to_3d().then(&self.projection)
    }

    pub fn clip_rect(&self) -> Option<&Rect> {
        self.clip_rect.as_ref()
    }

    /// Replaces the clip rect. Intersection with enclosing clips is the caller's business.
    pub fn set_clip_rect(&mut self, clip_rect: Option<Rect>, listener: &mut impl DrawRequired) {
        if clip_rect != self.clip_rect {
            listener.draw_required(self);
            self.clip_rect = clip_rect;
        }
    }

    /// `None` is the back buffer.
    pub fn render_target(&self) -> Option<TextureId> {
        self.render_target
    }

    pub fn render_target_options(&self) -> RenderTargetOptions {
        self.render_target_options
    }

    pub fn set_render_target(
        &mut self,
        target: Option<TextureId>,
        options: RenderTargetOptions,
        listener: &mut impl DrawRequired,
    ) {
        if target != self.render_target || options != self.render_target_options {
            listener.draw_required(self);
            self.render_target = target;
            self.render_target_options = options;
        }
    }

    pub fn is_drawing_to_back_buffer(&self) -> bool {
        self.render_target.is_none()
    }
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[RenderState alpha={} blend={}", self.alpha, self.blend_mode)?;
        if let Some(clip) = &self.clip_rect {
            write!(f, " clip={:?}..{:?}", clip.min, clip.max)?;
        }
        match self.render_target {
            Some(target) => write!(f, " target={target}]"),
            None => write!(f, " target=back-buffer]"),
        }
    }
}
