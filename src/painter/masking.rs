use super::*;
use crate::geom::{intersect_rects, is_axis_aligned, transform_bounds};
use crate::mesh::Mesh;

/// A mask shape, given in the coordinate space of the masked object.
#[derive(Debug, Clone, Copy)]
pub struct Mask<'a> {
    pub mesh: &'a Mesh,
    /// Maps mask coordinates into the space of the current modelview matrix.
    pub transform: Matrix2D,
}

impl<'a> Mask<'a> {
    pub fn new(mesh: &'a Mesh) -> Self {
        Self {
            mesh,
            transform: Matrix2D::identity(),
        }
    }

    pub fn with_transform(mut self, transform: Matrix2D) -> Self {
        self.transform = transform;
        self
    }
}

impl<B: GpuBackend> Painter<B> {
    /// Restricts subsequent drawing to `mask` until [`erase_mask`](Self::erase_mask).
    ///
    /// Only untextured, axis-aligned quads are supported. They become a clip rect, intersected
    /// with any enclosing one. `maskee` is excluded from the cache.
    pub fn draw_mask(&mut self, mask: &Mask<'_>, maskee: Option<NodeId>) -> Result<(), PainterError> {
        self.finish_mesh_batch();

        let clip_rect = self
            .rectangular_mask_bounds(mask)
            .ok_or(PainterError::UnsupportedMask)?;
        self.push_clip_rect(clip_rect);

        if let Some(maskee) = maskee {
            self.exclude_from_cache(maskee);
        }
        Ok(())
    }

    /// Undoes the most recent [`draw_mask`](Self::draw_mask).
    ///
    /// Panics if no mask is active.
    pub fn erase_mask(&mut self) {
        self.finish_mesh_batch();
        self.pop_clip_rect();
    }

    /// Marks `node` for a full redraw next frame. Handed out in [`finish_frame`](Self::finish_frame).
    pub fn exclude_from_cache(&mut self, node: NodeId) {
        self.cache_exclusions.push(node);
    }

    pub fn clip_rect_stack_depth(&self) -> usize {
        self.clip_rect_stack.len()
    }

    fn rectangular_mask_bounds(&self, mask: &Mask<'_>) -> Option<Rect> {
        if mask.mesh.style().texture.is_some() {
            return None;
        }

        let local = mask.mesh.as_axis_aligned_rect()?;
        let matrix = mask.transform.then(self.state.modelview_matrix());
        is_axis_aligned(&matrix).then(|| transform_bounds(&matrix, &local))
    }

    fn push_clip_rect(&mut self, clip_rect: Rect) {
        let clip_rect = match self.clip_rect_stack.last() {
            Some(enclosing) => intersect_rects(&clip_rect, enclosing),
            None => clip_rect,
        };
        self.clip_rect_stack.push(clip_rect);
        self.set_clip_rect(Some(clip_rect));
    }

    fn pop_clip_rect(&mut self) {
        if self.clip_rect_stack.pop().is_none() {
            panic!("cannot pop empty clip rect stack");
        }
        let enclosing = self.clip_rect_stack.last().copied();
        self.set_clip_rect(enclosing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::color::Color;
    use crate::geom::rect;
    use crate::id::TextureId;
    use crate::{PainterConfig, Viewport};

    fn painter() -> Painter<RecordingBackend> {
        let mut painter = Painter::new(RecordingBackend::new(), PainterConfig::default());
        painter.configure_back_buffer(Viewport::new(100.0, 100.0));
        painter.next_frame();
        painter
    }

    #[test]
    fn rectangular_mask_becomes_clip_rect() {
        let mut painter = painter();
        let mask_mesh = Mesh::quad(rect(0.0, 0.0, 20.0, 10.0), Color::WHITE);
        painter.transform_modelview_matrix(&Matrix2D::translation(5.0, 5.0));

        painter
            .draw_mask(&Mask::new(&mask_mesh), Some(NodeId(7)))
            .expect("rectangular mask");

        assert_eq!(painter.state().clip_rect(), Some(&rect(5.0, 5.0, 20.0, 10.0)));
        assert_eq!(painter.clip_rect_stack_depth(), 1);
        assert_eq!(painter.cache_exclusions, vec![NodeId(7)]);
    }

    #[test]
    fn nested_masks_intersect_and_unwind() {
        let mut painter = painter();
        let outer = Mesh::quad(rect(0.0, 0.0, 50.0, 50.0), Color::WHITE);
        let inner = Mesh::quad(rect(25.0, 25.0, 50.0, 50.0), Color::WHITE);

        painter.draw_mask(&Mask::new(&outer), None).expect("outer");
        painter.draw_mask(&Mask::new(&inner), None).expect("inner");
        assert_eq!(painter.state().clip_rect(), Some(&rect(25.0, 25.0, 25.0, 25.0)));

        painter.erase_mask();
        assert_eq!(painter.state().clip_rect(), Some(&rect(0.0, 0.0, 50.0, 50.0)));
        painter.erase_mask();
        assert_eq!(painter.state().clip_rect(), None);
    }

    #[test]
    fn mask_flushes_pending_meshes() {
        let mut painter = painter();
        let mask_mesh = Mesh::quad(rect(0.0, 0.0, 20.0, 10.0), Color::WHITE);
        painter.batch_mesh(&Mesh::quad(rect(0.0, 0.0, 1.0, 1.0), Color::WHITE), None);

        painter.draw_mask(&Mask::new(&mask_mesh), None).expect("rectangular mask");
        assert_eq!(painter.draw_count(), 1);
    }

    #[test]
    fn rotated_and_textured_masks_are_unsupported() {
        let mut painter = painter();
        let quad = Mesh::quad(rect(0.0, 0.0, 20.0, 10.0), Color::WHITE);
        let rotated = Mask::new(&quad).with_transform(Matrix2D::rotation(euclid::Angle::degrees(45.0)));
        assert!(matches!(
            painter.draw_mask(&rotated, None),
            Err(PainterError::UnsupportedMask)
        ));

        let textured = Mesh::textured_quad(
            rect(0.0, 0.0, 20.0, 10.0),
            TextureId(1),
            Default::default(),
            Color::WHITE,
        );
        assert!(painter.draw_mask(&Mask::new(&textured), None).is_err());

        let rounded = Mesh::fill_rounded_rect(rect(0.0, 0.0, 20.0, 10.0), 4.0, Color::WHITE)
            .expect("tessellation succeeds");
        assert!(painter.draw_mask(&Mask::new(&rounded), None).is_err());
        assert_eq!(painter.clip_rect_stack_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "cannot pop empty clip rect stack")]
    fn erasing_without_mask_panics() {
        painter().erase_mask();
    }
}
