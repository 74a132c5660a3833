use super::*;

impl<B: GpuBackend> Painter<B> {
    /// Replays what the previous frame recorded between `start` and `end` into the active
    /// processor, without transforming it again.
    ///
    /// Both tokens must come from the previous frame. Equal tokens replay nothing.
    pub fn draw_from_cache(&mut self, start: &BatchToken, end: &BatchToken) {
        if start == end {
            return;
        }

        self.push_state(None);

        let Painter {
            state,
            processors,
            output,
            ..
        } = self;
        let (prev, active) = processors.replay_pair();
        let mut replayed_vertices = 0;

        for batch_index in start.batch_index..=end.batch_index {
            let batch = prev.batch_at(batch_index);
            let mut subset = MeshSubset::ALL;

            if batch_index == start.batch_index {
                subset.vertex_id = start.vertex_offset;
                subset.index_id = start.index_offset;
            }
            if batch_index == end.batch_index {
                subset.num_vertices = Some(end.vertex_offset.saturating_sub(subset.vertex_id));
                subset.num_indices = Some(end.index_offset.saturating_sub(subset.index_id));
            }

            let subset = subset.resolve(batch.num_vertices(), batch.num_indices());
            if subset.vertex_count() == 0 {
                continue;
            }

            state.set_alpha(1.0);
            state.set_blend_mode(batch.blend_mode(), &mut |old: &RenderState| {
                active.finish_batch(&mut |finished: &mut MeshBatch| output.draw_batch(old, finished))
            });

            let state = &*state;
            active.add_mesh(
                batch,
                Some(state),
                Some(subset),
                true,
                &mut |finished: &mut MeshBatch| output.draw_batch(state, finished),
            );
            replayed_vertices += subset.vertex_count();
        }

        output.stats.cache_replays += 1;
        output.stats.replayed_vertices += replayed_vertices as u32;
        tracing::trace!("replayed {replayed_vertices} vertices from {start} to {end}");

        self.pop_state(None);
    }

    /// Whether batched meshes are recorded for replay next frame.
    pub fn cache_enabled(&self) -> bool {
        self.processors.active == Active::Cache
    }

    /// Switches recording on or off for what follows in this frame. The open batch is drawn
    /// first.
    pub fn set_cache_enabled(&mut self, enabled: bool) {
        if enabled != self.cache_enabled() {
            self.finish_mesh_batch();
            self.processors.active = if enabled {
                Active::Cache
            } else {
                Active::Speculative
            };
        }
    }

    /// Drops everything the active processor recorded after `token`.
    pub fn rewind_cache_to(&mut self, token: BatchToken) {
        self.processors.active_mut().rewind_to(token);
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::RecordingBackend;
    use crate::batch::BatchToken;
    use crate::geom::{rect, Matrix2D};
    use crate::style::StyleType;
    use crate::{BlendMode, Color, Mesh, MeshStyle, Painter, PainterConfig, Viewport};

    fn painter() -> Painter<RecordingBackend> {
        let mut painter = Painter::new(RecordingBackend::new(), PainterConfig::default());
        painter.configure_back_buffer(Viewport::new(100.0, 100.0));
        painter
    }

    fn quad(x: f32, color: Color) -> Mesh {
        Mesh::quad(rect(x, 0.0, 10.0, 10.0), color)
    }

    fn end_frame(painter: &mut Painter<RecordingBackend>) {
        painter.finish_frame(&mut |_: crate::id::NodeId| {});
        painter.present().expect("recording backend presents");
    }

    #[test]
    fn replay_reproduces_recorded_vertices() {
        let mut painter = painter();
        let red = Color::rgb(255, 0, 0);

        painter.next_frame();
        painter.batch_mesh(&quad(0.0, Color::WHITE), None);
        let mut start = BatchToken::default();
        let mut end = BatchToken::default();
        painter.push_state(Some(&mut start));
        painter.transform_modelview_matrix(&Matrix2D::translation(30.0, 0.0));
        painter.batch_mesh(&quad(0.0, red), None);
        painter.batch_mesh(&quad(20.0, red), None);
        painter.pop_state(Some(&mut end));
        end_frame(&mut painter);
        let recorded = painter.backend().draws().last().expect("frame drawn").vertices[4..].to_vec();
        painter.backend_mut().take_commands();

        painter.next_frame();
        painter.draw_from_cache(&start, &end);
        end_frame(&mut painter);

        let replayed = painter.backend().draws().next().expect("replay drawn");
        assert_eq!(replayed.vertices, recorded);
        assert_eq!(replayed.vertices[0].position, [30.0, 0.0]);
        assert_eq!(painter.frame_stats().cache_replays, 1);
        assert_eq!(painter.frame_stats().replayed_vertices, 8);
    }

    #[test]
    fn replay_spans_partial_first_and_last_batches() {
        let mut painter = painter();
        let other_style = MeshStyle::untextured(StyleType(2));

        painter.next_frame();
        painter.batch_mesh(&quad(0.0, Color::WHITE), None);
        let start = painter.fill_token();
        painter.batch_mesh(&quad(10.0, Color::WHITE), None);
        painter.batch_mesh(&quad(20.0, Color::WHITE).with_style(other_style), None);
        painter.batch_mesh(&quad(30.0, Color::WHITE).with_style(other_style), None);
        let end = BatchToken::new(1, 4, 6);
        end_frame(&mut painter);
        painter.backend_mut().take_commands();

        painter.next_frame();
        painter.draw_from_cache(&start, &end);
        end_frame(&mut painter);

        let draws: Vec<_> = painter.backend().draws().cloned().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].vertices[0].position, [10.0, 0.0]);
        assert_eq!(draws[0].vertices.len(), 4);
        assert_eq!(draws[1].vertices[0].position, [20.0, 0.0]);
        assert_eq!(draws[1].vertices.len(), 4);
    }

    #[test]
    fn replay_restores_blend_mode_of_each_batch() {
        let mut painter = painter();

        painter.next_frame();
        let start = painter.fill_token();
        painter.set_blend_mode(BlendMode::Add);
        painter.batch_mesh(&quad(0.0, Color::WHITE), None);
        painter.finish_mesh_batch();
        let end = painter.fill_token();
        end_frame(&mut painter);

        painter.next_frame();
        painter.set_alpha(0.5);
        painter.draw_from_cache(&start, &end);

        assert_eq!(painter.state().blend_mode(), BlendMode::Normal);
        assert_eq!(painter.state().alpha(), 0.5);
        painter.finish_mesh_batch();
        let replayed = painter.backend().draws().last().expect("replay drawn");
        assert_eq!(replayed.vertices[0].color, [1.0; 4]);
    }

    #[test]
    fn equal_tokens_replay_nothing() {
        let mut painter = painter();
        painter.next_frame();
        end_frame(&mut painter);
        painter.next_frame();

        let token = BatchToken::default();
        painter.draw_from_cache(&token, &token);
        assert_eq!(painter.state_stack_depth(), 0);
        assert_eq!(painter.frame_stats().cache_replays, 0);
    }

    #[test]
    fn disabling_cache_keeps_meshes_out_of_next_frame() {
        let mut painter = painter();
        painter.next_frame();
        painter.batch_mesh(&quad(0.0, Color::WHITE), None);
        assert!(painter.cache_enabled());

        painter.set_cache_enabled(false);
        assert_eq!(painter.draw_count(), 1);
        assert_eq!(painter.fill_token(), BatchToken::default());

        painter.batch_mesh(&quad(10.0, Color::WHITE), None);
        painter.set_cache_enabled(true);
        assert_eq!(painter.fill_token(), BatchToken::new(0, 4, 6));
    }

    #[test]
    fn rewind_discards_later_writes() {
        let mut painter = painter();
        painter.next_frame();
        painter.batch_mesh(&quad(0.0, Color::WHITE), None);
        let token = painter.fill_token();
        painter.batch_mesh(&quad(10.0, Color::WHITE), None);

        painter.rewind_cache_to(token);
        assert_eq!(painter.fill_token(), token);
        end_frame(&mut painter);

        let draws: Vec<_> = painter.backend().draws().collect();
        assert!(draws.is_empty(), "rewound batch is closed without drawing");
    }
}
