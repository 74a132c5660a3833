/// Per-frame counters for diagnosing draw-call and GPU state-change overhead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Batches drawn.
    pub draw_calls: u32,
    /// Blend mode changes sent to the backend.
    pub blend_mode_changes: u32,
    /// Framebuffer bindings sent to the backend.
    pub render_target_changes: u32,
    /// Scissor rect changes sent to the backend.
    pub scissor_changes: u32,
    /// Meshes submitted through `batch_mesh`.
    pub meshes_batched: u32,
    /// Cache regions replayed from the previous frame.
    pub cache_replays: u32,
    pub replayed_vertices: u32,
}

impl FrameStats {
    /// Merge another frame's counts into this accumulator.
    pub fn accumulate(&mut self, other: &Self) {
        self.draw_calls += other.draw_calls;
        self.blend_mode_changes += other.blend_mode_changes;
        self.render_target_changes += other.render_target_changes;
        self.scissor_changes += other.scissor_changes;
        self.meshes_batched += other.meshes_batched;
        self.cache_replays += other.cache_replays;
        self.replayed_vertices += other.replayed_vertices;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_sums_every_counter() {
        let frame = FrameStats {
            draw_calls: 3,
            blend_mode_changes: 1,
            render_target_changes: 1,
            scissor_changes: 2,
            meshes_batched: 40,
            cache_replays: 5,
            replayed_vertices: 120,
        };
        let mut total = FrameStats::default();
        total.accumulate(&frame);
        total.accumulate(&frame);

        assert_eq!(total.draw_calls, 6);
        assert_eq!(total.meshes_batched, 80);
        assert_eq!(total.replayed_vertices, 240);
    }
}
