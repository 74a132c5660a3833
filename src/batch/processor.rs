use super::mesh_batch::MeshBatch;
use super::pool::MeshBatchPool;
use super::token::BatchToken;
use crate::backend::GpuBackend;
use crate::geom::Matrix2D;
use crate::mesh::{MeshSource, MeshSubset};
use crate::render_state::RenderState;

/// Receives every batch a [`BatchProcessor`] finishes, typically to draw it.
pub trait BatchListener {
    fn batch_complete(&mut self, batch: &mut MeshBatch);
}

impl<F> BatchListener for F
where
    F: FnMut(&mut MeshBatch),
{
    fn batch_complete(&mut self, batch: &mut MeshBatch) {
        self(batch)
    }
}

/// Accumulates meshes, in display order, into as few batches as possible.
///
/// The last batch of the list stays open for more meshes until an incompatible mesh arrives or
/// [`finish_batch`](Self::finish_batch) is called. Batches stay in the list after they are
/// finished, so the list can be replayed by a later frame.
#[derive(Debug, Default)]
pub struct BatchProcessor {
    batches: Vec<MeshBatch>,
    current: Option<usize>,
    cache_token: BatchToken,
    pool: MeshBatchPool,
}

impl BatchProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `subset` of `mesh` (the whole mesh for `None`).
    ///
    /// With a `state`, positions are transformed by its modelview matrix, colors scaled by its
    /// alpha and the batch uses its blend mode. Without one, the mesh is copied as is with its own
    /// blend mode. A mesh that cannot join the open batch finishes it first.
    pub fn add_mesh<M, L>(
        &mut self,
        mesh: &M,
        state: Option<&RenderState>,
        subset: Option<MeshSubset>,
        ignore_transformations: bool,
        listener: &mut L,
    ) where
        M: MeshSource + ?Sized,
        L: BatchListener + ?Sized,
    {
        let subset = subset
            .unwrap_or(MeshSubset::ALL)
            .resolve(mesh.num_vertices(), mesh.num_indices());
        let num_vertices = subset.vertex_count();
        if num_vertices == 0 {
            return;
        }

        let blend_mode = state
            .map(RenderState::blend_mode)
            .unwrap_or_else(|| mesh.blend_mode());

        let can_add = self
            .current
            .is_some_and(|index| self.batches[index].can_add_mesh(mesh, num_vertices, blend_mode));

        if !can_add {
            self.finish_batch(listener);

            let mut batch = self.pool.get(mesh.style().style_type);
            batch.set_blend_mode(blend_mode);
            self.cache_token.set_to(self.batches.len(), 0, 0);
            self.current = Some(self.batches.len());
            self.batches.push(batch);
        }

        let (matrix, alpha) = match state {
            Some(state) => (*state.modelview_matrix(), state.alpha()),
            None => (Matrix2D::identity(), 1.0),
        };

        let index = self.current.unwrap_or(self.batches.len() - 1);
        let batch = &mut self.batches[index];
        if batch.is_empty() {
            batch.set_blend_mode(blend_mode);
        }
        batch.add_mesh(mesh, &matrix, alpha, subset, ignore_transformations);

        self.cache_token.vertex_offset += num_vertices;
        self.cache_token.index_offset += subset.index_count();
    }

    /// Closes the open batch, if any, and hands it to `listener`.
    pub fn finish_batch<L>(&mut self, listener: &mut L)
    where
        L: BatchListener + ?Sized,
    {
        if let Some(index) = self.current.take() {
            let batch = &mut self.batches[index];
            tracing::trace!(
                "finished {} with {} vertices, {} indices",
                batch.id(),
                batch.num_vertices(),
                batch.num_indices()
            );
            listener.batch_complete(batch);
        }
    }

    /// Returns every batch to the pool and resets the cursor.
    pub fn clear(&mut self) {
        for batch in self.batches.drain(..) {
            self.pool.put(batch);
        }
        self.current = None;
        self.cache_token.reset();
    }

    /// Releases the GPU buffers of idle pooled batches.
    pub fn trim(&mut self, gpu: &mut dyn GpuBackend) {
        self.pool.purge(gpu);
    }

    /// Releases every GPU buffer this processor owns.
    pub fn dispose(&mut self, gpu: &mut dyn GpuBackend) {
        self.clear();
        self.pool.purge(gpu);
    }

    /// Panics if `index` is out of range.
    pub fn batch_at(&self, index: usize) -> &MeshBatch {
        match self.batches.get(index) {
            Some(batch) => batch,
            None => panic!(
                "batch index {index} out of range, processor holds {} batches",
                self.batches.len()
            ),
        }
    }

    pub fn num_batches(&self) -> usize {
        self.batches.len()
    }

    pub fn batches(&self) -> &[MeshBatch] {
        &self.batches
    }

    /// The position the next mesh will be written to.
    pub fn fill_token(&self) -> BatchToken {
        self.cache_token
    }

    /// Discards everything written after `token`.
    ///
    /// Panics if `token` lies beyond the current batch.
    pub fn rewind_to(&mut self, token: BatchToken) {
        assert!(
            token.batch_index <= self.cache_token.batch_index,
            "cannot rewind to {token}, the cursor is at {}",
            self.cache_token
        );

        while self.batches.len() > token.batch_index + 1 {
            if let Some(batch) = self.batches.pop() {
                self.pool.put(batch);
            }
        }

        if let Some(batch) = self.batches.get_mut(token.batch_index) {
            let num_vertices = batch.num_vertices().min(token.vertex_offset);
            let num_indices = batch.num_indices().min(token.index_offset);
            batch.truncate(num_vertices, num_indices);
        }

        self.current = None;
        self.cache_token = token;
    }

    /// Number of idle batches in the pool.
    pub fn pooled_batches(&self) -> usize {
        self.pool.len()
    }
}
