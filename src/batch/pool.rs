use ahash::{HashMap, HashMapExt};

use super::mesh_batch::{BatchId, MeshBatch};
use crate::backend::GpuBackend;
use crate::mesh::MeshSource;
use crate::style::StyleType;

/// Idle batches, filed by style type.
#[derive(Debug)]
pub struct MeshBatchPool {
    idle: HashMap<StyleType, Vec<MeshBatch>>,
    next_id: u64,
}

impl Default for MeshBatchPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshBatchPool {
    pub fn new() -> Self {
        Self {
            idle: HashMap::new(),
            next_id: 0,
        }
    }

    /// Hands out an idle batch of `style_type`, allocating one when none is left.
    pub fn get(&mut self, style_type: StyleType) -> MeshBatch {
        if let Some(batch) = self.idle.get_mut(&style_type).and_then(Vec::pop) {
            return batch;
        }

        let id = BatchId(self.next_id);
        self.next_id += 1;
        MeshBatch::new(id, style_type)
    }

    /// Clears `batch` and keeps it for reuse.
    pub fn put(&mut self, mut batch: MeshBatch) {
        batch.clear();
        let style_type = batch.style().style_type;
        self.idle.entry(style_type).or_default().push(batch);
    }

    /// Releases the GPU buffers of every idle batch and forgets them.
    pub fn purge(&mut self, gpu: &mut dyn GpuBackend) {
        let mut purged = 0;
        for (_, batches) in self.idle.drain() {
            for mut batch in batches {
                batch.dispose(gpu);
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::debug!("purged {purged} idle mesh batches");
        }
    }

    /// Number of idle batches.
    pub fn len(&self) -> usize {
        self.idle.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
