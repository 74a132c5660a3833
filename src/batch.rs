//! Batch accumulation: merging compatible meshes into shared vertex and index buffers.

mod mesh_batch;
mod pool;
mod processor;
mod token;

pub use mesh_batch::{BatchId, MeshBatch, MAX_NUM_VERTICES};
pub use pool::MeshBatchPool;
pub use processor::{BatchListener, BatchProcessor};
pub use token::BatchToken;
