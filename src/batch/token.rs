use std::fmt;

/// A cursor into the batch list of a [`BatchProcessor`](super::BatchProcessor).
///
/// `vertex_offset` and `index_offset` count the data appended to the batch at `batch_index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BatchToken {
    pub batch_index: usize,
    pub vertex_offset: usize,
    pub index_offset: usize,
}

impl BatchToken {
    pub fn new(batch_index: usize, vertex_offset: usize, index_offset: usize) -> Self {
        Self {
            batch_index,
            vertex_offset,
            index_offset,
        }
    }

    pub fn set_to(&mut self, batch_index: usize, vertex_offset: usize, index_offset: usize) {
        *self = Self::new(batch_index, vertex_offset, index_offset);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for BatchToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[BatchToken batch={} vertex={} index={}]",
            self.batch_index, self.vertex_offset, self.index_offset
        )
    }
}
