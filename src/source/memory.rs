use ndarray::ArrayD;
use std::sync::Arc;

use super::ChunkSource;
use crate::field::{Chunk, Region};

/// Chunks of a resident array.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Arc<ArrayD<f64>>,
}

impl MemorySource {
    #[must_use]
    pub fn new(data: ArrayD<f64>) -> MemorySource {
        MemorySource {
            data: Arc::new(data),
        }
    }
}

impl ChunkSource for MemorySource {
    fn read_chunk(&self, chunk: &Chunk) -> anyhow::Result<ArrayD<f64>> {
        let r = Region::within(chunk.offset.clone(), chunk.shape.clone(), self.data.shape())?;
        Ok(r.view(&self.data).to_owned())
    }
}
