//! Where fields come from.
//!
//! A [`Catalog`] finds datasets matching some [`Criteria`], a [`Loader`] turns a [`Handle`] into
//! a lazy [`ChunkedArray`](crate::graph::ChunkedArray), and a [`ChunkSource`] reads the values of
//! one chunk when the array is materialized.
use ndarray::ArrayD;

use crate::field::Chunk;
use crate::graph::ChunkedArray;

mod catalog;
pub mod cf;
mod memory;
#[cfg(feature = "netcdf")]
pub mod netcdf;

pub use catalog::{Criteria, Filter, Handle, MemoryCatalog};
pub use memory::MemorySource;

/// Reads chunks of a field.
pub trait ChunkSource: Send + Sync {
    /// The values of `chunk`, with shape `chunk.shape`.
    fn read_chunk(&self, chunk: &Chunk) -> anyhow::Result<ArrayD<f64>>;
}

/// Finds datasets.
pub trait Catalog: Send + Sync {
    fn search(&self, criteria: &Criteria) -> anyhow::Result<Vec<Handle>>;
}

/// Opens datasets as lazy arrays.
pub trait Loader: Send + Sync {
    fn open(&self, handle: &Handle) -> anyhow::Result<ChunkedArray>;

    /// Open every dataset of a search.
    fn open_all(&self, handles: &[Handle]) -> anyhow::Result<Vec<ChunkedArray>> {
        handles.iter().map(|h| self.open(h)).collect()
    }
}
