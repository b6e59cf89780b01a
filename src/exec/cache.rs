use lru::LruCache;
use ndarray::ArrayD;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::field::Chunk;
use crate::source::ChunkSource;
use crate::{Error, Result};

/// Source chunks, keyed by node and chunk index.
type Key = (usize, usize);

/// A least recently used cache of source chunks, shared by the workers of one materialization.
pub(crate) struct ChunkCache {
    cache: Mutex<LruCache<Key, Arc<ArrayD<f64>>>>,
    hits: AtomicUsize,
    reads: AtomicUsize,
}

impl ChunkCache {
    /// A cache holding at most `budget` bytes of chunks of `chunk_sz` values, but never less than
    /// one chunk.
    pub fn with_budget(budget: u64, chunk_sz: usize) -> ChunkCache {
        let chunk_bytes = (chunk_sz.max(1) * std::mem::size_of::<f64>()) as u64;
        let cache_sz = std::cmp::max(budget / chunk_bytes, 1);

        ChunkCache {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_sz as usize).unwrap_or(NonZeroUsize::MIN),
            )),
            hits: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    /// The chunk from the cache, or read from `source`. The lock is not held while reading, two
    /// workers missing the same chunk at once may both read it.
    pub fn get_or_read(
        &self,
        node: usize,
        source: &dyn ChunkSource,
        chunk: &Chunk,
    ) -> Result<Arc<ArrayD<f64>>> {
        let key = (node, chunk.index);

        if let Some(d) = self.lock().get(&key) {
            trace!("node {node}: cache hit for chunk {:?}", chunk.offset);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(d));
        }

        trace!("node {node}: reading chunk {:?}", chunk.offset);
        let d = source
            .read_chunk(chunk)
            .map_err(|source| Error::ChunkFetchFailure {
                offset: chunk.offset.clone(),
                source,
            })?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        if d.shape() != chunk.shape.as_slice() {
            return Err(Error::shape(format!(
                "chunk at {:?} has shape {:?}, expected {:?}",
                chunk.offset,
                d.shape(),
                chunk.shape
            )));
        }

        let d = Arc::new(d);
        self.lock().put(key, Arc::clone(&d));

        Ok(d)
    }

    /// Number of chunks served from the cache.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of chunks read from sources.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<Key, Arc<ArrayD<f64>>>> {
        // every update is a single call
        self.cache
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use ndarray::IxDyn;

    struct Failing;

    impl ChunkSource for Failing {
        fn read_chunk(&self, _chunk: &Chunk) -> anyhow::Result<ArrayD<f64>> {
            Err(anyhow!("disk on fire"))
        }
    }

    fn chunk(index: usize) -> Chunk {
        Chunk {
            index,
            offset: vec![index * 2],
            shape: vec![2],
        }
    }

    #[test]
    fn hits_and_reads() {
        let src = MemorySource::new(
            ArrayD::from_shape_vec(IxDyn(&[6]), vec![0., 1., 2., 3., 4., 5.]).unwrap(),
        );
        let c = ChunkCache::with_budget(1024, 2);

        let a = c.get_or_read(0, &src, &chunk(1)).unwrap();
        assert_eq!(a.as_slice().unwrap(), &[2., 3.]);
        let _ = c.get_or_read(0, &src, &chunk(1)).unwrap();
        let _ = c.get_or_read(1, &src, &chunk(1)).unwrap();

        assert_eq!(c.reads(), 2);
        assert_eq!(c.hits(), 1);
    }

    #[test]
    fn holds_at_least_one_chunk() {
        let src = MemorySource::new(ArrayD::zeros(IxDyn(&[6])));
        let c = ChunkCache::with_budget(0, 2);

        c.get_or_read(0, &src, &chunk(0)).unwrap();
        c.get_or_read(0, &src, &chunk(0)).unwrap();
        c.get_or_read(0, &src, &chunk(1)).unwrap();
        c.get_or_read(0, &src, &chunk(0)).unwrap();

        assert_eq!(c.hits(), 1);
        assert_eq!(c.reads(), 3);
    }

    #[test]
    fn fetch_failure() {
        let c = ChunkCache::with_budget(1024, 2);
        match c.get_or_read(0, &Failing, &chunk(2)) {
            Err(Error::ChunkFetchFailure { offset, source }) => {
                assert_eq!(offset, [4]);
                assert_eq!(source.to_string(), "disk on fire");
            }
            r => panic!("unexpected: {r:?}"),
        }
    }

    struct Short;

    impl ChunkSource for Short {
        fn read_chunk(&self, _chunk: &Chunk) -> anyhow::Result<ArrayD<f64>> {
            Ok(ArrayD::zeros(IxDyn(&[1])))
        }
    }

    #[test]
    fn wrong_shape() {
        let c = ChunkCache::with_budget(1024, 2);
        assert!(matches!(
            c.get_or_read(0, &Short, &chunk(0)),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
