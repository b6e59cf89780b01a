//! Materialization of lazy arrays.
//!
//! The [`Materializer`] evaluates the output chunks of a graph on a pool of worker threads and
//! assembles them in canonical order. The result only depends on the graph and its chunk grids,
//! not on the number of workers or the order in which chunks complete.
//!
//! ```
//! use enstrend::prelude::*;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let schema = Schema::new("x", vec![Axis::index("a", 6), Axis::index("b", 2)]).unwrap();
//! let x = ChunkedArray::from_array(schema, ArrayD::ones(IxDyn(&[6, 2])), &[2, 2]).unwrap();
//!
//! let m = Materializer::new(Config::default().workers(2)).unwrap();
//! let r = m.materialize(&x.mean(&["a"]).unwrap()).unwrap();
//! assert_eq!(r.shape(), &[2]);
//! assert_eq!(r.degenerate(), 0);
//! ```
use futures::future::try_join_all;
use ndarray::{ArrayD, IxDyn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Config, DegeneratePolicy};
use crate::field::{Axis, Chunk, Schema};
use crate::graph::{ChunkedArray, Op};
use crate::source::ChunkSource;
use crate::{Error, Result};

mod cache;
mod cancel;

use cache::ChunkCache;
pub use cancel::{CancelToken, DropGuard};

/// State shared by the workers of one materialization.
pub(crate) struct Context {
    cache: ChunkCache,
    cancel: CancelToken,
    policy: DegeneratePolicy,
}

impl Context {
    fn new(config: &Config, cancel: CancelToken, chunk_sz: usize) -> Context {
        Context {
            cache: ChunkCache::with_budget(config.cache_bytes, chunk_sz),
            cancel,
            policy: config.degenerate,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_test(config: &Config) -> Context {
        Context::new(config, CancelToken::new(), 1)
    }

    pub(crate) fn check(&self) -> Result<()> {
        self.cancel.check()
    }

    pub(crate) fn fetch(
        &self,
        node: usize,
        source: &dyn ChunkSource,
        chunk: &Chunk,
    ) -> Result<Arc<ArrayD<f64>>> {
        self.check()?;
        self.cache.get_or_read(node, source, chunk)
    }

    /// Fail on `cells` cells without a defined value in the requested array, if the policy says so.
    pub(crate) fn degenerate(&self, cells: usize) -> Result<()> {
        if cells > 0 && self.policy == DegeneratePolicy::Fail {
            Err(Error::UndefinedReduction { cells })
        } else {
            Ok(())
        }
    }
}

/// A resident result.
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    schema: Schema,
    data: ArrayD<f64>,
    degenerate: usize,
}

impl Materialized {
    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        self.schema.axes()
    }

    pub fn axis(&self, name: &str) -> Result<&Axis> {
        self.schema.axis(name)
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    #[must_use]
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    /// Value at `index`, `None` if out of bounds.
    #[must_use]
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.data.get(IxDyn(index)).copied()
    }

    /// The values in row-major order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().copied().collect()
    }

    /// Number of cells of the requested array which had no defined value (zero total weight,
    /// or too few valid samples).
    ///
    /// Cells are counted where they are computed: by the reduction, resampling or trend that
    /// produces the requested array, and through selections, takes and rechunks of it. Cells of
    /// intermediate results feeding another computation are not counted, a NaN they cause only
    /// shows in [`non_finite`](Self::non_finite).
    #[must_use]
    pub fn degenerate(&self) -> usize {
        self.degenerate
    }

    /// Number of non-finite cells, whatever their cause.
    #[must_use]
    pub fn non_finite(&self) -> usize {
        self.data.iter().filter(|v| !v.is_finite()).count()
    }
}

/// Evaluates graphs on a pool of worker threads.
pub struct Materializer {
    pool: rayon::ThreadPool,
    config: Config,
}

impl std::fmt::Debug for Materializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materializer")
            .field("workers", &self.workers())
            .field("config", &self.config)
            .finish()
    }
}

impl Materializer {
    pub fn new(config: Config) -> Result<Materializer> {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("enstrend-{i}"));
        if let Some(n) = config.workers {
            builder = builder.num_threads(n);
        }

        let pool = builder
            .build()
            .map_err(|e| Error::Config(format!("could not start worker pool: {e}")))?;

        Ok(Materializer { pool, config })
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn materialize(&self, array: &ChunkedArray) -> Result<Materialized> {
        self.materialize_with(array, &CancelToken::new())
    }

    /// Materialize, aborting with [`Error::Cancelled`] once `cancel` is cancelled.
    pub fn materialize_with(
        &self,
        array: &ChunkedArray,
        cancel: &CancelToken,
    ) -> Result<Materialized> {
        let ctx = Context::new(&self.config, cancel.clone(), largest_source_chunk(&[array]));
        self.run(array, &ctx)
    }

    /// Materialize several arrays, sharing one chunk cache. Fails if any of them fails.
    pub fn materialize_all<'a, I>(
        &self,
        arrays: I,
        cancel: &CancelToken,
    ) -> Result<BTreeMap<String, Materialized>>
    where
        I: IntoIterator<Item = (&'a str, &'a ChunkedArray)>,
    {
        let arrays = arrays.into_iter().collect::<Vec<_>>();
        let all = arrays.iter().map(|(_, a)| *a).collect::<Vec<_>>();

        let ctx = Context::new(&self.config, cancel.clone(), largest_source_chunk(&all));

        arrays
            .into_iter()
            .map(|(name, a)| Ok((name.to_string(), self.run(a, &ctx)?)))
            .collect()
    }

    /// Materialize on the blocking thread pool of the tokio runtime. Dropping the future cancels
    /// the materialization.
    pub async fn materialize_async(
        self: &Arc<Self>,
        array: ChunkedArray,
        cancel: CancelToken,
    ) -> Result<Materialized> {
        let guard = cancel.clone().drop_guard();

        let m = Arc::clone(self);
        let r = tokio::task::spawn_blocking(move || m.materialize_with(&array, &cancel)).await;
        guard.disarm();

        match r {
            Ok(r) => r,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// Materialize independent arrays concurrently. If one fails, the others are cancelled.
    pub async fn materialize_many_async(
        self: &Arc<Self>,
        arrays: Vec<ChunkedArray>,
    ) -> Result<Vec<Materialized>> {
        let cancel = CancelToken::new();
        let _guard = cancel.clone().drop_guard();

        try_join_all(
            arrays
                .into_iter()
                .map(|a| self.materialize_async(a, cancel.clone())),
        )
        .await
    }

    fn run(&self, array: &ChunkedArray, ctx: &Context) -> Result<Materialized> {
        let grid = array.grid();
        let chunks = grid.chunks().collect::<Vec<_>>();

        info!(
            "materializing {} ({}) {:?}: {} chunks on {} workers",
            array.name(),
            array.describe(),
            array.shape(),
            chunks.len(),
            self.workers()
        );
        let start = Instant::now();

        let parts = self.pool.install(|| {
            chunks
                .par_iter()
                .map(|c| {
                    ctx.check()?;
                    array.eval(&c.region(), ctx).map(|e| (c, e))
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let mut data = ArrayD::from_elem(IxDyn(array.shape()), f64::NAN);
        let mut degenerate = 0;

        for (c, e) in parts {
            c.region().view_mut(&mut data).assign(&e.data);
            degenerate += e.degenerate;
        }

        ctx.degenerate(degenerate)?;
        if degenerate > 0 {
            warn!(
                "{}: {degenerate} cell(s) without a defined value",
                array.name()
            );
        }

        info!(
            "materialized {} in {:.3}s (chunks read: {}, cache hits: {})",
            array.name(),
            start.elapsed().as_secs_f64(),
            ctx.cache.reads(),
            ctx.cache.hits()
        );

        Ok(Materialized {
            schema: array.schema().clone(),
            data,
            degenerate,
        })
    }
}

/// Number of values in the largest source chunk of the graphs.
fn largest_source_chunk(arrays: &[&ChunkedArray]) -> usize {
    let mut sz = 1;
    for a in arrays {
        a.visit(&mut |n| {
            if let Op::Source(_) = n.op() {
                sz = sz.max(n.chunk_shape().iter().product());
            }
        });
    }
    sz
}
