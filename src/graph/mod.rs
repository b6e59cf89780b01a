//! Lazy chunked arrays.
//!
//! A [`ChunkedArray`] is a node in an immutable computation graph. Every operation returns a new
//! node holding shared references to its inputs, so a node can feed any number of downstream
//! nodes. Nothing is read or computed until the graph is materialized, see
//! [`Materializer`](crate::exec::Materializer).
use chrono::NaiveDateTime;
use std::fmt;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::extent::{Extent, Extents};
use crate::field::{Axis, ChunkGrid, Schema};
use crate::ops::calendar::Period;
use crate::ops::resample::{CalendarResampler, Resampled, Weighting};
use crate::ops::trend::TrendEstimator;
use crate::ops::weighted::{WeightedReducer, Weights};
use crate::source::{ChunkSource, MemorySource};
use crate::{Error, Result};

mod eval;

pub(crate) use eval::Evaluated;

pub type UnaryFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;
pub type BinaryFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

pub(crate) enum Op {
    Source(Arc<dyn ChunkSource>),

    /// Contiguous sub-box of the input starting at `offset`.
    Select {
        input: ChunkedArray,
        offset: Vec<usize>,
    },

    /// Strictly increasing `indices` along `axis`.
    Take {
        input: ChunkedArray,
        axis: usize,
        indices: Vec<usize>,
    },

    Rechunk {
        input: ChunkedArray,
    },

    Reduce(crate::ops::weighted::Reduce),

    Resample(crate::ops::resample::Resample),

    Map {
        input: ChunkedArray,
        label: String,
        f: UnaryFn,
    },

    /// `rhs` is broadcast over `lhs`, `axes` are the positions of the axes of `rhs` in `lhs`.
    Zip {
        lhs: ChunkedArray,
        rhs: ChunkedArray,
        axes: Vec<usize>,
        label: String,
        f: BinaryFn,
    },

    Trend(crate::ops::trend::Trend),
}

impl Op {
    fn kind(&self) -> &'static str {
        match self {
            Op::Source(_) => "source",
            Op::Select { .. } => "select",
            Op::Take { .. } => "take",
            Op::Rechunk { .. } => "rechunk",
            Op::Reduce(_) => "reduce",
            Op::Resample(_) => "resample",
            Op::Map { .. } => "map",
            Op::Zip { .. } => "zip",
            Op::Trend(_) => "trend",
        }
    }

    fn label(&self) -> &str {
        match self {
            Op::Map { label, .. } | Op::Zip { label, .. } => label,
            _ => self.kind(),
        }
    }

    fn inputs(&self) -> Vec<&ChunkedArray> {
        match self {
            Op::Source(_) => vec![],
            Op::Select { input, .. }
            | Op::Take { input, .. }
            | Op::Rechunk { input }
            | Op::Map { input, .. } => vec![input],
            Op::Reduce(r) => vec![r.input()],
            Op::Resample(r) => vec![r.input()],
            Op::Trend(t) => vec![t.input()],
            Op::Zip { lhs, rhs, .. } => vec![lhs, rhs],
        }
    }
}

pub(crate) struct Node {
    id: usize,
    schema: Schema,
    grid: ChunkGrid,
    op: Op,
}

/// A lazily evaluated, chunked, labelled N-D array of `f64`.
///
/// Cloning is cheap: clones share the same node.
#[derive(Clone)]
pub struct ChunkedArray {
    node: Arc<Node>,
}

impl fmt::Debug for ChunkedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedArray")
            .field("name", &self.name())
            .field("op", &self.describe())
            .field("shape", &self.shape())
            .field("chunk_shape", &self.chunk_shape())
            .finish()
    }
}

impl ChunkedArray {
    pub(crate) fn new(schema: Schema, grid: ChunkGrid, op: Op) -> ChunkedArray {
        debug_assert_eq!(schema.shape(), grid.shape());

        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(
            "node {id}: {} {} {:?} (chunks: {:?})",
            op.label(),
            schema.name(),
            grid.shape(),
            grid.chunk_shape()
        );

        ChunkedArray {
            node: Arc::new(Node {
                id,
                schema,
                grid,
                op,
            }),
        }
    }

    /// Wrap a resident array, split into chunks of `chunk_shape`.
    pub fn from_array(
        schema: Schema,
        data: ndarray::ArrayD<f64>,
        chunk_shape: &[usize],
    ) -> Result<ChunkedArray> {
        if data.shape() != schema.shape().as_slice() {
            return Err(Error::shape(format!(
                "{}: data has shape {:?}, axes have {:?}",
                schema.name(),
                data.shape(),
                schema.shape()
            )));
        }

        Self::from_source(schema, chunk_shape, MemorySource::new(data))
    }

    /// A field whose chunks are read from `source` when materialized.
    pub fn from_source<S>(schema: Schema, chunk_shape: &[usize], source: S) -> Result<ChunkedArray>
    where
        S: ChunkSource + 'static,
    {
        let grid = ChunkGrid::new(&schema.shape(), chunk_shape)?;
        Ok(ChunkedArray::new(schema, grid, Op::Source(Arc::new(source))))
    }

    pub(crate) fn id(&self) -> usize {
        self.node.id
    }

    pub(crate) fn op(&self) -> &Op {
        &self.node.op
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.node.schema
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.node.schema.name()
    }

    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        self.node.schema.axes()
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.node.schema.ndim()
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.node.grid.shape()
    }

    #[must_use]
    pub fn chunk_shape(&self) -> &[usize] {
        self.node.grid.chunk_shape()
    }

    #[must_use]
    pub fn grid(&self) -> &ChunkGrid {
        &self.node.grid
    }

    pub fn axis(&self, name: &str) -> Result<&Axis> {
        self.node.schema.axis(name)
    }

    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.node.schema.axis_index(name)
    }

    /// The kind of operation producing this array.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        self.node.op.kind()
    }

    /// The time axis: the axis named `time`, or else the first axis with timestamps.
    pub fn time_axis(&self) -> Result<usize> {
        let axes = self.axes();
        axes.iter()
            .position(|a| a.name() == "time" && a.times().is_some())
            .or_else(|| axes.iter().position(|a| a.times().is_some()))
            .ok_or_else(|| Error::UnknownAxis(format!("no time axis in {}", self.name())))
    }

    /// Visit every node of the graph once, inputs before the nodes using them.
    pub(crate) fn visit<F>(&self, f: &mut F)
    where
        F: FnMut(&ChunkedArray),
    {
        fn walk<F: FnMut(&ChunkedArray)>(a: &ChunkedArray, seen: &mut Vec<usize>, f: &mut F) {
            if seen.contains(&a.id()) {
                return;
            }
            seen.push(a.id());

            for i in a.node.op.inputs() {
                walk(i, seen, f);
            }
            f(a);
        }

        walk(self, &mut Vec::new(), f);
    }

    /// Select a contiguous box. Single indices keep their axis with length 1.
    ///
    /// ```
    /// # use enstrend::prelude::*;
    /// # use ndarray::{ArrayD, IxDyn};
    /// let s = Schema::new("x", vec![Axis::index("a", 10), Axis::index("b", 4)]).unwrap();
    /// let a = ChunkedArray::from_array(s, ArrayD::zeros(IxDyn(&[10, 4])), &[5, 2]).unwrap();
    ///
    /// assert_eq!(a.select((2..8, ..)).unwrap().shape(), &[6, 4]);
    /// assert_eq!(a.select([1, 3]).unwrap().shape(), &[1, 1]);
    /// ```
    pub fn select(&self, extents: impl Into<Extents>) -> Result<ChunkedArray> {
        let extents: Extents = extents.into();
        let region = extents.region(self.shape())?;

        let schema = self.schema().slice(&region);
        let grid = ChunkGrid::new(region.count(), self.chunk_shape())?;

        Ok(ChunkedArray::new(
            schema,
            grid,
            Op::Select {
                input: self.clone(),
                offset: region.start().to_vec(),
            },
        ))
    }

    /// Select a contiguous extent along the named axis.
    pub fn isel(&self, axis: &str, extent: impl Into<Extent>) -> Result<ChunkedArray> {
        let a = self.axis_index(axis)?;
        let extent: Extent = extent.into();

        let extents = (0..self.ndim())
            .map(|i| {
                if i == a {
                    extent
                } else {
                    Extent::ALL
                }
            })
            .collect::<Vec<_>>();

        self.select(Extents::Axes(extents))
    }

    /// Select the samples with timestamps within the closed interval.
    pub fn select_time(&self, range: RangeInclusive<NaiveDateTime>) -> Result<ChunkedArray> {
        let a = self.time_axis()?;
        let times = self.axes()[a].times().unwrap_or_default();

        let lo = times.partition_point(|t| t < range.start());
        let hi = times.partition_point(|t| t <= range.end()).max(lo);

        let name = self.axes()[a].name().to_string();
        self.isel(&name, lo..hi)
    }

    /// Select the strictly increasing `indices` along the named axis.
    pub fn take(&self, axis: &str, indices: Vec<usize>) -> Result<ChunkedArray> {
        let a = self.axis_index(axis)?;
        let len = self.shape()[a];

        if let Some(w) = indices.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::argument(format!(
                "take: indices along {axis} are not strictly increasing ({} >= {})",
                w[0], w[1]
            )));
        }

        if let Some(i) = indices.iter().find(|&&i| i >= len) {
            return Err(Error::shape(format!(
                "take: index {i} is out of bounds for {axis} of length {len}"
            )));
        }

        let schema = self
            .schema()
            .with_axis(a, self.axes()[a].take(&indices));
        let grid = ChunkGrid::new(&schema.shape(), self.chunk_shape())?;

        Ok(ChunkedArray::new(
            schema,
            grid,
            Op::Take {
                input: self.clone(),
                axis: a,
                indices,
            },
        ))
    }

    /// The same values split into chunks of `chunk_shape`.
    pub fn rechunk(&self, chunk_shape: &[usize]) -> Result<ChunkedArray> {
        let grid = ChunkGrid::new(self.shape(), chunk_shape)?;
        Ok(ChunkedArray::new(
            self.schema().clone(),
            grid,
            Op::Rechunk {
                input: self.clone(),
            },
        ))
    }

    /// Apply `f` to every value.
    pub fn map<F>(&self, label: impl Into<String>, f: F) -> ChunkedArray
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        ChunkedArray::new(
            self.schema().clone(),
            self.grid().clone(),
            Op::Map {
                input: self.clone(),
                label: label.into(),
                f: Arc::new(f),
            },
        )
    }

    #[must_use]
    pub fn scale(&self, k: f64) -> ChunkedArray {
        self.map(format!("scale({k})"), move |v| v * k)
    }

    #[must_use]
    pub fn offset(&self, k: f64) -> ChunkedArray {
        self.map(format!("offset({k})"), move |v| v + k)
    }

    /// Combine with `other` value by value. The axes of `other` must be an ordered subset of the
    /// axes of this array with the same lengths; `other` is broadcast along the rest.
    pub fn zip<F>(&self, label: impl Into<String>, other: &ChunkedArray, f: F) -> Result<ChunkedArray>
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        let mut axes = Vec::with_capacity(other.ndim());

        for o in other.axes() {
            let i = self.axis_index(o.name()).map_err(|_| {
                Error::shape(format!(
                    "{}: axis {} is not an axis of {}",
                    other.name(),
                    o.name(),
                    self.name()
                ))
            })?;

            if axes.last().is_some_and(|&l| l >= i) {
                return Err(Error::shape(format!(
                    "{}: axes are not in the order of {}",
                    other.name(),
                    self.name()
                )));
            }

            if o.len() != self.shape()[i] {
                return Err(Error::shape(format!(
                    "{}: axis {} has length {}, expected {}",
                    other.name(),
                    o.name(),
                    o.len(),
                    self.shape()[i]
                )));
            }

            axes.push(i);
        }

        Ok(ChunkedArray::new(
            self.schema().clone(),
            self.grid().clone(),
            Op::Zip {
                lhs: self.clone(),
                rhs: other.clone(),
                axes,
                label: label.into(),
                f: Arc::new(f),
            },
        ))
    }

    pub fn sub(&self, other: &ChunkedArray) -> Result<ChunkedArray> {
        self.zip("sub", other, |a, b| a - b)
    }

    pub fn add(&self, other: &ChunkedArray) -> Result<ChunkedArray> {
        self.zip("add", other, |a, b| a + b)
    }

    pub fn mul(&self, other: &ChunkedArray) -> Result<ChunkedArray> {
        self.zip("mul", other, |a, b| a * b)
    }

    pub fn div(&self, other: &ChunkedArray) -> Result<ChunkedArray> {
        self.zip("div", other, |a, b| a / b)
    }

    /// Unweighted mean along the named axes.
    pub fn mean(&self, axes: &[&str]) -> Result<ChunkedArray> {
        WeightedReducer::new(axes).reduce(self)
    }

    /// Weighted mean along the named axes.
    pub fn weighted_mean(&self, weights: &Weights, axes: &[&str]) -> Result<ChunkedArray> {
        WeightedReducer::new(axes).weights(weights.clone()).reduce(self)
    }

    /// Mean over calendar periods along the time axis.
    pub fn resample(&self, period: Period, weighting: Weighting) -> Result<Resampled> {
        CalendarResampler::new(period)
            .weighting(weighting)
            .resample(self)
    }

    /// Least-squares slope along the named axis, per sample.
    pub fn trend(&self, axis: &str) -> Result<ChunkedArray> {
        TrendEstimator::new().axis(axis).estimate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn field(shape: &[usize], chunks: &[usize]) -> ChunkedArray {
        let axes = shape
            .iter()
            .enumerate()
            .map(|(i, &n)| Axis::index(format!("d{i}"), n))
            .collect();
        let schema = Schema::new("f", axes).unwrap();
        let n = shape.iter().product::<usize>();
        let data = ArrayD::from_shape_vec(IxDyn(shape), (0..n).map(|v| v as f64).collect())
            .unwrap();
        ChunkedArray::from_array(schema, data, chunks).unwrap()
    }

    #[test]
    fn from_array_shape() {
        let schema = Schema::new("f", vec![Axis::index("a", 3)]).unwrap();
        assert!(matches!(
            ChunkedArray::from_array(schema, ArrayD::zeros(IxDyn(&[4])), &[2]),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn select_shapes() {
        let a = field(&[10, 6], &[4, 4]);
        let s = a.select((2..9, 1)).unwrap();
        assert_eq!(s.shape(), &[7, 1]);
        assert_eq!(s.chunk_shape(), &[4, 1]);
        assert_eq!(s.describe(), "select");

        assert!(a.select((2..11, ..)).is_err());
        assert_eq!(a.isel("d1", 2..4).unwrap().shape(), &[10, 2]);
        assert!(matches!(a.isel("d3", 0..1), Err(Error::UnknownAxis(_))));
    }

    #[test]
    fn take_validates() {
        let a = field(&[10, 6], &[4, 4]);
        assert_eq!(a.take("d0", vec![0, 3, 9]).unwrap().shape(), &[3, 6]);
        assert!(matches!(
            a.take("d0", vec![3, 3]),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            a.take("d0", vec![3, 10]),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn zip_axes() {
        let a = field(&[2, 3, 4], &[1, 3, 4]);
        let b = field(&[2, 4], &[2, 2]);
        // d0, d1 of b are named like the first two axes of a, but d1 has the wrong length
        assert!(matches!(a.sub(&b), Err(Error::ShapeMismatch(_))));

        let c = field(&[2, 3], &[2, 3]);
        assert_eq!(a.sub(&c).unwrap().shape(), &[2, 3, 4]);
    }

    #[test]
    fn visit_once() {
        let a = field(&[4, 4], &[2, 2]);
        let b = a.scale(2.);
        let c = b.add(&a).unwrap();

        let mut seen = Vec::new();
        c.visit(&mut |n| seen.push(n.describe()));
        assert_eq!(seen, ["source", "map", "zip"]);
    }
}
