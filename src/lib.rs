//! # ENSTREND
//!
//! A lazy, chunked aggregation and trend engine for ensemble climate fields.
//!
//! Fields (for instance `member × time × lat × lon`) are described by a [schema](field::Schema)
//! and split into rectangular [chunks](field::Chunk). Operations on a
//! [`ChunkedArray`](graph::ChunkedArray) only build a computation graph: nothing is read or
//! computed until the graph is handed to a [`Materializer`](exec::Materializer), which evaluates
//! the output chunks in parallel on a pool of workers and assembles the result.
//!
//! The building blocks are:
//!
//! * [weighted means](ops::weighted::WeightedReducer) along a set of axes, e.g. area weighted
//!   by `cos(lat)`,
//! * [calendar resampling](ops::resample::CalendarResampler) into annual or quarterly periods,
//!   optionally weighted by the length of every month,
//! * [per-pixel trends](ops::trend::TrendEstimator): the least-squares slope along time for
//!   every other index, skipping missing samples.
//!
//! ## Usage
//!
//! ```
//! use enstrend::prelude::*;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let schema = Schema::new(
//!     "tas",
//!     vec![Axis::index("time", 10), Axis::degrees("lat", vec![-30., 30.]).unwrap()],
//! )
//! .unwrap();
//! let data = ArrayD::from_shape_fn(IxDyn(&[10, 2]), |ix| 2. * ix[0] as f64 + 5.);
//! let tas = ChunkedArray::from_array(schema, data, &[5, 1]).unwrap();
//!
//! let slope = tas.trend("time").unwrap();
//!
//! let m = Materializer::new(Config::default()).unwrap();
//! let r = m.materialize(&slope).unwrap();
//! assert!(r.data().iter().all(|s| (s - 2.).abs() < 1e-12));
//! ```
//!
//! Fields enter the engine through a [`ChunkSource`](source::ChunkSource), usually obtained
//! from a [`Catalog`](source::Catalog) and a [`Loader`](source::Loader).

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

pub mod config;
mod error;
pub mod exec;
pub mod extent;
pub mod field;
pub mod graph;
pub mod ops;
pub mod source;

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::config::{Config, DegeneratePolicy};
    pub use crate::exec::{CancelToken, Materialized, Materializer};
    pub use crate::field::{Axis, Chunk, ChunkGrid, Coords, Region, Schema};
    pub use crate::graph::ChunkedArray;
    pub use crate::ops::calendar::{Calendar, Period};
    pub use crate::ops::resample::{CalendarResampler, DaysInMonth, Resampled, Weighting};
    pub use crate::ops::trend::TrendEstimator;
    pub use crate::ops::weighted::{WeightedReducer, Weights};
    pub use crate::source::{Catalog, ChunkSource, Criteria, Handle, Loader};
    pub use crate::{Error, Result};
}
