//! Weighted means along a set of axes.
//!
//! The weighted mean of a field `F` along the axes `R` with weights `W` is
//! `sum_R(F * W) / sum_R(W)` at every remaining index. Weights are given over a subset of the
//! axes of the field, matched by name, and are broadcast along the rest.
//!
//! ```
//! use enstrend::prelude::*;
//! use ndarray::{ArrayD, IxDyn};
//!
//! let lat = Axis::degrees("lat", vec![0., 60.]).unwrap();
//! let schema = Schema::new("tas", vec![Axis::index("time", 3), lat.clone()]).unwrap();
//! let tas = ArrayD::from_shape_vec(IxDyn(&[3, 2]), vec![1., 4., 1., 4., 1., 4.]).unwrap();
//! let tas = ChunkedArray::from_array(schema, tas, &[1, 2]).unwrap();
//!
//! // cos(60°) = 0.5: (1 * 1 + 4 * 0.5) / 1.5 = 2
//! let w = Weights::cos_lat(&lat).unwrap();
//! let global = tas.weighted_mean(&w, &["lat"]).unwrap();
//!
//! let r = Materializer::new(Config::default()).unwrap().materialize(&global).unwrap();
//! assert!(r.data().iter().all(|v| (v - 2.).abs() < 1e-12));
//! ```
use itertools::Itertools;
use ndarray::{ArrayD, Axis as NdAxis, IxDyn, Zip};
use rayon::prelude::*;

use super::{pairwise, Partial};
use crate::exec::Context;
use crate::field::{Axis, ChunkGrid, Region};
use crate::graph::{ChunkedArray, Evaluated, Op};
use crate::{Error, Result};

/// Non-negative, finite weights over named axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights {
    axes: Vec<String>,
    data: ArrayD<f64>,
}

impl Weights {
    /// Weights over `axes`, in the order of the axes of `data`. An axis of length 1 is broadcast.
    pub fn new(axes: &[&str], data: ArrayD<f64>) -> Result<Weights> {
        if axes.len() != data.ndim() {
            return Err(Error::shape(format!(
                "{} weight axes for weights of rank {}",
                axes.len(),
                data.ndim()
            )));
        }

        if let Some(a) = axes.iter().duplicates().next() {
            return Err(Error::argument(format!("duplicate weight axis {a}")));
        }

        if let Some(w) = data.iter().find(|w| !w.is_finite() || **w < 0.) {
            return Err(Error::InvalidWeights(format!(
                "weights must be finite and non-negative, got {w}"
            )));
        }

        Ok(Weights {
            axes: axes.iter().map(|a| a.to_string()).collect(),
            data,
        })
    }

    /// Equal weights along `axes`.
    #[must_use]
    pub fn uniform(axes: &[&str]) -> Weights {
        Weights {
            axes: axes.iter().map(|a| a.to_string()).collect(),
            data: ArrayD::ones(IxDyn(&vec![1; axes.len()])),
        }
    }

    /// Area weights `cos(lat)` of a latitude axis in degrees.
    pub fn cos_lat(lat: &Axis) -> Result<Weights> {
        let deg = lat.degree_values().ok_or_else(|| {
            Error::InvalidCoordinates(format!("{} is not in degrees", lat.name()))
        })?;

        if let Some(d) = deg.iter().find(|d| d.abs() > 90.) {
            return Err(Error::InvalidCoordinates(format!(
                "{}: latitude {d} is outside [-90, 90]",
                lat.name()
            )));
        }

        let w = deg
            .iter()
            .map(|d| d.to_radians().cos().max(0.))
            .collect::<Vec<_>>();

        Weights::new(&[lat.name()], ArrayD::from_shape_vec(IxDyn(&[w.len()]), w)?)
    }

    #[must_use]
    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    #[must_use]
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }
}

/// Builds weighted mean nodes.
#[derive(Debug, Clone, Default)]
pub struct WeightedReducer {
    axes: Vec<String>,
    weights: Option<Weights>,
    skip_missing: bool,
}

impl WeightedReducer {
    /// Reduce along `axes`. Without weights every sample has weight 1.
    #[must_use]
    pub fn new(axes: &[&str]) -> WeightedReducer {
        WeightedReducer {
            axes: axes.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn weights(mut self, weights: Weights) -> Self {
        self.weights = Some(weights);
        self
    }

    /// Exclude non-finite samples: they add nothing to the numerator and their weight is
    /// dropped from the denominator. By default they propagate into the result.
    #[must_use]
    pub fn skip_missing(mut self) -> Self {
        self.skip_missing = true;
        self
    }

    pub fn reduce(&self, input: &ChunkedArray) -> Result<ChunkedArray> {
        let mut axes = self
            .axes
            .iter()
            .map(|a| input.axis_index(a))
            .collect::<Result<Vec<_>>>()?;
        axes.sort_unstable();

        if axes.windows(2).any(|w| w[0] == w[1]) {
            return Err(Error::argument(format!(
                "duplicate reduction axis in {:?}",
                self.axes
            )));
        }

        let weights = self
            .weights
            .as_ref()
            .map(|w| align(w, input, &axes))
            .transpose()?;

        let schema = input.schema().without(&axes);
        let chunk_shape = input
            .chunk_shape()
            .iter()
            .enumerate()
            .filter(|(i, _)| !axes.contains(i))
            .map(|(_, &c)| c)
            .collect::<Vec<_>>();
        let grid = ChunkGrid::new(&schema.shape(), &chunk_shape)?;
        let keep = (0..input.ndim()).filter(|i| !axes.contains(i)).collect();

        Ok(ChunkedArray::new(
            schema,
            grid,
            Op::Reduce(Reduce {
                input: input.clone(),
                axes,
                keep,
                weights,
                skip_missing: self.skip_missing,
            }),
        ))
    }
}

/// Weights laid out along the axes of `input`, with length 1 along axes without weights.
fn align(w: &Weights, input: &ChunkedArray, reduced: &[usize]) -> Result<ArrayD<f64>> {
    let mut pos = Vec::with_capacity(w.axes.len());

    for (name, &len) in w.axes.iter().zip(w.data.shape()) {
        let i = input.axis_index(name).map_err(|_| {
            Error::shape(format!(
                "weight axis {name} is not an axis of {}",
                input.name()
            ))
        })?;

        let n = input.shape()[i];
        if len != n && len != 1 {
            return Err(Error::shape(format!(
                "weights have length {len} along {name}, {} has {n}",
                input.name()
            )));
        }

        if len != 1 && !reduced.contains(&i) {
            return Err(Error::shape(format!(
                "weights vary along {name}, which is not reduced"
            )));
        }

        pos.push(i);
    }

    // Permute weight axes into field order, then add the missing axes.
    let order = (0..pos.len()).sorted_by_key(|&k| pos[k]).collect::<Vec<_>>();
    let mut data = w.data.clone().permuted_axes(IxDyn(&order));
    for i in 0..input.ndim() {
        if !pos.contains(&i) {
            data.insert_axis_inplace(NdAxis(i));
        }
    }

    Ok(data.as_standard_layout().into_owned())
}

pub(crate) struct Reduce {
    input: ChunkedArray,
    /// Reduced axes, ascending.
    axes: Vec<usize>,
    /// Remaining axes, ascending.
    keep: Vec<usize>,
    weights: Option<ArrayD<f64>>,
    skip_missing: bool,
}

impl Reduce {
    pub fn input(&self) -> &ChunkedArray {
        &self.input
    }

    /// Partial sums are computed for every input chunk overlapping the region, and summed per
    /// output piece with a fixed pairwise tree in chunk order.
    pub fn eval(&self, region: &Region, ctx: &Context) -> Result<Evaluated> {
        let shape = self.input.shape();

        let mut source = region.clone();
        for &a in &self.axes {
            source = source.insert_axis(a, 0, shape[a]);
        }

        let pieces = self
            .input
            .grid()
            .intersecting(&source)
            .into_iter()
            .filter_map(|c| c.region().intersect(&source))
            .collect::<Vec<_>>();

        let partials = pieces
            .par_iter()
            .map(|p| {
                ctx.check()?;
                let x = self.input.values(p, ctx)?;
                let out = p.select_axes(&self.keep).relative_to(region);
                Ok((out, self.partial(&x, p)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut total = Partial {
            num: ArrayD::zeros(IxDyn(region.count())),
            den: ArrayD::zeros(IxDyn(region.count())),
        };

        for (out, parts) in partials.into_iter().into_group_map() {
            if let Some(s) = pairwise(parts) {
                out.view_mut(&mut total.num).assign(&s.num);
                out.view_mut(&mut total.den).assign(&s.den);
            }
        }

        let (data, degenerate) = total.ratio();

        Ok(Evaluated { data, degenerate })
    }

    /// Sums over the reduced axes of the piece `x` covering `p`.
    fn partial(&self, x: &ArrayD<f64>, p: &Region) -> Result<Partial> {
        let mut num = ArrayD::zeros(x.raw_dim());
        let mut den = ArrayD::zeros(x.raw_dim());

        let skip = self.skip_missing;
        let f = |n: &mut f64, d: &mut f64, x: f64, w: f64| {
            if skip && !x.is_finite() {
                *n = 0.;
                *d = 0.;
            } else {
                *n = x * w;
                *d = w;
            }
        };

        match &self.weights {
            Some(weights) => {
                let (start, count): (Vec<usize>, Vec<usize>) = weights
                    .shape()
                    .iter()
                    .zip(p.start().iter().zip(p.count()))
                    .map(|(&n, (&s, &c))| if n == 1 { (0, 1) } else { (s, c) })
                    .unzip();
                let w = Region::new(start, count).view(weights);
                let w = w.broadcast(x.raw_dim()).ok_or_else(|| {
                    Error::shape(format!(
                        "weights {:?} do not broadcast to {:?}",
                        w.shape(),
                        x.shape()
                    ))
                })?;

                Zip::from(&mut num)
                    .and(&mut den)
                    .and(x)
                    .and(&w)
                    .for_each(|n, d, &x, &w| f(n, d, x, w));
            }
            None => {
                Zip::from(&mut num)
                    .and(&mut den)
                    .and(x)
                    .for_each(|n, d, &x| f(n, d, x, 1.));
            }
        }

        for &a in self.axes.iter().rev() {
            num = num.sum_axis(NdAxis(a));
            den = den.sum_axis(NdAxis(a));
        }

        Ok(Partial { num, den })
    }
}
