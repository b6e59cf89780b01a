//! Evaluation of a node over a region of its index space.
use ndarray::{ArrayD, Axis, IxDyn, Zip};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::Arc;

use super::{ChunkedArray, Op};
use crate::exec::Context;
use crate::field::Region;
use crate::source::ChunkSource;
use crate::Result;

/// Values of a region, with the number of cells of this node that had no defined value.
#[derive(Debug)]
pub(crate) struct Evaluated {
    pub data: ArrayD<f64>,
    pub degenerate: usize,
}

impl From<ArrayD<f64>> for Evaluated {
    fn from(data: ArrayD<f64>) -> Self {
        Evaluated {
            data,
            degenerate: 0,
        }
    }
}

impl ChunkedArray {
    /// Compute the values of `region`. Inputs are evaluated over the regions they are needed for.
    pub(crate) fn eval(&self, region: &Region, ctx: &Context) -> Result<Evaluated> {
        debug_assert_eq!(region.ndim(), self.ndim());
        ctx.check()?;

        match self.op() {
            Op::Source(source) => self.read(source, region, ctx).map(Evaluated::from),

            Op::Select { input, offset } => input.eval(&region.shifted(offset), ctx),

            Op::Rechunk { input } => input.eval(region, ctx),

            Op::Take {
                input,
                axis,
                indices,
            } => {
                if region.is_empty() {
                    return Ok(ArrayD::zeros(IxDyn(region.count())).into());
                }

                let s = region.start()[*axis];
                let idx = &indices[s..s + region.count()[*axis]];

                // Only the taken indices are evaluated, one contiguous run at a time.
                let mut parts = Vec::new();
                let mut degenerate = 0;
                for run in runs(idx) {
                    let e = input.eval(&region.with_axis(*axis, run.start, run.len()), ctx)?;
                    degenerate += e.degenerate;
                    parts.push(e.data);
                }

                let views = parts.iter().map(|p| p.view()).collect::<Vec<_>>();
                Ok(Evaluated {
                    data: ndarray::concatenate(Axis(*axis), &views)?,
                    degenerate,
                })
            }

            Op::Map { input, f, .. } => {
                let data = input.values(region, ctx)?;
                Ok(data.mapv_into(|v| f(v)).into())
            }

            Op::Zip {
                lhs, rhs, axes, f, ..
            } => {
                let a = lhs.values(region, ctx)?;
                let mut b = rhs.values(&region.select_axes(axes), ctx)?;
                for i in 0..region.ndim() {
                    if !axes.contains(&i) {
                        b.insert_axis_inplace(Axis(i));
                    }
                }

                Ok(Zip::from(&a)
                    .and_broadcast(&b)
                    .map_collect(|&x, &y| f(x, y))
                    .into())
            }

            Op::Reduce(r) => r.eval(region, ctx),
            Op::Resample(r) => r.eval(region, ctx),
            Op::Trend(t) => t.eval(region, ctx),
        }
    }

    /// Values of `region`. Cells without a defined value in this node are not reported: they
    /// belong to an intermediate result.
    pub(crate) fn values(&self, region: &Region, ctx: &Context) -> Result<ArrayD<f64>> {
        Ok(self.eval(region, ctx)?.data)
    }

    /// Assemble `region` from the source chunks overlapping it.
    fn read(
        &self,
        source: &Arc<dyn ChunkSource>,
        region: &Region,
        ctx: &Context,
    ) -> Result<ArrayD<f64>> {
        let chunks = self.grid().intersecting(region);

        let parts = chunks
            .par_iter()
            .map(|c| ctx.fetch(self.id(), source.as_ref(), c).map(|d| (c, d)))
            .collect::<Result<Vec<_>>>()?;

        let mut out = ArrayD::from_elem(IxDyn(region.count()), f64::NAN);

        for (c, d) in parts {
            let cr = c.region();
            if let Some(o) = cr.intersect(region) {
                o.relative_to(region)
                    .view_mut(&mut out)
                    .assign(&o.relative_to(&cr).view(&d));
            }
        }

        Ok(out)
    }
}

/// Split indices into runs of consecutive indices, keeping their order.
fn runs(idx: &[usize]) -> Vec<Range<usize>> {
    let mut runs: Vec<Range<usize>> = Vec::new();
    for &i in idx {
        match runs.last_mut() {
            Some(r) if r.end == i => r.end += 1,
            _ => runs.push(i..i + 1),
        }
    }
    runs
}
