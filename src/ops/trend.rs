//! Per-pixel linear trends.
//!
//! For every index of the other axes the least-squares line through the finite samples along the
//! time axis is fitted against the sample position `0, 1, .., T - 1`. The slope is in units per
//! sample: scale by the number of samples per year (or decade) to get a rate.
use ndarray::{ArrayView1, Axis as NdAxis, Zip};

use crate::exec::Context;
use crate::field::{ChunkGrid, Region};
use crate::graph::{ChunkedArray, Evaluated, Op};
use crate::{Error, Result};

/// Fit `y = slope * i + intercept` through the finite values of `y`, using a centred least-squares
/// fit. `None` with less than two finite values.
///
/// ```
/// use enstrend::ops::trend::fit_line;
///
/// assert_eq!(fit_line(&[5., f64::NAN, 9.]), Some((2., 5.)));
/// assert_eq!(fit_line(&[f64::NAN, 1.]), None);
/// ```
#[must_use]
pub fn fit_line(y: &[f64]) -> Option<(f64, f64)> {
    fit(ArrayView1::from(y))
}

fn fit(y: ArrayView1<f64>) -> Option<(f64, f64)> {
    let (mut n, mut sx, mut sy) = (0usize, 0., 0.);

    for (i, &v) in y.iter().enumerate() {
        if v.is_finite() {
            n += 1;
            sx += i as f64;
            sy += v;
        }
    }

    if n < 2 {
        return None;
    }

    let (mx, my) = (sx / n as f64, sy / n as f64);
    let (mut sxx, mut sxy) = (0., 0.);

    for (i, &v) in y.iter().enumerate() {
        if v.is_finite() {
            let dx = i as f64 - mx;
            sxx += dx * dx;
            sxy += dx * (v - my);
        }
    }

    let slope = sxy / sxx;
    Some((slope, my - slope * mx))
}

/// Which coefficient of the fitted line to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Coefficient {
    #[default]
    Slope,
    /// The fitted value at the first sample.
    Intercept,
}

/// Builds trend nodes.
#[derive(Debug, Clone, Default)]
pub struct TrendEstimator {
    axis: Option<String>,
    coefficient: Coefficient,
}

impl TrendEstimator {
    #[must_use]
    pub fn new() -> TrendEstimator {
        TrendEstimator::default()
    }

    /// The axis to fit along. Defaults to [`ChunkedArray::time_axis`].
    #[must_use]
    pub fn axis(mut self, axis: impl Into<String>) -> Self {
        self.axis = Some(axis.into());
        self
    }

    /// Return the intercept instead of the slope.
    #[must_use]
    pub fn intercept(mut self) -> Self {
        self.coefficient = Coefficient::Intercept;
        self
    }

    pub fn estimate(&self, input: &ChunkedArray) -> Result<ChunkedArray> {
        let a = match &self.axis {
            Some(name) => input.axis_index(name)?,
            None => input.time_axis()?,
        };

        let t = input.shape()[a];
        if t < 2 {
            return Err(Error::argument(format!(
                "{}: a trend needs at least 2 samples along {}, got {t}",
                input.name(),
                input.axes()[a].name()
            )));
        }

        let schema = input.schema().without(&[a]);
        let mut chunk_shape = input.chunk_shape().to_vec();
        chunk_shape.remove(a);
        let grid = ChunkGrid::new(&schema.shape(), &chunk_shape)?;

        Ok(ChunkedArray::new(
            schema,
            grid,
            Op::Trend(Trend {
                input: input.clone(),
                axis: a,
                coefficient: self.coefficient,
            }),
        ))
    }
}

pub(crate) struct Trend {
    input: ChunkedArray,
    axis: usize,
    coefficient: Coefficient,
}

impl Trend {
    pub fn input(&self) -> &ChunkedArray {
        &self.input
    }

    pub fn eval(&self, region: &Region, ctx: &Context) -> Result<Evaluated> {
        let t = self.input.shape()[self.axis];
        let x = self
            .input
            .values(&region.insert_axis(self.axis, 0, t), ctx)?;

        let coefficient = self.coefficient;
        let data = Zip::from(x.lanes(NdAxis(self.axis))).par_map_collect(|lane| {
            match (fit(lane), coefficient) {
                (Some((slope, _)), Coefficient::Slope) => slope,
                (Some((_, intercept)), Coefficient::Intercept) => intercept,
                (None, _) => f64::NAN,
            }
        });
        debug_assert_eq!(data.shape(), region.count());

        let degenerate = data.iter().filter(|v| v.is_nan()).count();

        Ok(Evaluated { data, degenerate })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DegeneratePolicy};
    use crate::exec::Materializer;
    use crate::field::{Axis, Schema};
    use ndarray::{ArrayD, IxDyn};
    use rand::{Rng, SeedableRng};

    fn field(t: usize, f: impl Fn(usize, usize, usize) -> f64) -> ChunkedArray {
        let schema = Schema::new(
            "x",
            vec![
                Axis::labels("member", vec![0, 1]),
                Axis::index("time", t),
                Axis::index("cell", 3),
            ],
        )
        .unwrap();
        let data = ArrayD::from_shape_fn(IxDyn(&[2, t, 3]), |ix| f(ix[0], ix[1], ix[2]));
        ChunkedArray::from_array(schema, data, &[1, 4, 2]).unwrap()
    }

    fn run(a: &ChunkedArray) -> crate::exec::Materialized {
        Materializer::new(Config::default().workers(2))
            .unwrap()
            .materialize(a)
            .unwrap()
    }

    #[test]
    fn fit_exact() {
        assert_eq!(fit_line(&[5., 7., 9., 11.]), Some((2., 5.)));
        assert_eq!(fit_line(&[3., 3.]), Some((0., 3.)));
        assert_eq!(fit_line(&[1.]), None);
        assert_eq!(fit_line(&[]), None);
        assert_eq!(fit_line(&[f64::NAN, f64::INFINITY, 4.]), None);
    }

    #[test]
    fn linear_series() {
        let a = field(10, |_, t, _| 2. * t as f64 + 5.);
        let s = run(&a.trend("time").unwrap());

        assert_eq!(s.shape(), &[2, 3]);
        assert!(s.data().iter().all(|v| (v - 2.).abs() < 1e-12));
        assert_eq!(s.degenerate(), 0);

        let i = run(&TrendEstimator::new().axis("time").intercept().estimate(&a).unwrap());
        assert!(i.data().iter().all(|v| (v - 5.).abs() < 1e-12));
    }

    #[test]
    fn per_pixel() {
        let a = field(7, |m, t, c| (m as f64 - c as f64) * t as f64);
        let s = run(&a.trend("time").unwrap());

        for m in 0..2 {
            for c in 0..3 {
                assert!((s.data()[[m, c]] - (m as f64 - c as f64)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn missing_samples() {
        let a = field(6, |m, t, c| match (m, c) {
            (0, 0) if t % 2 == 0 => f64::NAN,
            (1, 1) if t > 0 => f64::NAN,
            _ => 3. * t as f64 - 1.,
        });
        let s = run(&a.trend("time").unwrap());

        assert!((s.data()[[0, 0]] - 3.).abs() < 1e-12);
        assert!(s.data()[[1, 1]].is_nan());
        assert_eq!(s.degenerate(), 1);

        let strict = Materializer::new(Config::default().degenerate(DegeneratePolicy::Fail)).unwrap();
        assert!(matches!(
            strict.materialize(&a.trend("time").unwrap()),
            Err(Error::UndefinedReduction { cells: 1 })
        ));
    }

    #[test]
    fn noisy() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let noise = (0..2 * 200 * 3).map(|_| rng.gen_range(-0.1..0.1)).collect::<Vec<f64>>();
        let a = field(200, |m, t, c| 0.05 * t as f64 + noise[(m * 200 + t) * 3 + c]);

        let s = run(&a.trend("time").unwrap());
        assert!(s.data().iter().all(|v| (v - 0.05).abs() < 1e-3));
    }

    #[test]
    fn too_short() {
        let a = field(1, |_, _, _| 0.);
        assert!(matches!(a.trend("time"), Err(Error::InvalidArgument(_))));
        assert!(matches!(a.trend("level"), Err(Error::UnknownAxis(_))));
    }
}
