//! Resampling of a time axis into calendar periods.
//!
//! The time axis is partitioned into contiguous periods (calendar years, or three month seasons)
//! starting from the period containing the first sample up to the period containing the last.
//! Every period is reduced to its mean. Periods without samples are kept, with value NaN.
//!
//! With duration weighting every sample is weighted by its duration (by default the number of
//! days in its month) relative to the total duration of the valid samples in its period, so that
//! e.g. February counts less than January in an annual mean of monthly values.
//!
//! Completeness of periods is not checked: use [`Resampled::periods`] and
//! [`Resampled::complete`] to find or keep the periods with the expected number of samples.
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use ndarray::{ArrayD, Axis as NdAxis, IxDyn, Zip};

use super::calendar::{Calendar, Period};
use super::Partial;
use crate::exec::Context;
use crate::field::{Axis, ChunkGrid, Region};
use crate::graph::{ChunkedArray, Evaluated, Op};
use crate::{Error, Result};

/// Derives the duration of every sample from its timestamp.
pub trait DurationWeights: Send + Sync {
    fn durations(&self, times: &[NaiveDateTime]) -> Vec<f64>;
}

impl<F> DurationWeights for F
where
    F: Fn(&[NaiveDateTime]) -> Vec<f64> + Send + Sync,
{
    fn durations(&self, times: &[NaiveDateTime]) -> Vec<f64> {
        self(times)
    }
}

/// Number of days in the month of every sample, for monthly data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaysInMonth {
    pub calendar: Calendar,
}

impl DaysInMonth {
    #[must_use]
    pub fn new(calendar: Calendar) -> DaysInMonth {
        DaysInMonth { calendar }
    }
}

impl DurationWeights for DaysInMonth {
    fn durations(&self, times: &[NaiveDateTime]) -> Vec<f64> {
        times
            .iter()
            .map(|t| f64::from(self.calendar.days_in_month(t.year(), t.month())))
            .collect()
    }
}

/// How samples within a period are weighted.
#[derive(Clone, Default)]
pub enum Weighting {
    /// Every valid sample counts the same.
    #[default]
    Uniform,

    /// Samples are weighted by their duration.
    Duration(Arc<dyn DurationWeights>),
}

impl fmt::Debug for Weighting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Weighting::Uniform => write!(f, "Uniform"),
            Weighting::Duration(_) => write!(f, "Duration"),
        }
    }
}

impl Weighting {
    /// Weight monthly samples by the number of days in their month.
    #[must_use]
    pub fn days_in_month(calendar: Calendar) -> Weighting {
        Weighting::Duration(Arc::new(DaysInMonth::new(calendar)))
    }

    /// Weight samples by the durations returned from `f`.
    pub fn duration<W: DurationWeights + 'static>(f: W) -> Weighting {
        Weighting::Duration(Arc::new(f))
    }
}

/// A period of a resampled time axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodLabel {
    /// First day of the period.
    pub start: NaiveDate,

    /// Raw samples of the input falling in the period.
    pub samples: Range<usize>,
}

impl PeriodLabel {
    /// The month the period starts in.
    #[must_use]
    pub fn month(&self) -> u32 {
        self.start.month()
    }

    /// Number of raw samples in the period.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Builds calendar resampling nodes.
#[derive(Debug, Clone)]
pub struct CalendarResampler {
    period: Period,
    weighting: Weighting,
    axis: Option<String>,
}

impl CalendarResampler {
    #[must_use]
    pub fn new(period: Period) -> CalendarResampler {
        CalendarResampler {
            period,
            weighting: Weighting::Uniform,
            axis: None,
        }
    }

    #[must_use]
    pub fn weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// The time axis to resample. Defaults to [`ChunkedArray::time_axis`].
    #[must_use]
    pub fn axis(mut self, axis: impl Into<String>) -> Self {
        self.axis = Some(axis.into());
        self
    }

    pub fn resample(&self, input: &ChunkedArray) -> Result<Resampled> {
        let a = match &self.axis {
            Some(name) => input.axis_index(name)?,
            None => input.time_axis()?,
        };

        let axis = &input.axes()[a];
        let times = axis.times().ok_or_else(|| {
            Error::InvalidCoordinates(format!("{} has no timestamps", axis.name()))
        })?;

        let periods = partition(times, self.period)?;

        let weights = match &self.weighting {
            Weighting::Uniform => None,
            Weighting::Duration(d) => Some(normalize(&d.durations(times), &periods)?),
        };

        let starts = periods
            .iter()
            .map(|p| p.start.and_hms_opt(0, 0, 0).unwrap_or_default())
            .collect::<Vec<_>>();
        let schema = input
            .schema()
            .with_axis(a, Axis::time(axis.name(), starts)?);

        let mut chunk_shape = input.chunk_shape().to_vec();
        chunk_shape[a] = periods.len().max(1);
        let grid = ChunkGrid::new(&schema.shape(), &chunk_shape)?;

        let array = ChunkedArray::new(
            schema,
            grid,
            Op::Resample(Resample {
                input: input.clone(),
                axis: a,
                groups: periods.iter().map(|p| p.samples.clone()).collect(),
                weights,
            }),
        );

        Ok(Resampled {
            array,
            axis: axis.name().to_string(),
            periods,
        })
    }
}

/// Periods covering `times`, from the period of the first sample to that of the last.
fn partition(times: &[NaiveDateTime], period: Period) -> Result<Vec<PeriodLabel>> {
    let mut periods = Vec::new();

    let Some(first) = times.first() else {
        return Ok(periods);
    };

    let mut start = period.start(*first);
    let mut i = 0;

    while i < times.len() {
        let next = period
            .next(start)
            .ok_or_else(|| Error::InvalidCoordinates(format!("no period after {start}")))?;
        let end = next.and_hms_opt(0, 0, 0).unwrap_or_default();

        let j = i + times[i..].partition_point(|t| *t < end);
        periods.push(PeriodLabel {
            start,
            samples: i..j,
        });

        start = next;
        i = j;
    }

    Ok(periods)
}

/// Durations scaled to sum to one within every period.
fn normalize(durations: &[f64], periods: &[PeriodLabel]) -> Result<Vec<f64>> {
    let n = periods.last().map_or(0, |p| p.samples.end);
    if durations.len() != n {
        return Err(Error::InvalidWeights(format!(
            "{} durations for {n} samples",
            durations.len()
        )));
    }

    if let Some(d) = durations.iter().find(|d| !d.is_finite() || **d < 0.) {
        return Err(Error::InvalidWeights(format!(
            "durations must be finite and non-negative, got {d}"
        )));
    }

    let mut w = durations.to_vec();
    for p in periods {
        let total = durations[p.samples.clone()].iter().sum::<f64>();
        if total > 0. {
            w[p.samples.clone()].iter_mut().for_each(|d| *d /= total);
        }
    }

    Ok(w)
}

pub(crate) struct Resample {
    input: ChunkedArray,
    axis: usize,
    groups: Vec<Range<usize>>,
    /// Normalized sample weights, `None` for uniform weighting.
    weights: Option<Vec<f64>>,
}

impl Resample {
    pub fn input(&self) -> &ChunkedArray {
        &self.input
    }

    pub fn eval(&self, region: &Region, ctx: &Context) -> Result<Evaluated> {
        let a = self.axis;
        let (s, c) = (region.start()[a], region.count()[a]);
        let groups = &self.groups[s..s + c];

        let (lo, hi) = match (groups.first(), groups.last()) {
            (Some(f), Some(l)) => (f.start, l.end),
            _ => (0, 0),
        };

        let x = if hi > lo {
            Some(self.input.values(&region.with_axis(a, lo, hi - lo), ctx)?)
        } else {
            None
        };

        let mut data = ArrayD::from_elem(IxDyn(region.count()), f64::NAN);
        let mut degenerate = 0;

        let mut lane = region.count().to_vec();
        lane.remove(a);

        for (k, g) in groups.iter().enumerate() {
            ctx.check()?;

            let mut p = Partial {
                num: ArrayD::zeros(IxDyn(&lane)),
                den: ArrayD::zeros(IxDyn(&lane)),
            };

            if let Some(x) = &x {
                for i in g.clone() {
                    let w = self.weights.as_ref().map_or(1., |w| w[i]);
                    Zip::from(&mut p.num)
                        .and(&mut p.den)
                        .and(x.index_axis(NdAxis(a), i - lo))
                        .for_each(|n, d, &v| {
                            if v.is_finite() {
                                *n += w * v;
                                *d += w;
                            }
                        });
                }
            }

            let (v, n) = p.ratio();
            data.index_axis_mut(NdAxis(a), k).assign(&v);
            degenerate += n;
        }


        Ok(Evaluated { data, degenerate })
    }
}

/// A lazily resampled array with the periods of its time axis.
#[derive(Debug, Clone)]
pub struct Resampled {
    array: ChunkedArray,
    axis: String,
    periods: Vec<PeriodLabel>,
}

impl Resampled {
    #[must_use]
    pub fn array(&self) -> &ChunkedArray {
        &self.array
    }

    #[must_use]
    pub fn into_array(self) -> ChunkedArray {
        self.array
    }

    #[must_use]
    pub fn periods(&self) -> &[PeriodLabel] {
        &self.periods
    }

    /// Number of periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Keep only the periods with exactly `samples` raw samples.
    pub fn complete(&self, samples: usize) -> Result<Resampled> {
        self.filter(|p| p.len() == samples)
    }

    /// Keep only the periods starting in `month`, e.g. 12 for the DJF winters of
    /// [`Period::seasons`].
    pub fn anchored(&self, month: u32) -> Result<Resampled> {
        if !(1..=12).contains(&month) {
            return Err(Error::argument(format!("month must be within 1..=12, got {month}")));
        }
        self.filter(|p| p.month() == month)
    }

    fn filter<F>(&self, f: F) -> Result<Resampled>
    where
        F: Fn(&PeriodLabel) -> bool,
    {
        let keep = (0..self.periods.len())
            .filter(|&i| f(&self.periods[i]))
            .collect::<Vec<_>>();
        let periods = keep.iter().map(|&i| self.periods[i].clone()).collect();

        Ok(Resampled {
            array: self.array.take(&self.axis, keep)?,
            axis: self.axis.clone(),
            periods,
        })
    }
}
