//! Reductions, calendar resampling and trends.
use ndarray::{ArrayD, Zip};

pub mod calendar;
pub mod resample;
pub mod trend;
pub mod weighted;

/// Partial sums of weighted values and of weights.
#[derive(Debug, Clone)]
pub(crate) struct Partial {
    pub num: ArrayD<f64>,
    pub den: ArrayD<f64>,
}

impl Partial {
    fn merge(mut self, other: Partial) -> Partial {
        self.num += &other.num;
        self.den += &other.den;
        self
    }

    /// `num / den`, with NaN where the total weight is zero. Returns the values and the number of
    /// such cells.
    pub fn ratio(&self) -> (ArrayD<f64>, usize) {
        let mut degenerate = 0;
        let values = Zip::from(&self.num).and(&self.den).map_collect(|&n, &d| {
            if d > 0. {
                n / d
            } else {
                degenerate += 1;
                f64::NAN
            }
        });

        (values, degenerate)
    }
}

/// Sum partials with a fixed pairwise tree: neighbours are added level by level, so the result
/// depends only on the order of `parts`.
pub(crate) fn pairwise(mut parts: Vec<Partial>) -> Option<Partial> {
    while parts.len() > 1 {
        let mut next = Vec::with_capacity((parts.len() + 1) / 2);
        let mut it = parts.into_iter();

        while let Some(a) = it.next() {
            next.push(match it.next() {
                Some(b) => a.merge(b),
                None => a,
            });
        }

        parts = next;
    }

    parts.pop()
}
