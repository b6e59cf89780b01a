use itertools::izip;
use ndarray::{ArrayD, ArrayViewD, ArrayViewMutD, Slice};

use crate::{Error, Result};

/// A rectangular box in index space, as start and count along every axis.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    start: Vec<usize>,
    count: Vec<usize>,
}

impl Region {
    pub(crate) fn new(start: Vec<usize>, count: Vec<usize>) -> Region {
        debug_assert_eq!(start.len(), count.len());
        Region { start, count }
    }

    /// The region covering all of `shape`.
    #[must_use]
    pub fn full(shape: &[usize]) -> Region {
        Region {
            start: vec![0; shape.len()],
            count: shape.to_vec(),
        }
    }

    /// A region that must lie within `shape`.
    pub fn within(start: Vec<usize>, count: Vec<usize>, shape: &[usize]) -> Result<Region> {
        if start.len() != shape.len() || count.len() != shape.len() {
            return Err(Error::shape(format!(
                "region has rank {} but the field has rank {}",
                start.len(),
                shape.len()
            )));
        }

        if izip!(&start, &count, shape).any(|(s, c, z)| s + c > *z) {
            return Err(Error::shape(format!(
                "region (start: {start:?}, count: {count:?}) is out of bounds for shape {shape:?}"
            )));
        }

        Ok(Region { start, count })
    }

    #[must_use]
    pub fn start(&self) -> &[usize] {
        &self.start
    }

    #[must_use]
    pub fn count(&self) -> &[usize] {
        &self.count
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.start.len()
    }

    /// Number of elements.
    #[must_use]
    pub fn size(&self) -> usize {
        self.count.iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count.iter().any(|&c| c == 0)
    }

    /// Overlap of two regions, `None` if they do not overlap.
    #[must_use]
    pub fn intersect(&self, other: &Region) -> Option<Region> {
        debug_assert_eq!(self.ndim(), other.ndim());

        let mut start = Vec::with_capacity(self.ndim());
        let mut count = Vec::with_capacity(self.ndim());

        for (s0, c0, s1, c1) in izip!(&self.start, &self.count, &other.start, &other.count) {
            let lo = *s0.max(s1);
            let hi = (s0 + c0).min(s1 + c1);
            if hi <= lo {
                return None;
            }
            start.push(lo);
            count.push(hi - lo);
        }

        Some(Region { start, count })
    }

    /// This region in the coordinates of `outer`, which must contain it.
    #[must_use]
    pub fn relative_to(&self, outer: &Region) -> Region {
        debug_assert!(izip!(&self.start, &outer.start).all(|(s, o)| s >= o));

        Region {
            start: izip!(&self.start, &outer.start).map(|(s, o)| s - o).collect(),
            count: self.count.clone(),
        }
    }

    /// Move the region by `by` along every axis.
    #[must_use]
    pub fn shifted(&self, by: &[usize]) -> Region {
        Region {
            start: izip!(&self.start, by).map(|(s, b)| s + b).collect(),
            count: self.count.clone(),
        }
    }

    /// Replace the extent along `axis`.
    #[must_use]
    pub fn with_axis(&self, axis: usize, start: usize, count: usize) -> Region {
        let mut r = self.clone();
        r.start[axis] = start;
        r.count[axis] = count;
        r
    }

    /// Insert a new axis with the given extent at position `axis`.
    #[must_use]
    pub fn insert_axis(&self, axis: usize, start: usize, count: usize) -> Region {
        let mut r = self.clone();
        r.start.insert(axis, start);
        r.count.insert(axis, count);
        r
    }

    /// Keep only the listed axes, in order.
    #[must_use]
    pub fn select_axes(&self, axes: &[usize]) -> Region {
        Region {
            start: axes.iter().map(|&a| self.start[a]).collect(),
            count: axes.iter().map(|&a| self.count[a]).collect(),
        }
    }

    /// View of `a` covering this region.
    pub fn view<'a>(&self, a: &'a ArrayD<f64>) -> ArrayViewD<'a, f64> {
        debug_assert_eq!(a.ndim(), self.ndim());
        a.slice_each_axis(|ad| {
            let i = ad.axis.index();
            Slice::from(self.start[i]..self.start[i] + self.count[i])
        })
    }

    /// Mutable view of `a` covering this region.
    pub fn view_mut<'a>(&self, a: &'a mut ArrayD<f64>) -> ArrayViewMutD<'a, f64> {
        debug_assert_eq!(a.ndim(), self.ndim());
        a.slice_each_axis_mut(|ad| {
            let i = ad.axis.index();
            Slice::from(self.start[i]..self.start[i] + self.count[i])
        })
    }
}
