//! Index extents for selecting a box of a field.
//!
//! ```rust
//! # use enstrend::extent::{Extent, Extents};
//! fn select(e: impl Into<Extents>) -> Extents { e.into() }
//!
//! // everything
//! select(..);
//! // one extent per axis, in any of the forms of `Extent`
//! select([Extent::from(..10), Extent::from(2..4)]);
//! select((1..10, 2..=100, 4, (3, 4)));
//! // separate start and count arrays
//! select(([1usize, 2, 3], [3usize, 2, 1]));
//! ```
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

use crate::field::Region;
use crate::{Error, Result};

/// Indices along one axis.
///
/// Built from an index (`3`), a range (`3..74`, `3..=74`, `..5`, `3..` or `..`) or a
/// `(start, count)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// A single index. The axis is kept with length 1.
    Index(usize),
    /// From `start` up to `end`, or to the end of the axis.
    Range { start: usize, end: Option<usize> },
    /// `count` indices from `start`.
    Count { start: usize, count: usize },
}

impl Extent {
    /// The whole axis.
    pub const ALL: Extent = Extent::Range {
        start: 0,
        end: None,
    };

    /// `(start, count)` along an axis of length `len`.
    fn resolve(self, len: usize) -> (usize, usize) {
        match self {
            Extent::Index(i) => (i, 1),
            Extent::Range { start, end } => {
                (start, end.unwrap_or(len).saturating_sub(start))
            }
            Extent::Count { start, count } => (start, count),
        }
    }
}

impl From<usize> for Extent {
    fn from(i: usize) -> Self {
        Extent::Index(i)
    }
}

impl From<(usize, usize)> for Extent {
    fn from((start, count): (usize, usize)) -> Self {
        Extent::Count { start, count }
    }
}

impl From<Range<usize>> for Extent {
    fn from(r: Range<usize>) -> Self {
        Extent::Range {
            start: r.start,
            end: Some(r.end),
        }
    }
}

impl From<RangeInclusive<usize>> for Extent {
    fn from(r: RangeInclusive<usize>) -> Self {
        Extent::Range {
            start: *r.start(),
            end: Some(r.end() + 1),
        }
    }
}

impl From<RangeFrom<usize>> for Extent {
    fn from(r: RangeFrom<usize>) -> Self {
        Extent::Range {
            start: r.start,
            end: None,
        }
    }
}

impl From<RangeTo<usize>> for Extent {
    fn from(r: RangeTo<usize>) -> Self {
        (0..r.end).into()
    }
}

impl From<RangeToInclusive<usize>> for Extent {
    fn from(r: RangeToInclusive<usize>) -> Self {
        (0..=r.end).into()
    }
}

impl From<RangeFull> for Extent {
    fn from(_: RangeFull) -> Self {
        Extent::ALL
    }
}

/// A box of a field: everything, or one [`Extent`] per axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Extents {
    #[default]
    All,
    Axes(Vec<Extent>),
}

impl From<RangeFull> for Extents {
    fn from(_: RangeFull) -> Self {
        Extents::All
    }
}

impl<T: Into<Extent>> From<Vec<T>> for Extents {
    fn from(v: Vec<T>) -> Self {
        Extents::Axes(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Extent>, const N: usize> From<[T; N]> for Extents {
    fn from(a: [T; N]) -> Self {
        Extents::Axes(a.into_iter().map(Into::into).collect())
    }
}

impl<const N: usize> From<([usize; N], [usize; N])> for Extents {
    fn from((start, count): ([usize; N], [usize; N])) -> Self {
        Extents::Axes(start.into_iter().zip(count).map(Extent::from).collect())
    }
}

macro_rules! from_tuple {
    ($($t:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($t: Into<Extent>),+> From<($($t,)+)> for Extents {
            fn from(($($t,)+): ($($t,)+)) -> Self {
                Extents::Axes(vec![$($t.into()),+])
            }
        }
    };
}

from_tuple!(A);
from_tuple!(A, B);
from_tuple!(A, B, C);
from_tuple!(A, B, C, D);
from_tuple!(A, B, C, D, E);
from_tuple!(A, B, C, D, E, F);

impl Extents {
    /// Resolve against `shape` into a bounds-checked region.
    pub fn region(&self, shape: &[usize]) -> Result<Region> {
        let (start, count) = match self {
            Extents::All => (vec![0; shape.len()], shape.to_vec()),
            Extents::Axes(axes) if axes.len() == shape.len() => axes
                .iter()
                .zip(shape)
                .map(|(e, &len)| e.resolve(len))
                .unzip(),
            Extents::Axes(axes) => {
                return Err(Error::shape(format!(
                    "{} extents for a field with {} axes",
                    axes.len(),
                    shape.len()
                )))
            }
        };

        Region::within(start, count, shape)
    }
}
