use itertools::izip;
use std::cmp::Ordering;
use strength_reduce::StrengthReducedUsize;

use super::Region;
use crate::{Error, Result};

/// A chunk of a field: one cell of its [`ChunkGrid`]. A chunk is computed (or fetched) in its
/// entirety, and is the unit of parallel work.
///
/// Edge chunks are clipped to the shape of the field, so `shape` may be smaller than the chunk
/// shape of the grid.
#[derive(Debug, Eq, Clone)]
pub struct Chunk {
    /// Position of the chunk in the row-major order of the grid.
    pub index: usize,
    pub offset: Vec<usize>,
    pub shape: Vec<usize>,
}

impl Chunk {
    /// Whether `coord` lies before (`Less`), inside (`Equal`) or after (`Greater`) the chunk, in
    /// the row-major order of the grid.
    #[must_use]
    pub fn contains(&self, coord: &[usize]) -> Ordering {
        debug_assert_eq!(coord.len(), self.offset.len());

        for (&i, &o, &n) in izip!(coord, &self.offset, &self.shape) {
            if i < o {
                return Ordering::Less;
            }
            if i >= o + n {
                return Ordering::Greater;
            }
        }

        Ordering::Equal
    }

    #[must_use]
    pub fn region(&self) -> Region {
        Region::new(self.offset.clone(), self.shape.clone())
    }

    /// Number of values in chunk.
    #[must_use]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        self.offset.cmp(&other.offset)
    }
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset && self.shape == other.shape
    }
}

/// A regular partition of a shape into chunks, which tile the shape without gaps or overlaps.
#[derive(Debug, Clone)]
pub struct ChunkGrid {
    shape: Vec<usize>,
    chunk_shape: Vec<usize>,

    /// Optimized divisor for chunk shape.
    chunk_shape_reduced: Vec<StrengthReducedUsize>,

    /// Number of chunks along every axis.
    grid_shape: Vec<usize>,

    /// Scaled dimension size: dimension size of the grid in chunk offset coordinates. The
    /// dimension size is rounded up, so that partially filled edge chunks are part of the grid.
    scaled_dim_sz: Vec<usize>,
}

impl PartialEq for ChunkGrid {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && self.chunk_shape == other.chunk_shape
    }
}

impl ChunkGrid {
    /// A grid over `shape`. Chunk dimensions larger than the shape are clipped.
    pub fn new(shape: &[usize], chunk_shape: &[usize]) -> Result<ChunkGrid> {
        if shape.len() != chunk_shape.len() {
            return Err(Error::shape(format!(
                "chunk shape {chunk_shape:?} does not have the rank of shape {shape:?}"
            )));
        }

        if chunk_shape.iter().any(|&c| c == 0) {
            return Err(Error::shape(format!(
                "chunk shape {chunk_shape:?} has a zero dimension"
            )));
        }

        let chunk_shape = chunk_shape
            .iter()
            .zip(shape)
            .map(|(&c, &s)| c.min(s.max(1)))
            .collect::<Vec<_>>();

        let chunk_shape_reduced = chunk_shape
            .iter()
            .map(|&c| StrengthReducedUsize::new(c))
            .collect();

        let grid_shape = shape
            .iter()
            .zip(&chunk_shape)
            .map(|(s, c)| (s + (c - 1)) / c)
            .collect::<Vec<_>>();

        let scaled_dim_sz = {
            let mut d = grid_shape
                .iter()
                .rev()
                .scan(1, |p, &c| {
                    let sz = *p;
                    *p *= c;
                    Some(sz)
                })
                .collect::<Vec<usize>>();
            d.reverse();
            d
        };

        Ok(ChunkGrid {
            shape: shape.to_vec(),
            chunk_shape,
            chunk_shape_reduced,
            grid_shape,
            scaled_dim_sz,
        })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn chunk_shape(&self) -> &[usize] {
        &self.chunk_shape
    }

    /// Number of chunks along every axis.
    #[must_use]
    pub fn grid_shape(&self) -> &[usize] {
        &self.grid_shape
    }

    /// Number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grid_shape.iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Chunk by its index in row-major grid order.
    #[must_use]
    pub fn chunk(&self, index: usize) -> Chunk {
        debug_assert!(index < self.len());

        let mut rest = index;
        let mut offset = Vec::with_capacity(self.shape.len());
        let mut shape = Vec::with_capacity(self.shape.len());

        for (sz, cs, s) in izip!(&self.scaled_dim_sz, &self.chunk_shape, &self.shape) {
            let g = rest / sz;
            rest -= g * sz;

            let o = g * cs;
            offset.push(o);
            shape.push((*cs).min(s - o));
        }

        Chunk {
            index,
            offset,
            shape,
        }
    }

    /// All chunks in canonical (row-major) order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.len()).map(|i| self.chunk(i))
    }

    /// The chunk holding `coord`, `None` if it is outside the grid.
    #[must_use]
    pub fn chunk_at(&self, coord: &[usize]) -> Option<Chunk> {
        if coord.len() != self.shape.len() || coord.iter().zip(&self.shape).any(|(i, s)| i >= s) {
            return None;
        }

        let index = izip!(coord, &self.chunk_shape_reduced, &self.scaled_dim_sz)
            .map(|(&i, &cs, sz)| i / cs * sz)
            .sum();

        let c = self.chunk(index);
        debug_assert_eq!(c.contains(coord), Ordering::Equal);
        Some(c)
    }

    /// Chunks overlapping `region`, in canonical order.
    #[must_use]
    pub fn intersecting(&self, region: &Region) -> Vec<Chunk> {
        debug_assert_eq!(region.ndim(), self.shape.len());

        if region.is_empty() || self.is_empty() {
            return Vec::new();
        }

        let last = izip!(region.start(), region.count())
            .map(|(s, c)| s + c - 1)
            .collect::<Vec<_>>();
        let (Some(first), Some(last)) = (self.chunk_at(region.start()), self.chunk_at(&last))
        else {
            return Vec::new();
        };

        // Range of grid coordinates along every axis.
        let ranges = izip!(&first.offset, &last.offset, &self.chunk_shape_reduced)
            .map(|(&a, &b, &cs)| (a / cs, b / cs + 1))
            .collect::<Vec<_>>();

        let n = ranges.iter().map(|(lo, hi)| hi - lo).product::<usize>();
        let mut chunks = Vec::with_capacity(n);

        for k in 0..n {
            let mut rest = k;
            let mut index = 0;
            for ((lo, hi), sz) in ranges.iter().zip(&self.scaled_dim_sz).rev() {
                let w = hi - lo;
                let g = lo + rest % w;
                rest /= w;
                index += g * sz;
            }
            chunks.push(self.chunk(index));
        }

        chunks.sort();
        chunks
    }
}
