//! Labelled axes, regions and chunk grids describing a field.

mod axis;
mod chunk;
mod region;

pub use axis::{Axis, Coords};
pub use chunk::{Chunk, ChunkGrid};
pub use region::Region;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name and ordered axes of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    name: String,
    axes: Vec<Axis>,
}

impl Schema {
    pub fn new(name: impl Into<String>, axes: Vec<Axis>) -> Result<Schema> {
        let name = name.into();

        for (i, a) in axes.iter().enumerate() {
            if axes[..i].iter().any(|b| b.name() == a.name()) {
                return Err(Error::InvalidCoordinates(format!(
                    "{name}: duplicate axis {}",
                    a.name()
                )));
            }
        }

        Ok(Schema { name, axes })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    #[must_use]
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.axes.iter().map(Axis::len).collect()
    }

    /// Number of values.
    #[must_use]
    pub fn size(&self) -> usize {
        self.axes.iter().map(Axis::len).product()
    }

    pub fn axis_index(&self, name: &str) -> Result<usize> {
        self.axes
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| Error::UnknownAxis(format!("{name} (field {})", self.name)))
    }

    pub fn axis(&self, name: &str) -> Result<&Axis> {
        Ok(&self.axes[self.axis_index(name)?])
    }

    /// Schema without the listed axes.
    #[must_use]
    pub(crate) fn without(&self, axes: &[usize]) -> Schema {
        Schema {
            name: self.name.clone(),
            axes: self
                .axes
                .iter()
                .enumerate()
                .filter(|(i, _)| !axes.contains(i))
                .map(|(_, a)| a.clone())
                .collect(),
        }
    }

    /// Schema with axis `i` replaced.
    #[must_use]
    pub(crate) fn with_axis(&self, i: usize, axis: Axis) -> Schema {
        let mut s = self.clone();
        s.axes[i] = axis;
        s
    }

    /// Schema restricted to `region`.
    #[must_use]
    pub(crate) fn slice(&self, region: &Region) -> Schema {
        Schema {
            name: self.name.clone(),
            axes: self
                .axes
                .iter()
                .zip(region.start().iter().zip(region.count()))
                .map(|(a, (&s, &c))| a.slice(s, c))
                .collect(),
        }
    }
}
