use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Coordinates along an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Coords {
    /// Strictly increasing timestamps.
    Time(Vec<NaiveDateTime>),
    /// Strictly monotonic degrees (latitude or longitude).
    Degrees(Vec<f64>),
    /// Integer labels, e.g. ensemble member ids.
    Labels(Vec<i64>),
    /// Positions only, for axes without a coordinate variable.
    Index(usize),
}

impl Coords {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Coords::Time(t) => t.len(),
            Coords::Degrees(d) => d.len(),
            Coords::Labels(l) => l.len(),
            Coords::Index(n) => *n,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice(&self, start: usize, count: usize) -> Coords {
        let r = start..start + count;
        match self {
            Coords::Time(t) => Coords::Time(t[r].to_vec()),
            Coords::Degrees(d) => Coords::Degrees(d[r].to_vec()),
            Coords::Labels(l) => Coords::Labels(l[r].to_vec()),
            Coords::Index(_) => Coords::Index(count),
        }
    }

    fn take(&self, indices: &[usize]) -> Coords {
        match self {
            Coords::Time(t) => Coords::Time(indices.iter().map(|&i| t[i]).collect()),
            Coords::Degrees(d) => Coords::Degrees(indices.iter().map(|&i| d[i]).collect()),
            Coords::Labels(l) => Coords::Labels(indices.iter().map(|&i| l[i]).collect()),
            Coords::Index(_) => Coords::Index(indices.len()),
        }
    }
}

/// A named axis of a field with its coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    name: String,
    coords: Coords,
}

impl Axis {
    /// A time axis. Timestamps must be strictly increasing.
    pub fn time(name: impl Into<String>, times: Vec<NaiveDateTime>) -> Result<Axis> {
        let name = name.into();

        if let Some(w) = times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(Error::InvalidCoordinates(format!(
                "{name}: time is not strictly increasing ({} >= {})",
                w[0], w[1]
            )));
        }

        Ok(Axis {
            name,
            coords: Coords::Time(times),
        })
    }

    /// An axis in degrees. Values must be finite and strictly monotonic, in either direction.
    pub fn degrees(name: impl Into<String>, values: Vec<f64>) -> Result<Axis> {
        let name = name.into();

        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidCoordinates(format!(
                "{name}: non-finite coordinate"
            )));
        }

        let increasing = values.windows(2).all(|w| w[0] < w[1]);
        let decreasing = values.windows(2).all(|w| w[0] > w[1]);
        if !(increasing || decreasing) {
            return Err(Error::InvalidCoordinates(format!(
                "{name}: coordinates are not strictly monotonic"
            )));
        }

        Ok(Axis {
            name,
            coords: Coords::Degrees(values),
        })
    }

    #[must_use]
    pub fn labels(name: impl Into<String>, labels: Vec<i64>) -> Axis {
        Axis {
            name: name.into(),
            coords: Coords::Labels(labels),
        }
    }

    #[must_use]
    pub fn index(name: impl Into<String>, len: usize) -> Axis {
        Axis {
            name: name.into(),
            coords: Coords::Index(len),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn coords(&self) -> &Coords {
        &self.coords
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Timestamps, if this is a time axis.
    #[must_use]
    pub fn times(&self) -> Option<&[NaiveDateTime]> {
        match &self.coords {
            Coords::Time(t) => Some(t),
            _ => None,
        }
    }

    /// Coordinates in degrees, if this is a degree axis.
    #[must_use]
    pub fn degree_values(&self) -> Option<&[f64]> {
        match &self.coords {
            Coords::Degrees(d) => Some(d),
            _ => None,
        }
    }

    pub(crate) fn slice(&self, start: usize, count: usize) -> Axis {
        Axis {
            name: self.name.clone(),
            coords: self.coords.slice(start, count),
        }
    }

    pub(crate) fn take(&self, indices: &[usize]) -> Axis {
        Axis {
            name: self.name.clone(),
            coords: self.coords.take(indices),
        }
    }
}
