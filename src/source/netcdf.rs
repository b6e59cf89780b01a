//! Lazy reading of variables in local NetCDF files.
//!
//! Every chunk is a hyperslab read of the variable. Packed values are unpacked with
//! `scale_factor` and `add_offset`, and `_FillValue` or `missing_value` become NaN. Coordinate
//! variables with CF time units become time axes, latitudes and longitudes become axes in degrees.
use anyhow::Context as _;
use ndarray::{ArrayD, IxDyn};
use std::path::{Path, PathBuf};

use super::cf::TimeUnits;
use super::{ChunkSource, Handle, Loader};
use crate::field::{Axis, Chunk, Schema};
use crate::graph::ChunkedArray;
use crate::ops::calendar::Calendar;

/// Target number of values in a default chunk.
const CHUNK_VALUES: usize = 1 << 20;

fn attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    var.attribute_value(name)
        .and_then(|r| r.ok())
        .and_then(|v| match v {
            netcdf::AttributeValue::Double(d) => Some(d),
            netcdf::AttributeValue::Float(f) => Some(f64::from(f)),
            netcdf::AttributeValue::Int(i) => Some(f64::from(i)),
            netcdf::AttributeValue::Short(s) => Some(f64::from(s)),
            _ => None,
        })
}

fn attr_str(var: &netcdf::Variable, name: &str) -> Option<String> {
    var.attribute_value(name)
        .and_then(|r| r.ok())
        .and_then(|v| match v {
            netcdf::AttributeValue::Str(s) => Some(s),
            _ => None,
        })
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Packing {
    scale: f64,
    offset: f64,
    fill: Option<f64>,
    missing: Option<f64>,
}

impl Packing {
    fn of(var: &netcdf::Variable) -> Packing {
        Packing {
            scale: attr_f64(var, "scale_factor").unwrap_or(1.),
            offset: attr_f64(var, "add_offset").unwrap_or(0.),
            fill: attr_f64(var, "_FillValue"),
            missing: attr_f64(var, "missing_value"),
        }
    }

    fn unpack(&self, v: f64) -> f64 {
        if Some(v) == self.fill || Some(v) == self.missing {
            f64::NAN
        } else {
            v * self.scale + self.offset
        }
    }
}

/// A variable of a NetCDF file, read chunk by chunk.
#[derive(Debug, Clone)]
pub struct NetcdfSource {
    path: PathBuf,
    variable: String,
    packing: Packing,
}

impl NetcdfSource {
    /// Open `variable` of the file at `path` as a lazy array with the given chunk shape, or a
    /// default one.
    pub fn open(
        path: impl AsRef<Path>,
        variable: &str,
        chunk_shape: Option<&[usize]>,
    ) -> anyhow::Result<ChunkedArray> {
        let path = path.as_ref();
        let file = netcdf::open(path).with_context(|| format!("opening {}", path.display()))?;
        let var = file
            .variable(variable)
            .ok_or_else(|| anyhow!("{}: no variable {variable}", path.display()))?;

        let axes = var
            .dimensions()
            .iter()
            .map(|d| axis(&file, &d.name(), d.len()))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let schema = Schema::new(variable, axes)?;

        let chunk_shape = match chunk_shape {
            Some(c) => c.to_vec(),
            None => default_chunks(&schema.shape()),
        };

        debug!(
            "{}: opened {variable} with shape {:?} and chunks {chunk_shape:?}",
            path.display(),
            schema.shape()
        );

        let source = NetcdfSource {
            path: path.to_path_buf(),
            variable: variable.to_string(),
            packing: Packing::of(&var),
        };

        Ok(ChunkedArray::from_source(schema, &chunk_shape, source)?)
    }
}

impl ChunkSource for NetcdfSource {
    fn read_chunk(&self, chunk: &Chunk) -> anyhow::Result<ArrayD<f64>> {
        trace!("{}: reading {} at {:?}", self.path.display(), self.variable, chunk.offset);

        let file = netcdf::open(&self.path)?;
        let var = file
            .variable(&self.variable)
            .ok_or_else(|| anyhow!("{}: no variable {}", self.path.display(), self.variable))?;

        let extents = chunk
            .offset
            .iter()
            .zip(&chunk.shape)
            .map(|(&o, &c)| netcdf::Extent::from(o..o + c))
            .collect::<Vec<_>>();

        let values = var.get_values::<f64, _>(extents)?;
        let values = values.into_iter().map(|v| self.packing.unpack(v)).collect();

        Ok(ArrayD::from_shape_vec(IxDyn(&chunk.shape), values)?)
    }
}

/// The axis for dimension `name`, from its coordinate variable if there is one.
fn axis(file: &netcdf::File, name: &str, len: usize) -> anyhow::Result<Axis> {
    let Some(var) = file.variable(name) else {
        return Ok(Axis::index(name, len));
    };

    let units = attr_str(&var, "units").unwrap_or_default();
    let lname = name.to_ascii_lowercase();

    if units.contains(" since ") {
        let calendar = attr_str(&var, "calendar")
            .map(|c| c.parse::<Calendar>())
            .transpose()?
            .unwrap_or_default();
        let values = var.get_values::<f64, _>(..)?;
        let times = TimeUnits::parse(&units, calendar)?.decode(&values)?;
        return Ok(Axis::time(name, times)?);
    }

    if units.starts_with("degree") || ["lat", "latitude", "lon", "longitude"].contains(&lname.as_str()) {
        return Ok(Axis::degrees(name, var.get_values::<f64, _>(..)?)?);
    }

    if lname.contains("member") || lname == "realization" || lname == "ens" {
        let labels = var.get_values::<i64, _>(..)?;
        return Ok(Axis::labels(name, labels));
    }

    Ok(Axis::index(name, len))
}

/// Full extent along every axis but the first, which is cut so that a chunk holds about
/// `CHUNK_VALUES` values.
fn default_chunks(shape: &[usize]) -> Vec<usize> {
    let mut c = shape.iter().map(|&n| n.max(1)).collect::<Vec<_>>();
    if let Some((first, rest)) = c.split_first_mut() {
        let inner = rest.iter().product::<usize>().max(1);
        *first = (*first).min((CHUNK_VALUES / inner).max(1));
    }
    c
}

/// Opens catalog handles as NetCDF variables. The variable is the `variable` attribute of the
/// handle unless set here.
#[derive(Debug, Clone, Default)]
pub struct NetcdfLoader {
    variable: Option<String>,
    chunk_shape: Option<Vec<usize>>,
}

impl NetcdfLoader {
    #[must_use]
    pub fn new() -> NetcdfLoader {
        NetcdfLoader::default()
    }

    #[must_use]
    pub fn variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    #[must_use]
    pub fn chunk_shape(mut self, chunk_shape: Vec<usize>) -> Self {
        self.chunk_shape = Some(chunk_shape);
        self
    }
}

impl Loader for NetcdfLoader {
    fn open(&self, handle: &Handle) -> anyhow::Result<ChunkedArray> {
        let variable = self
            .variable
            .as_deref()
            .or_else(|| handle.get("variable"))
            .ok_or_else(|| anyhow!("{}: no variable to open", handle.location))?;

        NetcdfSource::open(&handle.location, variable, self.chunk_shape.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks() {
        assert_eq!(default_chunks(&[1200, 180, 360]), [16, 180, 360]);
        assert_eq!(default_chunks(&[10, 2, 2]), [10, 2, 2]);
        assert_eq!(default_chunks(&[5, 2048, 1024]), [1, 2048, 1024]);
        assert_eq!(default_chunks(&[]), Vec::<usize>::new());
    }

    #[test]
    fn unpack() {
        let p = Packing {
            scale: 0.5,
            offset: 273.15,
            fill: Some(-999.),
            missing: None,
        };
        assert_eq!(p.unpack(2.), 274.15);
        assert!(p.unpack(-999.).is_nan());
    }
}
