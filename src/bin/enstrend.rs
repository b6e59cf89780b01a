//! Print the area weighted annual (or winter) mean series of a variable in a NetCDF file, and a
//! summary of its trend.
use clap::{Parser, ValueEnum};
use ndarray::Axis as NdAxis;
use std::path::PathBuf;

use enstrend::prelude::*;
use enstrend::source::netcdf::NetcdfSource;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Periods {
    Annual,
    Djf,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// NetCDF file
    input: PathBuf,

    /// Variable to summarize
    variable: String,

    #[arg(long, default_value = "lat")]
    lat: String,

    #[arg(long, default_value = "lon")]
    lon: String,

    #[arg(long, value_enum, default_value = "annual")]
    periods: Periods,

    /// Weight months by their number of days in this calendar
    #[arg(long)]
    days_in_month: Option<Calendar>,

    /// Worker threads (default: one per core)
    #[arg(short, long)]
    workers: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::from_env()?;
    if let Some(w) = args.workers {
        config = config.workers(w);
    }

    let field = NetcdfSource::open(&args.input, &args.variable, None)?;
    println!(
        "{}: {:?} {:?}",
        field.name(),
        field.axes().iter().map(Axis::name).collect::<Vec<_>>(),
        field.shape()
    );

    let area = Weights::cos_lat(field.axis(&args.lat)?)?;
    let mean = field.weighted_mean(&area, &[args.lat.as_str(), args.lon.as_str()])?;

    let weighting = match args.days_in_month {
        Some(c) => Weighting::days_in_month(c),
        None => Weighting::Uniform,
    };

    let series = match args.periods {
        Periods::Annual => mean.resample(Period::Annual, weighting)?.complete(12)?,
        Periods::Djf => mean
            .resample(Period::seasons(), weighting)?
            .anchored(12)?
            .complete(3)?,
    };
    let slope = TrendEstimator::new().estimate(series.array())?;

    let m = Materializer::new(config)?;
    let r = m.materialize_all(
        [("series", series.array()), ("slope", &slope)],
        &CancelToken::new(),
    )?;

    let t = series.array().time_axis()?;
    for (p, values) in series.periods().iter().zip(r["series"].data().axis_iter(NdAxis(t))) {
        let values = values.iter().map(|v| format!("{v:10.4}")).collect::<Vec<_>>();
        println!("{}  {}", p.start, values.join(" "));
    }

    let slope = &r["slope"];
    let finite = slope.values().into_iter().filter(|v| v.is_finite()).collect::<Vec<_>>();
    if finite.is_empty() {
        println!("trend: undefined ({} periods)", series.len());
    } else {
        let per_decade = finite.iter().map(|s| s * 10.).collect::<Vec<_>>();
        let avg = per_decade.iter().sum::<f64>() / per_decade.len() as f64;
        let lo = per_decade.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = per_decade.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        println!(
            "trend per decade over {} periods: mean {avg:.4}, min {lo:.4}, max {hi:.4}",
            series.len()
        );
    }

    Ok(())
}
