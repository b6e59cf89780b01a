use chrono::{Datelike, NaiveDate, NaiveDateTime};
use ndarray::{ArrayD, IxDyn};

use enstrend::ops::trend::fit_line;
use enstrend::prelude::*;

const YEARS: usize = 4;

fn months(y0: i32, n: usize) -> Vec<NaiveDateTime> {
    (0..n)
        .map(|i| {
            NaiveDate::from_ymd_opt(y0 + (i / 12) as i32, (i % 12) as u32 + 1, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        })
        .collect()
}

/// `member + 0.5 * year + month + (3 at the equator, 0 at 60°N)`
fn value(member: usize, t: &NaiveDateTime, lat: usize) -> f64 {
    member as f64
        + 0.5 * f64::from(t.year() - 2000)
        + f64::from(t.month())
        + if lat == 0 { 3. } else { 0. }
}

fn ensemble() -> ChunkedArray {
    let times = months(2000, 12 * YEARS);
    let schema = Schema::new(
        "tas",
        vec![
            Axis::labels("member", vec![1, 2, 3]),
            Axis::time("time", times.clone()).unwrap(),
            Axis::degrees("lat", vec![0., 60.]).unwrap(),
            Axis::degrees("lon", vec![10., 20.]).unwrap(),
        ],
    )
    .unwrap();

    let data = ArrayD::from_shape_fn(IxDyn(&[3, 12 * YEARS, 2, 2]), |ix| {
        value(ix[0], &times[ix[1]], ix[2])
    });

    // Chunks straddle the years.
    ChunkedArray::from_array(schema, data, &[1, 7, 1, 2]).unwrap()
}

/// Days-in-month weighted annual mean of the month numbers.
fn month_mean(year: i32) -> f64 {
    let cal = Calendar::Standard;
    let days = (1..=12).map(|m| f64::from(cal.days_in_month(year, m))).collect::<Vec<_>>();
    days.iter().zip(1..=12).map(|(d, m)| d * f64::from(m)).sum::<f64>() / days.iter().sum::<f64>()
}

fn annual_global(tas: &ChunkedArray) -> Resampled {
    let w = Weights::cos_lat(tas.axis("lat").unwrap()).unwrap();
    tas.weighted_mean(&w, &["lat", "lon"])
        .unwrap()
        .resample(Period::Annual, Weighting::days_in_month(Calendar::Standard))
        .unwrap()
}

#[test]
fn annual_global_means() {
    let tas = ensemble();
    let annual = annual_global(&tas);
    assert_eq!(annual.len(), YEARS);
    assert!(annual.periods().iter().all(|p| p.len() == 12));

    let m = Materializer::new(Config::default().workers(3)).unwrap();
    let r = m.materialize(annual.array()).unwrap();
    assert_eq!(r.shape(), &[3, YEARS]);
    assert_eq!(r.degenerate(), 0);

    // cos(0) = 1 and cos(60°) = 0.5: (3 * 1 + 0 * 0.5) / 1.5 = 2
    for member in 0..3 {
        for y in 0..YEARS {
            let year = 2000 + y as i32;
            let expected = member as f64 + 0.5 * y as f64 + month_mean(year) + 2.;
            let got = r.get(&[member, y]).unwrap();
            assert!((got - expected).abs() < 1e-9, "{member} {year}: {got} != {expected}");
        }
    }

    let years = r.axis("time").unwrap().times().unwrap();
    assert_eq!(years[0].year(), 2000);
    assert_eq!(years[YEARS - 1].year(), 2003);
}

#[test]
fn ensemble_mean_trend() {
    let tas = ensemble();
    let annual = annual_global(&tas).into_array();
    let ens = annual.mean(&["member"]).unwrap();
    let slope = ens.trend("time").unwrap();

    let m = Materializer::new(Config::default()).unwrap();
    let r = m
        .materialize_all([("ens", &ens), ("slope", &slope)], &CancelToken::new())
        .unwrap();

    let series = (0..YEARS)
        .map(|y| 1. + 0.5 * y as f64 + month_mean(2000 + y as i32) + 2.)
        .collect::<Vec<_>>();
    for (got, expected) in r["ens"].values().iter().zip(&series) {
        assert!((got - expected).abs() < 1e-9);
    }

    let (expected, _) = fit_line(&series).unwrap();
    assert_eq!(r["slope"].shape(), &[] as &[usize]);
    assert!((r["slope"].values()[0] - expected).abs() < 1e-9);

    // The leap year 2000 weights February more.
    assert!((expected - 0.5).abs() > 1e-6);
    assert!((expected - 0.5).abs() < 1e-2);
}

#[test]
fn two_point_trend() {
    let tas = ensemble();
    let annual = annual_global(&tas).into_array();
    let first = annual.isel("time", 0..2).unwrap();
    let slope = first.trend("time").unwrap();

    let m = Materializer::new(Config::default()).unwrap();
    let a = m.materialize(&first).unwrap();
    let s = m.materialize(&slope).unwrap();

    for member in 0..3 {
        let d = a.get(&[member, 1]).unwrap() - a.get(&[member, 0]).unwrap();
        assert!((s.get(&[member]).unwrap() - d).abs() < 1e-12);
    }
}

#[test]
fn two_point_pixel_trend() {
    let tas = ensemble();
    let annual = tas
        .resample(Period::Annual, Weighting::days_in_month(Calendar::Standard))
        .unwrap()
        .into_array()
        .isel("time", 0..2)
        .unwrap();
    let slope = annual.trend("time").unwrap();

    let m = Materializer::new(Config::default().workers(2)).unwrap();
    let a = m.materialize(&annual).unwrap();
    let s = m.materialize(&slope).unwrap();
    assert_eq!(s.shape(), &[3, 2, 2]);
    assert_eq!(s.degenerate(), 0);

    let expected = 0.5 + month_mean(2001) - month_mean(2000);
    for member in 0..3 {
        for lat in 0..2 {
            for lon in 0..2 {
                let d = a.get(&[member, 1, lat, lon]).unwrap() - a.get(&[member, 0, lat, lon]).unwrap();
                let got = s.get(&[member, lat, lon]).unwrap();
                assert!((got - d).abs() < 1e-12, "{member} {lat} {lon}: {got} != {d}");
                assert!((got - expected).abs() < 1e-9);
            }
        }
    }
}

#[test]
fn anomalies() {
    let tas = ensemble();
    let clim = tas.mean(&["time"]).unwrap();
    let anom = tas.sub(&clim).unwrap();
    let back = anom.mean(&["time"]).unwrap();

    let m = Materializer::new(Config::default()).unwrap();
    let r = m.materialize(&back).unwrap();
    assert_eq!(r.shape(), &[3, 2, 2]);
    assert!(r.data().iter().all(|v| v.abs() < 1e-12));

    let c = m.materialize(&clim).unwrap();
    let a = m.materialize(&anom).unwrap();
    let t = m.materialize(&tas).unwrap();
    assert!((a.get(&[2, 5, 0, 1]).unwrap() - (t.get(&[2, 5, 0, 1]).unwrap() - c.get(&[2, 0, 1]).unwrap())).abs() < 1e-12);
}

#[test]
fn selections_keep_values() {
    let tas = ensemble();
    let m = Materializer::new(Config::default()).unwrap();
    let full = m.materialize(&tas).unwrap();

    let rechunked = m.materialize(&tas.rechunk(&[3, 48, 2, 2]).unwrap()).unwrap();
    assert_eq!(rechunked.data(), full.data());

    let from = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let to = NaiveDate::from_ymd_opt(2001, 12, 31).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let y2001 = m.materialize(&tas.select_time(from..=to).unwrap()).unwrap();
    assert_eq!(y2001.shape(), &[3, 12, 2, 2]);
    assert_eq!(y2001.get(&[1, 0, 1, 0]), full.get(&[1, 12, 1, 0]));

    let picked = m.materialize(&tas.take("member", vec![0, 2]).unwrap()).unwrap();
    assert_eq!(picked.get(&[1, 30, 0, 0]), full.get(&[2, 30, 0, 0]));
}

#[test]
fn catalog_members() {
    let catalog = enstrend::source::MemoryCatalog::new(
        (1..=3)
            .map(|m| Handle::new(format!("r{m}")).with("experiment", "historical").with("member", m.to_string()))
            .collect(),
    );

    struct Synthetic;

    impl Loader for Synthetic {
        fn open(&self, handle: &Handle) -> anyhow::Result<ChunkedArray> {
            let member = handle.get("member").unwrap_or("0").parse::<f64>()?;
            let schema = Schema::new("tas", vec![Axis::time("time", months(2000, 24))?])?;
            let data = ArrayD::from_shape_fn(IxDyn(&[24]), |ix| member + ix[0] as f64);
            Ok(ChunkedArray::from_array(schema, data, &[6])?)
        }
    }

    let handles = catalog
        .search(&Criteria::new().equals("experiment", "historical"))
        .unwrap();
    let members = Synthetic.open_all(&handles).unwrap();
    assert_eq!(members.len(), 3);

    let m = Materializer::new(Config::default()).unwrap();
    let annual = members
        .iter()
        .map(|a| a.resample(Period::Annual, Weighting::Uniform).unwrap().into_array())
        .collect::<Vec<_>>();
    let r = m
        .materialize_all(
            annual.iter().enumerate().map(|(i, a)| (["r1", "r2", "r3"][i], a)),
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(r["r2"].values(), [2. + 5.5, 2. + 17.5]);
}
