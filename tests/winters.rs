use chrono::{Datelike, NaiveDate, NaiveDateTime};
use ndarray::{ArrayD, IxDyn};

use enstrend::prelude::*;

/// Monthly samples from January `y0` through December `y1`.
fn months(y0: i32, y1: i32) -> Vec<NaiveDateTime> {
    (y0..=y1)
        .flat_map(|y| (1..=12).map(move |m| (y, m)))
        .map(|(y, m)| {
            NaiveDate::from_ymd_opt(y, m, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        })
        .collect()
}

/// The month number as value, at two grid points.
fn monthly(times: Vec<NaiveDateTime>) -> ChunkedArray {
    let n = times.len();
    let values = times.iter().map(|t| f64::from(t.month())).collect::<Vec<_>>();
    let schema = Schema::new(
        "tas",
        vec![Axis::time("time", times).unwrap(), Axis::index("cell", 2)],
    )
    .unwrap();
    let data = ArrayD::from_shape_fn(IxDyn(&[n, 2]), |ix| values[ix[0]]);
    ChunkedArray::from_array(schema, data, &[10, 2]).unwrap()
}

#[test]
fn thirty_four_complete_winters() {
    let tas = monthly(months(1980, 2014));
    let seasons = tas.resample(Period::seasons(), Weighting::Uniform).unwrap();

    let winters = seasons.anchored(12).unwrap();
    // Dec 1979 (Jan, Feb 1980 only) through Dec 2014 (December only).
    assert_eq!(winters.len(), 36);
    assert_eq!(winters.periods()[0].len(), 2);
    assert_eq!(winters.periods()[35].len(), 1);

    let full = winters.complete(3).unwrap();
    assert_eq!(full.len(), 34);
    assert_eq!(full.periods()[0].start, NaiveDate::from_ymd_opt(1980, 12, 1).unwrap());
    assert_eq!(full.periods()[33].start, NaiveDate::from_ymd_opt(2013, 12, 1).unwrap());

    let r = Materializer::new(Config::default()).unwrap().materialize(full.array()).unwrap();
    assert_eq!(r.shape(), &[34, 2]);
    // (12 + 1 + 2) / 3
    assert!(r.data().iter().all(|v| (v - 5.).abs() < 1e-12));
    assert_eq!(r.degenerate(), 0);
}

#[test]
fn partial_winters_are_kept_until_filtered() {
    let tas = monthly(months(1980, 1981));
    let winters = tas
        .resample(Period::seasons(), Weighting::Uniform)
        .unwrap()
        .anchored(12)
        .unwrap();

    let counts = winters.periods().iter().map(|p| (p.start.year(), p.len())).collect::<Vec<_>>();
    assert_eq!(counts, [(1979, 2), (1980, 3), (1981, 1)]);

    let r = Materializer::new(Config::default()).unwrap().materialize(winters.array()).unwrap();
    assert_eq!(r.get(&[0, 0]), Some(1.5));
    assert_eq!(r.get(&[1, 0]), Some(5.));
    assert_eq!(r.get(&[2, 1]), Some(12.));
}

#[test]
fn weighted_winters() {
    // 1984 is a leap year: the winter of 1983 has a 29 day February.
    let tas = monthly(months(1983, 1984));
    let winters = tas
        .resample(
            Period::seasons(),
            Weighting::days_in_month(Calendar::Standard),
        )
        .unwrap()
        .anchored(12)
        .unwrap()
        .complete(3)
        .unwrap();
    assert_eq!(winters.len(), 1);

    let noleap = tas
        .resample(Period::seasons(), Weighting::days_in_month(Calendar::NoLeap))
        .unwrap()
        .anchored(12)
        .unwrap()
        .complete(3)
        .unwrap();

    let m = Materializer::new(Config::default()).unwrap();
    let r = m.materialize(winters.array()).unwrap();
    let n = m.materialize(noleap.array()).unwrap();

    let expected = (31. * 12. + 31. * 1. + 29. * 2.) / 91.;
    assert!((r.get(&[0, 0]).unwrap() - expected).abs() < 1e-12);

    let expected = (31. * 12. + 31. * 1. + 28. * 2.) / 90.;
    assert!((n.get(&[0, 0]).unwrap() - expected).abs() < 1e-12);
}

#[test]
fn other_quarters() {
    // Quarters starting in November: NDJ, FMA, MJJ, ASO.
    let tas = monthly(months(2000, 2000));
    let q = tas.resample(Period::quarterly(11).unwrap(), Weighting::Uniform).unwrap();

    let starts = q.periods().iter().map(|p| (p.start.month(), p.len())).collect::<Vec<_>>();
    assert_eq!(starts, [(11, 1), (2, 3), (5, 3), (8, 3), (11, 2)]);

    assert!(Period::quarterly(0).is_err());
    assert!(Period::quarterly(13).is_err());
}
