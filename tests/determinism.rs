use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{ArrayD, IxDyn};
use rand::{Rng, SeedableRng};

use enstrend::prelude::*;

fn months(n: usize) -> Vec<NaiveDateTime> {
    (0..n)
        .map(|i| {
            NaiveDate::from_ymd_opt(1950 + (i / 12) as i32, (i % 12) as u32 + 1, 16)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap()
        })
        .collect()
}

fn noisy(chunks: &[usize]) -> ChunkedArray {
    let (members, t, nlat, nlon) = (4, 240, 9, 12);
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);

    let data = ArrayD::from_shape_simple_fn(IxDyn(&[members, t, nlat, nlon]), || {
        if rng.gen_bool(0.02) {
            f64::NAN
        } else {
            rng.gen_range(250.0..300.0)
        }
    });

    let lat = (0..nlat).map(|i| -80. + 20. * i as f64).collect();
    let lon = (0..nlon).map(|i| 30. * i as f64).collect();
    let schema = Schema::new(
        "tas",
        vec![
            Axis::labels("member", (1..=members as i64).collect()),
            Axis::time("time", months(t)).unwrap(),
            Axis::degrees("lat", lat).unwrap(),
            Axis::degrees("lon", lon).unwrap(),
        ],
    )
    .unwrap();

    ChunkedArray::from_array(schema, data, chunks).unwrap()
}

fn pipeline(tas: &ChunkedArray) -> Vec<ChunkedArray> {
    let w = Weights::cos_lat(tas.axis("lat").unwrap()).unwrap();
    let global = WeightedReducer::new(&["lat", "lon"])
        .weights(w)
        .skip_missing()
        .reduce(tas)
        .unwrap();
    let annual = global
        .resample(Period::Annual, Weighting::days_in_month(Calendar::Standard))
        .unwrap()
        .into_array();
    let ens = annual.mean(&["member"]).unwrap();

    let pixel = tas
        .resample(Period::Annual, Weighting::Uniform)
        .unwrap()
        .into_array()
        .trend("time")
        .unwrap();

    vec![global, annual, ens, pixel]
}

fn bits(m: &Materialized) -> Vec<u64> {
    m.data().iter().map(|v| v.to_bits()).collect()
}

fn run(workers: usize, arrays: &[ChunkedArray]) -> Vec<Vec<u64>> {
    let m = Materializer::new(Config::default().workers(workers)).unwrap();
    arrays.iter().map(|a| bits(&m.materialize(a).unwrap())).collect()
}

#[test]
fn independent_of_workers() {
    let arrays = pipeline(&noisy(&[1, 17, 4, 5]));

    let one = run(1, &arrays);
    for workers in [2, 3, 8] {
        assert_eq!(run(workers, &arrays), one, "{workers} workers");
    }
}

#[test]
fn repeatable() {
    let arrays = pipeline(&noisy(&[2, 50, 9, 6]));
    let m = Materializer::new(Config::default().workers(4)).unwrap();

    let first = arrays.iter().map(|a| bits(&m.materialize(a).unwrap())).collect::<Vec<_>>();
    for _ in 0..3 {
        let again = arrays.iter().map(|a| bits(&m.materialize(a).unwrap())).collect::<Vec<_>>();
        assert_eq!(again, first);
    }
}

#[test]
fn independent_of_cache() {
    let arrays = pipeline(&noisy(&[1, 17, 4, 5]));

    let small = Materializer::new(Config::default().workers(4).cache_bytes(0)).unwrap();
    let large = Materializer::new(Config::default().workers(4)).unwrap();

    for a in &arrays {
        assert_eq!(bits(&small.materialize(a).unwrap()), bits(&large.materialize(a).unwrap()));
    }
}

#[test]
fn close_across_chunkings() {
    let a = pipeline(&noisy(&[1, 17, 4, 5]));
    let b = pipeline(&noisy(&[4, 240, 9, 12]));

    let m = Materializer::new(Config::default()).unwrap();
    for (a, b) in a.iter().zip(&b) {
        let (a, b) = (m.materialize(a).unwrap(), m.materialize(b).unwrap());
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.data().iter().zip(b.data()) {
            assert!((x - y).abs() <= 1e-9 * x.abs().max(1.) || (x.is_nan() && y.is_nan()));
        }
    }
}
