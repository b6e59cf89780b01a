use divan::Bencher;
use ndarray::{ArrayD, IxDyn};

use enstrend::prelude::*;

fn field(chunks: &[usize]) -> ChunkedArray {
    let lat = (0..90).map(|i| -89. + 2. * i as f64).collect();
    let lon = (0..180).map(|i| 2. * i as f64).collect();
    let schema = Schema::new(
        "tas",
        vec![
            Axis::labels("member", (0..5).collect()),
            Axis::index("time", 120),
            Axis::degrees("lat", lat).unwrap(),
            Axis::degrees("lon", lon).unwrap(),
        ],
    )
    .unwrap();
    let data = ArrayD::from_shape_fn(IxDyn(&[5, 120, 90, 180]), |ix| {
        (ix[0] + ix[1]) as f64 + (ix[2] as f64).sin()
    });
    ChunkedArray::from_array(schema, data, chunks).unwrap()
}

#[divan::bench(args = [1, 2, 4, 8])]
fn area_mean(b: Bencher, workers: usize) {
    let tas = field(&[1, 12, 45, 90]);
    let w = Weights::cos_lat(tas.axis("lat").unwrap()).unwrap();
    let global = tas.weighted_mean(&w, &["lat", "lon"]).unwrap();
    let m = Materializer::new(Config::default().workers(workers)).unwrap();

    b.bench_local(|| divan::black_box(m.materialize(&global).unwrap()))
}

#[divan::bench]
fn ensemble_mean(b: Bencher) {
    let tas = field(&[1, 12, 90, 180]);
    let ens = tas.mean(&["member"]).unwrap();
    let m = Materializer::new(Config::default()).unwrap();

    b.bench_local(|| divan::black_box(m.materialize(&ens).unwrap()))
}

#[divan::bench]
fn missing_values(b: Bencher) {
    let tas = field(&[1, 12, 45, 90]).map("mask", |v| if v > 100. { f64::NAN } else { v });
    let w = Weights::cos_lat(tas.axis("lat").unwrap()).unwrap();
    let global = WeightedReducer::new(&["lat", "lon"])
        .weights(w)
        .skip_missing()
        .reduce(&tas)
        .unwrap();
    let m = Materializer::new(Config::default()).unwrap();

    b.bench_local(|| divan::black_box(m.materialize(&global).unwrap()))
}

fn main() {
    divan::main();
}
