use divan::Bencher;
use ndarray::{ArrayD, IxDyn};
use rand::{Rng, SeedableRng};

use enstrend::ops::trend::fit_line;
use enstrend::prelude::*;

/// `time × lat × lon` with a small trend and noise.
fn field(t: usize, chunks: &[usize]) -> ChunkedArray {
    let mut rng = rand::rngs::StdRng::seed_from_u64(1);
    let data = ArrayD::from_shape_fn(IxDyn(&[t, 90, 180]), |ix| {
        0.02 * ix[0] as f64 + rng.gen_range(-1.0..1.0)
    });
    let schema = Schema::new(
        "tas",
        vec![
            Axis::index("time", t),
            Axis::index("lat", 90),
            Axis::index("lon", 180),
        ],
    )
    .unwrap();
    ChunkedArray::from_array(schema, data, chunks).unwrap()
}

#[divan::bench(args = [1, 2, 4, 8])]
fn per_pixel(b: Bencher, workers: usize) {
    let slope = field(100, &[100, 30, 60]).trend("time").unwrap();
    let m = Materializer::new(Config::default().workers(workers)).unwrap();

    b.bench_local(|| divan::black_box(m.materialize(&slope).unwrap()))
}

#[divan::bench]
fn time_chunked(b: Bencher) {
    // Every output chunk gathers ten source chunks along time.
    let slope = field(100, &[10, 30, 60]).trend("time").unwrap();
    let m = Materializer::new(Config::default()).unwrap();

    b.bench_local(|| divan::black_box(m.materialize(&slope).unwrap()))
}

#[divan::bench]
fn fit_series(b: Bencher) {
    let y = (0..1200).map(|i| 0.01 * i as f64).collect::<Vec<_>>();
    b.bench_local(|| fit_line(divan::black_box(&y)))
}

fn main() {
    divan::main();
}
