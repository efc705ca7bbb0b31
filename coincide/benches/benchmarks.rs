use coincide::{aggregate, align, RasterStack, Statistic};
use criterion::{criterion_group, criterion_main, Criterion};
use geo::geometry::Coord;
use georaster::{CellSize, Grid, Projection, RasterBuffer};
use std::collections::BTreeSet;

fn grid(side: usize, origin: (f64, f64)) -> Grid {
    Grid {
        origin: Coord {
            x: origin.0,
            y: origin.1,
        },
        cell: CellSize {
            width: 30.0,
            height: 30.0,
        },
        width: side,
        height: side,
        projection: Projection::new("EPSG:32617"),
    }
}

fn ramp(side: usize, origin: (f64, f64)) -> RasterBuffer {
    #[allow(clippy::cast_precision_loss)]
    let samples = (0..side * side).map(|v| (v % 251) as f32).collect();
    RasterBuffer::new(grid(side, origin), -9999.0, samples).unwrap()
}

fn alignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("Align");

    let reference = grid(1024, (0.0, 0.0));
    let inside = ramp(512, (3000.0, 3000.0));
    let straddling = ramp(1024, (15000.0, -9000.0));

    group.bench_with_input("inside", &(&reference, &inside), |b, (r, c)| {
        b.iter(|| align(r, c, None).unwrap())
    });
    group.bench_with_input("straddling", &(&reference, &straddling), |b, (r, c)| {
        b.iter(|| align(r, c, Some(0.0)).unwrap())
    });
}

fn statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("Aggregate");

    let stack = RasterStack::new((0..8).map(|_| ramp(512, (0.0, 0.0))).collect()).unwrap();
    let all: BTreeSet<Statistic> = Statistic::ALL.into_iter().collect();

    group.bench_with_input("8x512x512", &(stack, all), |b, (s, a)| {
        b.iter(|| aggregate(s, a, None, None).unwrap())
    });
}

criterion_group!(benches, alignment, statistics);
criterion_main!(benches);
