use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mapsight_core::raster::RasterMap;
use mapsight_core::region::Region;
use mapsight_core::renderer::overlay;

fn hill(res: f64) -> RasterMap {
    let region = Region::new(35.8, 35.6, -78.6, -79.0, res, res).unwrap();
    RasterMap::from_fn(region, |x, y| {
        let d2 = (x + 78.8).powi(2) + (y - 35.7).powi(2);
        (50.0 + 100.0 * (-d2 / 0.01).exp()) as f32
    })
}

fn overlay_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("raster_overlay");
    group.sample_size(10); // PNG encoding dominates

    let raster = hill(0.0005);
    for max_size in [256usize, 512, 1024] {
        let grid = overlay::overlay_grid(&raster.header, max_size).unwrap();
        group.bench_with_input(
            BenchmarkId::new("render_png", max_size),
            &grid,
            |b, grid| b.iter(|| std::hint::black_box(overlay::render_png(&raster, grid).unwrap())),
        );
    }

    // resampling only, onto a grid that is offset from the raster
    let grid = Region::new(35.75, 35.65, -78.7, -78.9, 0.0007, 0.0007).unwrap();
    group.bench_function("resample", |b| {
        b.iter(|| std::hint::black_box(raster.resample(&grid)))
    });

    group.finish();
}

criterion_group!(rendering_benches, overlay_benchmarks);
criterion_main!(rendering_benches);
