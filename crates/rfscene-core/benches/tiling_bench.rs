//! Spectrum tiling benchmarks
//!
//! Run with: cargo bench -p rfscene-core --bench tiling_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rfscene_core::{ModulatorType, SegmentDescriptor, SpectrumTiler, TilingConfig};

fn scenario(num_tx: usize, segments_per_tx: usize) -> Vec<Vec<SegmentDescriptor>> {
    (0..num_tx)
        .map(|tx| {
            let modulator = ModulatorType::ALL[tx % ModulatorType::ALL.len()];
            (0..segments_per_tx)
                .map(|s| {
                    let bw = 500.0 + 250.0 * ((tx + s) % 8) as f64;
                    SegmentDescriptor::symmetric(modulator, bw, 4.0 * bw, 0.01)
                })
                .collect()
        })
        .collect()
}

fn bench_tile(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile");

    for num_tx in [1usize, 4, 16, 64].iter() {
        let input = scenario(*num_tx, 4);
        let tiler = SpectrumTiler::default();
        let mut rng = StdRng::seed_from_u64(42);

        group.throughput(Throughput::Elements(*num_tx as u64));
        group.bench_with_input(BenchmarkId::new("non_overlap", num_tx), &input, |b, input| {
            b.iter(|| tiler.tile(black_box(input), &mut rng))
        });
    }

    group.finish();
}

fn bench_tile_overlap(c: &mut Criterion) {
    let mut group = c.benchmark_group("tile_overlap");

    let config = TilingConfig {
        is_overlap: true,
        overlap_probability: 0.5,
        ..Default::default()
    };
    let tiler = match SpectrumTiler::new(config) {
        Ok(t) => t,
        Err(e) => panic!("invalid bench config: {}", e),
    };
    let input = scenario(16, 4);
    let mut rng = StdRng::seed_from_u64(7);

    group.bench_function("16_tx", |b| b.iter(|| tiler.tile(black_box(&input), &mut rng)));

    group.finish();
}

criterion_group!(benches, bench_tile, bench_tile_overlap);
criterion_main!(benches);
