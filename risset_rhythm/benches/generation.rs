// Benchmarks for arc generation and the ratio sweep audit.
//
// Generation cost is dominated by the fixed-step walks, which scale with
// metabar length, so the single-generation group sweeps measure counts.
//
// Run with `cargo bench -p risset_rhythm`.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use risset_rhythm::arc::ArcAssembler;
use risset_rhythm::batch::{STANDARD_AUDIT_RATIOS, audit_matrix};
use risset_rhythm::config::{Direction, OnsetModel, RissetConfig};

const MEASURE_COUNTS: [u32; 3] = [4, 8, 32];

fn bench_generate(c: &mut Criterion) {
    let assembler = ArcAssembler::default();
    let mut group = c.benchmark_group("generate_arc");

    for model in [OnsetModel::PhaseAccumulation, OnsetModel::ClosedForm] {
        for &measures in &MEASURE_COUNTS {
            let mut config = RissetConfig::new(Direction::Accel);
            config.measure_count = measures;
            config.onset_model = model;

            let id = BenchmarkId::new(format!("{model:?}"), measures);
            group.bench_with_input(id, &config, |b, config| {
                b.iter(|| assembler.generate(black_box(config)))
            });
        }
    }
    group.finish();
}

fn bench_audit_matrix(c: &mut Criterion) {
    let assembler = ArcAssembler::default();
    let template = RissetConfig::new(Direction::Accel);
    let mut group = c.benchmark_group("audit_matrix");
    group.sample_size(20);
    group.bench_function("standard_ratios", |b| {
        b.iter(|| audit_matrix(&assembler, black_box(&template), &STANDARD_AUDIT_RATIOS, &[4, 8]))
    });
    group.finish();
}

criterion_group!(benches, bench_generate, bench_audit_matrix);
criterion_main!(benches);
