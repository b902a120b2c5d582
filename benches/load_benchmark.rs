use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::path::Path;
use trodes_importer::{load_lfp, LfpOptions};

pub fn bench_load_lfp(c: &mut Criterion) {
    // Benchmarks need a real export directory in a known location
    let lfp_dir = "data/session.LFP";

    if Path::new(lfp_dir).exists() {
        c.bench_function("load_lfp_single_channel", |b| {
            b.iter(|| {
                let result = black_box(load_lfp(lfp_dir, &[1], &[1], &LfpOptions::default()));
                black_box(result.is_ok())
            });
        });
    } else {
        println!("Skipping benchmark: export directory not found at {}", lfp_dir);
    }
}

criterion_group!(benches, bench_load_lfp);
criterion_main!(benches);
