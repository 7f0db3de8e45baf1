//! # Detector Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use nalgebra::Vector2;
use std::sync::Arc;
use track_lib::cam::{
    modifier::{ModifierKind, VisualModifier},
    params::DetectorParams,
    SimTarget, SyntheticSource,
};

fn detect_benchmark(c: &mut Criterion) {
    // ---- Build a synthetic frame ----

    let target = Arc::new(SimTarget::new(Vector2::new(400.0, 300.0), 1280, 720));
    let frame = SyntheticSource::new(1280, 720, target).unwrap().render();

    let params = DetectorParams::default();

    // ---- Run each detector over a copy of the frame ----

    for kind in ModifierKind::ALL.iter() {
        let mut modifier: Box<dyn VisualModifier> = kind.build(&params);

        c.bench_function(&format!("detect_{}", modifier.name()), |b| {
            b.iter(|| {
                let mut image = frame.clone();
                modifier.modify(&mut image).unwrap()
            })
        });
    }
}

criterion_group!(benches, detect_benchmark);
criterion_main!(benches);
