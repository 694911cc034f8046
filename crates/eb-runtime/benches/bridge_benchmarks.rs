use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eb_runtime::workloads::WorkloadRunner;
use eb_runtime::{ContextOptions, EngineKind};

fn bench_engine(c: &mut Criterion, kind: EngineKind) {
    let runner = WorkloadRunner::new(kind, ContextOptions::default()).unwrap();
    for workload in runner.workloads() {
        c.bench_function(&format!("{} {}", kind, workload), |b| {
            b.iter(|| black_box(runner.run(workload).unwrap()))
        });
    }
}

fn bench_rhai(c: &mut Criterion) {
    bench_engine(c, EngineKind::Rhai);
}

fn bench_boa(c: &mut Criterion) {
    bench_engine(c, EngineKind::Boa);
}

// Includes the shared-runtime variants.
fn bench_quickjs(c: &mut Criterion) {
    bench_engine(c, EngineKind::QuickJs);
}

criterion_group!(
    benches,
    bench_rhai,
    bench_boa,
    bench_quickjs,
);

criterion_main!(benches);
