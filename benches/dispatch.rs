use criterion::{black_box, criterion_group, criterion_main, Criterion};

use geodesic_rt::{BlockDispatcher, CpuUnit, ExecutionUnit, RayStore, RunParams};

fn bench_dispatcher_drain(c: &mut Criterion) {
    c.bench_function("dispatcher_drain_100k", |b| {
        b.iter(|| {
            let mut store = RayStore::new(100_000);
            let dispatcher = BlockDispatcher::new(&mut store, None);
            let mut total = 0usize;
            while let Some(block) = dispatcher.next_block(black_box(0)) {
                total += block.count;
            }
            total
        })
    });
}

fn bench_cpu_block_run(c: &mut Criterion) {
    let params = RunParams {
        t_final: 1.0,
        h: 0.01,
        steps_per_call: 100,
    };

    c.bench_function("cpu_block_256_rays", |b| {
        b.iter(|| {
            let mut store =
                RayStore::from_rays((0..256).map(|_| ([0.0; 4], [1.0, 1.0, 0.0, 0.0])));
            let dispatcher = BlockDispatcher::new(&mut store, None);
            let mut block = dispatcher.next_block(256).unwrap();

            let mut unit = CpuUnit::new(|pos: &mut [f32], dir: &mut [f32], h: f32, _: &[f32]| {
                for (p, d) in pos.iter_mut().zip(dir.iter()) {
                    *p += h * d;
                }
                false
            });
            unit.run_block(&mut block, black_box(&params), &[]).unwrap()
        })
    });
}

criterion_group!(benches, bench_dispatcher_drain, bench_cpu_block_run);
criterion_main!(benches);
