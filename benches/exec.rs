use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use respkv::{dispatch, Store};

fn bench_exec_set_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("exec");
    group.bench_function("set_get", |b| {
        b.iter_batched(
            Store::new,
            |store| {
                for i in 0..1000u32 {
                    let k = format!("k{i}").into_bytes();
                    let v = format!("v{i}").into_bytes();
                    let _ = dispatch(&store, &[b"SET".to_vec(), k.clone(), v]);
                    let _ = dispatch(&store, &[b"GET".to_vec(), k]);
                }
                black_box(store)
            },
            BatchSize::SmallInput,
        );
    });
    group.bench_function("incr", |b| {
        b.iter_batched(
            Store::new,
            |store| {
                for _ in 0..1000u32 {
                    let _ = dispatch(&store, &[b"INCR".to_vec(), b"ctr".to_vec()]);
                }
                black_box(store)
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_exec_set_get);
criterion_main!(benches);
