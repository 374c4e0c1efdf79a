use awards_api::rate_limit::{
    is_protected_path, is_write_method, AdmissionMiddleware, BucketKey, BucketPolicy,
    InMemoryTokenBucketStore, RateGovernor, TokenBucketStore,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use http::Method;
use std::sync::Arc;

fn benchmark_classification(c: &mut Criterion) {
    let cases = [
        (Method::POST, "/api/employees"),
        (Method::GET, "/api/employees/42"),
        (Method::DELETE, "/api/activities/7"),
        (Method::POST, "/health"),
    ];

    c.bench_function("classify_requests", |b| {
        b.iter(|| {
            for (method, path) in &cases {
                black_box(is_write_method(black_box(method)) && is_protected_path(path, "/api/"));
            }
        })
    });
}

fn benchmark_memory_store_admit(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let mut group = c.benchmark_group("memory_store_admit");

    for capacity in [10u32, 1_000, 100_000] {
        let store = InMemoryTokenBucketStore::new();
        let policy = BucketPolicy::new(capacity, 60, true).expect("Invalid policy");
        let key = BucketKey::global_write();

        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.to_async(&runtime)
                .iter(|| async { black_box(store.admit(&key, &policy).await) })
        });
    }

    group.finish();
}

fn benchmark_evaluate(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let admission = AdmissionMiddleware::new(
        Arc::new(RateGovernor::new(Arc::new(InMemoryTokenBucketStore::new()))),
        BucketPolicy::new(100, 60, true).expect("Invalid policy"),
        BucketKey::global_write(),
        "/api/",
    );

    c.bench_function("evaluate_read_passthrough", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(admission.evaluate(&Method::GET, "/api/employees").await) })
    });

    c.bench_function("evaluate_write", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(admission.evaluate(&Method::POST, "/api/employees").await) })
    });
}

criterion_group!(
    benches,
    benchmark_classification,
    benchmark_memory_store_admit,
    benchmark_evaluate
);
criterion_main!(benches);
