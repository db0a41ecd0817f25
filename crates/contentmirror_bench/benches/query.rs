//! Query benchmarks across backends.

use contentmirror_bench::blog_corpus;
use contentmirror_store::{ContentStore, StoreExt};
use contentmirror_testkit::{seeded_memory_store, seeded_sql_store};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn run_queries<S: ContentStore + ?Sized>(store: &S) -> usize {
    let by_slug = store
        .find_all("post")
        .eq("slug", "/post-17")
        .unwrap()
        .to_vec()
        .unwrap();
    let popular = store
        .find_all("post")
        .gte("views", 9_000)
        .unwrap()
        .limit(20)
        .to_vec()
        .unwrap();
    by_slug.len() + popular.len()
}

/// Benchmark simple field filters.
fn bench_field_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_filters");

    for posts in [100, 1_000] {
        let corpus = blog_corpus(20, posts);
        let memory = seeded_memory_store(corpus.clone());
        let sql = seeded_sql_store(corpus);

        group.bench_with_input(BenchmarkId::new("memory", posts), &memory, |b, store| {
            b.iter(|| black_box(run_queries(store)));
        });
        group.bench_with_input(BenchmarkId::new("sql", posts), &sql, |b, store| {
            b.iter(|| black_box(run_queries(store)));
        });
    }
    group.finish();
}

/// Benchmark a reference join with includes.
fn bench_join_with_include(c: &mut Criterion) {
    let mut group = c.benchmark_group("join_include");

    let corpus = blog_corpus(50, 1_000);
    let memory = seeded_memory_store(corpus.clone());
    let sql = seeded_sql_store(corpus);

    group.bench_function("memory", |b| {
        b.iter(|| {
            let result = memory
                .find_all("post")
                .eq("author.name", "Author 7")
                .unwrap()
                .include(1)
                .unwrap()
                .execute()
                .unwrap();
            black_box(result);
        });
    });
    group.bench_function("sql", |b| {
        b.iter(|| {
            let result = sql
                .find_all("post")
                .eq("author.name", "Author 7")
                .unwrap()
                .include(1)
                .unwrap()
                .execute()
                .unwrap();
            black_box(result);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_field_filters, bench_join_with_include);
criterion_main!(benches);
