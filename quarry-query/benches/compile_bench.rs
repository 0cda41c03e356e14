//! Benchmarks for statement compilation and cache key derivation

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

use quarry_query::cache::{generate_key, referenced_tables};
use quarry_query::prelude::*;
use quarry_query::BoxFuture;

struct NoopExecutor;

impl Executor for NoopExecutor {
    fn query<'a>(&'a self, _sql: &'a str, _bindings: &'a [SqlValue]) -> BoxFuture<'a, QueryResult<QueryOutput>> {
        Box::pin(async { Ok(QueryOutput::default()) })
    }

    fn execute<'a>(&'a self, _sql: &'a str, _bindings: &'a [SqlValue]) -> BoxFuture<'a, QueryResult<ExecOutput>> {
        Box::pin(async { Ok(ExecOutput::default()) })
    }
}

fn engine(dialect: Dialect) -> Engine {
    Engine::builder(Arc::new(NoopExecutor)).dialect(dialect).build()
}

fn report_query(engine: &Engine) -> QueryBuilder {
    engine
        .query()
        .from_as("orders", "o")
        .and_then(|q| q.select(["o.id", "o.total", "c.name AS customer"]))
        .and_then(|q| q.left_join("customers AS c", "c.id", "=", "o.customer_id"))
        .and_then(|q| q.where_eq("o.status", "paid"))
        .and_then(|q| q.where_in("o.region", ["eu", "us", "apac"]))
        .and_then(|q| q.where_between("o.total", 10, 500))
        .and_then(|q| q.order_by_desc("o.total"))
        .and_then(|q| q.limit(50))
        .expect("benchmark query is valid")
}

// ============================================================================
// Compilation Benchmarks
// ============================================================================

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");

    for dialect in [Dialect::PostgreSQL, Dialect::MySQL, Dialect::SQLite, Dialect::MSSQL] {
        let query = report_query(&engine(dialect));
        group.bench_with_input(BenchmarkId::new("report", dialect.name()), &query, |b, q| {
            b.iter(|| black_box(q.to_sql()))
        });
    }

    group.bench_function("build_and_compile", |b| {
        let e = engine(Dialect::PostgreSQL);
        b.iter(|| black_box(report_query(&e).to_sql()))
    });

    group.finish();
}

fn bench_wide_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("where_in");
    let e = engine(Dialect::PostgreSQL);

    for size in [10, 100, 1000] {
        let ids: Vec<i64> = (0..size).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &ids, |b, ids| {
            b.iter(|| {
                let q = e.table("users").and_then(|q| q.where_in("id", ids.iter().copied()));
                black_box(q.and_then(|q| q.to_sql()))
            })
        });
    }

    group.finish();
}

// ============================================================================
// Cache Key Benchmarks
// ============================================================================

fn bench_cache_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_keys");
    let compiled = report_query(&engine(Dialect::PostgreSQL))
        .to_sql()
        .expect("benchmark query compiles");

    group.bench_function("generate_key", |b| {
        b.iter(|| black_box(generate_key("quarry:", &compiled.sql, &compiled.bindings, 32)))
    });

    group.bench_function("referenced_tables", |b| {
        b.iter(|| black_box(referenced_tables(&compiled.sql)))
    });

    group.finish();
}

criterion_group!(benches, bench_compile, bench_wide_in, bench_cache_keys);
criterion_main!(benches);
