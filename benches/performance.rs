//! Criterion benchmarks for seldb query stages.
//!
//! Run with: `cargo bench --bench performance`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use seldb::engine::{Database, EngineOptions};

fn populated(rows: usize, options: EngineOptions) -> Database {
    let mut db = Database::with_options(options);
    db.execute("CREATE TABLE t1(id INTEGER PRIMARY KEY, val INTEGER, tag TEXT)")
        .unwrap();
    db.execute("CREATE TABLE t2(ref INTEGER, weight INTEGER)").unwrap();
    for chunk in (0..rows).collect::<Vec<_>>().chunks(500) {
        let values: Vec<String> = chunk
            .iter()
            .map(|i| format!("({}, {}, 'tag{}')", i, (i * 7) % 100, i % 13))
            .collect();
        db.execute(&format!("INSERT INTO t1 VALUES {}", values.join(", ")))
            .unwrap();
        let refs: Vec<String> = chunk
            .iter()
            .map(|i| format!("({}, {})", (i * 3) % rows, i % 17))
            .collect();
        db.execute(&format!("INSERT INTO t2 VALUES {}", refs.join(", ")))
            .unwrap();
    }
    db
}

fn bench_bulk_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_insert");
    for size in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut db = Database::new_in_memory();
                db.execute("CREATE TABLE t1(id INTEGER, val INTEGER)").unwrap();
                for i in 0..size {
                    let sql = format!("INSERT INTO t1 VALUES ({}, {})", i, i * 2);
                    db.execute(black_box(&sql)).unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_select_where(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_where");
    for (label, pushdown) in [("pushdown", true), ("no_pushdown", false)] {
        let db = populated(10000, EngineOptions { predicate_pushdown: pushdown });
        group.bench_function(label, |b| {
            b.iter(|| db.query(black_box("SELECT * FROM t1 WHERE val = 50")).unwrap());
        });
    }
    group.finish();
}

fn bench_like(c: &mut Criterion) {
    let db = populated(10000, EngineOptions::default());
    c.bench_function("like", |b| {
        b.iter(|| db.query(black_box("SELECT id FROM t1 WHERE tag LIKE '%1_'")).unwrap());
    });
}

fn bench_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("join");
    let db = populated(1000, EngineOptions::default());
    for kind in ["INNER", "LEFT", "FULL"] {
        let sql = format!(
            "SELECT a.id, b.weight FROM t1 a {} JOIN t2 b ON a.id = b.ref WHERE a.val < 20",
            kind
        );
        group.bench_function(kind, |b| {
            b.iter(|| db.query(black_box(&sql)).unwrap());
        });
    }
    group.finish();
}

fn bench_group_by(c: &mut Criterion) {
    let db = populated(10000, EngineOptions::default());
    c.bench_function("group_by", |b| {
        b.iter(|| {
            db.query(black_box(
                "SELECT val, COUNT(*), AVG(id) FROM t1 GROUP BY val HAVING COUNT(*) > 50",
            ))
            .unwrap()
        });
    });
}

fn bench_order_by_distinct(c: &mut Criterion) {
    let db = populated(10000, EngineOptions::default());
    c.bench_function("order_by_distinct", |b| {
        b.iter(|| {
            db.query(black_box("SELECT DISTINCT tag, val FROM t1 ORDER BY val DESC, tag"))
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_bulk_insert,
    bench_select_where,
    bench_like,
    bench_join,
    bench_group_by,
    bench_order_by_distinct
);
criterion_main!(benches);
