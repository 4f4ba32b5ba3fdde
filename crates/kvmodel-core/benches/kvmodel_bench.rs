use criterion::{Criterion, criterion_group, criterion_main};
use kvmodel_core::api::Database;
use kvmodel_core::types::TS_NONE;
use kvmodel_core::value::{NONE, Value};
use std::thread;

fn key(i: u64) -> Value {
    Value::from(format!("key_{i:08}"))
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("insert", |b| {
        let db = Database::new();
        let t = db.create_table("items").execute().unwrap();

        let mut i = 0u64;
        b.iter(|| {
            t.insert(&key(i), Value::from(i as i64), i + 1, false).unwrap();
            i += 1;
        });
    });
}

fn bench_get_deep_chain(c: &mut Criterion) {
    c.bench_function("get_deep_chain", |b| {
        let db = Database::new();
        let t = db.create_table("items").execute().unwrap();

        // One key with 1000 versions.
        for ts in 1..=1000u64 {
            t.insert(&key(0), Value::from(ts as i64), ts, true).unwrap();
        }

        let mut ts = 0u64;
        b.iter(|| {
            let _value = t.get(&key(0), ts % 1000 + 1).unwrap();
            ts += 1;
        });
    });
}

fn bench_txn_commit(c: &mut Criterion) {
    c.bench_function("txn_commit_10_writes", |b| {
        let db = Database::new();
        let t = db.create_table("items").execute().unwrap();

        let mut ts = 1u64;
        b.iter(|| {
            let txn = db.begin_transaction();
            for i in 0..10 {
                txn.insert(&t, &key(i), Value::from(ts as i64), true).unwrap();
            }
            txn.commit(ts, TS_NONE).unwrap();
            ts += 1;
        });
    });
}

fn bench_truncate_1k(c: &mut Criterion) {
    c.bench_function("truncate_1k", |b| {
        b.iter(|| {
            let db = Database::new();
            let t = db.create_table("items").execute().unwrap();
            for i in 0..1000 {
                t.insert(&key(i), Value::from(i as i64), 1, false).unwrap();
            }
            t.truncate(&NONE, &NONE, 2).unwrap();
        });
    });
}

fn bench_rollback_to_stable(c: &mut Criterion) {
    c.bench_function("rollback_to_stable_1k", |b| {
        b.iter(|| {
            let db = Database::new();
            let t = db.create_table("items").execute().unwrap();
            for i in 0..1000 {
                t.insert(&key(i % 100), Value::from(i as i64), i + 1, true).unwrap();
            }
            db.set_stable_timestamp(500);
            db.rollback_to_stable();
        });
    });
}

fn bench_concurrent_reads(c: &mut Criterion) {
    c.bench_function("concurrent_reads_4_threads", |b| {
        let db = Database::new();
        let t = db.create_table("items").execute().unwrap();
        for i in 0..100 {
            t.insert(&key(i), Value::from(i as i64), 1, false).unwrap();
        }

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let t = t.clone();
                    thread::spawn(move || {
                        for i in 0..100 {
                            let _value = t.get(&key(i), TS_NONE).unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        });
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_get_deep_chain,
    bench_txn_commit,
    bench_truncate_1k,
    bench_rollback_to_stable,
    bench_concurrent_reads,
);
criterion_main!(benches);
