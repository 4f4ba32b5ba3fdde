//! Randomized checks of the read-path invariants.

use proptest::prelude::*;

use kvmodel_core::api::{Database, Table};
use kvmodel_core::types::{TS_NONE, Timestamp};
use kvmodel_core::value::{NONE, Value};

#[derive(Debug, Clone)]
enum Op {
    Put { key: u8, value: i64, ts: Timestamp },
    Remove { key: u8, ts: Timestamp },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..8, any::<i64>(), 1u64..100)
            .prop_map(|(key, value, ts)| Op::Put { key, value, ts }),
        1 => (0u8..8, 1u64..100).prop_map(|(key, ts)| Op::Remove { key, ts }),
    ]
}

fn key(k: u8) -> Value {
    Value::from(format!("k{k}"))
}

/// Apply `ops` with overwrite semantics, ignoring removes of absent keys.
fn build(ops: &[Op]) -> Table {
    let db = Database::new();
    let t = db.create_table("t").execute().unwrap();
    for op in ops {
        match *op {
            Op::Put { key: k, value, ts } => {
                t.insert(&key(k), Value::from(value), ts, true).unwrap();
            }
            Op::Remove { key: k, ts } => {
                let _ = t.remove(&key(k), ts);
            }
        }
    }
    t
}

/// The values ever written to `k` at or below `ts`, including deletes.
fn written_at_or_below(ops: &[Op], k: u8, ts: Timestamp) -> Vec<Value> {
    ops.iter()
        .filter_map(|op| match *op {
            Op::Put { key: ok, value, ts: ots } if ok == k && ots <= ts => {
                Some(Value::from(value))
            }
            Op::Remove { key: ok, ts: ots } if ok == k && ots <= ts => Some(NONE),
            _ => None,
        })
        .collect()
}

proptest! {
    #[test]
    fn read_returns_a_value_written_at_or_below(
        ops in prop::collection::vec(op(), 1..40),
        k in 0u8..8,
        ts in 1u64..120,
    ) {
        let t = build(&ops);
        let got = t.get(&key(k), ts).unwrap();
        if !got.is_none() {
            prop_assert!(written_at_or_below(&ops, k, ts).contains(&got));
        }
    }

    #[test]
    fn later_reads_never_go_back_to_an_absent_state(
        ops in prop::collection::vec(op(), 1..40),
        k in 0u8..8,
        t1 in 1u64..120,
        delta in 0u64..50,
    ) {
        let t = build(&ops);
        let t2 = t1 + delta;
        let early = t.get(&key(k), t1).unwrap();
        let late = t.get(&key(k), t2).unwrap();
        // Without a later write in (t1, t2], both reads agree.
        let rewritten = ops.iter().any(|op| match *op {
            Op::Put { key: ok, ts, .. } | Op::Remove { key: ok, ts } => {
                ok == k && ts > t1 && ts <= t2
            }
        });
        if !rewritten {
            prop_assert_eq!(early, late);
        }
    }

    #[test]
    fn truncate_clears_exactly_the_range(
        ops in prop::collection::vec(op(), 0..40),
        lo in 0u8..8,
        span in 0u8..8,
    ) {
        let hi = lo.saturating_add(span).min(7);
        let t = build(&ops);
        let before: Vec<Value> = (0..8).map(|k| t.get(&key(k), TS_NONE).unwrap()).collect();

        t.truncate(&key(lo), &key(hi), 200).unwrap();

        for k in 0..8u8 {
            let got = t.get(&key(k), 200).unwrap();
            if key(lo) <= key(k) && key(k) <= key(hi) {
                prop_assert_eq!(got, NONE);
            } else {
                prop_assert_eq!(&got, &before[k as usize]);
            }
        }
    }

    #[test]
    fn rollback_to_stable_freezes_history(
        ops in prop::collection::vec(op(), 0..40),
        stable in 1u64..100,
    ) {
        let t = build(&ops);
        let at_stable: Vec<Value> = (0..8).map(|k| t.get(&key(k), stable).unwrap()).collect();

        t.rollback_to_stable(stable, None);

        for k in 0..8u8 {
            for ts in [stable, stable + 1, 150, TS_NONE] {
                prop_assert_eq!(&t.get(&key(k), ts).unwrap(), &at_stable[k as usize]);
            }
        }
    }

    #[test]
    fn rolled_back_transaction_leaves_no_trace(
        ops in prop::collection::vec(op(), 0..20),
        writes in prop::collection::vec((0u8..8, any::<i64>()), 1..10),
    ) {
        let db = Database::new();
        let t = db.create_table("t").execute().unwrap();
        for op in &ops {
            if let Op::Put { key: k, value, ts } = *op {
                t.insert(&key(k), Value::from(value), ts, true).unwrap();
            }
        }
        let before: Vec<Value> = (0..8).map(|k| t.get(&key(k), TS_NONE).unwrap()).collect();

        let txn = db.begin_transaction();
        for (k, value) in &writes {
            txn.insert(&t, &key(*k), Value::from(*value), true).unwrap();
        }
        txn.rollback();

        for k in 0..8u8 {
            prop_assert_eq!(&t.get(&key(k), TS_NONE).unwrap(), &before[k as usize]);
        }
    }
}
