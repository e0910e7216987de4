use criterion::{criterion_group, criterion_main, Criterion};
use priter_core::{Config, SelectionPolicy};
use priter_reduce::{StateStore, UserLogic};
use std::cmp::Ordering;

#[derive(Clone)]
struct RankLogic;

impl UserLogic for RankLogic {
    type Key = u64;
    type IState = f64;
    type CState = f64;
    type Static = ();

    fn i_unit(&self) -> f64 {
        0.0
    }
    fn c_unit(&self) -> f64 {
        0.15
    }
    fn combine(&self, current: &f64, delta: &f64) -> f64 {
        current + delta
    }
    fn priority(&self, i_state: &f64) -> f64 {
        *i_state
    }
    fn update(&self, _key: &u64, i_state: &f64, c_state: &f64) -> (f64, f64) {
        (c_state + 0.8 * i_state, 0.8 * i_state)
    }
    fn c_state_diff(&self, a: &f64, b: &f64) -> f64 {
        (a - b).abs()
    }
    fn c_state_cmp(&self, a: &f64, b: &f64) -> Ordering {
        a.partial_cmp(b).unwrap_or(Ordering::Equal)
    }
}

fn populated_store(n: u64) -> StateStore<RankLogic> {
    let store = StateStore::with_shards(RankLogic, 32);
    for k in 0..n {
        store.merge_delta(&k, &((k % 97) as f64));
        store.load_static(&k, ());
    }
    store
}

fn select_activation_over_large_key_set(c: &mut Criterion) {
    let store = populated_store(100_000);
    let config = {
        let mut cfg = Config::default();
        cfg.selection = SelectionPolicy::FixedLength(1_000);
        cfg.nodes = 100_000;
        cfg
    };

    c.bench_function("select_activation over 100k keys, top 1k", |b| {
        b.iter(|| {
            let selected = store.select_activation(&config);
            assert_eq!(selected.len(), 1_000);
            // selection reset the iState of every selected key; put it
            // back so the next iteration has something to select again.
            for entry in &selected {
                store.merge_delta(&entry.key, &1.0);
            }
        })
    });
}

criterion_group!(benches, select_activation_over_large_key_set);
criterion_main!(benches);
