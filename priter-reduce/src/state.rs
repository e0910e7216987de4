//! The per-key `(iState, cState, staticData)` triple store (spec.md 3, 4.3).
//!
//! Generalizes the teacher's `KvStore` split of disk work into
//! `ReadHalf`/`WriteHalf` around a shared map: here the map itself is
//! sharded so `mergeDelta` scales with cores instead of serializing on
//! one coarse monitor (spec.md 9 "Concurrency control").

use crate::callbacks::UserLogic;
use priter_core::{Config, SelectionPolicy};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

const DEFAULT_SHARDS: usize = 16;

struct Entry<L: UserLogic> {
    i_state: L::IState,
    c_state: L::CState,
    static_data: Option<L::Static>,
}

struct Shard<L: UserLogic> {
    entries: HashMap<L::Key, Entry<L>>,
    /// Deltas for keys whose `staticData` has not yet been loaded
    /// (spec.md 4.3 edge case: "buffered and re-merged after the next
    /// static-data refresh, not dropped").
    pending: HashMap<L::Key, Vec<L::IState>>,
}

impl<L: UserLogic> Default for Shard<L> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            pending: HashMap::new(),
        }
    }
}

/// One key selected by `selectActivation`, paired with the priority it
/// was ranked by.
pub struct SelectedEntry<L: UserLogic> {
    pub key: L::Key,
    pub i_state: L::IState,
    pub c_state: L::CState,
    pub priority: f64,
}

/// A snapshot-ready `(key, cState)` pair, used by `snapshot(topK)`.
pub struct StateSample<L: UserLogic> {
    pub key: L::Key,
    pub c_state: L::CState,
}

/// The reduce-side per-key state store: sharded, fine-grained-locked
/// storage for the `(iState, cState, staticData)` triple (spec.md 3).
pub struct StateStore<L: UserLogic> {
    shards: Vec<Mutex<Shard<L>>>,
    logic: L,
}

fn shard_index<K: Hash>(key: &K, num_shards: usize) -> usize {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % num_shards
}

impl<L: UserLogic> StateStore<L> {
    pub fn new(logic: L) -> Self {
        Self::with_shards(logic, DEFAULT_SHARDS)
    }

    pub fn with_shards(logic: L, num_shards: usize) -> Self {
        let mut shards = Vec::with_capacity(num_shards.max(1));
        shards.resize_with(num_shards.max(1), || Mutex::new(Shard::default()));
        Self { shards, logic }
    }

    pub fn logic(&self) -> &L {
        &self.logic
    }

    fn shard(&self, key: &L::Key) -> &Mutex<Shard<L>> {
        &self.shards[shard_index(key, self.shards.len())]
    }

    /// `mergeDelta(key, delta)` (spec.md 4.3). Creates the entry on
    /// first observation. If the key's `staticData` has not yet been
    /// loaded the delta is buffered rather than merged.
    pub fn merge_delta(&self, key: &L::Key, delta: &L::IState) {
        let mut shard = self.shard(key).lock().unwrap();
        let has_static = shard
            .entries
            .get(key)
            .map(|e| e.static_data.is_some())
            .unwrap_or(false);

        if has_static {
            let entry = shard.entries.get_mut(key).unwrap();
            entry.i_state = self.logic.combine(&entry.i_state, delta);
            return;
        }

        shard.entries.entry(key.clone()).or_insert_with(|| Entry {
            i_state: self.logic.i_unit(),
            c_state: self.logic.c_unit(),
            static_data: None,
        });
        shard.pending.entry(key.clone()).or_default().push(delta.clone());
    }

    /// Loads (or refreshes) a key's immutable static context, draining
    /// any deltas buffered while it was absent.
    pub fn load_static(&self, key: &L::Key, data: L::Static) {
        let mut shard = self.shard(key).lock().unwrap();
        let entry = shard.entries.entry(key.clone()).or_insert_with(|| Entry {
            i_state: self.logic.i_unit(),
            c_state: self.logic.c_unit(),
            static_data: None,
        });
        entry.static_data = Some(data);

        if let Some(pending) = shard.pending.remove(key) {
            let entry = shard.entries.get_mut(key).unwrap();
            for delta in pending {
                entry.i_state = self.logic.combine(&entry.i_state, &delta);
            }
        }
    }

    /// Total number of keys with a live entry (buffered-only keys still
    /// count, matching "The triple is created on first observation").
    pub fn key_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap().entries.len())
            .sum()
    }

    /// `selectActivation()` (spec.md 4.3): draws either the fixed
    /// `execQueueLen` or `alpha * nodes` top entries by `iState`
    /// priority, ties broken by key ascending, and atomically resets
    /// each selected key's `iState` to the unit element.
    pub fn select_activation(&self, config: &Config) -> Vec<SelectedEntry<L>> {
        let limit = match config.selection {
            SelectionPolicy::Portion(alpha) => {
                ((alpha * config.nodes as f64).ceil() as usize).max(0)
            }
            SelectionPolicy::FixedLength(n) => n,
        };
        if limit == 0 {
            return Vec::new();
        }

        // Gather every live candidate first: selection must see a
        // consistent snapshot of iState across all shards (spec.md 3
        // invariant 3: "stable for a fixed snapshot of iState").
        let mut candidates: Vec<(L::Key, f64)> = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock().unwrap();
            for (key, entry) in shard.entries.iter() {
                candidates.push((key.clone(), self.logic.priority(&entry.i_state)));
            }
        }

        candidates.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        candidates.truncate(limit);

        let mut selected = Vec::with_capacity(candidates.len());
        for (key, priority) in candidates {
            let mut shard = self.shard(&key).lock().unwrap();
            if let Some(entry) = shard.entries.get_mut(&key) {
                let i_state = entry.i_state.clone();
                let c_state = entry.c_state.clone();
                entry.i_state = self.logic.i_unit();
                selected.push(SelectedEntry {
                    key,
                    i_state,
                    c_state,
                    priority,
                });
            }
        }
        selected
    }

    /// `update(key, iState, cState)` (spec.md 4.3): installs the new
    /// `cState` the user's callback produced and returns the delta it
    /// emitted, for the caller to send downstream.
    pub fn apply_update(&self, key: &L::Key, i_state: &L::IState, c_state: &L::CState) -> L::IState {
        let (new_c_state, delta) = self.logic.update(key, i_state, c_state);
        let mut shard = self.shard(key).lock().unwrap();
        if let Some(entry) = shard.entries.get_mut(key) {
            entry.c_state = new_c_state;
        }
        delta
    }

    /// A consistent sample of `(key, cState)` across every shard,
    /// ordered by `cState` descending, for `snapshot(topK)` and
    /// `checkDone`'s bounded sample.
    pub fn top_k_by_c_state(&self, k: usize) -> Vec<StateSample<L>> {
        let mut all: Vec<StateSample<L>> = Vec::new();
        for shard in &self.shards {
            let shard = shard.lock().unwrap();
            for (key, entry) in shard.entries.iter() {
                all.push(StateSample {
                    key: key.clone(),
                    c_state: entry.c_state.clone(),
                });
            }
        }
        all.sort_by(|a, b| self.logic.c_state_cmp(&b.c_state, &a.c_state));
        all.truncate(k);
        all
    }

    /// Overwrites a key's full triple, used to reload state after a
    /// rollback to a checkpoint (spec.md 4.3: "iState and cState are
    /// reloaded from the snapshot at id <= c").
    pub fn restore(&self, key: &L::Key, i_state: L::IState, c_state: L::CState) {
        let mut shard = self.shard(key).lock().unwrap();
        let entry = shard.entries.entry(key.clone()).or_insert_with(|| Entry {
            i_state: self.logic.i_unit(),
            c_state: self.logic.c_unit(),
            static_data: None,
        });
        entry.i_state = i_state;
        entry.c_state = c_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Clone)]
    struct SumLogic;

    impl UserLogic for SumLogic {
        type Key = u32;
        type IState = f64;
        type CState = f64;
        type Static = ();

        fn i_unit(&self) -> f64 {
            0.0
        }
        fn c_unit(&self) -> f64 {
            0.0
        }
        fn combine(&self, current: &f64, delta: &f64) -> f64 {
            current + delta
        }
        fn priority(&self, i_state: &f64) -> f64 {
            *i_state
        }
        fn update(&self, _key: &u32, i_state: &f64, c_state: &f64) -> (f64, f64) {
            (c_state + i_state, *i_state)
        }
        fn c_state_diff(&self, a: &f64, b: &f64) -> f64 {
            (a - b).abs()
        }
        fn c_state_cmp(&self, a: &f64, b: &f64) -> Ordering {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        }
    }

    fn test_config(policy: SelectionPolicy) -> Config {
        let mut cfg = Config::default();
        cfg.selection = policy;
        cfg.nodes = 10;
        cfg.stop_max_time = Duration::from_secs(3600);
        cfg
    }

    #[test]
    fn merge_delta_creates_and_buffers_without_static() {
        let store = StateStore::with_shards(SumLogic, 4);
        store.merge_delta(&1, &5.0);
        assert_eq!(store.key_count(), 1);

        // buffered: selection priority is still the unit (0.0), not 5.0,
        // because static data hasn't loaded.
        let selected = store.select_activation(&test_config(SelectionPolicy::FixedLength(1)));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].i_state, 0.0);
    }

    #[test]
    fn load_static_drains_pending_deltas() {
        let store = StateStore::with_shards(SumLogic, 4);
        store.merge_delta(&1, &5.0);
        store.merge_delta(&1, &3.0);
        store.load_static(&1, ());

        let selected = store.select_activation(&test_config(SelectionPolicy::FixedLength(1)));
        assert_eq!(selected[0].i_state, 8.0);
    }

    #[test]
    fn select_activation_resets_i_state_and_ties_break_by_key() {
        let store = StateStore::with_shards(SumLogic, 4);
        for k in [3u32, 1, 2] {
            store.merge_delta(&k, &1.0);
            store.load_static(&k, ());
        }
        let selected = store.select_activation(&test_config(SelectionPolicy::FixedLength(3)));
        let keys: Vec<u32> = selected.iter().map(|e| e.key).collect();
        assert_eq!(keys, vec![1, 2, 3]);

        // selector reset: next selection sees the unit element.
        let selected_again = store.select_activation(&test_config(SelectionPolicy::FixedLength(3)));
        assert!(selected_again.iter().all(|e| e.i_state == 0.0));
    }

    #[test]
    fn portion_based_selection_sizes_from_config_nodes() {
        let store = StateStore::with_shards(SumLogic, 4);
        for k in 0..10u32 {
            store.merge_delta(&k, &1.0);
            store.load_static(&k, ());
        }
        let cfg = test_config(SelectionPolicy::Portion(0.3));
        let selected = store.select_activation(&cfg);
        assert_eq!(selected.len(), 3); // ceil(0.3 * 10)
    }

    #[test]
    fn apply_update_installs_new_c_state_and_returns_delta() {
        let store = StateStore::with_shards(SumLogic, 4);
        store.merge_delta(&1, &5.0);
        store.load_static(&1, ());
        let selected = store.select_activation(&test_config(SelectionPolicy::FixedLength(1)));
        let entry = &selected[0];
        let delta = store.apply_update(&entry.key, &entry.i_state, &entry.c_state);
        assert_eq!(delta, 5.0);

        let top = store.top_k_by_c_state(1);
        assert_eq!(top[0].c_state, 5.0);
    }
}
