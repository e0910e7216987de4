//! Static partition loading (spec.md 4.4 "Lifecycle"): `<inDir>/subgraph/
//! part<partId>` is read once per map task into an in-memory `key ->
//! staticData` mapping, line by line, the way the teacher's
//! `load_from_logfile` walks a reader incrementally instead of reading the
//! whole file into one `String` first.

use crate::callbacks::ActivationLogic;
use priter_core::{BlobStore, PriterErrorKind, Result};
use std::collections::HashMap;

/// Loads and holds one map task's static subgraph partition.
pub struct Subgraph<L: ActivationLogic> {
    entries: HashMap<L::Key, L::Static>,
}

impl<L: ActivationLogic> Subgraph<L> {
    /// Reads `<inDir>/subgraph/part<partId>` through `store` and parses
    /// each non-blank line with `logic.parse_static`.
    pub fn load(store: &impl BlobStore, in_dir: &str, part_id: u32, logic: &L) -> Result<Self> {
        let path = priter_core::join(&[in_dir, "subgraph", &format!("part{part_id}")]);
        let bytes = store.read_all(&path)?;
        let text = std::str::from_utf8(&bytes).map_err(|_| PriterErrorKind::Codec)?;

        let mut entries = HashMap::new();
        for line in text.lines() {
            if line.is_empty() {
                continue;
            }
            if let Some((key, data)) = logic.parse_static(line) {
                entries.insert(key, data);
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &L::Key) -> Option<&L::Static> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use priter_core::LocalBlobStore;

    struct LineLogic;
    impl ActivationLogic for LineLogic {
        type Key = u32;
        type IState = f64;
        type Delta = f64;
        type Static = Vec<u32>;

        fn parse_static(&self, line: &str) -> Option<(u32, Vec<u32>)> {
            let mut fields = line.split('\t');
            let key: u32 = fields.next()?.parse().ok()?;
            let outlinks: Vec<u32> = fields.filter_map(|f| f.parse().ok()).collect();
            Some((key, outlinks))
        }

        fn activate(&self, _: &u32, _: &f64, _: &Vec<u32>, _: &mut dyn FnMut(u32, f64)) {}

        fn zero_delta(&self) -> f64 {
            0.0
        }
    }

    #[test]
    fn loads_tab_separated_partition_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path()).unwrap();
        store
            .write_all("in/subgraph/part0", b"1\t2\t3\n2\t3\n\n3\n")
            .unwrap();

        let graph = Subgraph::load(&store, "in", 0, &LineLogic).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.get(&1), Some(&vec![2, 3]));
        assert_eq!(graph.get(&3), Some(&vec![]));
        assert_eq!(graph.get(&99), None);
    }
}
