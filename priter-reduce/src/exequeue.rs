//! The `_ExeQueueTemp` text spill (spec.md 6): one `(iter, key,
//! priority, cState)` row per selected-and-updated key, tab-separated.
//! Kept as plain text rather than the record codec, exactly as spec.md 6
//! specifies the layout ("text, one ... per line, TSV").

use crate::callbacks::UserLogic;
use priter_core::{join, BlobStore, Result, TaskId};
use std::fmt::Display;

/// Appends one execution-queue row per activated key for iteration
/// `iteration`, to `<outDir>/_ExeQueueTemp/<reduceId>-exequeue`.
pub fn append_exequeue<L: UserLogic>(
    store: &impl BlobStore,
    out_dir: &str,
    task_id: TaskId,
    iteration: u64,
    rows: &[(L::Key, f64, String)],
) -> Result<()>
where
    L::Key: Display,
{
    let file_name = format!("{task_id}-exequeue");
    let path = join(&[out_dir, "_ExeQueueTemp", &file_name]);
    let mut text = String::new();
    for (key, priority, c_state) in rows {
        text.push_str(&format!("{iteration}\t{key}\t{priority}\t{c_state}\n"));
    }
    store.append(&path, text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::UserLogic;
    use priter_core::LocalBlobStore;
    use std::cmp::Ordering;

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

    #[test]
    fn appends_tsv_rows() {
        let dir = tempfile::tempdir().unwrap();
        let blob = LocalBlobStore::new(dir.path()).unwrap();
        append_exequeue::<SumLogic>(&blob, "out", 0, 1, &[(1u32, 0.5, "1.5".to_string())]).unwrap();
        append_exequeue::<SumLogic>(&blob, "out", 0, 2, &[(1u32, 0.3, "1.8".to_string())]).unwrap();

        let contents = blob.read_all("out/_ExeQueueTemp/0-exequeue").unwrap();
        let text = String::from_utf8(contents).unwrap();
        assert_eq!(text, "1\t1\t0.5\t1.5\n2\t1\t0.3\t1.8\n");
    }
}
