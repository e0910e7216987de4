//! Per-`(source, sink)` cursor state and the dedup rule table (spec.md
//! 4.2). Kept as plain, synchronous state machines so the accept/dedup
//! logic can be exercised without any networking.

use crate::enums::Transfer;

/// FILE handler cursor: an integer spill-id. Accepts iff the incoming
/// batch's first id equals the cursor; advances past the batch's last id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCursor {
    next_id: i64,
}

impl FileCursor {
    pub fn new(start: i64) -> Self {
        Self { next_id: start }
    }

    pub fn cursor(&self) -> i64 {
        self.next_id
    }

    /// Applies the dedup rule for an incoming `[first_id, last_id]` batch.
    pub fn accept(&mut self, first_id: i64, last_id: i64) -> Transfer {
        if first_id == self.next_id {
            self.next_id = last_id + 1;
            Transfer::Success
        } else {
            Transfer::Ignore
        }
    }

    /// Resets the cursor on rollback to a checkpoint (spec.md 4.3).
    pub fn rollback_to(&mut self, id: i64) {
        self.next_id = id;
    }
}

/// SNAPSHOT handler cursor: a float progress value. Idempotent by
/// progress — a replay of an already-applied progress is ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotCursor {
    progress: f32,
}

impl SnapshotCursor {
    pub fn new(start: f32) -> Self {
        Self { progress: start }
    }

    pub fn cursor(&self) -> f32 {
        self.progress
    }

    pub fn accept(&mut self, incoming_progress: f32) -> Transfer {
        if incoming_progress > self.progress {
            self.progress = incoming_progress;
            Transfer::Success
        } else {
            Transfer::Ignore
        }
    }

    pub fn rollback_to(&mut self, progress: f32) {
        self.progress = progress;
    }
}

/// Shared shape for STREAM (sequence) and PKVBUF (iteration) cursors: a
/// strictly-sequenced `long`, accepted only on exact match, advanced by
/// one per accepted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceCursor {
    next: i64,
}

impl SequenceCursor {
    pub fn new(start: i64) -> Self {
        Self { next: start }
    }

    pub fn cursor(&self) -> i64 {
        self.next
    }

    pub fn accept(&mut self, incoming: i64) -> Transfer {
        if incoming == self.next {
            self.next += 1;
            Transfer::Success
        } else {
            Transfer::Ignore
        }
    }

    pub fn rollback_to(&mut self, value: i64) {
        self.next = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_cursor_accepts_matching_first_id_and_advances_past_last() {
        let mut cursor = FileCursor::new(0);
        assert_eq!(cursor.accept(0, 4), Transfer::Success);
        assert_eq!(cursor.cursor(), 5);
        assert_eq!(cursor.accept(0, 4), Transfer::Ignore); // replay
        assert_eq!(cursor.accept(5, 9), Transfer::Success);
        assert_eq!(cursor.cursor(), 10);
    }

    #[test]
    fn snapshot_cursor_is_idempotent_on_replay() {
        let mut cursor = SnapshotCursor::new(0.0);
        assert_eq!(cursor.accept(0.5), Transfer::Success);
        assert_eq!(cursor.accept(0.5), Transfer::Ignore);
        assert_eq!(cursor.accept(0.3), Transfer::Ignore);
        assert_eq!(cursor.accept(0.9), Transfer::Success);
    }

    #[test]
    fn sequence_cursor_rejects_duplicate_and_out_of_order() {
        let mut cursor = SequenceCursor::new(0);
        assert_eq!(cursor.accept(0), Transfer::Success);
        assert_eq!(cursor.accept(1), Transfer::Success);
        assert_eq!(cursor.accept(1), Transfer::Ignore); // duplicate replay
        assert_eq!(cursor.accept(5), Transfer::Ignore); // arrives ahead of cursor
        assert_eq!(cursor.cursor(), 2);
    }

    #[test]
    fn replay_scenario_from_spec_three_then_duplicate() {
        // STREAM seq = 0,1,2,1 (duplicate): sink accepts 0,1,2 and
        // replies IGNORE to the duplicate.
        let mut cursor = SequenceCursor::new(0);
        let seqs = [0i64, 1, 2, 1];
        let results: Vec<Transfer> = seqs.iter().map(|&s| cursor.accept(s)).collect();
        assert_eq!(
            results,
            vec![
                Transfer::Success,
                Transfer::Success,
                Transfer::Success,
                Transfer::Ignore
            ]
        );
    }

    #[test]
    fn rollback_resets_cursor_for_replay() {
        let mut cursor = SequenceCursor::new(0);
        cursor.accept(0);
        cursor.accept(1);
        cursor.accept(2);
        cursor.rollback_to(1);
        assert_eq!(cursor.accept(1), Transfer::Success);
    }
}
