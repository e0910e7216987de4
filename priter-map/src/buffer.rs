//! `InputPKVBuffer` (spec.md 4.4): the single input channel a map task's
//! `ActivationEngine` drains, seeded by `init` and fed batch-by-batch by
//! the PKVBUF handler.

use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

struct BufferState<K, V> {
    queue: VecDeque<(K, V)>,
    iteration: i64,
}

/// A FIFO queue of `(key, iState)` pairs paired with a monotonic
/// `iteration` counter (spec.md 4.4). `next()` is a plain, non-blocking
/// pop; callers that want to wait for more input await `notified()`
/// between empty pops, which `read` fires once it has enqueued a batch.
pub struct InputPkvBuffer<K, V> {
    state: Mutex<BufferState<K, V>>,
    notify: Notify,
}

impl<K, V> InputPkvBuffer<K, V> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BufferState {
                queue: VecDeque::new(),
                iteration: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// `init(k, v)` (spec.md 4.4): called once by user code during setup
    /// to seed the buffer, bypassing the iteration-monotonicity check
    /// `read` enforces.
    pub fn init(&self, key: K, value: V) {
        let mut state = self.state.lock().unwrap();
        state.queue.push_back((key, value));
        drop(state);
        self.notify.notify_waiters();
    }

    /// `read(stream, header)` (spec.md 4.4): accepts the batch iff
    /// `header.iteration >= buffer.iteration`, advances `buffer.iteration`,
    /// enqueues all records, and wakes any waiter. Returns whether the
    /// batch was accepted.
    pub fn read(&self, header_iteration: i64, records: Vec<(K, V)>) -> bool {
        let mut state = self.state.lock().unwrap();
        if header_iteration < state.iteration {
            return false;
        }
        state.iteration = header_iteration;
        state.queue.extend(records);
        drop(state);
        self.notify.notify_waiters();
        true
    }

    /// `next()` (spec.md 4.4): pops one record, or `None` when the
    /// buffer is currently empty (signaling the map iteration's local
    /// work is complete until more input arrives).
    pub fn next(&self) -> Option<(K, V)> {
        self.state.lock().unwrap().queue.pop_front()
    }

    /// `free()` (spec.md 4.4): clears the buffer without closing it —
    /// the iteration counter is left untouched so a stale, in-flight
    /// batch from before the clear is still rejected by `read`.
    pub fn free(&self) {
        self.state.lock().unwrap().queue.clear();
    }

    /// The current iteration the buffer has most recently accepted a
    /// batch for.
    pub fn iteration(&self) -> i64 {
        self.state.lock().unwrap().iteration
    }

    /// Waits until `read` or `init` next enqueues something. Callers
    /// should re-check `next()` after this resolves, not assume the
    /// queue is non-empty (the wake can race a concurrent `next()`).
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

impl<K, V> Default for InputPkvBuffer<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_seeds_without_iteration_check() {
        let buf: InputPkvBuffer<u32, f64> = InputPkvBuffer::new();
        buf.init(1, 0.5);
        assert_eq!(buf.next(), Some((1, 0.5)));
        assert_eq!(buf.next(), None);
    }

    #[test]
    fn read_rejects_stale_iteration() {
        let buf: InputPkvBuffer<u32, f64> = InputPkvBuffer::new();
        assert!(buf.read(2, vec![(1, 1.0)]));
        assert!(!buf.read(1, vec![(2, 2.0)]));
        assert_eq!(buf.iteration(), 2);
        assert_eq!(buf.next(), Some((1, 1.0)));
        assert_eq!(buf.next(), None);
    }

    #[test]
    fn next_drains_fifo_order() {
        let buf: InputPkvBuffer<u32, f64> = InputPkvBuffer::new();
        buf.read(0, vec![(1, 1.0), (2, 2.0), (3, 3.0)]);
        assert_eq!(buf.next(), Some((1, 1.0)));
        assert_eq!(buf.next(), Some((2, 2.0)));
        assert_eq!(buf.next(), Some((3, 3.0)));
        assert_eq!(buf.next(), None);
    }

    #[test]
    fn free_clears_without_resetting_iteration() {
        let buf: InputPkvBuffer<u32, f64> = InputPkvBuffer::new();
        buf.read(5, vec![(1, 1.0)]);
        buf.free();
        assert_eq!(buf.next(), None);
        assert_eq!(buf.iteration(), 5);
        assert!(!buf.read(4, vec![(2, 2.0)]));
    }

    #[tokio::test]
    async fn notified_wakes_after_read() {
        let buf: std::sync::Arc<InputPkvBuffer<u32, f64>> =
            std::sync::Arc::new(InputPkvBuffer::new());
        let waiter = {
            let buf = std::sync::Arc::clone(&buf);
            tokio::spawn(async move {
                buf.notified().await;
                buf.next()
            })
        };
        tokio::task::yield_now().await;
        buf.read(0, vec![(7, 9.0)]);
        assert_eq!(waiter.await.unwrap(), Some((7, 9.0)));
    }
}
