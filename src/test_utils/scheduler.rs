//! Deterministic eviction scheduler.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::templating::{EvictionScheduler, EvictionTask};

struct PendingTask {
    deadline: Duration,
    seq: u64,
    task: EvictionTask,
}

#[derive(Default)]
struct State {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

/// Scheduler with a virtual clock that only moves when [`advance`](Self::advance) is called.
///
/// Tasks whose deadline has been reached run in deadline order (ties in
/// scheduling order) on the thread calling `advance`.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<State>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of tasks that have not fired yet.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }

    /// Move the clock forward and run every task that became due. Returns how
    /// many tasks ran.
    pub fn advance(&self, by: Duration) -> usize {
        let mut due = {
            let mut state = self.lock();
            state.now += by;
            let now = state.now;
            let (due, pending): (Vec<_>, Vec<_>) =
                state.pending.drain(..).partition(|task| task.deadline <= now);
            state.pending = pending;
            due
        };
        due.sort_by_key(|task| (task.deadline, task.seq));

        // Tasks run without the lock held so they may schedule more work.
        let count = due.len();
        for pending in due {
            (pending.task)();
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EvictionScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: EvictionTask) {
        let mut state = self.lock();
        let seq = state.next_seq;
        state.next_seq += 1;
        let deadline = state.now + delay;
        state.pending.push(PendingTask {
            deadline,
            seq,
            task,
        });
    }
}
