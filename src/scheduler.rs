//! Timer queue for deferred engine work.
//!
//! The engine is single-threaded: nothing here spawns or sleeps. Work is
//! queued with a deadline and handed back by [`Scheduler::take_due`] when the
//! host drives the engine forward on a frame tick.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Insertion order, breaking ties between equal deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Seq(u64);

/// Shared cancellation flag.
///
/// Clones observe the same flag. Work that was scheduled with a token is
/// silently dropped once the token is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the token and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether the token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct Entry<T> {
    task: T,
    token: Option<CancellationToken>,
}

/// Deadline-ordered queue of deferred tasks.
#[derive(Debug)]
pub struct Scheduler<T> {
    timers: BTreeMap<(Instant, Seq), Entry<T>>,
    next_id: u64,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            timers: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<T> Scheduler<T> {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run at `at`.
    pub fn schedule(&mut self, at: Instant, task: T) {
        self.insert(at, task, None);
    }

    /// Queue `task` to run at `at`, unless `token` is cancelled first.
    pub fn schedule_with_token(&mut self, at: Instant, task: T, token: CancellationToken) {
        self.insert(at, task, Some(token));
    }

    fn insert(&mut self, at: Instant, task: T, token: Option<CancellationToken>) {
        let seq = Seq(self.next_id);
        self.next_id += 1;
        self.timers.insert((at, seq), Entry { task, token });
    }

    /// Cancel every pending timer whose task matches `predicate`.
    ///
    /// Returns how many timers were removed.
    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> usize {
        let before = self.timers.len();
        self.timers.retain(|_, entry| !predicate(&entry.task));
        before - self.timers.len()
    }

    /// Remove and return every task due at or before `now`, in deadline order.
    ///
    /// Tasks whose token was cancelled are discarded.
    pub fn take_due(&mut self, now: Instant) -> Vec<T> {
        let mut due = Vec::new();
        while let Some(entry) = self.timers.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let Entry { task, token } = entry.remove();
            if token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                continue;
            }
            due.push(task);
        }
        due
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no timers are pending.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_take_due_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        scheduler.schedule(now + Duration::from_millis(20), "late");
        scheduler.schedule(now + Duration::from_millis(10), "early");
        scheduler.schedule(now + Duration::from_secs(5), "future");

        let due = scheduler.take_due(now + Duration::from_millis(30));
        assert_eq!(due, vec!["early", "late"]);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_equal_deadlines_keep_insertion_order() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        for n in [3, 1, 2] {
            scheduler.schedule(now, n);
        }
        assert_eq!(scheduler.take_due(now), vec![3, 1, 2]);
    }

    #[test]
    fn test_cancel_where() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        scheduler.schedule(now, 1);
        scheduler.schedule(now, 2);
        scheduler.schedule(now, 3);

        assert_eq!(scheduler.cancel_where(|n| n % 2 == 1), 2);
        assert_eq!(scheduler.take_due(now), vec![2]);
    }

    #[test]
    fn test_cancelled_token_drops_task() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let token = CancellationToken::new();
        scheduler.schedule_with_token(now, "restore", token.clone());
        scheduler.schedule(now, "keep");

        token.cancel();
        assert_eq!(scheduler.take_due(now), vec!["keep"]);
        assert!(scheduler.is_empty());
    }
}
