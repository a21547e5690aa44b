//! Deduplicating work queue of group keys.
//!
//! A key sits in the queue at most once. While a worker holds a key, adds
//! for it are parked in a dirty set and re-queued when the worker calls
//! `done`, so a group is never reconciled by two workers at once but a
//! change that arrives mid-pass is not lost.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;
use tracing::debug;

use grouplcm_core::ObjectKey;

#[derive(Debug, Default)]
struct QueueState {
    queue: VecDeque<ObjectKey>,
    queued: HashSet<ObjectKey>,
    processing: HashSet<ObjectKey>,
    dirty: HashSet<ObjectKey>,
    failures: HashMap<ObjectKey, u32>,
    shutting_down: bool,
}

#[derive(Debug)]
pub struct WorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl WorkQueue {
    pub fn new(backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            backoff_base,
            backoff_max,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Every mutation completes before the guard drops, so poisoning is ignored.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queue `key` unless it is already waiting.
    pub fn add(&self, key: ObjectKey) {
        let mut state = self.lock();
        if state.shutting_down || state.queued.contains(&key) {
            return;
        }
        if state.processing.contains(&key) {
            debug!(group = %key, "group busy, marking dirty");
            state.dirty.insert(key);
            return;
        }
        state.queued.insert(key.clone());
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    /// Queue `key` after `delay`, unless the queue shuts down first.
    pub fn add_after(self: &Arc<Self>, key: ObjectKey, delay: Duration) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Wait for the next key and mark it as being processed.
    ///
    /// Returns `None` once the queue is shut down.
    pub async fn next(&self) -> Option<ObjectKey> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.queued.remove(&key);
                    state.processing.insert(key.clone());
                    let more = !state.queue.is_empty();
                    drop(state);
                    if more {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Release `key` after a pass. Re-queues it if it changed meanwhile.
    pub fn done(&self, key: &ObjectKey) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.remove(key) && !state.shutting_down && state.queued.insert(key.clone()) {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Record a failed pass and return how long to wait before retrying:
    /// `base * 2^(failures - 1)`, capped at the configured maximum.
    pub fn backoff(&self, key: &ObjectKey) -> Duration {
        let mut state = self.lock();
        let failures = state.failures.entry(key.clone()).or_insert(0);
        let exponent = *failures;
        *failures = failures.saturating_add(1);
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.backoff_max)
    }

    /// Clear the failure count of `key`.
    pub fn forget(&self, key: &ObjectKey) {
        self.lock().failures.remove(key);
    }

    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Number of keys waiting (not counting keys being processed).
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop handing out keys and wake every waiting worker.
    pub fn shut_down(&self) {
        let mut state = self.lock();
        state.shutting_down = true;
        state.queue.clear();
        state.queued.clear();
        state.dirty.clear();
        drop(state);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::group("ztp", name)
    }

    fn queue() -> WorkQueue {
        WorkQueue::new(Duration::from_millis(100), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn fifo_order() {
        let q = queue();
        q.add(key("a"));
        q.add(key("b"));
        assert_eq!(q.next().await, Some(key("a")));
        assert_eq!(q.next().await, Some(key("b")));
    }

    #[tokio::test]
    async fn duplicate_adds_collapse() {
        let q = queue();
        q.add(key("a"));
        q.add(key("a"));
        q.add(key("a"));
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn add_while_processing_requeues_on_done() {
        let q = queue();
        q.add(key("a"));
        let k = q.next().await.unwrap();

        q.add(key("a"));
        assert!(q.is_empty(), "busy key must not be handed to another worker");

        q.done(&k);
        assert_eq!(q.len(), 1);
        assert_eq!(q.next().await, Some(key("a")));
    }

    #[tokio::test]
    async fn done_without_changes_does_not_requeue() {
        let q = queue();
        q.add(key("a"));
        let k = q.next().await.unwrap();
        q.done(&k);
        assert!(q.is_empty());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let q = queue();
        let k = key("a");
        let delays: Vec<u128> = (0..6).map(|_| q.backoff(&k).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(q.failures(&k), 6);

        q.forget(&k);
        assert_eq!(q.failures(&k), 0);
        assert_eq!(q.backoff(&k), Duration::from_millis(100));
    }

    #[test]
    fn backoff_is_per_key() {
        let q = queue();
        q.backoff(&key("a"));
        q.backoff(&key("a"));
        assert_eq!(q.backoff(&key("b")), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn shut_down_wakes_waiting_workers() {
        let q = Arc::new(queue());
        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.next().await })
        };
        tokio::task::yield_now().await;
        q.shut_down();
        assert_eq!(waiter.await.unwrap(), None);

        q.add(key("a"));
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn waiting_worker_is_woken_by_add() {
        let q = Arc::new(queue());
        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.next().await })
        };
        tokio::task::yield_now().await;
        q.add(key("a"));
        assert_eq!(waiter.await.unwrap(), Some(key("a")));
    }

    #[tokio::test]
    async fn add_after_delays_the_key() {
        let q = Arc::new(queue());
        q.add_after(key("a"), Duration::from_millis(50));
        assert!(q.is_empty());
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(q.len(), 1);
    }
}
