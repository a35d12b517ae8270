//! A time-ordered queue with one slot per torrent.
//!
//! Entries are ordered by their ready-at instant; re-adding an entry for the
//! same torrent replaces the pending one, and the replacement's schedule
//! wins. Mutations and reads compose atomically: the queue can never hold two
//! entries for the same torrent.
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use ghostseed_primitives::info_hash::InfoHash;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Anything keyed by a torrent identity can be queued.
pub trait InfoHashKeyed {
    fn info_hash(&self) -> InfoHash;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EntryKey {
    ready_at: Instant,
    sequence: u64,
}

struct Inner<T> {
    entries: BTreeMap<EntryKey, T>,
    index: HashMap<InfoHash, EntryKey>,
    next_sequence: u64,
}

/// The delay queue feeding the orchestrator's scheduler loop.
pub struct DelayQueue<T: InfoHashKeyed + Send> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

impl<T: InfoHashKeyed + Send> Default for DelayQueue<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                index: HashMap::new(),
                next_sequence: 0,
            }),
            notify: Notify::new(),
        }
    }
}

impl<T: InfoHashKeyed + Send> DelayQueue<T> {
    /// Queues `entry` to become ready after `delay`, replacing any pending
    /// entry for the same torrent. Wakes a blocked [`Self::get_available`].
    pub fn add_or_replace(&self, entry: T, delay: Duration) {
        {
            let mut inner = self.inner.lock().expect("the delay queue lock is poisoned");

            let info_hash = entry.info_hash();
            if let Some(stale) = inner.index.remove(&info_hash) {
                inner.entries.remove(&stale);
            }

            let key = EntryKey {
                ready_at: Instant::now() + delay,
                sequence: inner.next_sequence,
            };
            inner.next_sequence += 1;
            inner.entries.insert(key, entry);
            inner.index.insert(info_hash, key);
        }

        // notify_one stores a permit when nobody is waiting yet, so a consumer
        // that checks the queue and then parks can never miss this entry.
        self.notify.notify_one();
    }

    /// Waits until at least one entry is due, then returns and removes all
    /// due entries in ready-at order.
    ///
    /// The wait is interrupted early when [`Self::add_or_replace`] schedules
    /// something nearer. Cancellation is the caller's business: select over
    /// this future and a shutdown signal.
    pub async fn get_available(&self) -> Vec<T> {
        loop {
            let (due, next_ready_at) = self.pop_due();

            if !due.is_empty() {
                return due;
            }

            match next_ready_at {
                Some(ready_at) => {
                    tokio::select! {
                        () = self.notify.notified() => {}
                        () = tokio::time::sleep_until(ready_at) => {}
                    }
                }
                None => self.notify.notified().await,
            }
        }
    }

    /// Returns and removes every entry regardless of schedule. Never blocks.
    pub fn drain_all(&self) -> Vec<T> {
        let mut inner = self.inner.lock().expect("the delay queue lock is poisoned");

        inner.index.clear();
        let entries = std::mem::take(&mut inner.entries);
        entries.into_values().collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("the delay queue lock is poisoned").entries.is_empty()
    }

    fn pop_due(&self) -> (Vec<T>, Option<Instant>) {
        let mut inner = self.inner.lock().expect("the delay queue lock is poisoned");
        let now = Instant::now();

        let mut due = Vec::new();
        loop {
            let Some(key) = inner.entries.keys().next().copied() else {
                break;
            };
            if key.ready_at > now {
                break;
            }
            if let Some(value) = inner.entries.remove(&key) {
                inner.index.remove(&value.info_hash());
                due.push(value);
            }
        }

        let next_ready_at = inner.entries.keys().next().map(|key| key.ready_at);

        (due, next_ready_at)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ghostseed_primitives::info_hash::InfoHash;

    use super::{DelayQueue, InfoHashKeyed};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct StubEntry {
        info_hash: InfoHash,
        label: &'static str,
    }

    impl StubEntry {
        fn new(byte: u8, label: &'static str) -> Self {
            Self {
                info_hash: InfoHash::new([byte; 20]),
                label,
            }
        }
    }

    impl InfoHashKeyed for StubEntry {
        fn info_hash(&self) -> InfoHash {
            self.info_hash
        }
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_return_due_entries_in_ready_at_order() {
        let queue: DelayQueue<StubEntry> = DelayQueue::default();
        queue.add_or_replace(StubEntry::new(1, "late"), Duration::from_secs(10));
        queue.add_or_replace(StubEntry::new(2, "early"), Duration::from_secs(5));

        tokio::time::advance(Duration::from_secs(11)).await;

        let due = queue.get_available().await;

        assert_eq!(due.iter().map(|e| e.label).collect::<Vec<_>>(), vec!["early", "late"]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_only_return_entries_whose_time_has_come() {
        let queue: DelayQueue<StubEntry> = DelayQueue::default();
        queue.add_or_replace(StubEntry::new(1, "soon"), Duration::from_secs(1));
        queue.add_or_replace(StubEntry::new(2, "later"), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(2)).await;

        let due = queue.get_available().await;

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].label, "soon");
        assert!(!queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_keep_a_single_entry_per_torrent_and_let_the_replacement_schedule_win() {
        let queue: DelayQueue<StubEntry> = DelayQueue::default();
        queue.add_or_replace(StubEntry::new(1, "original"), Duration::from_secs(1));
        queue.add_or_replace(StubEntry::new(1, "replacement"), Duration::from_secs(30));

        tokio::time::advance(Duration::from_secs(2)).await;
        let (due, _) = queue.pop_due();
        assert!(due.is_empty(), "the replaced schedule must not fire");

        tokio::time::advance(Duration::from_secs(30)).await;
        let due = queue.get_available().await;

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].label, "replacement");
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_wake_a_blocked_consumer_when_a_due_entry_arrives() {
        let queue: std::sync::Arc<DelayQueue<StubEntry>> = std::sync::Arc::default();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get_available().await })
        };
        tokio::task::yield_now().await;

        queue.add_or_replace(StubEntry::new(1, "instant"), Duration::ZERO);

        let due = waiter.await.unwrap();

        assert_eq!(due[0].label, "instant");
    }

    #[tokio::test(start_paused = true)]
    async fn it_should_drain_everything_without_blocking() {
        let queue: DelayQueue<StubEntry> = DelayQueue::default();
        queue.add_or_replace(StubEntry::new(1, "near"), Duration::from_secs(1));
        queue.add_or_replace(StubEntry::new(2, "far"), Duration::from_secs(3600));

        let drained = queue.drain_all();

        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }
}
