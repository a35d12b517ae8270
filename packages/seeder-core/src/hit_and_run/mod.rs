//! Anti-hit-and-run accounting.
//!
//! Trackers with hit-and-run policies expect a minimum total seed time per
//! torrent. Each torrent gets a [`SeedTimeTracker`]; the [`SeedTimeRegistry`]
//! restores totals from the persistent store, persists them on a review loop
//! and reports which torrents have served their time.
pub mod persistence;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ghostseed_clock::clock::Time;
use ghostseed_primitives::info_hash::InfoHash;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use self::persistence::ElapsedTimeStore;
use crate::event::{self, Event};
use crate::torrent::metainfo::SeededTorrent;
use crate::torrent::provider::{TorrentFileChangeListener, TorrentFileProvider};
use crate::CurrentClock;

/// Pure per-torrent seed-time accounting, in wall-clock milliseconds.
///
/// The caller supplies the current time so the bookkeeping stays clock-free.
#[derive(Debug)]
pub struct SeedTimeTracker {
    required_seeding_ms: u64,
    max_non_seeding_ms: u64,
    total_seeding_ms: u64,
    last_seeding_start_ms: u64,
    last_seeding_stop_ms: u64,
    seeding: bool,
    warning_sent: bool,
}

impl SeedTimeTracker {
    #[must_use]
    pub fn new(required_seeding_ms: u64, max_non_seeding_ms: u64) -> Self {
        Self {
            required_seeding_ms,
            max_non_seeding_ms,
            total_seeding_ms: 0,
            last_seeding_start_ms: 0,
            last_seeding_stop_ms: 0,
            seeding: false,
            warning_sent: false,
        }
    }

    /// Restores a persisted total.
    pub fn set_total_seeding_ms(&mut self, total_seeding_ms: u64) {
        self.total_seeding_ms = total_seeding_ms;
    }

    #[must_use]
    pub fn total_seeding_ms(&self) -> u64 {
        self.total_seeding_ms
    }

    #[must_use]
    pub fn is_seeding(&self) -> bool {
        self.seeding
    }

    /// Marks the torrent as seeding. Returns true when the preceding
    /// non-seeding window was long enough to deserve a warning.
    pub fn on_seeding_start(&mut self, now_ms: u64) -> bool {
        self.seeding = true;
        self.last_seeding_start_ms = now_ms;

        if self.last_seeding_stop_ms == 0 {
            return false;
        }

        let non_seeding_ms = now_ms.saturating_sub(self.last_seeding_stop_ms);
        if non_seeding_ms > self.max_non_seeding_ms && !self.warning_sent && self.total_seeding_ms < self.required_seeding_ms
        {
            self.warning_sent = true;
            return true;
        }

        false
    }

    /// Marks the torrent as no longer seeding and banks the session.
    pub fn on_seeding_stop(&mut self, now_ms: u64) {
        self.seeding = false;
        self.total_seeding_ms += now_ms.saturating_sub(self.last_seeding_start_ms);
        self.last_seeding_stop_ms = now_ms;
    }

    /// Periodic check while not seeding. Returns true when a warning is due.
    pub fn periodic_check(&mut self, now_ms: u64) -> bool {
        if self.seeding || self.warning_sent || self.total_seeding_ms >= self.required_seeding_ms {
            return false;
        }
        if self.last_seeding_stop_ms == 0 {
            return false;
        }

        if now_ms.saturating_sub(self.last_seeding_stop_ms) > self.max_non_seeding_ms {
            self.warning_sent = true;
            return true;
        }

        false
    }

    /// Total seeded time including the in-progress session.
    #[must_use]
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        if self.seeding {
            self.total_seeding_ms + now_ms.saturating_sub(self.last_seeding_start_ms)
        } else {
            self.total_seeding_ms
        }
    }

    /// Whether the required total seeding time has been served.
    #[must_use]
    pub fn requirement_met(&self, now_ms: u64) -> bool {
        self.elapsed_ms(now_ms) >= self.required_seeding_ms
    }

    #[must_use]
    pub fn required_seeding_ms(&self) -> u64 {
        self.required_seeding_ms
    }
}

/// The per-torrent trackers plus their persistence.
pub struct SeedTimeRegistry {
    required_seeding_ms: u64,
    max_non_seeding_ms: u64,
    trackers: Mutex<HashMap<InfoHash, SeedTimeTracker>>,
    store: Arc<ElapsedTimeStore>,
    event_sender: event::sender::Sender,
}

impl SeedTimeRegistry {
    #[must_use]
    pub fn new(
        required_seeding_ms: u64,
        max_non_seeding_ms: u64,
        store: Arc<ElapsedTimeStore>,
        event_sender: event::sender::Sender,
    ) -> Self {
        Self {
            required_seeding_ms,
            max_non_seeding_ms,
            trackers: Mutex::new(HashMap::new()),
            store,
            event_sender,
        }
    }

    /// Starts accounting for a torrent, restoring any persisted total.
    pub fn ensure_tracking(&self, info_hash: &InfoHash) {
        let now_ms = CurrentClock::now_ms();
        let mut warning = None;

        {
            let mut trackers = self.trackers.lock().expect("the seed time registry lock is poisoned");
            if trackers.contains_key(info_hash) {
                return;
            }

            let mut tracker = SeedTimeTracker::new(self.required_seeding_ms, self.max_non_seeding_ms);

            let persisted_ms = self.store.get(info_hash);
            if persisted_ms > 0 {
                tracker.set_total_seeding_ms(persisted_ms);
            }

            if tracker.on_seeding_start(now_ms) {
                warning = Some(tracker.elapsed_ms(now_ms));
            }

            trackers.insert(*info_hash, tracker);
            self.store.save(info_hash, persisted_ms);
        }

        if let Some(seeded_ms) = warning {
            self.publish_warning(info_hash, seeded_ms);
        }
    }

    /// One pass of the review loop: raise due warnings, persist every
    /// in-progress total, and report the torrents that have served their
    /// required time.
    #[must_use]
    pub fn review_pass(&self) -> Vec<InfoHash> {
        let now_ms = CurrentClock::now_ms();
        let mut warnings = Vec::new();
        let mut served = Vec::new();

        {
            let mut trackers = self.trackers.lock().expect("the seed time registry lock is poisoned");

            for (info_hash, tracker) in trackers.iter_mut() {
                if tracker.periodic_check(now_ms) {
                    warnings.push((*info_hash, tracker.elapsed_ms(now_ms)));
                }

                self.store.save(info_hash, tracker.elapsed_ms(now_ms));

                if tracker.requirement_met(now_ms) {
                    served.push(*info_hash);
                }
            }
        }

        for (info_hash, seeded_ms) in warnings {
            self.publish_warning(&info_hash, seeded_ms);
        }

        served
    }

    /// Banks and persists every in-progress session. Called on shutdown.
    pub fn stop_all(&self) {
        let now_ms = CurrentClock::now_ms();
        let mut trackers = self.trackers.lock().expect("the seed time registry lock is poisoned");

        for (info_hash, tracker) in trackers.iter_mut() {
            if tracker.is_seeding() {
                tracker.on_seeding_stop(now_ms);
            }
            self.store.save(info_hash, tracker.total_seeding_ms());
        }
    }

    /// Total seeded time for one torrent, including the in-progress session.
    #[must_use]
    pub fn seeding_time_ms_for(&self, info_hash: &InfoHash) -> u64 {
        let now_ms = CurrentClock::now_ms();
        self.trackers
            .lock()
            .expect("the seed time registry lock is poisoned")
            .get(info_hash)
            .map_or(0, |tracker| tracker.elapsed_ms(now_ms))
    }

    fn publish_warning(&self, info_hash: &InfoHash, seeded_ms: u64) {
        event::publish(
            &self.event_sender,
            Event::HitAndRunWarning {
                info_hash: *info_hash,
                seeded: Duration::from_millis(seeded_ms),
                required: Duration::from_millis(self.required_seeding_ms),
            },
        );
    }
}

impl TorrentFileChangeListener for SeedTimeRegistry {
    fn on_torrent_file_added(&self, torrent: &Arc<SeededTorrent>) {
        self.ensure_tracking(torrent.info_hash());
    }

    fn on_torrent_file_removed(&self, torrent: &Arc<SeededTorrent>) {
        let now_ms = CurrentClock::now_ms();
        let mut trackers = self.trackers.lock().expect("the seed time registry lock is poisoned");

        if let Some(mut tracker) = trackers.remove(torrent.info_hash()) {
            if tracker.is_seeding() {
                tracker.on_seeding_stop(now_ms);
            }
            self.store.save(torrent.info_hash(), tracker.total_seeding_ms());
        }
    }
}

/// The review loop: persists totals and archives torrents that served their
/// time.
#[must_use]
pub fn start_review_job(
    registry: Arc<SeedTimeRegistry>,
    provider: Arc<TorrentFileProvider>,
    check_interval: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(check_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                () = cancellation_token.cancelled() => {
                    tracing::info!("Received cancellation request, shutting down the hit-and-run review loop.");
                    registry.stop_all();
                    break;
                }

                _ = interval.tick() => {
                    for info_hash in registry.review_pass() {
                        tracing::info!("Torrent {info_hash} has served its required seeding time, archiving");
                        provider.move_to_archive(&info_hash);
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use ghostseed_clock::clock::StoppedTime;
    use ghostseed_primitives::info_hash::InfoHash;

    use super::persistence::ElapsedTimeStore;
    use super::{SeedTimeRegistry, SeedTimeTracker};
    use crate::CurrentClock;

    #[test]
    fn it_should_bank_each_seeding_session_exactly_once() {
        let mut tracker = SeedTimeTracker::new(1_000_000, 1_000);

        tracker.on_seeding_start(1_000);
        tracker.on_seeding_stop(4_600_000); // t1 = 4_599_000

        tracker.on_seeding_start(5_000_000);
        tracker.on_seeding_stop(5_000_500); // t2 = 500

        assert_eq!(tracker.total_seeding_ms(), 4_599_500);
    }

    #[test]
    fn it_should_include_the_in_progress_session_in_the_elapsed_time() {
        let mut tracker = SeedTimeTracker::new(1_000_000, 1_000);

        tracker.on_seeding_start(10_000);

        assert_eq!(tracker.elapsed_ms(15_000), 5_000);
    }

    #[test]
    fn it_should_warn_once_when_the_non_seeding_window_exceeds_the_tolerance() {
        let mut tracker = SeedTimeTracker::new(1_000_000, 1_000);
        tracker.on_seeding_start(0);
        tracker.on_seeding_stop(100);

        assert!(!tracker.periodic_check(500));
        assert!(tracker.periodic_check(2_000));
        assert!(!tracker.periodic_check(10_000), "the warning fires only once");
    }

    #[test]
    fn it_should_not_warn_once_the_requirement_is_met() {
        let mut tracker = SeedTimeTracker::new(1_000, 1_000);
        tracker.on_seeding_start(0);
        tracker.on_seeding_stop(5_000); // requirement served

        assert!(!tracker.periodic_check(100_000));
    }

    #[test]
    fn it_should_meet_the_requirement_mid_session() {
        let mut tracker = SeedTimeTracker::new(10_000, 1_000);
        tracker.on_seeding_start(0);

        assert!(!tracker.requirement_met(5_000));
        assert!(tracker.requirement_met(10_000));
    }

    #[test]
    fn it_should_restore_the_persisted_total_when_tracking_starts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ElapsedTimeStore::new(&dir.path().join("elapsed-times.json")));
        let info_hash = InfoHash::new([7u8; 20]);
        store.save(&info_hash, 3_600_000);

        CurrentClock::local_set(&Duration::from_secs(1_000_000));

        let registry = SeedTimeRegistry::new(604_800_000, 259_200_000, store, None);
        registry.ensure_tracking(&info_hash);

        assert!(registry.seeding_time_ms_for(&info_hash) >= 3_600_000);
    }

    #[test]
    fn it_should_persist_the_banked_total_when_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ElapsedTimeStore::new(&dir.path().join("elapsed-times.json")));
        let info_hash = InfoHash::new([8u8; 20]);

        CurrentClock::local_set(&Duration::from_secs(1_000));
        let registry = SeedTimeRegistry::new(604_800_000, 259_200_000, store.clone(), None);
        registry.ensure_tracking(&info_hash);

        CurrentClock::local_add(&Duration::from_secs(3_600));
        registry.stop_all();

        assert_eq!(store.get(&info_hash), 3_600_000);
    }

    #[test]
    fn it_should_report_served_torrents_from_a_review_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ElapsedTimeStore::new(&dir.path().join("elapsed-times.json")));
        let info_hash = InfoHash::new([9u8; 20]);

        CurrentClock::local_set(&Duration::from_secs(10_000));
        let registry = SeedTimeRegistry::new(60_000, 259_200_000, store, None);
        registry.ensure_tracking(&info_hash);

        assert!(registry.review_pass().is_empty());

        CurrentClock::local_add(&Duration::from_secs(120));

        assert_eq!(registry.review_pass(), vec![info_hash]);
    }
}
