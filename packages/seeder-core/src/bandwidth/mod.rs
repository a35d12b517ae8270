//! The bandwidth dispatcher: fabricates the upload history the announces
//! report.
//!
//! A single tick loop divides a randomized global budget among the registered
//! torrents, weighted by their peer populations, and accumulates the
//! per-torrent uploaded-bytes tallies the announce data accessor later reads.
pub mod budget;
pub mod weight;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use ghostseed_primitives::info_hash::InfoHash;
use ghostseed_primitives::peers::Peers;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use self::budget::RandomUploadBudget;
use self::weight::WeightHolder;
use crate::event::{self, Event};

/// Period of the accumulation tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(5000);

/// The global budget is re-drawn every two minutes worth of ticks.
const BUDGET_REFRESH_PERIOD: Duration = Duration::from_secs(120);

/// The fabricated upload speed of one torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Speed {
    pub bytes_per_second: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct SeedStats {
    uploaded_bytes: u64,
}

#[derive(Debug)]
struct DispatcherState {
    weights: WeightHolder<InfoHash>,
    stats: HashMap<InfoHash, SeedStats>,
    speeds: HashMap<InfoHash, Speed>,
    budget: RandomUploadBudget,
    ticks_since_refresh: u32,
}

/// Divides the global upload budget among the active torrents.
///
/// All maps live behind one reader/writer lock; peer updates, registration
/// and budget refreshes recompute every speed under the write lock and then
/// publish the full speed map as a single event.
pub struct BandwidthDispatcher {
    state: RwLock<DispatcherState>,
    tick_interval: Duration,
    event_sender: event::sender::Sender,
}

impl BandwidthDispatcher {
    #[must_use]
    pub fn new(
        min_upload_rate: u64,
        max_upload_rate: u64,
        tick_interval: Duration,
        event_sender: event::sender::Sender,
    ) -> Self {
        Self {
            state: RwLock::new(DispatcherState {
                weights: WeightHolder::default(),
                stats: HashMap::new(),
                speeds: HashMap::new(),
                budget: RandomUploadBudget::new(min_upload_rate, max_upload_rate),
                ticks_since_refresh: 0,
            }),
            tick_interval,
            event_sender,
        }
    }

    /// The fabricated uploaded-bytes tally for one torrent. Zero when the
    /// torrent is not registered.
    #[must_use]
    pub fn uploaded_bytes_for(&self, info_hash: &InfoHash) -> u64 {
        self.state
            .read()
            .expect("the dispatcher lock is poisoned")
            .stats
            .get(info_hash)
            .map_or(0, |stats| stats.uploaded_bytes)
    }

    /// A defensive copy of the current speed assignments.
    #[must_use]
    pub fn speed_map(&self) -> HashMap<InfoHash, Speed> {
        self.state.read().expect("the dispatcher lock is poisoned").speeds.clone()
    }

    /// Records the swarm peer counts reported by a tracker and redistributes
    /// the budget.
    pub fn update_torrent_peers(&self, info_hash: &InfoHash, seeders: u32, leechers: u32) {
        tracing::debug!("Updating peers stats for {info_hash}");
        let speeds = {
            let mut state = self.state.write().expect("the dispatcher lock is poisoned");
            state.weights.add_or_update(*info_hash, Peers::new(seeders, leechers));
            Self::recompute_speeds(&mut state)
        };
        self.publish_speeds(speeds);
    }

    /// Seeds the stats and speed maps with zeros for a new torrent.
    pub fn register_torrent(&self, info_hash: &InfoHash) {
        tracing::debug!("{info_hash} has been added to the bandwidth dispatcher");
        let mut state = self.state.write().expect("the dispatcher lock is poisoned");
        state.stats.insert(*info_hash, SeedStats::default());
        state.speeds.insert(*info_hash, Speed::default());
    }

    /// Drops a torrent from all maps and redistributes the budget.
    pub fn unregister_torrent(&self, info_hash: &InfoHash) {
        tracing::debug!("{info_hash} has been removed from the bandwidth dispatcher");
        let speeds = {
            let mut state = self.state.write().expect("the dispatcher lock is poisoned");
            state.weights.remove(info_hash);
            state.stats.remove(info_hash);
            state.speeds.remove(info_hash);
            Self::recompute_speeds(&mut state)
        };
        self.publish_speeds(speeds);
    }

    async fn run(&self, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                () = cancellation_token.cancelled() => {
                    tracing::info!("Received cancellation request, shutting down bandwidth dispatcher.");
                    break;
                }

                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }

    /// One accumulation step, plus a budget refresh when one is due.
    fn tick(&self) {
        let refresh_every = Self::ticks_per_refresh(self.tick_interval);

        let due_for_refresh = {
            let mut state = self.state.write().expect("the dispatcher lock is poisoned");

            let tick_ms = u64::try_from(self.tick_interval.as_millis()).unwrap_or(u64::MAX);
            let info_hashes: Vec<InfoHash> = state.stats.keys().copied().collect();
            for info_hash in info_hashes {
                let speed = state.speeds.get(&info_hash).copied().unwrap_or_default();
                if let Some(stats) = state.stats.get_mut(&info_hash) {
                    // Multiplication before division, or the budget truncates away.
                    stats.uploaded_bytes += speed.bytes_per_second * tick_ms / 1000;
                }
            }

            state.ticks_since_refresh += 1;
            state.ticks_since_refresh >= refresh_every
        };

        if due_for_refresh {
            self.refresh_budget();
        }
    }

    /// Re-draws the global budget and redistributes it.
    fn refresh_budget(&self) {
        tracing::debug!("Refreshing the global bandwidth budget");
        let speeds = {
            let mut state = self.state.write().expect("the dispatcher lock is poisoned");
            state.ticks_since_refresh = 0;
            state.budget.refresh();
            Self::recompute_speeds(&mut state)
        };
        self.publish_speeds(speeds);
    }

    fn recompute_speeds(state: &mut DispatcherState) -> HashMap<InfoHash, Speed> {
        let total_weight = state.weights.total_weight();
        let budget = state.budget.current();

        let info_hashes: Vec<InfoHash> = state.speeds.keys().copied().collect();
        for info_hash in info_hashes {
            let share = if total_weight == 0.0 {
                0.0
            } else {
                state.weights.weight_for(&info_hash) / total_weight
            };
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let bytes_per_second = (budget as f64 * share) as u64;
            state.speeds.insert(info_hash, Speed { bytes_per_second });
        }

        state.speeds.clone()
    }

    fn publish_speeds(&self, speeds: HashMap<InfoHash, Speed>) {
        event::publish(&self.event_sender, Event::SeedingSpeedsUpdated { speeds });
    }

    fn ticks_per_refresh(tick_interval: Duration) -> u32 {
        let ticks = BUDGET_REFRESH_PERIOD.as_millis() / tick_interval.as_millis().max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX).max(1)
    }
}

#[must_use]
pub fn start_job(dispatcher: Arc<BandwidthDispatcher>, cancellation_token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        dispatcher.run(cancellation_token).await;
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ghostseed_primitives::info_hash::InfoHash;

    use super::BandwidthDispatcher;

    fn dispatcher_with_budget(budget: u64) -> BandwidthDispatcher {
        BandwidthDispatcher::new(budget, budget, Duration::from_millis(5000), None)
    }

    fn info_hash(byte: u8) -> InfoHash {
        InfoHash::new([byte; 20])
    }

    #[test]
    fn it_should_assign_the_whole_budget_proportionally_to_the_weights() {
        let dispatcher = dispatcher_with_budget(1_000_000);
        let hungry = info_hash(1);
        let quiet = info_hash(2);

        dispatcher.register_torrent(&hungry);
        dispatcher.register_torrent(&quiet);
        dispatcher.update_torrent_peers(&hungry, 10, 90);
        dispatcher.update_torrent_peers(&quiet, 10, 10);

        let speeds = dispatcher.speed_map();
        let total: u64 = speeds.values().map(|speed| speed.bytes_per_second).sum();

        assert!(total <= 1_000_000);
        assert!(total >= 999_998, "rounding should lose at most a few bytes, kept {total}");
        assert!(speeds[&hungry].bytes_per_second > speeds[&quiet].bytes_per_second);
    }

    #[test]
    fn it_should_assign_zero_speeds_when_the_total_weight_is_zero() {
        let dispatcher = dispatcher_with_budget(1_000_000);
        let lonely = info_hash(1);

        dispatcher.register_torrent(&lonely);
        dispatcher.update_torrent_peers(&lonely, 0, 0);

        assert_eq!(dispatcher.speed_map()[&lonely].bytes_per_second, 0);
    }

    #[test]
    fn it_should_accumulate_uploaded_bytes_on_every_tick() {
        let dispatcher = dispatcher_with_budget(1_000_000);
        let only = info_hash(1);

        dispatcher.register_torrent(&only);
        dispatcher.update_torrent_peers(&only, 5, 5);

        dispatcher.tick();
        dispatcher.tick();

        // The single torrent owns the full budget: 1 MB/s over two 5s ticks.
        assert_eq!(dispatcher.uploaded_bytes_for(&only), 10_000_000);
    }

    #[test]
    fn it_should_never_decrease_an_uploaded_tally() {
        let dispatcher = dispatcher_with_budget(1_000_000);
        let only = info_hash(1);
        dispatcher.register_torrent(&only);
        dispatcher.update_torrent_peers(&only, 5, 5);

        dispatcher.tick();
        let after_first = dispatcher.uploaded_bytes_for(&only);

        dispatcher.update_torrent_peers(&only, 0, 0);
        dispatcher.tick();

        assert_eq!(dispatcher.uploaded_bytes_for(&only), after_first);
    }

    #[test]
    fn it_should_report_zero_uploaded_bytes_for_an_unknown_torrent() {
        let dispatcher = dispatcher_with_budget(1_000_000);

        assert_eq!(dispatcher.uploaded_bytes_for(&info_hash(9)), 0);
    }

    #[test]
    fn it_should_drop_an_unregistered_torrent_from_the_speed_map() {
        let dispatcher = dispatcher_with_budget(1_000_000);
        let gone = info_hash(1);
        dispatcher.register_torrent(&gone);
        dispatcher.update_torrent_peers(&gone, 5, 5);

        dispatcher.unregister_torrent(&gone);

        assert!(dispatcher.speed_map().is_empty());
        assert_eq!(dispatcher.uploaded_bytes_for(&gone), 0);
    }
}
