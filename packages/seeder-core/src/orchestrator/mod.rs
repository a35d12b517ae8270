//! The orchestrator: owns the active set of announcers and the scheduling
//! loop, reacts to file churn and announce outcomes, and enforces the
//! simultaneous-seed cap.
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;

use ghostseed_configuration::AppConfiguration;
use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_primitives::info_hash::InfoHash;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::announce::announcer::{Announcer, AnnouncerFactory};
use crate::announce::delay_queue::DelayQueue;
use crate::announce::executor::AnnounceExecutor;
use crate::announce::request::AnnounceRequest;
use crate::announce::response::client_notifier::{ClientNotifier, SeedingCallbacks};
use crate::announce::response::event_publisher::AnnounceEventPublisher;
use crate::announce::response::peers_updater::PeersUpdater;
use crate::announce::response::rescheduler::ReScheduler;
use crate::announce::response::tracker_updater::TrackerUpdater;
use crate::announce::response::AnnounceResponseChain;
use crate::bandwidth::BandwidthDispatcher;
use crate::event::{self, Event};
use crate::torrent::metainfo::SeededTorrent;
use crate::torrent::provider::{ProviderError, TorrentFileChangeListener, TorrentFileProvider};

/// Pause between scheduler polls.
const SCHEDULER_POLL_PAUSE: Duration = Duration::from_secs(1);

/// Grace delay before a removed torrent's `stopped` announce, so an in-flight
/// request can settle first.
const STOP_ANNOUNCE_DELAY: Duration = Duration::from_secs(1);

/// The orchestrator. One per process; `new → start → stop`, no restart.
pub struct Client {
    configuration: Arc<AppConfiguration>,
    torrent_provider: Arc<TorrentFileProvider>,
    bandwidth_dispatcher: Arc<BandwidthDispatcher>,
    delay_queue: Arc<DelayQueue<AnnounceRequest>>,
    executor: AnnounceExecutor,
    announcer_factory: AnnouncerFactory,
    currently_seeding: RwLock<Vec<Arc<Announcer>>>,
    stopping: Arc<AtomicBool>,
    scheduler_cancellation: CancellationToken,
    scheduler_handle: Mutex<Option<JoinHandle<()>>>,
    event_sender: event::sender::Sender,
}

/// Assembles a [`Client`] with its executor and handler chain.
#[derive(Default)]
pub struct ClientBuilder {
    configuration: Option<Arc<AppConfiguration>>,
    torrent_provider: Option<Arc<TorrentFileProvider>>,
    bandwidth_dispatcher: Option<Arc<BandwidthDispatcher>>,
    delay_queue: Option<Arc<DelayQueue<AnnounceRequest>>>,
    announcer_factory: Option<AnnouncerFactory>,
    event_sender: event::sender::Sender,
}

impl ClientBuilder {
    #[must_use]
    pub fn with_configuration(mut self, configuration: Arc<AppConfiguration>) -> Self {
        self.configuration = Some(configuration);
        self
    }

    #[must_use]
    pub fn with_torrent_provider(mut self, torrent_provider: Arc<TorrentFileProvider>) -> Self {
        self.torrent_provider = Some(torrent_provider);
        self
    }

    #[must_use]
    pub fn with_bandwidth_dispatcher(mut self, bandwidth_dispatcher: Arc<BandwidthDispatcher>) -> Self {
        self.bandwidth_dispatcher = Some(bandwidth_dispatcher);
        self
    }

    #[must_use]
    pub fn with_delay_queue(mut self, delay_queue: Arc<DelayQueue<AnnounceRequest>>) -> Self {
        self.delay_queue = Some(delay_queue);
        self
    }

    #[must_use]
    pub fn with_announcer_factory(mut self, announcer_factory: AnnouncerFactory) -> Self {
        self.announcer_factory = Some(announcer_factory);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, event_sender: event::sender::Sender) -> Self {
        self.event_sender = event_sender;
        self
    }

    /// # Panics
    ///
    /// Panics when a required collaborator is missing: that is a wiring bug,
    /// not a runtime condition.
    #[must_use]
    pub fn build(self) -> Arc<Client> {
        let configuration = self.configuration.expect("the client needs a configuration");
        let torrent_provider = self.torrent_provider.expect("the client needs a torrent provider");
        let bandwidth_dispatcher = self.bandwidth_dispatcher.expect("the client needs a bandwidth dispatcher");
        let delay_queue = self.delay_queue.expect("the client needs a delay queue");
        let announcer_factory = self.announcer_factory.expect("the client needs an announcer factory");
        let event_sender = self.event_sender;

        let stopping = Arc::new(AtomicBool::new(true));

        Arc::new_cyclic(|weak: &Weak<Client>| {
            let callbacks: Weak<dyn SeedingCallbacks> = weak.clone();

            let handlers: AnnounceResponseChain = vec![
                Box::new(TrackerUpdater::new(bandwidth_dispatcher.clone())),
                Box::new(PeersUpdater::new(bandwidth_dispatcher.clone())),
                Box::new(ReScheduler::new(delay_queue.clone(), stopping.clone())),
                Box::new(ClientNotifier::new(callbacks)),
                Box::new(AnnounceEventPublisher::new(event_sender.clone())),
            ];

            Client {
                configuration,
                torrent_provider,
                bandwidth_dispatcher,
                delay_queue,
                executor: AnnounceExecutor::new(handlers),
                announcer_factory,
                currently_seeding: RwLock::new(Vec::new()),
                stopping,
                scheduler_cancellation: CancellationToken::new(),
                scheduler_handle: Mutex::new(None),
                event_sender,
            }
        })
    }
}

impl Client {
    /// Starts the scheduling loop, fills the active set and subscribes to
    /// file churn.
    pub fn start(self: &Arc<Self>) {
        self.stopping.store(false, Ordering::SeqCst);

        self.spawn_scheduler_loop();

        {
            let mut seeding = self.write_seeding();

            if self.configuration.seeds_unbounded() {
                tracing::info!("Simultaneous seed is unbounded, every torrent in the directory will seed.");
                let excluded = Self::info_hashes_of(&seeding);
                for torrent in self.torrent_provider.get_all_torrents_not_in(&excluded) {
                    self.add_torrent(&mut seeding, &torrent);
                }
            } else {
                #[allow(clippy::cast_sign_loss)]
                let cap = self.configuration.simultaneous_seed.max(0) as usize;
                for _ in 0..cap {
                    let excluded = Self::info_hashes_of(&seeding);
                    match self.torrent_provider.get_torrent_not_in(&excluded) {
                        Ok(torrent) => self.add_torrent(&mut seeding, &torrent),
                        Err(ProviderError::NoMoreTorrentsAvailable) => break,
                        Err(e) => {
                            tracing::error!("Unable to pick a torrent to seed: {e}");
                            break;
                        }
                    }
                }
            }
        }

        let listener: Arc<dyn TorrentFileChangeListener> = self.clone();
        self.torrent_provider.register_listener(listener);
    }

    /// Stops everything, in order: the scheduling loop, then the queue (every
    /// pending non-`started` request becomes a `stopped` announce), then the
    /// executor drain. After this returns no task is in flight and the queue
    /// is empty.
    pub async fn stop(self: &Arc<Self>) {
        self.stopping.store(true, Ordering::SeqCst);

        let listener: Arc<dyn TorrentFileChangeListener> = self.clone();
        self.torrent_provider.unregister_listener(&listener);

        self.scheduler_cancellation.cancel();
        let handle = self.scheduler_handle.lock().expect("the scheduler handle lock is poisoned").take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!("The scheduler loop ended abnormally: {e}");
            }
        }

        // A request the tracker never learned about needs no goodbye.
        for request in self.delay_queue.drain_all() {
            if request.event() != AnnounceEvent::Started {
                self.executor.execute(request.into_stop());
            }
        }

        self.executor.await_running_tasks().await;
    }

    /// Snapshot of the currently seeding announcers.
    #[must_use]
    pub fn currently_seeding(&self) -> Vec<Arc<Announcer>> {
        self.currently_seeding
            .read()
            .expect("the seeding set lock is poisoned")
            .clone()
    }

    fn spawn_scheduler_loop(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let delay_queue = self.delay_queue.clone();
        let cancellation = self.scheduler_cancellation.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    () = cancellation.cancelled() => break,

                    requests = delay_queue.get_available() => {
                        let Some(client) = weak.upgrade() else { break };

                        for request in requests {
                            let announcer = request.announcer().clone();
                            client.executor.execute(request);
                            client.mark_recently_dispatched(&announcer);
                        }
                        drop(client);

                        tokio::select! {
                            () = cancellation.cancelled() => break,
                            () = tokio::time::sleep(SCHEDULER_POLL_PAUSE) => {}
                        }
                    }
                }
            }
        });

        *self.scheduler_handle.lock().expect("the scheduler handle lock is poisoned") = Some(handle);
    }

    /// Re-adding keeps the most recently dispatched announcer at the tail.
    fn mark_recently_dispatched(&self, announcer: &Arc<Announcer>) {
        let mut seeding = self.write_seeding();
        seeding.retain(|candidate| !Arc::ptr_eq(candidate, announcer));
        seeding.push(announcer.clone());
    }

    fn add_torrent(&self, seeding: &mut Vec<Arc<Announcer>>, torrent: &Arc<SeededTorrent>) {
        let announcer = self.announcer_factory.create(torrent.clone());
        seeding.push(announcer.clone());
        self.delay_queue.add_or_replace(AnnounceRequest::start(announcer), Duration::ZERO);
    }

    fn try_promote_replacement(&self, seeding: &mut Vec<Arc<Announcer>>) {
        let excluded = Self::info_hashes_of(seeding);
        match self.torrent_provider.get_torrent_not_in(&excluded) {
            Ok(torrent) => self.add_torrent(seeding, &torrent),
            Err(ProviderError::NoMoreTorrentsAvailable) => {}
            Err(e) => tracing::error!("Unable to promote a replacement torrent: {e}"),
        }
    }

    fn remove_from_seeding(&self, announcer: &Arc<Announcer>) {
        self.write_seeding().retain(|candidate| !Arc::ptr_eq(candidate, announcer));
        self.bandwidth_dispatcher.unregister_torrent(announcer.info_hash());
    }

    fn has_capacity(&self, active: usize) -> bool {
        if self.configuration.seeds_unbounded() {
            return true;
        }
        #[allow(clippy::cast_sign_loss)]
        let cap = self.configuration.simultaneous_seed.max(0) as usize;
        active < cap
    }

    fn info_hashes_of(seeding: &[Arc<Announcer>]) -> HashSet<InfoHash> {
        seeding.iter().map(|announcer| *announcer.info_hash()).collect()
    }

    fn write_seeding(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<Announcer>>> {
        self.currently_seeding.write().expect("the seeding set lock is poisoned")
    }
}

impl TorrentFileChangeListener for Client {
    fn on_torrent_file_added(&self, torrent: &Arc<SeededTorrent>) {
        event::publish(
            &self.event_sender,
            Event::TorrentFileAdded {
                info_hash: *torrent.info_hash(),
                name: torrent.name().to_string(),
            },
        );

        if self.stopping.load(Ordering::SeqCst) {
            return;
        }

        let mut seeding = self.write_seeding();
        if self.has_capacity(seeding.len()) {
            self.add_torrent(&mut seeding, torrent);
        }
    }

    fn on_torrent_file_removed(&self, torrent: &Arc<SeededTorrent>) {
        event::publish(
            &self.event_sender,
            Event::TorrentFileRemoved {
                info_hash: *torrent.info_hash(),
                name: torrent.name().to_string(),
            },
        );

        let seeding = self.write_seeding();
        if let Some(announcer) = seeding
            .iter()
            .find(|announcer| announcer.info_hash() == torrent.info_hash())
        {
            self.delay_queue
                .add_or_replace(AnnounceRequest::stop(announcer.clone()), STOP_ANNOUNCE_DELAY);
        }
    }
}

impl SeedingCallbacks for Client {
    fn on_no_more_peers(&self, info_hash: &InfoHash) {
        if !self.configuration.keep_torrent_with_zero_leechers {
            tracing::info!("Archiving torrent {info_hash}: its swarm has no peers left to serve");
            self.torrent_provider.move_to_archive(info_hash);
        }
    }

    fn on_upload_ratio_limit_reached(&self, info_hash: &InfoHash) {
        tracing::info!("Archiving torrent {info_hash}: its upload ratio target has been met");
        self.torrent_provider.move_to_archive(info_hash);
    }

    fn on_torrent_has_stopped(&self, announcer: &Arc<Announcer>) {
        if self.stopping.load(Ordering::SeqCst) {
            self.remove_from_seeding(announcer);
            return;
        }

        {
            let mut seeding = self.write_seeding();
            self.try_promote_replacement(&mut seeding);
            seeding.retain(|candidate| !Arc::ptr_eq(candidate, announcer));
        }
        self.bandwidth_dispatcher.unregister_torrent(announcer.info_hash());
    }

    fn on_too_many_failed_in_a_row(&self, announcer: &Arc<Announcer>) {
        if self.stopping.load(Ordering::SeqCst) {
            self.remove_from_seeding(announcer);
            return;
        }

        if self.configuration.archive_on_too_many_fails {
            tracing::info!(
                "Archiving torrent {}: too many failed announces in a row",
                announcer.info_hash()
            );
            self.remove_from_seeding(announcer);
            self.torrent_provider.move_to_archive(announcer.info_hash());
            let mut seeding = self.write_seeding();
            self.try_promote_replacement(&mut seeding);
        } else {
            tracing::info!(
                "Torrent {} has failed too many announces in a row; it will no longer be announced",
                announcer.info_hash()
            );
            self.remove_from_seeding(announcer);
        }
    }
}
