use std::sync::Arc;
use std::time::Duration;

use ghostseed_configuration::AppConfiguration;
use ghostseed_emulated_client::provider::ClientFileProvider;
use ghostseed_seeder_core::announce::announcer::AnnouncerFactory;
use ghostseed_seeder_core::announce::data::AnnounceDataAccessor;
use ghostseed_seeder_core::announce::delay_queue::DelayQueue;
use ghostseed_seeder_core::bandwidth::{BandwidthDispatcher, TICK_INTERVAL};
use ghostseed_seeder_core::connection::ConnectionProbe;
use ghostseed_seeder_core::event;
use ghostseed_seeder_core::folders::SeedFolders;
use ghostseed_seeder_core::hit_and_run::persistence::ElapsedTimeStore;
use ghostseed_seeder_core::hit_and_run::SeedTimeRegistry;
use ghostseed_seeder_core::orchestrator::{Client, ClientBuilder};
use ghostseed_seeder_core::torrent::provider::{TorrentFileChangeListener, TorrentFileProvider};
use tracing::instrument;

const ANNOUNCE_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ANNOUNCE_READ_TIMEOUT: Duration = Duration::from_secs(5);
const ANNOUNCE_POOL_IDLE_PER_HOST: usize = 100;

pub struct AppContainer {
    // Configuration
    pub configuration: Arc<AppConfiguration>,
    pub folders: SeedFolders,

    // Events
    pub event_bus: Arc<event::bus::EventBus>,

    // Torrent lifecycle
    pub torrent_file_provider: Arc<TorrentFileProvider>,
    pub seed_time_registry: Arc<SeedTimeRegistry>,

    // Announce pipeline
    pub connection_probe: Arc<ConnectionProbe>,
    pub bandwidth_dispatcher: Arc<BandwidthDispatcher>,
    pub client: Arc<Client>,
    pub emulated_client_name: String,
}

impl AppContainer {
    /// Wires the whole service graph.
    ///
    /// # Panics
    ///
    /// Panics when a collaborator that must exist at startup cannot be built:
    /// a missing torrents directory, or a missing/invalid emulated-client
    /// fingerprint file. Both are operator errors and fatal by design.
    #[instrument(skip(configuration, folders))]
    pub fn initialize(configuration: &Arc<AppConfiguration>, folders: &SeedFolders) -> AppContainer {
        // Events

        let event_bus = Arc::new(event::bus::EventBus::default());
        let event_sender = event_bus.sender();

        // Torrent lifecycle

        let torrent_file_provider = Arc::new(
            TorrentFileProvider::new(folders, event_sender.clone()).expect("the torrents directory must exist"),
        );

        let elapsed_time_store = Arc::new(ElapsedTimeStore::new(&folders.elapsed_times_file()));

        let seed_time_registry = Arc::new(SeedTimeRegistry::new(
            configuration.required_seeding_time_ms,
            configuration.max_non_seeding_time_ms,
            elapsed_time_store,
            event_sender.clone(),
        ));

        let registry_listener: Arc<dyn TorrentFileChangeListener> = seed_time_registry.clone();
        torrent_file_provider.register_listener(registry_listener);

        // Announce pipeline

        let emulated_client = ClientFileProvider::new(folders.clients_dir())
            .load(&configuration.client)
            .expect("the configured emulated-client file must load");
        let emulated_client_name = emulated_client.user_agent().unwrap_or("unknown").to_string();

        let connection_probe = Arc::new(ConnectionProbe::new());

        let bandwidth_dispatcher = Arc::new(BandwidthDispatcher::new(
            configuration.min_upload_rate,
            configuration.max_upload_rate,
            TICK_INTERVAL,
            event_sender.clone(),
        ));

        let announce_data_accessor = Arc::new(AnnounceDataAccessor::new(
            emulated_client,
            bandwidth_dispatcher.clone(),
            connection_probe.clone(),
        ));

        let announce_http_client = reqwest::Client::builder()
            .connect_timeout(ANNOUNCE_CONNECT_TIMEOUT)
            .read_timeout(ANNOUNCE_READ_TIMEOUT)
            .pool_max_idle_per_host(ANNOUNCE_POOL_IDLE_PER_HOST)
            .build()
            .expect("the announce http client should build");

        let announcer_factory = AnnouncerFactory::new(
            announce_data_accessor,
            announce_http_client,
            configuration.upload_ratio_target,
        );

        let client = ClientBuilder::default()
            .with_configuration(configuration.clone())
            .with_torrent_provider(torrent_file_provider.clone())
            .with_bandwidth_dispatcher(bandwidth_dispatcher.clone())
            .with_delay_queue(Arc::new(DelayQueue::default()))
            .with_announcer_factory(announcer_factory)
            .with_event_sender(event_sender)
            .build();

        AppContainer {
            // Configuration
            configuration: configuration.clone(),
            folders: folders.clone(),

            // Events
            event_bus,

            // Torrent lifecycle
            torrent_file_provider,
            seed_time_registry,

            // Announce pipeline
            connection_probe,
            bandwidth_dispatcher,
            client,
            emulated_client_name,
        }
    }
}
