//! End-to-end scenarios: a full container wired against a mock HTTP tracker
//! that replies with literal bencoded bodies.
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use ghostseed_configuration::AppConfiguration;
use ghostseed_events::receiver::Receiver as _;
use ghostseed_lib::container::AppContainer;
use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_seeder_core::event::Event;
use ghostseed_seeder_core::folders::SeedFolders;
use ghostseed_seeder_core::test_helpers::{torrent_bytes, TorrentSpec, SAMPLE_CLIENT_FILE_JSON};
use ghostseed_seeder_core::torrent::metainfo::SeededTorrent;

const HEALTHY_SWARM: &[u8] = b"d8:completei10e10:incompletei5e8:intervali1800ee";
const EMPTY_SWARM: &[u8] = b"d8:completei0e10:incompletei0e8:intervali1800ee";

#[derive(Clone)]
enum TrackerReply {
    Bencoded(&'static [u8]),
    HttpStatus(u16),
}

#[derive(Clone)]
struct MockTrackerState {
    requests: Arc<Mutex<Vec<String>>>,
    reply: TrackerReply,
}

struct MockTracker {
    address: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockTracker {
    async fn start(reply: TrackerReply) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockTrackerState {
            requests: requests.clone(),
            reply,
        };

        let app = Router::new().route("/announce", get(announce_handler)).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("the mock tracker should bind");
        let address = listener.local_addr().expect("the mock tracker should have an address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("the mock tracker should serve");
        });

        Self { address, requests }
    }

    fn announce_url(&self) -> String {
        format!("http://{}/announce", self.address)
    }

    fn queries(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn count_with_event(&self, event: &str) -> usize {
        let needle = format!("event={event}");
        self.queries().iter().filter(|query| query.contains(&needle)).count()
    }
}

async fn announce_handler(State(state): State<MockTrackerState>, RawQuery(query): RawQuery) -> Response {
    state.requests.lock().unwrap().push(query.unwrap_or_default());

    match &state.reply {
        TrackerReply::Bencoded(body) => (StatusCode::OK, body.to_vec()).into_response(),
        TrackerReply::HttpStatus(code) => StatusCode::from_u16(*code)
            .expect("the mock status code should be valid")
            .into_response(),
    }
}

struct SeedingEnv {
    _conf_dir: tempfile::TempDir,
    folders: SeedFolders,
    container: Arc<AppContainer>,
}

fn config_json(simultaneous_seed: i64, keep_torrent_with_zero_leechers: bool) -> serde_json::Value {
    serde_json::json!({
        "minUploadRate": 1000,
        "maxUploadRate": 2000,
        "simultaneousSeed": simultaneous_seed,
        "client": "qbittorrent-4.6.5.client",
        "keepTorrentWithZeroLeechers": keep_torrent_with_zero_leechers
    })
}

fn build_env(config: &serde_json::Value, torrents: &[(&str, Vec<u8>)]) -> SeedingEnv {
    let conf_dir = tempfile::tempdir().expect("the configuration directory should be created");
    write_env_files(conf_dir.path(), config, torrents);

    let folders = SeedFolders::new(conf_dir.path());
    let configuration =
        Arc::new(AppConfiguration::load_from_dir(folders.conf_root()).expect("the test configuration should load"));
    let container = Arc::new(AppContainer::initialize(&configuration, &folders));

    container.torrent_file_provider.init().expect("the archive folder should be created");
    container.torrent_file_provider.scan();

    SeedingEnv {
        _conf_dir: conf_dir,
        folders,
        container,
    }
}

fn write_env_files(root: &Path, config: &serde_json::Value, torrents: &[(&str, Vec<u8>)]) {
    std::fs::create_dir_all(root.join("torrents")).unwrap();
    std::fs::create_dir_all(root.join("clients")).unwrap();
    std::fs::write(root.join("config.json"), config.to_string()).unwrap();
    std::fs::write(root.join("clients").join("qbittorrent-4.6.5.client"), SAMPLE_CLIENT_FILE_JSON).unwrap();

    for (file_name, bytes) in torrents {
        std::fs::write(root.join("torrents").join(file_name), bytes).unwrap();
    }
}

fn torrent_for_tracker(name: &str, announce_url: &str) -> Vec<u8> {
    torrent_bytes(&TorrentSpec {
        name: name.to_string(),
        announce: announce_url.to_string(),
        ..TorrentSpec::default()
    })
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_announce_started_and_stopped_over_a_full_session() {
    let tracker = MockTracker::start(TrackerReply::Bencoded(HEALTHY_SWARM)).await;
    let env = build_env(
        &config_json(1, true),
        &[("t1.torrent", torrent_for_tracker("t1", &tracker.announce_url()))],
    );

    let mut events = env.container.event_bus.receiver();

    let client = env.container.client.clone();
    client.start();

    // The event publisher is the last handler in the chain, so once the
    // success event arrives the follow-up re-announce is already queued.
    let announced = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Ok(Event::SuccessfullyAnnounced {
                    event: AnnounceEvent::Started,
                    ..
                }) => break true,
                Ok(_) => {}
                Err(_) => break false,
            }
        }
    })
    .await
    .unwrap_or(false);

    assert!(announced, "the initial announce should succeed, got queries: {:?}", tracker.queries());
    assert_eq!(tracker.count_with_event("started"), 1);
    assert_eq!(client.currently_seeding().len(), 1);

    client.stop().await;

    assert_eq!(
        tracker.count_with_event("stopped"),
        1,
        "expected the pending re-announce to be converted into a stop, got queries: {:?}",
        tracker.queries()
    );
    assert!(client.currently_seeding().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_archive_a_peerless_torrent_and_keep_seeding_the_healthy_one() {
    let empty_tracker = MockTracker::start(TrackerReply::Bencoded(EMPTY_SWARM)).await;
    let healthy_tracker = MockTracker::start(TrackerReply::Bencoded(HEALTHY_SWARM)).await;

    let env = build_env(
        &config_json(2, false),
        &[
            ("empty.torrent", torrent_for_tracker("empty", &empty_tracker.announce_url())),
            ("healthy.torrent", torrent_for_tracker("healthy", &healthy_tracker.announce_url())),
        ],
    );

    let healthy_info_hash = *SeededTorrent::from_bytes(&torrent_for_tracker("healthy", &healthy_tracker.announce_url()))
        .unwrap()
        .info_hash();

    let client = env.container.client.clone();
    client.start();

    let archived_file = env.folders.archive_dir().join("empty.torrent");
    assert!(
        wait_until(Duration::from_secs(15), || archived_file.is_file()).await,
        "the peerless torrent should have been moved to the archive folder"
    );

    assert!(
        wait_until(Duration::from_secs(15), || {
            let seeding = client.currently_seeding();
            seeding.len() == 1 && *seeding[0].info_hash() == healthy_info_hash
        })
        .await,
        "only the healthy torrent should stay in the active set"
    );
    assert_eq!(healthy_tracker.count_with_event("started"), 1);
    assert!(
        wait_until(Duration::from_secs(10), || empty_tracker.count_with_event("stopped") == 1).await,
        "the archived torrent should say goodbye to its tracker"
    );

    client.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_seed_every_torrent_when_the_cap_is_unbounded() {
    let tracker = MockTracker::start(TrackerReply::Bencoded(HEALTHY_SWARM)).await;

    let env = build_env(
        &config_json(-1, true),
        &[
            ("a.torrent", torrent_for_tracker("a", &tracker.announce_url())),
            ("b.torrent", torrent_for_tracker("b", &tracker.announce_url())),
            ("c.torrent", torrent_for_tracker("c", &tracker.announce_url())),
        ],
    );

    let client = env.container.client.clone();
    client.start();

    assert!(
        wait_until(Duration::from_secs(10), || tracker.count_with_event("started") == 3).await,
        "every torrent should announce started, got queries: {:?}",
        tracker.queries()
    );

    let distinct_info_hashes: std::collections::HashSet<String> = tracker
        .queries()
        .iter()
        .filter_map(|query| {
            query
                .split('&')
                .find(|pair| pair.starts_with("info_hash="))
                .map(ToString::to_string)
        })
        .collect();
    assert_eq!(distinct_info_hashes.len(), 3);
    assert_eq!(client.currently_seeding().len(), 3);

    client.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_give_up_on_a_torrent_after_too_many_failed_announces() {
    let tracker = MockTracker::start(TrackerReply::HttpStatus(500)).await;

    let mut config = config_json(1, true);
    config["archiveOnTooManyFails"] = serde_json::json!(true);

    let env = build_env(
        &config,
        &[("failing.torrent", torrent_for_tracker("failing", &tracker.announce_url()))],
    );

    let client = env.container.client.clone();
    client.start();

    // Retries are paced by the announcer's initial interval; five failures
    // take a few tens of seconds at most.
    let archived_file = env.folders.archive_dir().join("failing.torrent");
    assert!(
        wait_until(Duration::from_secs(60), || archived_file.is_file()).await,
        "the failing torrent should be archived after exhausting its failure budget"
    );

    assert!(
        tracker.queries().len() >= 5,
        "expected at least five announce attempts, got {}",
        tracker.queries().len()
    );
    assert!(
        wait_until(Duration::from_secs(5), || client.currently_seeding().is_empty()).await,
        "the failing torrent should leave the active set"
    );

    client.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn it_should_restore_persisted_seed_time_across_a_restart() {
    let tracker = MockTracker::start(TrackerReply::Bencoded(HEALTHY_SWARM)).await;

    let torrent = torrent_for_tracker("old-friend", &tracker.announce_url());
    let info_hash = *SeededTorrent::from_bytes(&torrent).unwrap().info_hash();

    let conf_dir = tempfile::tempdir().unwrap();
    write_env_files(conf_dir.path(), &config_json(1, true), &[("old-friend.torrent", torrent)]);

    // One hour of seeding banked by a previous run.
    let mut elapsed_times = serde_json::Map::new();
    elapsed_times.insert(info_hash.to_string(), serde_json::json!(3_600_000u64));
    std::fs::write(
        conf_dir.path().join("elapsed-times.json"),
        serde_json::Value::Object(elapsed_times).to_string(),
    )
    .unwrap();

    let folders = SeedFolders::new(conf_dir.path());
    let configuration = Arc::new(AppConfiguration::load_from_dir(folders.conf_root()).unwrap());
    let container = Arc::new(AppContainer::initialize(&configuration, &folders));
    container.torrent_file_provider.init().unwrap();
    container.torrent_file_provider.scan();

    assert!(
        container.seed_time_registry.seeding_time_ms_for(&info_hash) >= 3_600_000,
        "the persisted hour must survive the restart"
    );
}
