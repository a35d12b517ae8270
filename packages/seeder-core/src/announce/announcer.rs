//! The per-torrent announcer: bookkeeping, tracker tiers and the wire call.
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_primitives::info_hash::InfoHash;
use serde::Deserialize;
use url::Url;

use crate::announce::data::AnnounceDataAccessor;
use crate::torrent::metainfo::SeededTorrent;

/// After this many consecutive failed announces the orchestrator is told to
/// give up on the torrent.
pub const TOO_MANY_FAILS_THRESHOLD: u32 = 5;

/// Interval assumed before a tracker ever told us one. Keeps the first retry
/// after a failed initial announce quick.
const INITIAL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum AnnounceError {
    #[error("announce to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("announce to {url} returned http status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("announce to {url} returned an invalid bencoded payload: {source}")]
    InvalidPayload {
        url: String,
        source: serde_bencode::Error,
    },

    #[error("tracker {url} rejected the announce: {reason}")]
    TrackerRejected { url: String, reason: String },

    #[error("announce to {url} response is missing the mandatory field `{field}`")]
    MissingField { url: String, field: &'static str },

    #[error("torrent {info_hash} has no tracker to announce to")]
    NoTrackerAvailable { info_hash: InfoHash },
}

/// What a tracker said when it accepted an announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessAnnounceResponse {
    pub interval: Duration,
    pub seeders: u32,
    pub leechers: u32,
}

#[derive(Deserialize)]
struct TrackerResponseModel {
    #[serde(rename = "failure reason")]
    failure_reason: Option<String>,
    interval: Option<i64>,
    #[serde(rename = "min interval")]
    min_interval: Option<i64>,
    complete: Option<i64>,
    incomplete: Option<i64>,
}

/// Tracker tiers per the multi-tracker extension (BEP 12): URLs are tried in
/// order; a working URL floats to the front of its tier and its tier to the
/// front of the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TrackerTiers {
    tiers: Vec<Vec<Url>>,
}

impl TrackerTiers {
    fn new(tiers: &[Vec<Url>]) -> Self {
        Self { tiers: tiers.to_vec() }
    }

    /// All URLs of one full announce pass, tier order first.
    fn announce_pass(&self) -> Vec<Url> {
        self.tiers.iter().flatten().cloned().collect()
    }

    /// Promotes a URL that worked.
    pub(crate) fn promote(&mut self, url: &Url) {
        let Some(tier_index) = self.tiers.iter().position(|tier| tier.contains(url)) else {
            return;
        };

        let mut tier = self.tiers.remove(tier_index);
        if let Some(url_index) = tier.iter().position(|candidate| candidate == url) {
            let url = tier.remove(url_index);
            tier.insert(0, url);
        }
        self.tiers.insert(0, tier);
    }
}

#[derive(Debug)]
struct AnnouncerState {
    consecutive_fails: u32,
    uploaded: u64,
    downloaded: u64,
    left: u64,
    last_known_interval: Duration,
    last_event: AnnounceEvent,
    tiers: TrackerTiers,
}

/// One announcer per actively seeded torrent.
pub struct Announcer {
    torrent: Arc<SeededTorrent>,
    upload_ratio_target: f64,
    data_accessor: Arc<AnnounceDataAccessor>,
    http_client: reqwest::Client,
    state: Mutex<AnnouncerState>,
}

impl Announcer {
    #[must_use]
    pub fn new(
        torrent: Arc<SeededTorrent>,
        upload_ratio_target: f64,
        data_accessor: Arc<AnnounceDataAccessor>,
        http_client: reqwest::Client,
    ) -> Self {
        let tiers = TrackerTiers::new(torrent.announce_tiers());

        Self {
            torrent,
            upload_ratio_target,
            data_accessor,
            http_client,
            state: Mutex::new(AnnouncerState {
                consecutive_fails: 0,
                uploaded: 0,
                downloaded: 0,
                left: 0,
                last_known_interval: INITIAL_INTERVAL,
                last_event: AnnounceEvent::Started,
                tiers,
            }),
        }
    }

    #[must_use]
    pub fn info_hash(&self) -> &InfoHash {
        self.torrent.info_hash()
    }

    #[must_use]
    pub fn torrent(&self) -> &Arc<SeededTorrent> {
        &self.torrent
    }

    #[must_use]
    pub fn consecutive_fails(&self) -> u32 {
        self.lock_state().consecutive_fails
    }

    #[must_use]
    pub fn uploaded(&self) -> u64 {
        self.lock_state().uploaded
    }

    #[must_use]
    pub fn downloaded(&self) -> u64 {
        self.lock_state().downloaded
    }

    #[must_use]
    pub fn left(&self) -> u64 {
        self.lock_state().left
    }

    #[must_use]
    pub fn last_known_interval(&self) -> Duration {
        self.lock_state().last_known_interval
    }

    #[must_use]
    pub fn last_event(&self) -> AnnounceEvent {
        self.lock_state().last_event
    }

    /// Folds the dispatcher's accumulated tally into the announcer's own
    /// bookkeeping. The tally only ever grows.
    pub fn sync_uploaded_to(&self, dispatcher_tally: u64) {
        let mut state = self.lock_state();
        if dispatcher_tally > state.uploaded {
            state.uploaded = dispatcher_tally;
        }
    }

    pub fn record_interval(&self, interval: Duration) {
        self.lock_state().last_known_interval = interval;
    }

    /// Whether the configured upload ratio has been met. Always false when
    /// the ratio target is disabled (negative).
    #[must_use]
    pub fn has_reached_upload_ratio_limit(&self) -> bool {
        if self.upload_ratio_target < 0.0 || self.torrent.size() == 0 {
            return false;
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = self.uploaded() as f64 / self.torrent.size() as f64;
        ratio >= self.upload_ratio_target
    }

    /// One announce pass: tries every tracker URL across the tiers until one
    /// accepts. Success promotes the URL and resets the failure counter; a
    /// full failed pass counts as one consecutive failure.
    ///
    /// # Errors
    ///
    /// Returns the last [`AnnounceError`] of the pass when no tracker
    /// accepted.
    pub async fn announce(&self, event: AnnounceEvent) -> Result<SuccessAnnounceResponse, AnnounceError> {
        let pass = {
            let mut state = self.lock_state();
            state.last_event = event;
            state.tiers.announce_pass()
        };

        let query = self.data_accessor.announce_query(self.info_hash(), event);

        let mut last_error = AnnounceError::NoTrackerAvailable {
            info_hash: *self.info_hash(),
        };

        for url in pass {
            match self.announce_to(&url, &query).await {
                Ok(response) => {
                    let mut state = self.lock_state();
                    state.tiers.promote(&url);
                    state.consecutive_fails = 0;
                    return Ok(response);
                }
                Err(error) => {
                    tracing::debug!("Announce attempt failed: {error}");
                    last_error = error;
                }
            }
        }

        self.lock_state().consecutive_fails += 1;
        Err(last_error)
    }

    async fn announce_to(&self, url: &Url, query: &str) -> Result<SuccessAnnounceResponse, AnnounceError> {
        let separator = if url.query().is_some() { '&' } else { '?' };
        let target = format!("{url}{separator}{query}");

        let mut request = self.http_client.get(&target);
        for header in self.data_accessor.request_headers() {
            request = request.header(header.name.as_str(), header.value.as_str());
        }

        let response = request.send().await.map_err(|source| AnnounceError::Transport {
            url: target.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnnounceError::HttpStatus {
                url: target,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|source| AnnounceError::Transport {
            url: target.clone(),
            source,
        })?;

        parse_tracker_response(&target, &body)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AnnouncerState> {
        self.state.lock().expect("the announcer state lock is poisoned")
    }
}

/// Builds announcers wired to the shared accessor and HTTP client.
pub struct AnnouncerFactory {
    data_accessor: Arc<AnnounceDataAccessor>,
    http_client: reqwest::Client,
    upload_ratio_target: f64,
}

impl AnnouncerFactory {
    #[must_use]
    pub fn new(data_accessor: Arc<AnnounceDataAccessor>, http_client: reqwest::Client, upload_ratio_target: f64) -> Self {
        Self {
            data_accessor,
            http_client,
            upload_ratio_target,
        }
    }

    #[must_use]
    pub fn create(&self, torrent: Arc<SeededTorrent>) -> Arc<Announcer> {
        Arc::new(Announcer::new(
            torrent,
            self.upload_ratio_target,
            self.data_accessor.clone(),
            self.http_client.clone(),
        ))
    }
}

fn parse_tracker_response(url: &str, body: &[u8]) -> Result<SuccessAnnounceResponse, AnnounceError> {
    let model: TrackerResponseModel = serde_bencode::from_bytes(body).map_err(|source| AnnounceError::InvalidPayload {
        url: url.to_string(),
        source,
    })?;

    if let Some(reason) = model.failure_reason {
        return Err(AnnounceError::TrackerRejected {
            url: url.to_string(),
            reason,
        });
    }

    let interval = read_field(url, "interval", model.interval)?;
    let seeders = read_field(url, "complete", model.complete)?;
    let leechers = read_field(url, "incomplete", model.incomplete)?;

    // Honor `min interval` by never announcing more often than it allows.
    let min_interval = model.min_interval.and_then(|value| u64::try_from(value).ok()).unwrap_or(0);

    Ok(SuccessAnnounceResponse {
        interval: Duration::from_secs(u64::from(interval).max(min_interval)),
        seeders,
        leechers,
    })
}

fn read_field(url: &str, field: &'static str, value: Option<i64>) -> Result<u32, AnnounceError> {
    let value = value.ok_or(AnnounceError::MissingField {
        url: url.to_string(),
        field,
    })?;

    u32::try_from(value).map_err(|_| AnnounceError::MissingField {
        url: url.to_string(),
        field,
    })
}
