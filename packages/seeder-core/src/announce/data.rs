//! Builds the wire-level data for a single tracker announce.
use std::sync::Arc;

use ghostseed_emulated_client::{AnnounceQuery, EmulatedClient, Header};
use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_primitives::info_hash::InfoHash;

use crate::bandwidth::BandwidthDispatcher;
use crate::connection::ConnectionProbe;

/// Glues the emulated client template to the live state it reports: the
/// dispatcher's fabricated tallies and the probe's ip/port.
///
/// A seed emulator always claims a finished download: `downloaded` and `left`
/// are reported as zero.
pub struct AnnounceDataAccessor {
    emulated_client: EmulatedClient,
    bandwidth_dispatcher: Arc<BandwidthDispatcher>,
    connection_probe: Arc<ConnectionProbe>,
}

impl AnnounceDataAccessor {
    #[must_use]
    pub fn new(
        emulated_client: EmulatedClient,
        bandwidth_dispatcher: Arc<BandwidthDispatcher>,
        connection_probe: Arc<ConnectionProbe>,
    ) -> Self {
        Self {
            emulated_client,
            bandwidth_dispatcher,
            connection_probe,
        }
    }

    /// The expanded query string for one announce.
    #[must_use]
    pub fn announce_query(&self, info_hash: &InfoHash, event: AnnounceEvent) -> String {
        self.emulated_client.announce_query(&AnnounceQuery {
            info_hash: *info_hash,
            uploaded: self.bandwidth_dispatcher.uploaded_bytes_for(info_hash),
            downloaded: 0,
            left: 0,
            event,
            ip: self.connection_probe.reported_ip(),
            port: self.connection_probe.port(),
        })
    }

    /// The fingerprint headers for every announce request.
    #[must_use]
    pub fn request_headers(&self) -> &[Header] {
        self.emulated_client.request_headers()
    }

    /// The emulated client's User-Agent, for logs and events.
    #[must_use]
    pub fn emulated_client_name(&self) -> String {
        self.emulated_client.user_agent().unwrap_or("unknown").to_string()
    }
}
