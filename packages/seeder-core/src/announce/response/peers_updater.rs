use std::sync::Arc;

use ghostseed_primitives::announce_event::AnnounceEvent;

use crate::announce::announcer::SuccessAnnounceResponse;
use crate::announce::request::AnnounceRequest;
use crate::announce::response::AnnounceResponseHandler;
use crate::bandwidth::BandwidthDispatcher;

/// Keeps the bandwidth dispatcher's view of the swarms in step with the
/// tracker responses. Failures change nothing.
pub struct PeersUpdater {
    bandwidth_dispatcher: Arc<BandwidthDispatcher>,
}

impl PeersUpdater {
    #[must_use]
    pub fn new(bandwidth_dispatcher: Arc<BandwidthDispatcher>) -> Self {
        Self { bandwidth_dispatcher }
    }
}

impl AnnounceResponseHandler for PeersUpdater {
    fn on_announce_success(&self, request: &AnnounceRequest, response: &SuccessAnnounceResponse) {
        let info_hash = request.announcer().info_hash();

        match request.event() {
            AnnounceEvent::Started => {
                self.bandwidth_dispatcher.register_torrent(info_hash);
                self.bandwidth_dispatcher
                    .update_torrent_peers(info_hash, response.seeders, response.leechers);
            }
            AnnounceEvent::None | AnnounceEvent::Completed => {
                self.bandwidth_dispatcher
                    .update_torrent_peers(info_hash, response.seeders, response.leechers);
            }
            AnnounceEvent::Stopped => {
                self.bandwidth_dispatcher.unregister_torrent(info_hash);
            }
        }
    }
}
