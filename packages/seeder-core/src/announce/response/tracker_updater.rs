use std::sync::Arc;

use crate::announce::announcer::SuccessAnnounceResponse;
use crate::announce::request::AnnounceRequest;
use crate::announce::response::AnnounceResponseHandler;
use crate::bandwidth::BandwidthDispatcher;

/// Folds the dispatcher's fabricated tally into the announcer and records the
/// tracker-supplied interval.
pub struct TrackerUpdater {
    bandwidth_dispatcher: Arc<BandwidthDispatcher>,
}

impl TrackerUpdater {
    #[must_use]
    pub fn new(bandwidth_dispatcher: Arc<BandwidthDispatcher>) -> Self {
        Self { bandwidth_dispatcher }
    }
}

impl AnnounceResponseHandler for TrackerUpdater {
    fn on_announce_success(&self, request: &AnnounceRequest, response: &SuccessAnnounceResponse) {
        let announcer = request.announcer();

        announcer.sync_uploaded_to(self.bandwidth_dispatcher.uploaded_bytes_for(announcer.info_hash()));
        announcer.record_interval(response.interval);
    }
}
