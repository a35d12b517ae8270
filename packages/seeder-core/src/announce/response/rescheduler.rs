use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ghostseed_primitives::announce_event::AnnounceEvent;

use crate::announce::announcer::{AnnounceError, SuccessAnnounceResponse, TOO_MANY_FAILS_THRESHOLD};
use crate::announce::delay_queue::DelayQueue;
use crate::announce::request::AnnounceRequest;
use crate::announce::response::AnnounceResponseHandler;

/// Retry back-off never exceeds five minutes.
const RETRY_BACKOFF_CAP: Duration = Duration::from_secs(300);

/// Schedules the follow-up request after every outcome.
///
/// Success re-queues a regular announce at the tracker's interval; failure
/// retries the same event with a capped back-off. Nothing is queued once the
/// orchestrator is shutting down or the torrent has burnt its failure budget.
pub struct ReScheduler {
    delay_queue: Arc<DelayQueue<AnnounceRequest>>,
    shutting_down: Arc<AtomicBool>,
}

impl ReScheduler {
    #[must_use]
    pub fn new(delay_queue: Arc<DelayQueue<AnnounceRequest>>, shutting_down: Arc<AtomicBool>) -> Self {
        Self {
            delay_queue,
            shutting_down,
        }
    }
}

impl AnnounceResponseHandler for ReScheduler {
    fn on_announce_success(&self, request: &AnnounceRequest, response: &SuccessAnnounceResponse) {
        if request.event() == AnnounceEvent::Stopped || self.shutting_down.load(Ordering::SeqCst) {
            return;
        }

        self.delay_queue
            .add_or_replace(AnnounceRequest::regular(request.announcer().clone()), response.interval);
    }

    fn on_announce_failure(&self, request: &AnnounceRequest, _error: &AnnounceError) {
        if self.shutting_down.load(Ordering::SeqCst) {
            return;
        }

        if request.announcer().consecutive_fails() >= TOO_MANY_FAILS_THRESHOLD {
            return;
        }

        let backoff = request.announcer().last_known_interval().min(RETRY_BACKOFF_CAP);
        self.delay_queue.add_or_replace(request.clone(), backoff);
    }
}
