use std::sync::{Arc, Weak};

use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_primitives::info_hash::InfoHash;

use crate::announce::announcer::{AnnounceError, Announcer, SuccessAnnounceResponse, TOO_MANY_FAILS_THRESHOLD};
use crate::announce::request::AnnounceRequest;
use crate::announce::response::AnnounceResponseHandler;

/// The narrow capability the handler chain needs from the orchestrator.
pub trait SeedingCallbacks: Send + Sync {
    fn on_no_more_peers(&self, info_hash: &InfoHash);
    fn on_upload_ratio_limit_reached(&self, info_hash: &InfoHash);
    fn on_torrent_has_stopped(&self, announcer: &Arc<Announcer>);
    fn on_too_many_failed_in_a_row(&self, announcer: &Arc<Announcer>);
}

/// Relays announce outcomes to the orchestrator.
///
/// Held as a weak capability: the orchestrator owns the executor that owns
/// this handler, so a strong reference would be a cycle.
pub struct ClientNotifier {
    callbacks: Weak<dyn SeedingCallbacks>,
}

impl ClientNotifier {
    #[must_use]
    pub fn new(callbacks: Weak<dyn SeedingCallbacks>) -> Self {
        Self { callbacks }
    }

    fn with_callbacks(&self, action: impl FnOnce(&dyn SeedingCallbacks)) {
        if let Some(callbacks) = self.callbacks.upgrade() {
            action(callbacks.as_ref());
        }
    }
}

impl AnnounceResponseHandler for ClientNotifier {
    fn on_announce_success(&self, request: &AnnounceRequest, response: &SuccessAnnounceResponse) {
        let announcer = request.announcer();

        match request.event() {
            AnnounceEvent::Started => {
                if response.seeders < 1 || response.leechers < 1 {
                    self.with_callbacks(|callbacks| callbacks.on_no_more_peers(announcer.info_hash()));
                }
            }
            AnnounceEvent::None | AnnounceEvent::Completed => {
                if response.seeders < 1 || response.leechers < 1 {
                    self.with_callbacks(|callbacks| callbacks.on_no_more_peers(announcer.info_hash()));
                    return;
                }
                if announcer.has_reached_upload_ratio_limit() {
                    self.with_callbacks(|callbacks| callbacks.on_upload_ratio_limit_reached(announcer.info_hash()));
                }
            }
            AnnounceEvent::Stopped => {
                tracing::debug!("Notifying the orchestrator that a torrent has stopped");
                self.with_callbacks(|callbacks| callbacks.on_torrent_has_stopped(announcer));
            }
        }
    }

    fn on_announce_failure(&self, request: &AnnounceRequest, _error: &AnnounceError) {
        // Signaled exactly once, when the failure budget is first exhausted.
        if request.announcer().consecutive_fails() == TOO_MANY_FAILS_THRESHOLD {
            tracing::debug!("Notifying the orchestrator that a torrent has failed too many times");
            self.with_callbacks(|callbacks| callbacks.on_too_many_failed_in_a_row(request.announcer()));
        }
    }
}
