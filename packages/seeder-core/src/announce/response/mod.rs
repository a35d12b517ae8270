//! The fixed handler chain every announce outcome runs through.
//!
//! Order matters and is wired once, in the orchestrator builder: bookkeeping
//! first, then swarm updates, then rescheduling, then orchestrator
//! notifications, then event publication.
pub mod client_notifier;
pub mod event_publisher;
pub mod peers_updater;
pub mod rescheduler;
pub mod tracker_updater;

use crate::announce::announcer::{AnnounceError, SuccessAnnounceResponse};
use crate::announce::request::AnnounceRequest;

/// One link of the chain. Handlers see every outcome; each overrides only the
/// hooks it cares about.
pub trait AnnounceResponseHandler: Send + Sync {
    fn on_will_announce(&self, _request: &AnnounceRequest) {}

    fn on_announce_success(&self, _request: &AnnounceRequest, _response: &SuccessAnnounceResponse) {}

    fn on_announce_failure(&self, _request: &AnnounceRequest, _error: &AnnounceError) {}
}

/// The chain itself: a fixed ordered sequence of handlers.
pub type AnnounceResponseChain = Vec<Box<dyn AnnounceResponseHandler>>;
