use crate::announce::announcer::{AnnounceError, SuccessAnnounceResponse};
use crate::announce::request::AnnounceRequest;
use crate::announce::response::AnnounceResponseHandler;
use crate::event::{self, Event};

/// Emits the announce domain events to the external bus.
pub struct AnnounceEventPublisher {
    event_sender: event::sender::Sender,
}

impl AnnounceEventPublisher {
    #[must_use]
    pub fn new(event_sender: event::sender::Sender) -> Self {
        Self { event_sender }
    }
}

impl AnnounceResponseHandler for AnnounceEventPublisher {
    fn on_will_announce(&self, request: &AnnounceRequest) {
        event::publish(
            &self.event_sender,
            Event::WillAnnounce {
                info_hash: *request.announcer().info_hash(),
                event: request.event(),
            },
        );
    }

    fn on_announce_success(&self, request: &AnnounceRequest, response: &SuccessAnnounceResponse) {
        event::publish(
            &self.event_sender,
            Event::SuccessfullyAnnounced {
                info_hash: *request.announcer().info_hash(),
                event: request.event(),
                interval: response.interval,
                seeders: response.seeders,
                leechers: response.leechers,
            },
        );
    }

    fn on_announce_failure(&self, request: &AnnounceRequest, error: &AnnounceError) {
        event::publish(
            &self.event_sender,
            Event::FailedToAnnounce {
                info_hash: *request.announcer().info_hash(),
                event: request.event(),
                reason: error.to_string(),
            },
        );
    }
}
