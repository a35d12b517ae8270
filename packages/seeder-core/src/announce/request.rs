use std::sync::Arc;

use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_primitives::info_hash::InfoHash;

use crate::announce::announcer::Announcer;
use crate::announce::delay_queue::InfoHashKeyed;

/// An immutable order for one announce: which announcer, which event.
///
/// The scheduled time lives in the delay queue entry, not here.
#[derive(Clone)]
pub struct AnnounceRequest {
    announcer: Arc<Announcer>,
    event: AnnounceEvent,
}

impl AnnounceRequest {
    #[must_use]
    pub fn start(announcer: Arc<Announcer>) -> Self {
        Self {
            announcer,
            event: AnnounceEvent::Started,
        }
    }

    #[must_use]
    pub fn regular(announcer: Arc<Announcer>) -> Self {
        Self {
            announcer,
            event: AnnounceEvent::None,
        }
    }

    #[must_use]
    pub fn stop(announcer: Arc<Announcer>) -> Self {
        Self {
            announcer,
            event: AnnounceEvent::Stopped,
        }
    }

    /// The same announcer, re-ordered to announce `stopped`.
    #[must_use]
    pub fn into_stop(self) -> Self {
        Self {
            announcer: self.announcer,
            event: AnnounceEvent::Stopped,
        }
    }

    #[must_use]
    pub fn announcer(&self) -> &Arc<Announcer> {
        &self.announcer
    }

    #[must_use]
    pub fn event(&self) -> AnnounceEvent {
        self.event
    }
}

impl InfoHashKeyed for AnnounceRequest {
    fn info_hash(&self) -> InfoHash {
        *self.announcer.info_hash()
    }
}
