//! Domain events published by the seeding core.
//!
//! One bus carries everything: torrent file churn, announce outcomes, speed
//! changes and hit-and-run warnings. Consumers subscribe through the
//! [`bus::EventBus`] aliases.
pub mod handler;
pub mod listener;

use std::collections::HashMap;
use std::time::Duration;

use ghostseed_primitives::announce_event::AnnounceEvent;
use ghostseed_primitives::info_hash::InfoHash;

use crate::bandwidth::Speed;

/// A seeding core event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    TorrentFileAdded {
        info_hash: InfoHash,
        name: String,
    },
    TorrentFileRemoved {
        info_hash: InfoHash,
        name: String,
    },
    FailedToAddTorrentFile {
        file_name: String,
        reason: String,
    },
    GlobalSeedStarted {
        client: String,
    },
    GlobalSeedStopped,
    SeedingSpeedsUpdated {
        speeds: HashMap<InfoHash, Speed>,
    },
    WillAnnounce {
        info_hash: InfoHash,
        event: AnnounceEvent,
    },
    SuccessfullyAnnounced {
        info_hash: InfoHash,
        event: AnnounceEvent,
        interval: Duration,
        seeders: u32,
        leechers: u32,
    },
    FailedToAnnounce {
        info_hash: InfoHash,
        event: AnnounceEvent,
        reason: String,
    },
    HitAndRunWarning {
        info_hash: InfoHash,
        seeded: Duration,
        required: Duration,
    },
}

pub mod sender {
    use std::sync::Arc;

    use super::Event;

    pub type Sender = Option<Arc<dyn ghostseed_events::sender::Sender<Event = Event>>>;
    pub type Broadcaster = ghostseed_events::broadcaster::Broadcaster<Event>;
}

pub mod receiver {
    use super::Event;

    pub type Receiver = Box<dyn ghostseed_events::receiver::Receiver<Event = Event>>;
}

pub mod bus {
    use crate::event::Event;

    pub type EventBus = ghostseed_events::bus::EventBus<Event>;
}

/// Sends an event when a sender is wired, drops it silently otherwise.
pub fn publish(sender: &sender::Sender, event: Event) {
    if let Some(sender) = sender {
        if let Err(e) = sender.send(event) {
            tracing::trace!("No event receiver is listening: {e}");
        }
    }
}
