use crate::event::Event;
use crate::SEEDER_CORE_LOG_TARGET;

pub fn handle_event(event: Event) {
    match event {
        Event::TorrentFileAdded { info_hash, name } => {
            tracing::info!(target: SEEDER_CORE_LOG_TARGET, %info_hash, name, "Torrent file added");
        }
        Event::TorrentFileRemoved { info_hash, name } => {
            tracing::info!(target: SEEDER_CORE_LOG_TARGET, %info_hash, name, "Torrent file removed");
        }
        Event::FailedToAddTorrentFile { file_name, reason } => {
            tracing::warn!(target: SEEDER_CORE_LOG_TARGET, file_name, reason, "Failed to add torrent file");
        }
        Event::GlobalSeedStarted { client } => {
            tracing::info!(target: SEEDER_CORE_LOG_TARGET, client, "Global seeding started");
        }
        Event::GlobalSeedStopped => {
            tracing::info!(target: SEEDER_CORE_LOG_TARGET, "Global seeding stopped");
        }
        Event::SeedingSpeedsUpdated { speeds } => {
            tracing::debug!(target: SEEDER_CORE_LOG_TARGET, torrents = speeds.len(), "Seeding speeds updated");
        }
        Event::WillAnnounce { info_hash, event } => {
            tracing::debug!(target: SEEDER_CORE_LOG_TARGET, %info_hash, %event, "Will announce");
        }
        Event::SuccessfullyAnnounced {
            info_hash,
            event,
            interval,
            seeders,
            leechers,
        } => {
            tracing::info!(
                target: SEEDER_CORE_LOG_TARGET,
                %info_hash, %event, interval_secs = interval.as_secs(), seeders, leechers,
                "Successfully announced"
            );
        }
        Event::FailedToAnnounce { info_hash, event, reason } => {
            tracing::warn!(target: SEEDER_CORE_LOG_TARGET, %info_hash, %event, reason, "Failed to announce");
        }
        Event::HitAndRunWarning {
            info_hash,
            seeded,
            required,
        } => {
            tracing::warn!(
                target: SEEDER_CORE_LOG_TARGET,
                %info_hash,
                seeded_secs = seeded.as_secs(),
                required_secs = required.as_secs(),
                "Hit-and-run warning: keep this torrent seeding"
            );
        }
    }
}
