//! Job that reviews hit-and-run compliance and persists seed times.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::AppContainer;

#[must_use]
pub fn start_job(app_container: &Arc<AppContainer>, cancellation_token: CancellationToken) -> JoinHandle<()> {
    ghostseed_seeder_core::hit_and_run::start_review_job(
        app_container.seed_time_registry.clone(),
        app_container.torrent_file_provider.clone(),
        Duration::from_millis(app_container.configuration.hit_and_run_check_interval_ms),
        cancellation_token,
    )
}
