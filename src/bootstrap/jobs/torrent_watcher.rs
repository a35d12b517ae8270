//! Job that polls the torrents directory for added, removed and modified
//! files.
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::AppContainer;

#[must_use]
pub fn start_job(app_container: &Arc<AppContainer>, cancellation_token: CancellationToken) -> JoinHandle<()> {
    ghostseed_seeder_core::torrent::watcher::start_job(
        app_container.torrent_file_provider.clone(),
        ghostseed_seeder_core::torrent::watcher::DEFAULT_SCAN_INTERVAL,
        cancellation_token,
    )
}
