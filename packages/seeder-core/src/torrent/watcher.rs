//! Polls the watched directory on an interval and lets the provider diff it.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::torrent::provider::TorrentFileProvider;

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

#[must_use]
pub fn start_job(
    provider: Arc<TorrentFileProvider>,
    scan_interval: Duration,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        run_watcher(&provider, scan_interval, cancellation_token).await;
    })
}

async fn run_watcher(provider: &TorrentFileProvider, scan_interval: Duration, cancellation_token: CancellationToken) {
    let mut interval = tokio::time::interval(scan_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            () = cancellation_token.cancelled() => {
                tracing::info!("Received cancellation request, shutting down torrent file watcher.");
                break;
            }

            _ = interval.tick() => {
                provider.scan();
            }
        }
    }
}
