//! Job that keeps the public IP reported to trackers fresh.
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::AppContainer;

#[must_use]
pub fn start_job(app_container: &Arc<AppContainer>, cancellation_token: CancellationToken) -> JoinHandle<()> {
    ghostseed_seeder_core::connection::start_ip_refresh_job(app_container.connection_probe.clone(), cancellation_token)
}
