//! Job that runs the bandwidth dispatcher tick loop.
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::AppContainer;

#[must_use]
pub fn start_job(app_container: &Arc<AppContainer>, cancellation_token: CancellationToken) -> JoinHandle<()> {
    ghostseed_seeder_core::bandwidth::start_job(app_container.bandwidth_dispatcher.clone(), cancellation_token)
}
