//! Ghostseed application.
//!
//! The application is a container of background jobs around one seeding
//! orchestrator:
//!
//! - the seeder job: starts the orchestrator and runs its shutdown sequence
//!   on cancellation;
//! - the bandwidth dispatcher tick loop;
//! - the torrent directory watcher;
//! - the hit-and-run review loop;
//! - the public-IP refresh loop;
//! - the event listener that turns domain events into logs.
use std::sync::Arc;

use ghostseed_configuration::AppConfiguration;
use tracing::instrument;

use crate::bootstrap::jobs::manager::JobManager;
use crate::bootstrap::jobs::{bandwidth_dispatcher, event_listener, hit_and_run, ip_refresher, seeder, torrent_watcher};
use crate::bootstrap::{self};
use crate::container::AppContainer;

pub async fn run() -> (Arc<AppContainer>, JobManager) {
    let (configuration, app_container) = bootstrap::app::setup();

    let jobs = start(&configuration, &app_container).await;

    (app_container, jobs)
}

/// Starts the application.
///
/// # Panics
///
/// Will panic if:
///
/// - No listening port is free for the emulated client.
/// - The torrents archive folder cannot be prepared.
#[instrument(skip(configuration, app_container))]
pub async fn start(configuration: &Arc<AppConfiguration>, app_container: &Arc<AppContainer>) -> JobManager {
    app_container
        .connection_probe
        .start()
        .await
        .expect("no listening port is available for the emulated client");

    app_container
        .torrent_file_provider
        .init()
        .expect("the torrents archive folder could not be prepared");

    // Known torrents must be in place before the orchestrator picks its
    // initial active set.
    app_container.torrent_file_provider.scan();

    warn_if_nothing_to_seed(app_container);

    tracing::info!(
        "Seeding as {} with {} torrent file(s)",
        app_container.emulated_client_name,
        app_container.torrent_file_provider.torrent_count()
    );

    start_jobs(configuration, app_container)
}

fn start_jobs(_configuration: &Arc<AppConfiguration>, app_container: &Arc<AppContainer>) -> JobManager {
    let mut job_manager = JobManager::new();

    job_manager.push(
        "event_listener",
        event_listener::start_job(app_container, job_manager.new_cancellation_token()),
    );
    job_manager.push(
        "bandwidth_dispatcher",
        bandwidth_dispatcher::start_job(app_container, job_manager.new_cancellation_token()),
    );
    job_manager.push(
        "seeder",
        seeder::start_job(app_container, job_manager.new_cancellation_token()),
    );
    job_manager.push(
        "torrent_watcher",
        torrent_watcher::start_job(app_container, job_manager.new_cancellation_token()),
    );
    job_manager.push(
        "hit_and_run_review",
        hit_and_run::start_job(app_container, job_manager.new_cancellation_token()),
    );
    job_manager.push(
        "ip_refresher",
        ip_refresher::start_job(app_container, job_manager.new_cancellation_token()),
    );

    job_manager
}

fn warn_if_nothing_to_seed(app_container: &Arc<AppContainer>) {
    if app_container.torrent_file_provider.torrent_count() == 0 {
        tracing::warn!("No torrent files found yet; drop .torrent files into the watched directory to start seeding");
    }
}
