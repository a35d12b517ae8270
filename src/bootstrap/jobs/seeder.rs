//! Job that runs the orchestrator for the whole session.
//!
//! The orchestrator's own stop sequencing (drain the queue, send the
//! `stopped` announces, wait for the executor) runs when the shared
//! cancellation token fires.
use std::sync::Arc;

use ghostseed_seeder_core::event::{self, Event};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::AppContainer;

#[must_use]
pub fn start_job(app_container: &Arc<AppContainer>, cancellation_token: CancellationToken) -> JoinHandle<()> {
    let client = app_container.client.clone();
    let event_sender = app_container.event_bus.sender();
    let emulated_client_name = app_container.emulated_client_name.clone();

    tokio::spawn(async move {
        client.start();
        event::publish(
            &event_sender,
            Event::GlobalSeedStarted {
                client: emulated_client_name,
            },
        );

        cancellation_token.cancelled().await;

        tracing::info!("Received cancellation request, stopping the seeding orchestrator.");
        client.stop().await;
        event::publish(&event_sender, Event::GlobalSeedStopped);
    })
}
