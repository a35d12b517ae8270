use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::handler::handle_event;
use super::receiver::Receiver;
use crate::SEEDER_CORE_LOG_TARGET;

#[must_use]
pub fn run_event_listener(receiver: Receiver, cancellation_token: CancellationToken) -> JoinHandle<()> {
    tracing::info!(target: SEEDER_CORE_LOG_TARGET, "Starting seeding core event listener");

    tokio::spawn(async move {
        dispatch_events(receiver, cancellation_token).await;

        tracing::info!(target: SEEDER_CORE_LOG_TARGET, "Seeding core event listener finished");
    })
}

async fn dispatch_events(mut receiver: Receiver, cancellation_token: CancellationToken) {
    loop {
        tokio::select! {
            biased;

            () = cancellation_token.cancelled() => {
                tracing::info!(target: SEEDER_CORE_LOG_TARGET, "Received cancellation request, shutting down event listener.");
                break;
            }

            result = receiver.recv() => {
                match result {
                    Ok(event) => handle_event(event),
                    Err(e) => {
                        match e {
                            ghostseed_events::receiver::RecvError::Closed => {
                                tracing::info!(target: SEEDER_CORE_LOG_TARGET, "Event receiver closed");
                                break;
                            }
                            ghostseed_events::receiver::RecvError::Lagged(n) => {
                                tracing::warn!(target: SEEDER_CORE_LOG_TARGET, "Event receiver lagged by {} events", n);
                            }
                        }
                    }
                }
            }
        }
    }
}
