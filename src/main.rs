use std::time::Duration;

use ghostseed_lib::app;

#[tokio::main]
async fn main() {
    let (_app_container, jobs) = app::run().await;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ghostseed shutting down ...");

            jobs.cancel();

            jobs.wait_for_all(Duration::from_secs(30)).await;

            tracing::info!("Ghostseed successfully shutdown.");
        }
    }
}
