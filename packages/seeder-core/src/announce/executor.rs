//! The bounded worker pool that performs the actual announces.
//!
//! Concurrency is capped by a semaphore and every spawned task is tracked so
//! shutdown can wait for the pool to drain. A torrent can never have two
//! announces in flight: a request for a torrent that is already running is
//! dropped (the delay queue guarantees the same for queued requests).
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use ghostseed_primitives::info_hash::InfoHash;
use tokio::sync::Semaphore;
use tokio_util::task::TaskTracker;

use crate::announce::request::AnnounceRequest;
use crate::announce::response::{AnnounceResponseChain, AnnounceResponseHandler};

/// Number of concurrent announce workers.
pub const EXECUTOR_POOL_SIZE: usize = 3;

/// Runs announce requests on a bounded pool and fans outcomes into the
/// handler chain.
pub struct AnnounceExecutor {
    handlers: Arc<AnnounceResponseChain>,
    semaphore: Arc<Semaphore>,
    task_tracker: TaskTracker,
    running: Arc<Mutex<HashSet<InfoHash>>>,
}

impl AnnounceExecutor {
    #[must_use]
    pub fn new(handlers: AnnounceResponseChain) -> Self {
        Self {
            handlers: Arc::new(handlers),
            semaphore: Arc::new(Semaphore::new(EXECUTOR_POOL_SIZE)),
            task_tracker: TaskTracker::new(),
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Accepts a request and returns immediately; the announce itself runs on
    /// the pool. A request for a torrent with an announce already in flight
    /// is discarded.
    pub fn execute(&self, request: AnnounceRequest) {
        let info_hash = *request.announcer().info_hash();

        {
            let mut running = self.running.lock().expect("the running set lock is poisoned");
            if !running.insert(info_hash) {
                tracing::warn!("Dropping announce for {info_hash}: another one is already in flight");
                return;
            }
        }

        let handlers = self.handlers.clone();
        let semaphore = self.semaphore.clone();
        let running = self.running.clone();

        self.task_tracker.spawn(async move {
            let permit = semaphore.acquire_owned().await;
            if permit.is_err() {
                running.lock().expect("the running set lock is poisoned").remove(&info_hash);
                return;
            }

            for handler in handlers.iter() {
                handler.on_will_announce(&request);
            }

            let outcome = request.announcer().announce(request.event()).await;

            match &outcome {
                Ok(response) => {
                    for handler in handlers.iter() {
                        handler.on_announce_success(&request, response);
                    }
                }
                Err(error) => {
                    for handler in handlers.iter() {
                        handler.on_announce_failure(&request, error);
                    }
                }
            }

            running.lock().expect("the running set lock is poisoned").remove(&info_hash);
        });
    }

    /// Blocks until every accepted request has run to completion. The
    /// executor accepts no deadline extensions after this returns; it is a
    /// shutdown-only call.
    pub async fn await_running_tasks(&self) {
        self.task_tracker.close();
        self.task_tracker.wait().await;
    }
}
