use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

use cg_mqtt_channel::SessionManager;

/// How long shutdown waits for the publisher to finish its current cycle.
pub const PUBLISHER_GRACE: Duration = Duration::from_secs(5);

/// Ordered, run-once teardown: stop the publisher, then close the session.
///
/// Safe to call from several triggers (signal handler, server exit); only
/// the first call does any work.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    publisher: Mutex<Option<JoinHandle<()>>>,
    session: Arc<SessionManager>,
    grace: Duration,
    fired: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(session: Arc<SessionManager>, token: CancellationToken) -> Self {
        Self {
            token,
            publisher: Mutex::new(None),
            session,
            grace: PUBLISHER_GRACE,
            fired: AtomicBool::new(false),
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Token the publisher loop watches.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Hand over the publisher task so shutdown can wait on it.
    pub fn track_publisher(&self, handle: JoinHandle<()>) {
        let mut slot = self.publisher.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(handle);
    }

    pub fn is_shut_down(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Run the teardown. Returns `false` if it had already run.
    pub async fn shutdown(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            tracing::debug!("shutdown already in progress");
            return false;
        }

        tracing::info!("shutting down");
        self.token.cancel();

        let publisher = self
            .publisher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(mut handle) = publisher {
            match time::timeout(self.grace, &mut handle).await {
                Ok(Ok(())) => tracing::info!("publisher stopped"),
                Ok(Err(e)) => tracing::warn!(error = %e, "publisher task ended abnormally"),
                Err(_) => {
                    tracing::warn!(
                        grace_secs = self.grace.as_secs_f64(),
                        "publisher did not stop in time, aborting"
                    );
                    handle.abort();
                }
            }
        }

        self.session.disconnect().await;
        tracing::info!("shutdown complete");
        true
    }
}
