//! Session bootstrap: the one auth-state listener installed at startup.
//!
//! `install` subscribes to the backend's event stream and spawns a task
//! that forwards every change to the navigator. The returned
//! `AuthSubscription` owns that task; dropping it or calling `shutdown`
//! stops the listener.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::AuthBackend;
use crate::location::History;
use crate::navigator::Navigator;

/// Handle to a running auth-state listener.
pub struct AuthSubscription {
    task: Option<JoinHandle<()>>,
    handled: watch::Receiver<u64>,
}

/// Subscribe to `backend` and route every auth change through `navigator`.
///
/// Events emitted before this call are not seen.
pub fn install<H>(backend: &dyn AuthBackend, navigator: Arc<Navigator<H>>) -> AuthSubscription
where
    H: History + 'static,
{
    let mut events = backend.subscribe();
    let (handled_tx, handled) = watch::channel(0_u64);

    let task = tokio::spawn(async move {
        loop {
            let change = match events.recv().await {
                Ok(change) => change,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "auth listener lagged; continuing");
                    handled_tx.send_modify(|count| *count += skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("auth event stream closed");
                    break;
                }
            };

            debug!(event = %change.event, "auth state change received");
            if let Err(e) = navigator.handle_auth_change(&change).await {
                warn!(event = %change.event, error = %e, "navigation after auth change failed");
            }
            handled_tx.send_modify(|count| *count += 1);
        }
    });

    info!("auth listener installed");
    AuthSubscription { task: Some(task), handled }
}

impl AuthSubscription {
    /// Number of events fully handled so far.
    #[must_use]
    pub fn handled(&self) -> u64 {
        *self.handled.borrow()
    }

    /// Wait until at least `count` events have been handled.
    ///
    /// Returns `false` if the listener stopped first.
    pub async fn wait_for(&self, count: u64) -> bool {
        let mut handled = self.handled.clone();
        handled.wait_for(|n| *n >= count).await.is_ok()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the listener and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            // Cancellation is the expected outcome.
            let _ = task.await;
            info!("auth listener stopped");
        }
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "bootstrap_test.rs"]
mod tests;
