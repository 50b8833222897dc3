//! Readiness and termination hooks.
//!
//! The serve task publishes its handler exactly once into a [`ServeSlot`];
//! everything that forwards traffic reads from that slot, either polling with
//! [`ServeSlot::get`] or awaiting [`ServeSlot::wait`].

use arc_swap::ArcSwapOption;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Notify;

use super::{Service, ServiceError};

/// Hook run on the router right before the embedded server starts serving.
pub type ServeHook = Box<dyn Fn(Router, &ServeEvent) -> Router + Send + Sync>;

/// Hook run when the service is terminating.
pub type TerminateHook = Box<dyn Fn(&Service) -> Result<(), ServiceError> + Send + Sync>;

/// Details handed to serve hooks.
#[derive(Debug, Clone)]
pub struct ServeEvent {
    pub local_addr: SocketAddr,
}

/// Returned when a handler was already published.
#[derive(Debug, thiserror::Error)]
#[error("handler already published")]
pub struct AlreadyPublished;

/// Single-assignment slot for the embedded server's request handler.
#[derive(Default)]
pub struct ServeSlot {
    handler: ArcSwapOption<Router>,
    ready: Notify,
}

impl ServeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the handler and wake every waiter. Only the first call wins.
    pub fn publish(&self, router: Router) -> Result<(), AlreadyPublished> {
        let previous = self
            .handler
            .compare_and_swap(&None::<Arc<Router>>, Some(Arc::new(router)));
        if previous.is_some() {
            return Err(AlreadyPublished);
        }
        self.ready.notify_waiters();
        Ok(())
    }

    /// The published handler, if any.
    pub fn get(&self) -> Option<Router> {
        self.handler.load_full().map(|r| (*r).clone())
    }

    pub fn is_ready(&self) -> bool {
        self.handler.load().is_some()
    }

    /// Resolve once a handler has been published.
    pub async fn wait(&self) -> Router {
        loop {
            // Register before checking so a publish in between is not lost.
            let notified = self.ready.notified();
            if let Some(router) = self.get() {
                return router;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_publish_once() {
        let slot = ServeSlot::new();
        assert!(!slot.is_ready());
        assert!(slot.get().is_none());

        slot.publish(Router::new()).unwrap();
        assert!(slot.is_ready());
        assert!(slot.get().is_some());
        assert!(slot.publish(Router::new()).is_err());
    }

    #[tokio::test]
    async fn test_wait_resolves_after_publish() {
        let slot = Arc::new(ServeSlot::new());
        let waiter = {
            let slot = slot.clone();
            tokio::spawn(async move { slot.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        slot.publish(Router::new()).unwrap();
        let result = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(result.is_ok(), "waiter was not woken");
    }
}
