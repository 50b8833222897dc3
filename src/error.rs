//! Lifecycle error taxonomy.
//!
//! Configuration errors live in [`crate::config::loader`], record-level
//! errors in [`crate::service`] and per-request admin errors in
//! [`crate::admin::response`]. This module holds the errors of the
//! provision → start → stop sequence.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::lifecycle::state::LifecycleState;
use crate::service::ServiceError;

/// Failure while preparing the embedded service.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The data directory could not be created.
    #[error("not able to create data_dir {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No listener could be bound for the embedded server.
    #[error("not able to bind listen address {address}: {source}")]
    PortAllocation {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The embedded service refused to initialise.
    #[error("embedded service failed to bootstrap: {0}")]
    Bootstrap(#[source] ServiceError),

    /// `provision` was called on an instance that is not fresh.
    #[error("provision called in state {0}, instance is single-use")]
    AlreadyProvisioned(LifecycleState),
}

/// Failure launching the serve task.
#[derive(Debug, Error)]
pub enum StartError {
    #[error("start called before provision")]
    NotProvisioned,

    #[error("start called in state {0}, restart is not supported")]
    InvalidState(LifecycleState),
}

/// One of the failures that can happen while stopping.
#[derive(Debug, Error)]
pub enum StopFailure {
    #[error("stop called in state {0}")]
    NotRunning(LifecycleState),

    #[error("graceful shutdown did not finish within {0:?}")]
    Timeout(Duration),

    #[error("embedded server exited with error: {0}")]
    Task(#[source] io::Error),

    #[error("embedded server task panicked: {0}")]
    Panicked(String),

    #[error("termination hook failed: {0}")]
    Terminate(#[source] ServiceError),
}

/// Every failure observed during `stop`, in the order they happened.
#[derive(Debug)]
pub struct StopError {
    failures: Vec<StopFailure>,
}

impl StopError {
    /// Returns `Ok` when nothing failed.
    pub(crate) fn from_failures(failures: Vec<StopFailure>) -> Result<(), Self> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self { failures })
        }
    }

    pub fn failures(&self) -> &[StopFailure] {
        &self.failures
    }

    /// True when the graceful-shutdown deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f, StopFailure::Timeout(_)))
    }
}

impl fmt::Display for StopError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stop failed: ")?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for StopError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_failures_is_ok() {
        assert!(StopError::from_failures(Vec::new()).is_ok());
    }

    #[test]
    fn test_display_lists_every_failure() {
        let err = StopError::from_failures(vec![
            StopFailure::Timeout(Duration::from_secs(5)),
            StopFailure::Terminate(ServiceError::Storage("disk full".into())),
        ])
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("5s"), "{}", text);
        assert!(text.contains("disk full"), "{}", text);
        assert!(err.is_timeout());
        assert_eq!(err.failures().len(), 2);
    }
}
