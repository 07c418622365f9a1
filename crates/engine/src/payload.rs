//! Payload plumbing: the user function run under the lock
//!
//! A payload is a factory producing one future per holding epoch. The
//! locker spawns the future after publishing "locked" and hands it a
//! cancellation token that fires when the lock is lost or the run is
//! stopped; payloads observe the token at their suspension points and
//! wind down on their own.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// Failure carried out of a payload run.
///
/// Whether a cancelled payload counts as failed is the payload's own call:
/// returning `Ok` after observing the token is a normal finish, returning
/// `Err` makes retry-capable modes run it again.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// The payload reported a failure of its own
    #[error("{0}")]
    Failed(String),
    /// The payload task panicked
    #[error("payload panicked: {0}")]
    Panicked(String),
}

impl PayloadError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Boxed future produced by one payload invocation
pub type PayloadFuture = Pin<Box<dyn Future<Output = Result<(), PayloadError>> + Send>>;

/// Factory invoked once per holding epoch
pub type PayloadFn = Arc<dyn Fn(CancellationToken) -> PayloadFuture + Send + Sync>;

/// Wrap an async closure as a [`PayloadFn`].
pub fn payload_fn<F, Fut>(f: F) -> PayloadFn
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PayloadError>> + Send + 'static,
{
    Arc::new(move |token| Box::pin(f(token)))
}

/// Terminal state of one payload run, as seen after joining its task
#[derive(Debug)]
pub(crate) enum PayloadOutcome {
    /// Returned `Ok`, possibly after observing cancellation
    Finished,
    Failed(PayloadError),
    /// The task itself was torn down before producing a result
    Cancelled,
}

impl PayloadOutcome {
    pub(crate) fn from_join(joined: Result<Result<(), PayloadError>, JoinError>) -> Self {
        match joined {
            Ok(Ok(())) => Self::Finished,
            Ok(Err(error)) => Self::Failed(error),
            Err(join_error) if join_error.is_cancelled() => Self::Cancelled,
            Err(join_error) => Self::Failed(PayloadError::Panicked(join_error.to_string())),
        }
    }

    pub(crate) fn into_result(self) -> Result<(), PayloadError> {
        match self {
            Self::Failed(error) => Err(error),
            Self::Finished | Self::Cancelled => Ok(()),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}
