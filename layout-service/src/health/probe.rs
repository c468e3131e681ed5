//! Probe descriptors and the bounded context they run under

use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Outcome of a single probe execution
pub type ProbeResult = std::result::Result<(), ProbeError>;

/// Boxed future returned by a probe
pub type ProbeFuture = BoxFuture<'static, ProbeResult>;

type CheckFn = dyn Fn(ProbeContext) -> ProbeFuture + Send + Sync;

/// Failure reported by a probe
///
/// The message becomes the `reason` of the DOWN check verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProbeError {
    message: String,
}

impl ProbeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ProbeError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProbeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Bounded context handed to each probe
///
/// The deadline is the earlier of the per-probe timeout and the caller's own
/// deadline. The token is cancelled when the caller goes away.
#[derive(Debug, Clone)]
pub struct ProbeContext {
    cancel: CancellationToken,
    deadline: Instant,
}

impl ProbeContext {
    pub fn new(cancel: CancellationToken, deadline: Instant) -> Self {
        Self { cancel, deadline }
    }

    /// Context with a fresh token and a deadline `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(CancellationToken::new(), Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when the caller cancels the sweep
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// A named dependency check
///
/// Cloning is cheap; the check function is shared.
#[derive(Clone)]
pub struct Probe {
    name: String,
    check: Arc<CheckFn>,
}

impl Probe {
    /// Create a probe from an async check function
    ///
    /// ```rust
    /// use layout_service::health::{Probe, ProbeError};
    ///
    /// let probe = Probe::new("cache", |_ctx| async {
    ///     Err(ProbeError::new("ping failed"))
    /// });
    /// assert_eq!(probe.name(), "cache");
    /// ```
    pub fn new<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(ProbeContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProbeResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(move |ctx| check(ctx).boxed()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start one execution of the check
    pub fn run(&self, ctx: ProbeContext) -> ProbeFuture {
        (self.check)(ctx)
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Probe").field("name", &self.name).finish()
    }
}
