//! Single-attempt invocation of inference calls.
//!
//! Inference calls against a rate-limited platform are made exactly once. A
//! failure is classified, logged, and handed back to the caller untouched; there
//! is no backoff and no second attempt. Successive calls from the same process
//! can additionally be spaced out with a [`RateGate`].

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::providers::{self, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum FailureClass {
    /// Quota exhausted or too many requests
    RateLimited,
    /// Missing, expired or insufficient credentials
    Authentication,
    Other,
}

impl FailureClass {
    /// Guidance to show the user for a failure of this class.
    pub(crate) fn remediation(&self) -> &'static str {
        match self {
            FailureClass::RateLimited => {
                "the platform is rate limiting requests; wait a minute before trying again"
            }
            FailureClass::Authentication => {
                "check the configured credentials and that the API is enabled for the project"
            }
            FailureClass::Other => "the request failed; try again later",
        }
    }
}

/// Errors that can be sorted into a [`FailureClass`].
pub(crate) trait Classify {
    fn failure_class(&self) -> FailureClass;
}

impl Classify for providers::Error {
    fn failure_class(&self) -> FailureClass {
        match self.kind() {
            ErrorKind::ExcessUsage => FailureClass::RateLimited,
            ErrorKind::Authentication | ErrorKind::PermissionDenied => FailureClass::Authentication,
            _ => FailureClass::Other,
        }
    }
}

/// Runs `call` once. Errors are logged by class and returned unchanged.
pub(crate) async fn invoke_once<F, Fut, R, E>(call: F) -> Result<R, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    E: Classify + Display,
{
    let result = call().await;

    if let Err(err) = &result {
        match err.failure_class() {
            FailureClass::RateLimited => {
                tracing::warn!(error = %err, "inference call was rate limited, not retrying")
            }
            FailureClass::Authentication => {
                tracing::error!(error = %err, "inference call was not authorized")
            }
            FailureClass::Other => tracing::error!(error = %err, "inference call failed"),
        }
    }

    result
}

/// Enforces a minimum spacing between successive calls.
pub(crate) struct RateGate {
    min_interval: Duration,
    last: Mutex<Option<Instant>>,
    clock: Arc<dyn Clock>,
}

impl RateGate {
    pub(crate) fn new(min_interval: Duration) -> RateGate {
        RateGate {
            min_interval,
            last: Mutex::new(None),
            clock: Arc::new(SystemClock),
        }
    }

    pub(crate) fn with_clock(mut self, clock: Arc<dyn Clock>) -> RateGate {
        self.clock = clock;
        self
    }

    /// Records a call and returns `Ok(())`, or returns how long the caller
    /// must still wait. A refused call is not recorded.
    pub(crate) fn check(&self) -> Result<(), Duration> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        let now = self.clock.now();

        if let Some(previous) = *last {
            let elapsed = now.saturating_duration_since(previous);

            if elapsed < self.min_interval {
                return Err(self.min_interval - elapsed);
            }
        }

        *last = Some(now);

        Ok(())
    }
}
