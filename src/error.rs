use std::time::Duration;

use thiserror::Error;

/// A type-erased failure reported by a call itself.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure kinds delivered to a call's completion callback.
///
/// These are values, not faults: the [Funnel](crate::Funnel) never panics for
/// any of them.
#[derive(Debug, Error)]
pub enum Error {
    /// The backlog was already at its limit and the funnel is configured to
    /// refuse rather than queue. The call never ran.
    ///
    /// Delivered synchronously, from within [push](crate::Funnel::push_with).
    #[error("too much async call in queue")]
    Refused,

    /// The deadline elapsed before the call completed.
    ///
    /// The underlying work is not cancelled. If it later finishes with a
    /// failure, that failure surfaces as [Event::Outdated](crate::Event).
    #[error("{limit:?} timeout invoking `{label}`")]
    Timeout {
        /// The configured deadline.
        limit: Duration,
        /// Identity of the call, for diagnostics. See
        /// [AsyncCall::label](crate::AsyncCall::label).
        label: String,
    },

    /// The call itself reported a failure. Propagated as-is.
    #[error("call failed: {0}")]
    Call(BoxError),
}

impl From<BoxError> for Error {
    fn from(source: BoxError) -> Self {
        Error::Call(source)
    }
}

impl Error {
    /// Whether this is an admission refusal.
    pub fn is_refused(&self) -> bool {
        matches!(self, Error::Refused)
    }

    /// Whether this is a deadline failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
