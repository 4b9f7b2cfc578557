use std::time::Duration;

/// Policy configuration for a [Funnel](crate::Funnel).
///
/// Immutable once the funnel is constructed.
#[derive(Debug, Clone)]
pub struct Config {
    pub(crate) disabled: bool,
    pub(crate) refuse: bool,
    pub(crate) ratio: f64,
    pub(crate) timeout: Option<Duration>,
    pub(crate) clear_on_error: bool,
}

impl Default for Config {
    /// No policies enabled: unlimited queueing, no deadline, backlog limit
    /// equal to the capacity.
    fn default() -> Self {
        Self {
            disabled: false,
            refuse: false,
            ratio: 1.0,
            timeout: None,
            clear_on_error: false,
        }
    }
}

impl Config {
    /// Disable limiting entirely: every call is dispatched immediately,
    /// bypassing the backlog and the in-flight counter.
    ///
    /// Useful in tests.
    pub fn disabled(self, disabled: bool) -> Self {
        Self { disabled, ..self }
    }

    /// Refuse new calls with [Error::Refused](crate::Error) once the backlog
    /// reaches its limit, instead of queueing without bound.
    pub fn refuse_when_full(self, refuse: bool) -> Self {
        Self { refuse, ..self }
    }

    /// Multiplier applied to the capacity to derive the admissible backlog
    /// length before [refuse_when_full](Self::refuse_when_full) kicks in.
    ///
    /// Must be positive.
    pub fn queue_capacity_ratio(self, ratio: f64) -> Self {
        assert!(ratio > 0.0, "queue capacity ratio must be positive");
        Self { ratio, ..self }
    }

    /// Deadline on waiting for a call's completion.
    ///
    /// A call that misses its deadline resolves the caller with
    /// [Error::Timeout](crate::Error) and releases its slot. The underlying
    /// work is not cancelled.
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..self
        }
    }

    /// Drop the whole backlog whenever a completed or timed-out call reports
    /// failure.
    ///
    /// Queued-but-not-yet-started calls are abandoned silently: their
    /// completion callbacks never fire. Already-running calls are unaffected.
    pub fn clear_on_error(self, clear: bool) -> Self {
        Self {
            clear_on_error: clear,
            ..self
        }
    }
}
