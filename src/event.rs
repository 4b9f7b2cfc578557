use std::sync::Arc;

use crate::Error;

/// Side-channel notifications published by a [Funnel](crate::Funnel).
///
/// Delivered to every live subscriber. See
/// [Funnel::subscribe](crate::Funnel::subscribe).
#[derive(Debug, Clone)]
pub enum Event {
    /// Work is backing up: an admission left more than one call queued.
    ///
    /// This signals pressure, not overflow. Calls are still being admitted.
    Saturated {
        /// Backlog length at the time of admission.
        queued: usize,
    },

    /// A call failed after its deadline had already resolved the caller.
    ///
    /// There is no completion callback left to deliver the failure to, so it
    /// is surfaced here instead of being silently dropped. A late *success*
    /// is dropped without an event.
    Outdated(Arc<Error>),
}
