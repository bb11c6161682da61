//! Lifecycle trigger: collapses redundant host "leaving" signals into one
//! flush per logical leave.
//!
//! Hosts emit several independent signals for the same real transition
//! (focus loss, visibility change, teardown). The trigger is a small state
//! machine over active / hidden-but-resumable / leaving, guarded so that a
//! burst of redundant signals produces a single leave event. The guard is
//! rearmed asynchronously (next tick) by the driver so a later, genuinely
//! distinct leave is not suppressed; a resume signal clears it proactively.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// A host lifecycle transition fed in by the embedding.
///
/// A native embedding maps OS suspend/resume hooks onto these the same way
/// a browser embedding maps focus/visibility/unload events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// The host regained focus or became visible again.
    Resumed,
    /// The host lost focus or went hidden but may come back.
    Suspended,
    /// The host is being torn down; this is the last chance to send.
    Terminating,
}

/// A collapsed leave occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveEvent {
    /// Whether the host is expected to remain reachable after the signal.
    /// Terminal signals carry `false`; only those force an unconditional
    /// flush in the default wiring.
    pub accessible: bool,
}

/// Re-entrancy guard over leave-indicating signals.
#[derive(Default)]
pub struct LifecycleTrigger {
    leaving: AtomicBool,
}

impl LifecycleTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one signal through the trigger.
    ///
    /// Returns `Some(LeaveEvent)` for the first leave-indicating signal of a
    /// burst, `None` for collapsed repeats and resume signals.
    pub fn observe(&self, signal: LifecycleSignal) -> Option<LeaveEvent> {
        match signal {
            LifecycleSignal::Resumed => {
                self.leaving.store(false, Ordering::SeqCst);
                None
            }
            LifecycleSignal::Suspended | LifecycleSignal::Terminating => {
                if self.leaving.swap(true, Ordering::SeqCst) {
                    debug!(?signal, "Collapsed redundant leave signal");
                    return None;
                }
                Some(LeaveEvent {
                    accessible: signal == LifecycleSignal::Suspended,
                })
            }
        }
    }

    /// Clear the guard so the next leave signal is treated as distinct.
    /// Drivers call this on the tick after handling a leave event.
    pub fn rearm(&self) {
        self.leaving.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_leave_signal_fires() {
        let trigger = LifecycleTrigger::new();
        let leave = trigger.observe(LifecycleSignal::Terminating).unwrap();
        assert!(!leave.accessible);
    }

    #[test]
    fn suspended_is_accessible() {
        let trigger = LifecycleTrigger::new();
        let leave = trigger.observe(LifecycleSignal::Suspended).unwrap();
        assert!(leave.accessible);
    }

    #[test]
    fn redundant_signals_collapse() {
        let trigger = LifecycleTrigger::new();
        assert!(trigger.observe(LifecycleSignal::Suspended).is_some());
        // Focus loss and visibility change firing for the same real event.
        assert!(trigger.observe(LifecycleSignal::Suspended).is_none());
        assert!(trigger.observe(LifecycleSignal::Terminating).is_none());
    }

    #[test]
    fn rearm_allows_the_next_distinct_leave() {
        let trigger = LifecycleTrigger::new();
        assert!(trigger.observe(LifecycleSignal::Suspended).is_some());
        assert!(trigger.observe(LifecycleSignal::Suspended).is_none());
        trigger.rearm();
        assert!(trigger.observe(LifecycleSignal::Suspended).is_some());
    }

    #[test]
    fn resume_clears_the_guard_proactively() {
        let trigger = LifecycleTrigger::new();
        assert!(trigger.observe(LifecycleSignal::Suspended).is_some());
        trigger.observe(LifecycleSignal::Resumed);
        let leave = trigger.observe(LifecycleSignal::Terminating).unwrap();
        assert!(!leave.accessible);
    }

    #[test]
    fn resume_without_prior_leave_is_a_no_op() {
        let trigger = LifecycleTrigger::new();
        assert!(trigger.observe(LifecycleSignal::Resumed).is_none());
        assert!(trigger.observe(LifecycleSignal::Suspended).is_some());
    }
}
