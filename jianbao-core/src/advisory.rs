//! Outcome type for best-effort side effects.
//!
//! Cache statistics and delayed notifications must never fail the write
//! that triggered them. `Advisory` carries what happened without offering a
//! conversion into `Result`, so it cannot be propagated with `?`.

use std::fmt;

use crate::AppraisalStatus;

/// Result of an advisory (non-authoritative) operation.
#[must_use = "advisory outcomes should be inspected or explicitly discarded"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory<T> {
    /// The side effect ran.
    Applied(T),
    /// The rules said there was nothing to do.
    Skipped(SkipReason),
    /// The backing service failed; the failure was logged and swallowed.
    Degraded { reason: String },
}

impl<T> Advisory<T> {
    pub fn degraded(reason: impl fmt::Display) -> Self {
        Advisory::Degraded {
            reason: reason.to_string(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Advisory::Applied(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Advisory::Skipped(_))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Advisory::Degraded { .. })
    }

    pub fn applied(&self) -> Option<&T> {
        match self {
            Advisory::Applied(value) => Some(value),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Advisory::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Advisory<U> {
        match self {
            Advisory::Applied(value) => Advisory::Applied(f(value)),
            Advisory::Skipped(reason) => Advisory::Skipped(reason),
            Advisory::Degraded { reason } => Advisory::Degraded { reason },
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Advisory::Applied(_) => "applied",
            Advisory::Skipped(reason) => reason.label(),
            Advisory::Degraded { .. } => "degraded",
        }
    }
}

/// Why an advisory operation decided not to act.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No previous status: the order was just created.
    Creation,
    /// Previous and new status are equal.
    Unchanged,
    /// Transition out of a terminal status; ignored.
    TerminalGuard {
        from: AppraisalStatus,
        to: AppraisalStatus,
    },
    /// Neither side of the transition is tracked.
    Untracked,
    /// The new status does not produce a notification.
    NotNotifiable,
    /// No phone number on file for the owner.
    NoRecipient,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Creation => "skipped_creation",
            SkipReason::Unchanged => "skipped_unchanged",
            SkipReason::TerminalGuard { .. } => "skipped_terminal",
            SkipReason::Untracked => "skipped_untracked",
            SkipReason::NotNotifiable => "skipped_not_notifiable",
            SkipReason::NoRecipient => "skipped_no_recipient",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_preserves_non_applied() {
        let skipped: Advisory<u32> = Advisory::Skipped(SkipReason::Unchanged);
        assert_eq!(skipped.map(|n| n + 1), Advisory::Skipped(SkipReason::Unchanged));

        let degraded: Advisory<u32> = Advisory::degraded("redis down");
        assert_eq!(
            degraded.map(|n| n + 1),
            Advisory::Degraded {
                reason: "redis down".to_string()
            }
        );

        assert_eq!(Advisory::Applied(1).map(|n| n + 1), Advisory::Applied(2));
    }

    #[test]
    fn test_labels() {
        assert_eq!(Advisory::Applied(()).label(), "applied");
        assert_eq!(Advisory::<()>::degraded("x").label(), "degraded");
        let guard = Advisory::<()>::Skipped(SkipReason::TerminalGuard {
            from: AppraisalStatus::Completed,
            to: AppraisalStatus::Pending,
        });
        assert_eq!(guard.label(), "skipped_terminal");
        assert!(guard.is_skipped());
    }
}
