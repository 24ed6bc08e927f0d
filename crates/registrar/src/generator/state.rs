use crate::{Error, StoreError};

/// Where a single generation attempt got to.
///
/// An attempt moves `Idle → Allocating → Formatted → CollisionChecked` and
/// ends in one of the three terminal states. When an attempt is aborted, the
/// outcome records the step that was in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptState {
    Idle,
    Allocating,
    Formatted,
    CollisionChecked,
    Committed,
    AbortedRetry,
    AbortedFatal,
}

impl AttemptState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Committed | Self::AbortedRetry | Self::AbortedFatal
        )
    }
}

/// Why an aborted attempt may be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RetryReason {
    /// The formatted identifier is already taken.
    Collision(String),
    Transient(StoreError),
}

/// How a single attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptOutcome {
    Committed(String),
    AbortedRetry {
        at: AttemptState,
        reason: RetryReason,
    },
    AbortedFatal {
        at: AttemptState,
        error: Error,
    },
}

impl AttemptOutcome {
    /// Classifies an error raised while `at` was in progress.
    pub(crate) fn failed(at: AttemptState, error: Error) -> Self {
        match error {
            Error::Store(err) if err.is_transient() => Self::AbortedRetry {
                at,
                reason: RetryReason::Transient(err),
            },
            error => Self::AbortedFatal { at, error },
        }
    }

    pub(crate) fn state(&self) -> AttemptState {
        match self {
            Self::Committed(_) => AttemptState::Committed,
            Self::AbortedRetry { .. } => AttemptState::AbortedRetry,
            Self::AbortedFatal { .. } => AttemptState::AbortedFatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_store_errors_are_retried() {
        let outcome = AttemptOutcome::failed(
            AttemptState::Allocating,
            StoreError::Conflict { key: "k".into() }.into(),
        );
        assert_eq!(outcome.state(), AttemptState::AbortedRetry);
        assert!(matches!(
            outcome,
            AttemptOutcome::AbortedRetry {
                at: AttemptState::Allocating,
                reason: RetryReason::Transient(StoreError::Conflict { .. }),
            }
        ));
    }

    #[test]
    fn everything_else_is_fatal() {
        for error in [
            Error::from(StoreError::Backend("corrupt".into())),
            Error::invalid("bad format"),
            Error::Cancelled,
        ] {
            let outcome = AttemptOutcome::failed(AttemptState::Formatted, error);
            assert_eq!(outcome.state(), AttemptState::AbortedFatal);
            assert!(outcome.state().is_terminal());
        }
        assert!(!AttemptState::CollisionChecked.is_terminal());
    }
}
