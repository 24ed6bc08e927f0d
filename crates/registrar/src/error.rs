use core::time::Duration;

/// A result type defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures reported by a [`CounterStore`] or [`RecordIndex`] backend.
///
/// Every variant except [`StoreError::Backend`] is transient: the retry
/// coordinator aborts the current attempt, backs off and tries again with a
/// fresh allocation.
///
/// [`CounterStore`]: crate::CounterStore
/// [`RecordIndex`]: crate::RecordIndex
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Another transaction holds or modified the counter document.
    #[error("write conflict on counter `{key}`")]
    Conflict { key: String },

    /// The attempt did not finish within its time budget.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// Connectivity blip or the store refused the request for now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Anything the backend considers permanent (bad document, overflowed
    /// counter, closed session).
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Backend(_))
    }
}

/// All errors `registrar` surfaces to callers.
///
/// A collision between a freshly formatted identifier and an existing record
/// is not an error: it is absorbed by the retry loop and only shows up as
/// [`Error::ExhaustedRetries`] if every attempt collides.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input to a codec, a scheme or a configuration value.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A store failure that was not retried (or cannot be).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Every attempt either collided or failed transiently. The transaction
    /// has been aborted and nothing was issued.
    #[error("failed to generate a unique identifier after {attempts} attempts{}", last_error(.last))]
    ExhaustedRetries {
        attempts: u32,
        last: Option<StoreError>,
    },

    /// The generator was cancelled before an attempt could start.
    #[error("identifier generation cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error is a transient store failure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(err) if err.is_transient())
    }
}

fn last_error(last: &Option<StoreError>) -> String {
    match last {
        Some(err) => format!(" (last error: {err})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_are_not_transient() {
        assert!(StoreError::Conflict { key: "k".into() }.is_transient());
        assert!(StoreError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(StoreError::Unavailable("down".into()).is_transient());
        assert!(!StoreError::Backend("corrupt".into()).is_transient());
    }

    #[test]
    fn exhausted_message_mentions_last_error() {
        let err = Error::ExhaustedRetries {
            attempts: 3,
            last: Some(StoreError::Conflict {
                key: "250314".into(),
            }),
        };
        assert_eq!(
            err.to_string(),
            "failed to generate a unique identifier after 3 attempts (last error: write conflict on counter `250314`)"
        );

        let err = Error::ExhaustedRetries {
            attempts: 3,
            last: None,
        };
        assert_eq!(
            err.to_string(),
            "failed to generate a unique identifier after 3 attempts"
        );
    }

    #[test]
    fn only_store_errors_classify_as_transient() {
        assert!(Error::from(StoreError::Unavailable("blip".into())).is_transient());
        assert!(!Error::invalid("bad").is_transient());
        assert!(!Error::Cancelled.is_transient());
    }
}
