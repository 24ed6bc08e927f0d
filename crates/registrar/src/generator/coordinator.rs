use core::marker::PhantomData;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
#[cfg(feature = "tracing")]
use tracing::instrument;

use super::{AttemptOutcome, AttemptState, RetryConfig, RetryReason};
use crate::{
    Backend, CollisionGuard, Error, IdScheme, Result, SequenceAllocator, SleepProvider,
    StoreError, TimeSource, Transaction,
};

/// Issues identifiers of one [`IdScheme`] with bounded retries.
///
/// Every identifier gets up to [`RetryConfig::max_attempts`] attempts. An
/// attempt allocates the next sequence, formats it and checks the result
/// against the scheme's record field, all inside one store transaction:
///
/// - a clear identifier is committed and returned;
/// - a collision aborts the attempt and retries at once (the consumed
///   sequence is not reused);
/// - a transient store error aborts the attempt and retries after
///   `attempt * base_delay`;
/// - anything else aborts and is returned unchanged.
///
/// The store work of an attempt runs under
/// [`RetryConfig::attempt_timeout`]; running out of time counts as a
/// transient [`StoreError::Timeout`]. The cancellation token is checked
/// before every attempt.
///
/// `Sl` chooses how the coordinator sleeps and times out, e.g.
/// [`TokioSleep`](crate::TokioSleep) or [`SmolSleep`](crate::SmolSleep).
pub struct IdGenerator<B, S, C, Sl> {
    allocator: SequenceAllocator<B, S>,
    guard: CollisionGuard<B>,
    retry: RetryConfig,
    clock: C,
    cancel: CancellationToken,
    _sleep: PhantomData<fn() -> Sl>,
}

enum Candidate {
    Clear(String),
    Taken(String),
}

impl<B, S, C, Sl> IdGenerator<B, S, C, Sl>
where
    B: Backend,
    S: IdScheme,
    C: TimeSource,
    Sl: SleepProvider,
{
    pub fn new(store: Arc<B>, scheme: S, retry: RetryConfig, clock: C) -> Self {
        let guard = CollisionGuard::new(Arc::clone(&store), scheme.field());
        Self {
            allocator: SequenceAllocator::new(store, scheme),
            guard,
            retry,
            clock,
            cancel: CancellationToken::new(),
            _sleep: PhantomData,
        }
    }

    /// Replaces the cancellation token, e.g. with a child of a service-wide
    /// shutdown token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn scheme(&self) -> &S {
        self.allocator.scheme()
    }

    pub fn store(&self) -> &Arc<B> {
        self.allocator.store()
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Issues one identifier in its own transaction.
    ///
    /// # Errors
    ///
    /// - [`Error::ExhaustedRetries`] if every attempt collided or failed
    ///   transiently.
    /// - [`Error::Cancelled`] if the token was cancelled before an attempt.
    /// - Any non-transient error, unchanged.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub async fn generate_one(&self) -> Result<String> {
        self.generate(None).await
    }

    /// Issues one identifier inside a caller-owned transaction.
    ///
    /// Nothing is committed or aborted here; the caller decides what happens
    /// to `tx`. Retries reuse the same transaction.
    ///
    /// # Errors
    ///
    /// Same as [`IdGenerator::generate_one`].
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self, tx)))]
    pub async fn generate_in(&self, tx: &mut B::Tx) -> Result<String> {
        self.generate(Some(tx)).await
    }

    /// Issues `count` identifiers under one transaction, all or nothing.
    ///
    /// Each identifier has its own attempt budget. If any of them fails, the
    /// transaction is aborted and the error is returned without any
    /// identifiers. `count == 0` returns immediately without touching the
    /// store.
    ///
    /// # Errors
    ///
    /// The first error any identifier fails with, or the commit error.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub async fn generate_batch(&self, count: usize) -> Result<Vec<String>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut tx = self.store().begin().await?;
        let mut ids = Vec::with_capacity(count);
        for _index in 0..count {
            match self.generate_in(&mut tx).await {
                Ok(id) => ids.push(id),
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(index = _index, count, error = %err, "batch aborted");
                    if let Err(_e) = tx.abort().await {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Failed to abort batch transaction: {}", _e);
                    }
                    return Err(err);
                }
            }
        }
        tx.commit().await?;
        Ok(ids)
    }

    async fn generate(&self, mut tx: Option<&mut B::Tx>) -> Result<String> {
        let max_attempts = self.retry.max_attempts;
        let mut last = None;

        for attempt in 1..=max_attempts {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let outcome = match tx.as_deref_mut() {
                Some(tx) => self.attempt_in(tx).await,
                None => self.attempt_owned().await,
            };
            log_attempt(attempt, outcome.state());

            match outcome {
                AttemptOutcome::Committed(id) => {
                    log_issued(self.guard.field(), &id, attempt);
                    return Ok(id);
                }
                AttemptOutcome::AbortedRetry {
                    at,
                    reason: RetryReason::Collision(id),
                } => {
                    log_collision(self.guard.field(), &id, attempt, at);
                }
                AttemptOutcome::AbortedRetry {
                    at,
                    reason: RetryReason::Transient(err),
                } => {
                    log_transient(&err, attempt, at);
                    last = Some(err);
                    if attempt < max_attempts {
                        Sl::sleep_for(self.retry.backoff(attempt)).await;
                    }
                }
                AttemptOutcome::AbortedFatal { at, error } => {
                    log_fatal(&error, attempt, at);
                    return Err(error);
                }
            }
        }

        Err(Error::ExhaustedRetries {
            attempts: max_attempts,
            last,
        })
    }

    /// One attempt in a transaction of its own: committed when clear,
    /// aborted otherwise.
    async fn attempt_owned(&self) -> AttemptOutcome {
        let mut tx = match self.store().begin().await {
            Ok(tx) => tx,
            Err(err) => return AttemptOutcome::failed(AttemptState::Idle, err.into()),
        };

        let mut state = AttemptState::Idle;
        match self.bounded(&mut tx, &mut state).await {
            Ok(Candidate::Clear(id)) => match tx.commit().await {
                Ok(()) => AttemptOutcome::Committed(id),
                Err(err) => AttemptOutcome::failed(state, err.into()),
            },
            result => {
                if let Err(_e) = tx.abort().await {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Failed to abort attempt transaction: {}", _e);
                }
                settle(result, state)
            }
        }
    }

    /// One attempt inside a borrowed transaction, which stays open.
    async fn attempt_in(&self, tx: &mut B::Tx) -> AttemptOutcome {
        let mut state = AttemptState::Idle;
        let result = self.bounded(tx, &mut state).await;
        settle(result, state)
    }

    async fn bounded(&self, tx: &mut B::Tx, state: &mut AttemptState) -> Result<Candidate> {
        let limit = self.retry.attempt_timeout();
        match Sl::timeout(limit, self.candidate(tx, state)).await {
            Some(result) => result,
            None => Err(StoreError::Timeout(limit).into()),
        }
    }

    async fn candidate(&self, tx: &mut B::Tx, state: &mut AttemptState) -> Result<Candidate> {
        *state = AttemptState::Allocating;
        let allocation = self.allocator.allocate(tx, self.clock.now()).await?;

        *state = AttemptState::Formatted;
        let id = self.scheme().format(&allocation)?;

        *state = AttemptState::CollisionChecked;
        let taken = self.guard.check_exists(tx, &id).await?;
        Ok(if taken {
            Candidate::Taken(id)
        } else {
            Candidate::Clear(id)
        })
    }
}

fn settle(result: Result<Candidate>, at: AttemptState) -> AttemptOutcome {
    match result {
        Ok(Candidate::Clear(id)) => AttemptOutcome::Committed(id),
        Ok(Candidate::Taken(id)) => AttemptOutcome::AbortedRetry {
            at,
            reason: RetryReason::Collision(id),
        },
        Err(error) => AttemptOutcome::failed(at, error),
    }
}

#[cfg(feature = "tracing")]
fn log_attempt(attempt: u32, state: AttemptState) {
    tracing::trace!(attempt, ?state, "attempt finished");
}
#[cfg(not(feature = "tracing"))]
fn log_attempt(_attempt: u32, _state: AttemptState) {}

#[cfg(feature = "tracing")]
fn log_issued(field: &str, id: &str, attempt: u32) {
    tracing::info!(field, id, attempt, "identifier issued");
}
#[cfg(not(feature = "tracing"))]
fn log_issued(_field: &str, _id: &str, _attempt: u32) {}

#[cfg(feature = "tracing")]
fn log_collision(field: &str, id: &str, attempt: u32, at: AttemptState) {
    tracing::warn!(field, id, attempt, ?at, "identifier already taken, retrying");
}
#[cfg(not(feature = "tracing"))]
fn log_collision(_field: &str, _id: &str, _attempt: u32, _at: AttemptState) {}

#[cfg(feature = "tracing")]
fn log_transient(err: &StoreError, attempt: u32, at: AttemptState) {
    tracing::warn!(attempt, ?at, error = %err, "transient store error, retrying");
}
#[cfg(not(feature = "tracing"))]
fn log_transient(_err: &StoreError, _attempt: u32, _at: AttemptState) {}

#[cfg(feature = "tracing")]
fn log_fatal(err: &Error, attempt: u32, at: AttemptState) {
    tracing::error!(attempt, ?at, error = %err, "attempt failed");
}
#[cfg(not(feature = "tracing"))]
fn log_fatal(_err: &Error, _attempt: u32, _at: AttemptState) {}
