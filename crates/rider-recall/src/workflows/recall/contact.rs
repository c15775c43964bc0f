//! Bounded-concurrency outreach against selected candidates.
//!
//! Every candidate is attempted in its own task so a failing or panicking channel call only
//! affects that candidate. The executor owns concurrency and deadlines; whether a rider
//! picks up or agrees is entirely the channel's business.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::config::ContactSettings;
use super::domain::{ContactOutcome, ContactReason, ScoredCandidate, WorkerId};

/// Outbound channel (telephony, push, SMS) that performs one attempt per call.
#[async_trait]
pub trait ContactChannel: Send + Sync {
    async fn attempt(&self, candidate: &ScoredCandidate) -> Result<ContactOutcome, ContactError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContactError {
    #[error("contact channel unavailable: {0}")]
    Unavailable(String),
    #[error("channel answered for {returned} while contacting {expected}")]
    MismatchedWorker {
        expected: WorkerId,
        returned: WorkerId,
    },
    #[error("outcome for {0} reports agreement without a connection")]
    AgreedWithoutConnection(WorkerId),
}

/// Cooperative cancellation shared between the orchestrator and in-flight attempts.
#[derive(Debug, Clone)]
pub struct CancellationFlag {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancellationFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationFlag {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return std::future::pending().await;
            }
        }
    }
}

pub struct ContactExecutor<C: ?Sized> {
    channel: Arc<C>,
    settings: ContactSettings,
}

impl<C> ContactExecutor<C>
where
    C: ContactChannel + ?Sized + 'static,
{
    pub fn new(channel: Arc<C>, settings: ContactSettings) -> Self {
        Self { channel, settings }
    }

    /// Attempts every candidate once, returning outcomes aligned with the input order.
    ///
    /// Attempts still waiting for a slot or in flight when `cancel` fires resolve to
    /// [`ContactReason::Cancelled`]; finished attempts keep their outcome. Dropping the
    /// returned future aborts every attempt that has not finished.
    pub async fn execute(
        &self,
        candidates: &[ScoredCandidate],
        cancel: &CancellationFlag,
    ) -> Vec<ContactOutcome> {
        let permits = Arc::new(Semaphore::new(self.settings.concurrency_limit.max(1)));
        let attempt_timeout = self.settings.attempt_timeout;

        let attempts = candidates.iter().cloned().map(|candidate| {
            let worker_id = candidate.worker.worker_id.clone();
            let channel = Arc::clone(&self.channel);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();

            let mut attempt = AbortOnDrop(tokio::spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return ContactOutcome::not_connected(
                            candidate.worker.worker_id.clone(),
                            ContactReason::Cancelled,
                        );
                    }
                    permit = permits.acquire_owned() => permit,
                };
                attempt_once(channel.as_ref(), &candidate, attempt_timeout, &cancel).await
            }));

            async move {
                match (&mut attempt.0).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        warn!(worker_id = %worker_id, error = %err, "contact attempt aborted");
                        ContactOutcome::not_connected(worker_id, ContactReason::ChannelError)
                    }
                }
            }
        });

        // join_all yields in input order regardless of completion order.
        join_all(attempts).await
    }
}

/// Aborts the attempt task when the batch awaiting it goes away.
struct AbortOnDrop(JoinHandle<ContactOutcome>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn attempt_once<C>(
    channel: &C,
    candidate: &ScoredCandidate,
    attempt_timeout: Duration,
    cancel: &CancellationFlag,
) -> ContactOutcome
where
    C: ContactChannel + ?Sized,
{
    let worker_id = &candidate.worker.worker_id;

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!(worker_id = %worker_id, "contact attempt cancelled");
            ContactOutcome::not_connected(worker_id.clone(), ContactReason::Cancelled)
        }
        result = tokio::time::timeout(attempt_timeout, channel.attempt(candidate)) => {
            match result {
                Err(_) => {
                    warn!(
                        worker_id = %worker_id,
                        timeout_ms = attempt_timeout.as_millis() as u64,
                        "contact attempt timed out"
                    );
                    ContactOutcome::not_connected(worker_id.clone(), ContactReason::Timeout)
                }
                Ok(Err(err)) => {
                    warn!(worker_id = %worker_id, error = %err, "contact attempt failed");
                    ContactOutcome::not_connected(worker_id.clone(), ContactReason::ChannelError)
                }
                Ok(Ok(outcome)) => match checked_outcome(worker_id, outcome) {
                    Ok(outcome) => {
                        debug!(worker_id = %worker_id, reason = outcome.reason.label(), "contact attempt finished");
                        outcome
                    }
                    Err(err) => {
                        warn!(worker_id = %worker_id, error = %err, "contact channel returned a malformed outcome");
                        ContactOutcome::not_connected(worker_id.clone(), ContactReason::ChannelError)
                    }
                },
            }
        }
    }
}

fn checked_outcome(
    expected: &WorkerId,
    outcome: ContactOutcome,
) -> Result<ContactOutcome, ContactError> {
    if &outcome.worker_id != expected {
        return Err(ContactError::MismatchedWorker {
            expected: expected.clone(),
            returned: outcome.worker_id,
        });
    }
    if outcome.agreed && !outcome.connected {
        return Err(ContactError::AgreedWithoutConnection(outcome.worker_id));
    }
    Ok(outcome)
}
