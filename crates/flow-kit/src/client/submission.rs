//! Submitting envelopes and polling them to a terminal status.

use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, RestError};
use crate::types::{Network, SignedEnvelope, Submission};

use super::config::PollConfig;
use super::rest::RestClient;

/// POST a signed envelope and check the id the node assigns.
///
/// A 400 whose message mentions an expired reference block becomes
/// [`Error::Expired`]; one that mentions an invalid signature becomes
/// [`Error::SignatureInvalid`].
pub(crate) async fn submit_envelope(
    rest: &RestClient,
    envelope: &SignedEnvelope,
    network: Network,
) -> Result<Submission, Error> {
    let local_id = envelope.transaction_id();
    tracing::debug!(transaction_id = %local_id, %network, "Submitting transaction");

    let server_id = match rest.send_transaction(&envelope.to_request()).await {
        Ok(id) => id,
        Err(RestError::Rejected { message, .. }) if mentions_expiry(&message) => {
            return Err(Error::Expired {
                transaction_id: None,
                message,
                explorer_url: None,
            });
        }
        Err(RestError::Rejected { message, .. }) if mentions_bad_signature(&message) => {
            return Err(Error::SignatureInvalid {
                transaction_id: local_id,
                message,
            });
        }
        Err(e) => return Err(e.into()),
    };

    if server_id != local_id {
        return Err(Error::Protocol(format!(
            "node assigned transaction id {server_id}, but the envelope hashes to {local_id}"
        )));
    }
    Ok(Submission::new(local_id, network))
}

fn mentions_expiry(message: &str) -> bool {
    message.to_ascii_lowercase().contains("expired")
}

fn mentions_bad_signature(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("signature")
        && (message.contains("invalid") || message.contains("verif"))
}

/// `now + after`, saturating about thirty years out instead of overflowing.
pub(crate) fn instant_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .unwrap_or_else(|| now + Duration::from_secs(30 * 365 * 86_400))
}

/// Poll the result endpoint until the submission is terminal.
///
/// Waits `poll.initial_interval()` before the first poll and doubles the
/// wait up to the cap. A 404 means the node has not indexed the transaction
/// yet; it and transient failures keep the loop going. Any other failure
/// ends it with [`Error::Poll`].
pub(crate) async fn poll_until_terminal(
    rest: &RestClient,
    submission: &mut Submission,
    poll: &PollConfig,
    deadline: Instant,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    let id = submission.transaction_id;
    let mut interval = poll.initial_interval();

    while !submission.is_terminal() {
        let wake = std::cmp::min(instant_after(interval), deadline);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(submission)),
            _ = tokio::time::sleep_until(wake) => {}
        }
        if Instant::now() >= deadline {
            return Err(timed_out(submission));
        }

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(submission)),
            result = tokio::time::timeout_at(deadline, rest.transaction_result(&id)) => match result {
                Ok(result) => result,
                Err(_) => return Err(timed_out(submission)),
            },
        };

        match result {
            Ok(result) => {
                let previous = submission.status;
                if submission.observe(&result) {
                    tracing::debug!(
                        transaction_id = %id,
                        from = %previous,
                        to = %submission.status,
                        "Transaction status changed"
                    );
                }
            }
            Err(RestError::NotFound(_)) => {
                tracing::trace!(transaction_id = %id, "Result not available yet");
            }
            Err(e) if e.is_retryable() => {
                tracing::debug!(transaction_id = %id, error = %e, "Transient poll failure");
            }
            Err(source) => {
                return Err(Error::Poll {
                    transaction_id: id,
                    explorer_url: submission.explorer_url.clone(),
                    source,
                });
            }
        }
        interval = poll.next_interval(interval);
    }
    Ok(())
}

/// Poll once. Returns whether the submission changed; terminal submissions
/// are left alone.
pub(crate) async fn refresh_once(
    rest: &RestClient,
    submission: &mut Submission,
) -> Result<bool, Error> {
    if submission.is_terminal() {
        return Ok(false);
    }
    match rest.transaction_result(&submission.transaction_id).await {
        Ok(result) => Ok(submission.observe(&result)),
        Err(RestError::NotFound(_)) => Ok(false),
        Err(source) => Err(Error::Poll {
            transaction_id: submission.transaction_id,
            explorer_url: submission.explorer_url.clone(),
            source,
        }),
    }
}

fn cancelled(submission: &Submission) -> Error {
    Error::Cancelled {
        transaction_id: Some(submission.transaction_id),
        explorer_url: Some(submission.explorer_url.clone()),
    }
}

fn timed_out(submission: &Submission) -> Error {
    Error::Timeout {
        transaction_id: Some(submission.transaction_id),
        last_status: Some(submission.status),
        explorer_url: Some(submission.explorer_url.clone()),
    }
}

// ============================================================================
// SealWait
// ============================================================================

/// Wait for an already submitted transaction to reach a terminal status.
///
/// Resolves to the sealed [`Submission`]; expiry and execution failures
/// resolve to [`Error::Expired`] and [`Error::Execution`].
///
/// # Example
///
/// ```rust,no_run
/// # use flow_kit::*;
/// # use std::time::Duration;
/// # async fn example(flow: Flow, id: Identifier) -> Result<(), flow_kit::Error> {
/// let sealed = flow.wait(id).deadline(Duration::from_secs(120)).await?;
/// println!("{} events", sealed.events.len());
/// # Ok(())
/// # }
/// ```
pub struct SealWait {
    rest: Arc<RestClient>,
    submission: Submission,
    poll: PollConfig,
    deadline: Duration,
    cancel: CancellationToken,
}

impl SealWait {
    pub(crate) fn new(
        rest: Arc<RestClient>,
        submission: Submission,
        poll: PollConfig,
        deadline: Duration,
    ) -> Self {
        Self {
            rest,
            submission,
            poll,
            deadline,
            cancel: CancellationToken::new(),
        }
    }

    /// Overall deadline, measured from when the wait is awaited.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Abort the wait when this token is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

impl IntoFuture for SealWait {
    type Output = Result<Submission, Error>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut submission = self.submission;
            let deadline = instant_after(self.deadline);
            poll_until_terminal(
                &self.rest,
                &mut submission,
                &self.poll,
                deadline,
                &self.cancel,
            )
            .await?;
            submission.into_result()
        })
    }
}
