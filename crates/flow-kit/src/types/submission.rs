//! The client-side record of a submitted transaction.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::{Event, Identifier, Network, TransactionResult, TransactionStatus};

/// Where a submitted transaction is in its lifecycle.
///
/// Statuses only move forward: `Submitted → Pending → Finalized → Executed →
/// Sealed`. `Expired` can follow any non-terminal status, and an execution
/// error turns the record `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    /// Accepted by the Access node; no result observed yet.
    Submitted,
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
    /// Executed with an error. Terminal.
    Failed,
}

impl SubmissionStatus {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionStatus::Sealed | SubmissionStatus::Expired | SubmissionStatus::Failed
        )
    }

    fn rank(&self) -> u8 {
        match self {
            SubmissionStatus::Submitted => 0,
            SubmissionStatus::Pending => 1,
            SubmissionStatus::Finalized => 2,
            SubmissionStatus::Executed => 3,
            SubmissionStatus::Sealed
            | SubmissionStatus::Expired
            | SubmissionStatus::Failed => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Submitted => "SUBMITTED",
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Finalized => "FINALIZED",
            SubmissionStatus::Executed => "EXECUTED",
            SubmissionStatus::Sealed => "SEALED",
            SubmissionStatus::Expired => "EXPIRED",
            SubmissionStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TransactionStatus> for SubmissionStatus {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Unknown | TransactionStatus::Pending => SubmissionStatus::Pending,
            TransactionStatus::Finalized => SubmissionStatus::Finalized,
            TransactionStatus::Executed => SubmissionStatus::Executed,
            TransactionStatus::Sealed => SubmissionStatus::Sealed,
            TransactionStatus::Expired => SubmissionStatus::Expired,
        }
    }
}

/// A transaction the node has accepted, and what is known about it so far.
///
/// Callers may persist submissions; they serialize with serde.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub transaction_id: Identifier,
    pub network: Network,
    pub submitted_at: SystemTime,
    pub status: SubmissionStatus,
    /// Status code from the result endpoint; 0 on success.
    pub status_code: u32,
    pub events: Vec<Event>,
    /// The chain's error message, verbatim. Empty unless `Failed`.
    pub error_message: String,
    pub explorer_url: String,
    pub block_id: Option<Identifier>,
}

impl Submission {
    /// A freshly accepted transaction.
    pub fn new(transaction_id: Identifier, network: Network) -> Self {
        Self {
            transaction_id,
            network,
            submitted_at: SystemTime::now(),
            status: SubmissionStatus::Submitted,
            status_code: 0,
            events: Vec::new(),
            error_message: String::new(),
            explorer_url: network.explorer_url(&transaction_id),
            block_id: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Sealed without an error.
    pub fn is_success(&self) -> bool {
        self.status == SubmissionStatus::Sealed && self.error_message.is_empty()
    }

    /// Apply an observed result. Returns whether the record changed.
    ///
    /// Terminal records never change, and a result reporting an earlier status
    /// than the one already recorded (a lagging node) is ignored.
    pub fn observe(&mut self, result: &TransactionResult) -> bool {
        if self.is_terminal() {
            return false;
        }

        let next = if result.is_failed() {
            SubmissionStatus::Failed
        } else {
            SubmissionStatus::from(result.status)
        };
        if next.rank() < self.status.rank() {
            return false;
        }

        let changed = next != self.status
            || result.events.len() != self.events.len()
            || result.block_id != self.block_id;

        self.status = next;
        self.status_code = result.status_code;
        self.block_id = result.block_id.or(self.block_id);
        self.events = result.events.clone();
        if next == SubmissionStatus::Failed {
            self.error_message = if result.error_message.is_empty() {
                format!("execution failed with status code {}", result.status_code)
            } else {
                result.error_message.clone()
            };
        }
        changed
    }

    /// Turn a terminal record into the caller-facing outcome: `Ok` when
    /// sealed, otherwise the matching error.
    pub fn into_result(self) -> Result<Submission, Error> {
        match self.status {
            SubmissionStatus::Failed => Err(Error::Execution(Box::new(self))),
            SubmissionStatus::Expired => Err(Error::Expired {
                transaction_id: Some(self.transaction_id),
                message: "reference block expired before the transaction was sealed".to_string(),
                explorer_url: Some(self.explorer_url),
            }),
            _ => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn submission() -> Submission {
        Submission::new(Identifier::sha3_256(b"tx"), Network::Testnet)
    }

    fn result(status: TransactionStatus) -> TransactionResult {
        TransactionResult {
            block_id: None,
            status,
            status_code: 0,
            error_message: String::new(),
            events: Vec::new(),
        }
    }

    #[test]
    fn test_new_submission() {
        let s = submission();
        assert_eq!(s.status, SubmissionStatus::Submitted);
        assert!(!s.is_terminal());
        assert_eq!(
            s.explorer_url,
            format!("https://testnet.flowscan.io/tx/{}", s.transaction_id)
        );
    }

    #[test]
    fn test_happy_path() {
        let mut s = submission();
        for (status, expected) in [
            (TransactionStatus::Unknown, SubmissionStatus::Pending),
            (TransactionStatus::Pending, SubmissionStatus::Pending),
            (TransactionStatus::Finalized, SubmissionStatus::Finalized),
            (TransactionStatus::Executed, SubmissionStatus::Executed),
            (TransactionStatus::Sealed, SubmissionStatus::Sealed),
        ] {
            s.observe(&result(status));
            assert_eq!(s.status, expected);
        }
        assert!(s.is_success());
        assert_eq!(s.status_code, 0);
    }

    #[test]
    fn test_status_never_regresses() {
        let mut s = submission();
        assert!(s.observe(&result(TransactionStatus::Executed)));
        assert!(!s.observe(&result(TransactionStatus::Pending)));
        assert_eq!(s.status, SubmissionStatus::Executed);
    }

    #[test]
    fn test_terminal_is_frozen() {
        let mut s = submission();
        s.observe(&result(TransactionStatus::Sealed));
        let before = s.clone();

        let mut failed = result(TransactionStatus::Sealed);
        failed.error_message = "boom".to_string();
        assert!(!s.observe(&failed));
        assert!(!s.observe(&result(TransactionStatus::Expired)));
        assert_eq!(s, before);
    }

    #[test]
    fn test_error_message_fails() {
        let mut s = submission();
        let mut r = result(TransactionStatus::Executed);
        r.status_code = 1;
        r.error_message = "[Error Code: 1007] invalid proposal key".to_string();
        s.observe(&r);
        assert_eq!(s.status, SubmissionStatus::Failed);
        assert!(s.is_terminal());
        assert!(!s.is_success());

        let err = s.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Execution);
        assert!(err.to_string().contains("[Error Code: 1007]"));
        assert!(err.explorer_url().unwrap().contains("flowscan.io"));
    }

    #[test]
    fn test_nonzero_status_code_without_message_fails() {
        let mut s = submission();
        let mut r = result(TransactionStatus::Sealed);
        r.status_code = 1;
        s.observe(&r);
        assert_eq!(s.status, SubmissionStatus::Failed);
        assert!(!s.error_message.is_empty());
    }

    #[test]
    fn test_expired() {
        let mut s = submission();
        s.observe(&result(TransactionStatus::Pending));
        s.observe(&result(TransactionStatus::Expired));
        assert_eq!(s.status, SubmissionStatus::Expired);
        let id = s.transaction_id;
        let err = s.into_result().unwrap_err();
        assert!(err.is_expired());
        assert_eq!(err.transaction_id(), Some(id));
    }

    #[test]
    fn test_serde() {
        let mut s = submission();
        s.observe(&result(TransactionStatus::Sealed));
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["status"], "SEALED");
        assert_eq!(json["network"], "testnet");
        let back: Submission = serde_json::from_value(json).unwrap();
        assert_eq!(back, s);
    }
}
