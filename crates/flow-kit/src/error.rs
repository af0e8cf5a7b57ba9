//! Error types for flow-kit.
//!
//! # Error Hierarchy
//!
//! - [`Error`](enum@Error) — Main error type, returned by most operations
//!   - [`ValidationError`] — Caller-provided data is malformed
//!   - [`ConfigError`] — Signer/key mismatches, unknown networks, missing settings
//!   - [`RestError`] — HTTP-level failures talking to the Access node
//!   - [`SignerError`] — Local signing failures
//!
//! Every variant maps onto a stable [`ErrorKind`] through [`Error::kind`], which is
//! the surface callers should match on when they only care about the class of
//! failure.
//!
//! # Example
//!
//! ```rust,no_run
//! use flow_kit::*;
//!
//! # async fn example() -> Result<(), Error> {
//! let flow = Flow::testnet().build();
//!
//! match flow.account("0x0000000000000000").await {
//!     Ok(account) => println!("Balance: {}", account.balance),
//!     Err(e) if e.kind() == ErrorKind::NotFound => println!("No such account"),
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::{
    Address, HashAlgorithm, Identifier, Network, SignatureAlgorithm, Submission, SubmissionStatus,
};

/// Error parsing an address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseAddressError {
    #[error("Address '{0}' must be exactly 16 hex characters, optionally prefixed with 0x")]
    InvalidLength(String),

    #[error("Address '{0}' contains non-hex character '{1}'")]
    InvalidChar(String, char),
}

/// Error parsing a 32-byte identifier (block or transaction id).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseHashError {
    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid identifier length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Error parsing a fixed-point amount (`UFix64` / `Fix64`).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseFixedPointError {
    #[error("Amount is empty")]
    Empty,

    #[error("Invalid fixed-point format: '{0}'")]
    InvalidFormat(String),

    #[error("Amount '{0}' has more than 8 fractional digits")]
    TooManyDecimals(String),

    #[error("Amount '{0}' is negative, but the type is unsigned")]
    Negative(String),

    #[error("Amount '{0}' is out of range")]
    Overflow(String),
}

/// Error parsing keys, signatures or algorithm names.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseKeyError {
    #[error("Unknown signature algorithm: '{0}'")]
    UnknownSignatureAlgorithm(String),

    #[error("Unknown hash algorithm: '{0}'")]
    UnknownHashAlgorithm(String),

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid curve point: key bytes do not represent a valid point on the curve")]
    InvalidCurvePoint,

    #[error("Invalid private key: scalar is zero or out of range")]
    InvalidScalar,
}

/// Caller-provided data is malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error(transparent)]
    Address(#[from] ParseAddressError),

    #[error(transparent)]
    Identifier(#[from] ParseHashError),

    #[error(transparent)]
    Amount(#[from] ParseFixedPointError),

    #[error(transparent)]
    Key(#[from] ParseKeyError),

    #[error("Unknown Cadence type '{0}'")]
    UnknownType(String),

    #[error("Malformed argument: {0}")]
    MalformedArgument(String),

    #[error("Script does not declare a transaction")]
    NotATransaction,

    #[error("Transaction declares {expected} parameter(s) but {actual} argument(s) were supplied")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("Argument {index} ('{name}') must be {expected}, got {actual}")]
    ArgumentType {
        index: usize,
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Transaction expects {expected} authorizer(s) but {actual} were supplied")]
    AuthorizerCount { expected: usize, actual: usize },

    #[error("Gas limit must be greater than zero")]
    ZeroGasLimit,

    #[error("Proposer {0} must be the payer or one of the authorizers")]
    ProposerNotSigner(Address),

    #[error("Signature from {0}, which is not a party to the transaction")]
    UnknownSigner(Address),
}

/// Configuration problems: unknown networks, missing settings, and signers that
/// do not match the keys registered on chain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown network '{0}'. Expected one of: mainnet, testnet, emulator")]
    UnknownNetwork(String),

    #[error("Missing REST base URL for {0}")]
    MissingBaseUrl(Network),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(
        "No signer configured. Call .signer() on FlowBuilder or .sign_with() on the transaction."
    )]
    NoSigner,

    #[error("No signer configured for {0}, which must sign this transaction")]
    MissingSigner(Address),

    #[error("Two signers were supplied for {address} key #{key_index}")]
    DuplicateSigner { address: Address, key_index: u32 },

    #[error("The proposal key {address} key #{key_index} has no signer")]
    ProposalKeyNotSigned { address: Address, key_index: u32 },

    #[error("Account {address} has no key #{key_index}")]
    KeyNotFound { address: Address, key_index: u32 },

    #[error("Key #{key_index} of {address} is revoked")]
    KeyRevoked { address: Address, key_index: u32 },

    #[error(
        "Signer for {address} key #{key_index} declares ({declared_signature}, {declared_hash}) \
         but the on-chain key uses ({on_chain_signature}, {on_chain_hash}). \
         Configure the signer with the on-chain algorithm pair."
    )]
    AlgorithmMismatch {
        address: Address,
        key_index: u32,
        declared_signature: SignatureAlgorithm,
        declared_hash: HashAlgorithm,
        on_chain_signature: SignatureAlgorithm,
        on_chain_hash: HashAlgorithm,
    },

    #[error("Signer public key does not match key #{key_index} registered on {address}")]
    PublicKeyMismatch { address: Address, key_index: u32 },

    #[error("Keys signing for {address} carry a total weight of {weight}; at least 1000 is required")]
    InsufficientWeight { address: Address, weight: u32 },
}

/// Error during local signing operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),
}

// ============================================================================
// REST Errors
// ============================================================================

/// Errors talking to the Access node's REST API.
#[derive(Debug, Error)]
pub enum RestError {
    // ─── Network/Transport ───
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {message}")]
    Network {
        message: String,
        status_code: Option<u16>,
        retryable: bool,
    },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    // ─── Node responses ───
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request rejected (HTTP {status_code}): {message}")]
    Rejected { status_code: u16, message: String },

    // ─── Response shape ───
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RestError {
    /// Check if this error is transient and the request may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            RestError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            RestError::Timeout(_) => true,
            RestError::Network { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>, status_code: Option<u16>, retryable: bool) -> Self {
        RestError::Network {
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// The HTTP status code, when the node answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RestError::Http(e) => e.status().map(|s| s.as_u16()),
            RestError::Network { status_code, .. } => *status_code,
            RestError::NotFound(_) => Some(404),
            RestError::Rejected { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            RestError::Timeout(_) => ErrorKind::Timeout,
            RestError::Http(e) if e.is_timeout() => ErrorKind::Timeout,
            RestError::NotFound(_) => ErrorKind::NotFound,
            RestError::Json(_) | RestError::InvalidResponse(_) => ErrorKind::Protocol,
            _ => ErrorKind::Transport,
        }
    }
}

// ============================================================================
// Main Error Type
// ============================================================================

/// The class of a failure, independent of the variant that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Configuration,
    NotFound,
    Transport,
    Protocol,
    Timeout,
    Expired,
    SignatureInvalid,
    Execution,
    Crypto,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::NotFound => "NotFoundError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::Protocol => "ProtocolError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Expired => "ExpiredError",
            ErrorKind::SignatureInvalid => "SignatureInvalidError",
            ErrorKind::Execution => "ExecutionError",
            ErrorKind::Crypto => "CryptoError",
            ErrorKind::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for flow-kit operations.
#[derive(Debug, Error)]
pub enum Error {
    // ─── Caller input ───
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    // ─── Lookups ───
    #[error("Account {address} not found on {network}")]
    AccountNotFound { address: Address, network: Network },

    #[error("Transaction {transaction_id} not found on {network}")]
    TransactionNotFound {
        transaction_id: Identifier,
        network: Network,
    },

    // ─── Transport ───
    #[error(transparent)]
    Rest(#[from] RestError),

    #[error("Failed to poll transaction {transaction_id} ({explorer_url}): {source}")]
    Poll {
        transaction_id: Identifier,
        explorer_url: String,
        #[source]
        source: RestError,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    // ─── Submission lifecycle ───
    #[error("Deadline exceeded{}", tracked(.last_status, .explorer_url))]
    Timeout {
        transaction_id: Option<Identifier>,
        last_status: Option<SubmissionStatus>,
        explorer_url: Option<String>,
    },

    #[error("Cancelled{}", tracked(&None, .explorer_url))]
    Cancelled {
        transaction_id: Option<Identifier>,
        explorer_url: Option<String>,
    },

    #[error("Transaction expired: {message}{}", tracked(&None, .explorer_url))]
    Expired {
        transaction_id: Option<Identifier>,
        message: String,
        explorer_url: Option<String>,
    },

    #[error("Signature rejected by the node: {message}")]
    SignatureInvalid {
        transaction_id: Identifier,
        message: String,
    },

    #[error("Transaction {} failed: {} ({})", .0.transaction_id, .0.error_message, .0.explorer_url)]
    Execution(Box<Submission>),

    // ─── Signing ───
    #[error(transparent)]
    Crypto(#[from] SignerError),
}

fn tracked(status: &Option<SubmissionStatus>, explorer_url: &Option<String>) -> String {
    let mut out = String::new();
    if let Some(status) = status {
        out.push_str(&format!(" (last status: {status})"));
    }
    if let Some(url) = explorer_url {
        out.push_str(&format!("; track the transaction at {url}"));
    }
    out
}

impl Error {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Config(_) => ErrorKind::Configuration,
            Error::AccountNotFound { .. } | Error::TransactionNotFound { .. } => {
                ErrorKind::NotFound
            }
            Error::Rest(e) => e.kind(),
            Error::Poll { source, .. } => source.kind(),
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Expired { .. } => ErrorKind::Expired,
            Error::SignatureInvalid { .. } => ErrorKind::SignatureInvalid,
            Error::Execution(_) => ErrorKind::Execution,
            Error::Crypto(_) => ErrorKind::Crypto,
        }
    }

    /// The id of the transaction this error concerns, once one exists.
    pub fn transaction_id(&self) -> Option<Identifier> {
        match self {
            Error::TransactionNotFound { transaction_id, .. }
            | Error::Poll { transaction_id, .. }
            | Error::SignatureInvalid { transaction_id, .. } => Some(*transaction_id),
            Error::Timeout { transaction_id, .. }
            | Error::Cancelled { transaction_id, .. }
            | Error::Expired { transaction_id, .. } => *transaction_id,
            Error::Execution(submission) => Some(submission.transaction_id),
            _ => None,
        }
    }

    /// Explorer URL for failures that happened after the node accepted the
    /// transaction.
    pub fn explorer_url(&self) -> Option<&str> {
        match self {
            Error::Poll { explorer_url, .. } => Some(explorer_url),
            Error::Timeout { explorer_url, .. }
            | Error::Cancelled { explorer_url, .. }
            | Error::Expired { explorer_url, .. } => explorer_url.as_deref(),
            Error::Execution(submission) => Some(&submission.explorer_url),
            _ => None,
        }
    }

    /// Whether the transaction was rejected because its reference block aged out.
    pub fn is_expired(&self) -> bool {
        matches!(self, Error::Expired { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        "0x36395f9dde50ea27".parse().unwrap()
    }

    // ========================================================================
    // Parse error tests
    // ========================================================================

    #[test]
    fn test_parse_address_error_display() {
        assert_eq!(
            ParseAddressError::InvalidLength("0x12".to_string()).to_string(),
            "Address '0x12' must be exactly 16 hex characters, optionally prefixed with 0x"
        );
        assert_eq!(
            ParseAddressError::InvalidChar("zz".to_string(), 'z').to_string(),
            "Address 'zz' contains non-hex character 'z'"
        );
    }

    #[test]
    fn test_parse_fixed_point_error_display() {
        assert_eq!(
            ParseFixedPointError::TooManyDecimals("1.123456789".to_string()).to_string(),
            "Amount '1.123456789' has more than 8 fractional digits"
        );
        assert_eq!(ParseFixedPointError::Empty.to_string(), "Amount is empty");
    }

    #[test]
    fn test_parse_key_error_display() {
        assert_eq!(
            ParseKeyError::InvalidLength {
                expected: 64,
                actual: 33
            }
            .to_string(),
            "Invalid key length: expected 64 bytes, got 33"
        );
    }

    // ========================================================================
    // ConfigError tests
    // ========================================================================

    #[test]
    fn test_algorithm_mismatch_names_both_pairs() {
        let err = ConfigError::AlgorithmMismatch {
            address: address(),
            key_index: 0,
            declared_signature: SignatureAlgorithm::EcdsaP256,
            declared_hash: HashAlgorithm::Sha2_256,
            on_chain_signature: SignatureAlgorithm::EcdsaSecp256k1,
            on_chain_hash: HashAlgorithm::Sha2_256,
        };
        let msg = err.to_string();
        assert!(msg.contains("0x36395f9dde50ea27"));
        assert!(msg.contains("(ECDSA_P256, SHA2_256)"));
        assert!(msg.contains("(ECDSA_secp256k1, SHA2_256)"));
    }

    #[test]
    fn test_unknown_network_display() {
        assert_eq!(
            ConfigError::UnknownNetwork("devnet".to_string()).to_string(),
            "Unknown network 'devnet'. Expected one of: mainnet, testnet, emulator"
        );
    }

    // ========================================================================
    // RestError tests
    // ========================================================================

    #[test]
    fn test_rest_error_retryable() {
        assert!(RestError::network("HTTP 503", Some(503), true).is_retryable());
        assert!(!RestError::network("HTTP 418", Some(418), false).is_retryable());
        assert!(RestError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(!RestError::NotFound("/v1/accounts/00".to_string()).is_retryable());
        assert!(
            !RestError::Rejected {
                status_code: 400,
                message: "bad".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_rest_error_status_code() {
        assert_eq!(
            RestError::network("x", Some(502), true).status_code(),
            Some(502)
        );
        assert_eq!(RestError::NotFound("x".to_string()).status_code(), Some(404));
        assert_eq!(RestError::InvalidResponse("x".to_string()).status_code(), None);
    }

    // ========================================================================
    // Error kind tests
    // ========================================================================

    #[test]
    fn test_error_kinds() {
        let err: Error = ValidationError::ZeroGasLimit.into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: Error = ConfigError::NoSigner.into();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Error::AccountNotFound {
            address: address(),
            network: Network::Testnet,
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "Account 0x36395f9dde50ea27 not found on testnet"
        );

        let err: Error = RestError::network("HTTP 500", Some(500), true).into();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err: Error = RestError::Timeout(Duration::from_secs(10)).into();
        assert_eq!(err.kind(), ErrorKind::Timeout);

        let err: Error = RestError::InvalidResponse("missing id".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let err: Error = SignerError::SigningFailed("boom".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Crypto);
    }

    #[test]
    fn test_timeout_display_carries_status_and_url() {
        let err = Error::Timeout {
            transaction_id: Some(Identifier::ZERO),
            last_status: Some(SubmissionStatus::Finalized),
            explorer_url: Some("https://testnet.flowscan.io/tx/00".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Deadline exceeded (last status: FINALIZED); track the transaction at https://testnet.flowscan.io/tx/00"
        );
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.transaction_id(), Some(Identifier::ZERO));
        assert_eq!(
            err.explorer_url(),
            Some("https://testnet.flowscan.io/tx/00")
        );
    }

    #[test]
    fn test_expired_without_id() {
        let err = Error::Expired {
            transaction_id: None,
            message: "reference block is expired".to_string(),
            explorer_url: None,
        };
        assert!(err.is_expired());
        assert_eq!(err.transaction_id(), None);
        assert_eq!(
            err.to_string(),
            "Transaction expired: reference block is expired"
        );
    }
}
