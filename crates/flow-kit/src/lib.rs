//! Build, sign, submit and confirm Flow transactions over the Access REST API.
//!
//! **flow-kit** turns a Cadence script, its arguments and a signer into a
//! sealed transaction: it reads the proposer's sequence number, checks every
//! signer against its on-chain key, signs the canonical RLP encoding, submits
//! it, and polls until the transaction is sealed, expired or failed.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use flow_kit::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), flow_kit::Error> {
//!     let flow = Flow::testnet()
//!         .credentials(
//!             "0x36395f9dde50ea27",
//!             0,
//!             "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721",
//!             SignatureAlgorithm::EcdsaP256,
//!             HashAlgorithm::Sha3_256,
//!         )?
//!         .build();
//!
//!     let balance = flow.balance("0x36395f9dde50ea27").await?;
//!     println!("Balance: {}", balance.to_token_string());
//!
//!     let sealed = flow
//!         .transaction(r#"
//!             transaction(amount: UFix64) {
//!                 prepare(signer: &Account) {}
//!             }
//!         "#)
//!         .argument(Argument::ufix64("1.0")?)
//!         .send()
//!         .await?;
//!     println!("Sealed with {} events: {}", sealed.events.len(), sealed.explorer_url);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Core Types
//!
//! - [`Address`] - 8-byte Flow account address
//! - [`UFix64`], [`Fix64`] - Fixed-point amounts with 8 decimals
//! - [`Argument`] - Typed JSON-Cadence argument
//! - [`UnsignedTransaction`], [`SignedEnvelope`] - The two signing stages
//! - [`Submission`] - A submitted transaction and its lifecycle
//!
//! # Errors
//!
//! Every failure is an [`Error`]; match on [`Error::kind`] to handle a class
//! of failures. Errors raised after the node accepted a transaction carry its
//! id and explorer URL.

pub mod client;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    ConfigError, Error, ErrorKind, ParseAddressError, ParseFixedPointError, ParseHashError,
    ParseKeyError, RestError, SignerError, ValidationError,
};
pub use types::*;

// Re-export client types
pub use client::{
    AccountQuery, BalanceQuery, ClientConfig, Flow, FlowBuilder, InMemorySigner, KeyLocks,
    PollConfig, RestClient, RetryConfig, SealWait, Signer, TransactionBuilder, TransactionSend,
};

// Cancellation tokens appear in the builder APIs.
pub use tokio_util::sync::CancellationToken;
