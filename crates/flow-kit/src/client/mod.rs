//! Client module for talking to a Flow Access node.
//!
//! This module provides the core client infrastructure:
//!
//! - [`Flow`] — The main client, the single entry point for all operations
//! - [`FlowBuilder`] — Fluent builder for configuring the client
//! - [`RestClient`] — Low-level REST client with retry logic
//! - [`ClientConfig`] — The whole configuration as one serde record
//!
//! # Signers
//!
//! A [`Signer`] holds one key of one account. [`InMemorySigner`] keeps the
//! private key in memory; implement the trait to sign with a KMS or HSM.
//! Before signing, every signer is checked against the key registered on
//! chain at its index.
//!
//! # Builders
//!
//! - [`AccountQuery`] — Get balance, keys and contracts
//! - [`BalanceQuery`] — Get the balance only
//! - [`TransactionBuilder`] — Build, sign and submit a transaction
//! - [`TransactionSend`] — Submit and wait until sealed
//! - [`SealWait`] — Wait for an already submitted transaction

mod config;
mod flow;
mod key_lock;
mod query;
mod rest;
mod signer;
mod submission;
mod transaction;

pub use config::{ClientConfig, PollConfig};
pub use flow::{Flow, FlowBuilder};
pub use key_lock::KeyLocks;
pub use query::{AccountQuery, BalanceQuery};
pub use rest::{RestClient, RetryConfig};
pub use signer::{FULL_WEIGHT, InMemorySigner, Signer, check_key, check_weight};
pub use submission::SealWait;
pub use transaction::{TransactionBuilder, TransactionSend};
