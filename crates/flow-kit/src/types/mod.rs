//! Core types for the Flow chain.
//!
//! Value objects are validated at construction: an [`Address`] is always 8
//! bytes, a [`UFix64`] always has 8 fractional digits, and an
//! [`UnsignedTransaction`] has already been checked against its script.

mod address;
mod cadence;
mod hash;
mod key;
mod network;
mod rest;
mod script;
mod submission;
mod transaction;
mod units;

pub use address::Address;
pub use cadence::{Argument, IntegerType, PathDomain, TypeTag};
pub use hash::Identifier;
pub use key::{HashAlgorithm, PrivateKey, PublicKey, Signature, SignatureAlgorithm};
pub use network::{EMULATOR, Endpoint, MAINNET, Network, TESTNET, endpoint_for};
pub use rest::{
    AccountSnapshot, Block, Event, KeyEntry, ProposalKeyBody, SignatureBody, TransactionRequest,
    TransactionResult, TransactionStatus,
};
pub use script::{Parameter, ScriptSignature};
pub use submission::{Submission, SubmissionStatus};
pub use transaction::{
    DEFAULT_GAS_LIMIT, DOMAIN_TAG, ProposalKey, SignedEnvelope, TransactionSignature,
    TransactionSpec, UnsignedTransaction,
};
pub use units::{FIX64_DECIMALS, Fix64, UFix64};
