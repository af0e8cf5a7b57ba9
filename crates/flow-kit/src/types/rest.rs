//! Access API response and request types.
//!
//! The REST API encodes 64-bit integers as decimal strings; numbers are
//! accepted too so that fixtures and emulators that emit plain JSON numbers
//! still decode.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{
    DeserializeAs, DisplayFromStr, NoneAsEmptyString, PickFirst, Same, SerializeAs,
    base64::Base64, serde_as,
};

use super::{Address, HashAlgorithm, Identifier, PublicKey, SignatureAlgorithm, UFix64};

// ============================================================================
// Field adapters
// ============================================================================

/// A `UFix64` carried as its raw smallest-unit integer.
struct RawUnits;

impl<'de> DeserializeAs<'de, UFix64> for RawUnits {
    fn deserialize_as<D: Deserializer<'de>>(d: D) -> Result<UFix64, D::Error> {
        let raw = <PickFirst<(DisplayFromStr, Same)> as DeserializeAs<'de, u64>>::deserialize_as(d)?;
        Ok(UFix64::from_raw(raw))
    }
}

/// Base64-encoded UTF-8 source text.
struct Base64Source;

impl<'de> DeserializeAs<'de, String> for Base64Source {
    fn deserialize_as<D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        let encoded = String::deserialize(d)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        String::from_utf8(bytes).map_err(serde::de::Error::custom)
    }
}

/// Base64-encoded JSON-Cadence.
struct Base64Json;

impl<'de> DeserializeAs<'de, serde_json::Value> for Base64Json {
    fn deserialize_as<D: Deserializer<'de>>(d: D) -> Result<serde_json::Value, D::Error> {
        let encoded = String::deserialize(d)?;
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        serde_json::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

impl SerializeAs<serde_json::Value> for Base64Json {
    fn serialize_as<S: Serializer>(value: &serde_json::Value, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(value.to_string()))
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// An account as reported by the Access node.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccountSnapshot {
    pub address: Address,
    /// Balance in raw units (10⁸ per token). Use
    /// [`UFix64::to_token_string`] to format it.
    #[serde_as(as = "RawUnits")]
    pub balance: UFix64,
    /// Keys in the order the node returned them.
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
    /// Deployed contracts: name to source.
    #[serde_as(as = "BTreeMap<_, Base64Source>")]
    #[serde(default)]
    pub contracts: BTreeMap<String, String>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub storage_capacity: Option<u64>,
    #[serde_as(as = "Option<PickFirst<(DisplayFromStr, _)>>")]
    pub storage_used: Option<u64>,
}

impl AccountSnapshot {
    /// The key registered under `index`, wherever it sits in the list.
    pub fn key(&self, index: u32) -> Option<&KeyEntry> {
        self.keys.iter().find(|k| k.index == index)
    }

    /// Keys that have not been revoked.
    pub fn active_keys(&self) -> impl Iterator<Item = &KeyEntry> {
        self.keys.iter().filter(|k| !k.revoked)
    }
}

/// One key registered on an account.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KeyEntry {
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub index: u32,
    pub public_key: PublicKey,
    #[serde(rename = "signing_algorithm")]
    pub signature_algorithm: SignatureAlgorithm,
    #[serde(rename = "hashing_algorithm")]
    pub hash_algorithm: HashAlgorithm,
    /// Weight out of 1000.
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub weight: u32,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub sequence_number: u64,
    #[serde(default)]
    pub revoked: bool,
}

// ============================================================================
// Blocks
// ============================================================================

/// A block header.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Block {
    pub id: Identifier,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub height: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// ============================================================================
// Transaction results
// ============================================================================

/// Status string reported by the result endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionStatus {
    #[default]
    Unknown,
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Unknown => "UNKNOWN",
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Finalized => "FINALIZED",
            TransactionStatus::Executed => "EXECUTED",
            TransactionStatus::Sealed => "SEALED",
            TransactionStatus::Expired => "EXPIRED",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = std::convert::Infallible;

    /// Case-insensitive; anything unrecognized is `Unknown`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_uppercase().as_str() {
            "PENDING" => TransactionStatus::Pending,
            "FINALIZED" => TransactionStatus::Finalized,
            "EXECUTED" => TransactionStatus::Executed,
            "SEALED" => TransactionStatus::Sealed,
            "EXPIRED" => TransactionStatus::Expired,
            _ => TransactionStatus::Unknown,
        })
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransactionStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(s.parse().unwrap_or_default())
    }
}

/// The execution result of a transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionResult {
    #[serde_as(as = "NoneAsEmptyString")]
    #[serde(default)]
    pub block_id: Option<Identifier>,
    pub status: TransactionStatus,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    #[serde(default)]
    pub status_code: u32,
    /// Empty unless execution failed.
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl TransactionResult {
    pub fn is_failed(&self) -> bool {
        !self.error_message.is_empty() || self.status_code != 0
    }
}

/// An event emitted by a transaction.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Fully qualified type, e.g. `A.1654653399040a61.FlowToken.TokensDeposited`.
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub transaction_index: u32,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub event_index: u32,
    /// Decoded JSON-Cadence payload.
    #[serde_as(as = "Base64Json")]
    pub payload: serde_json::Value,
}

impl Event {
    /// A payload field's JSON-Cadence value, by name.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.payload
            .pointer("/value/fields")?
            .as_array()?
            .iter()
            .find(|f| f.get("name").and_then(|n| n.as_str()) == Some(name))?
            .get("value")
    }
}

// ============================================================================
// Submission body
// ============================================================================

/// The JSON body of `POST /v1/transactions`.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    #[serde_as(as = "Base64")]
    pub script: Vec<u8>,
    #[serde_as(as = "Vec<Base64>")]
    pub arguments: Vec<Vec<u8>>,
    pub reference_block_id: Identifier,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub gas_limit: u64,
    pub payer: Address,
    pub proposal_key: ProposalKeyBody,
    pub authorizers: Vec<Address>,
    pub payload_signatures: Vec<SignatureBody>,
    pub envelope_signatures: Vec<SignatureBody>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalKeyBody {
    pub address: Address,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub key_index: u32,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub sequence_number: u64,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBody {
    pub address: Address,
    #[serde_as(as = "PickFirst<(DisplayFromStr, _)>")]
    pub key_index: u32,
    #[serde_as(as = "Base64")]
    pub signature: Vec<u8>,
}
