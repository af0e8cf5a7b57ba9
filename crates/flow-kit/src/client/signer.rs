//! Signer trait and implementations.
//!
//! A signer holds one key of one account and declares the algorithm pair it
//! signs with. Flow does not record which algorithms a signature used, so a
//! signer whose declared pair differs from the on-chain key produces
//! signatures the node rejects. [`check_key`] catches that before anything
//! is signed.

use std::sync::Arc;

use crate::error::{ConfigError, Error, SignerError, ValidationError};
use crate::types::{
    AccountSnapshot, Address, HashAlgorithm, KeyEntry, PrivateKey, PublicKey, Signature,
    SignatureAlgorithm,
};

/// Total key weight an account must sign with.
pub const FULL_WEIGHT: u32 = 1000;

// ============================================================================
// Signer Trait
// ============================================================================

/// Trait for signing transactions.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use flow_kit::*;
///
/// struct KmsSigner {
///     address: Address,
///     public_key: PublicKey,
///     client: MyKmsClient,
/// }
///
/// impl Signer for KmsSigner {
///     fn address(&self) -> Address { self.address }
///     fn key_index(&self) -> u32 { 0 }
///     fn signature_algorithm(&self) -> SignatureAlgorithm { SignatureAlgorithm::EcdsaP256 }
///     fn hash_algorithm(&self) -> HashAlgorithm { HashAlgorithm::Sha2_256 }
///     fn public_key(&self) -> PublicKey { self.public_key }
///
///     fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
///         let digest = self.hash_algorithm().digest(message);
///         self.client.sign_digest(&digest)
///     }
/// }
/// ```
pub trait Signer: Send + Sync {
    /// The account this signer signs for.
    fn address(&self) -> Address;

    /// Index of the key on that account.
    fn key_index(&self) -> u32;

    /// Curve the key signs on.
    fn signature_algorithm(&self) -> SignatureAlgorithm;

    /// Hash applied to messages before signing.
    fn hash_algorithm(&self) -> HashAlgorithm;

    fn public_key(&self) -> PublicKey;

    /// Hash `message` with [`Signer::hash_algorithm`] and sign the digest.
    fn sign(&self, message: &[u8]) -> Result<Signature, SignerError>;
}

/// Implement `Signer` for `Arc<dyn Signer>` for convenience.
impl Signer for Arc<dyn Signer> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn key_index(&self) -> u32 {
        (**self).key_index()
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        (**self).signature_algorithm()
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        (**self).hash_algorithm()
    }

    fn public_key(&self) -> PublicKey {
        (**self).public_key()
    }

    fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        (**self).sign(message)
    }
}

// ============================================================================
// InMemorySigner
// ============================================================================

/// A signer with a single key stored in memory.
///
/// # Example
///
/// ```rust
/// use flow_kit::{HashAlgorithm, InMemorySigner, SignatureAlgorithm, Signer};
///
/// let signer = InMemorySigner::new(
///     "0x36395f9dde50ea27",
///     0,
///     "c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721",
///     SignatureAlgorithm::EcdsaP256,
///     HashAlgorithm::Sha3_256,
/// ).unwrap();
/// assert_eq!(signer.key_index(), 0);
/// ```
#[derive(Clone)]
pub struct InMemorySigner {
    address: Address,
    key_index: u32,
    private_key: PrivateKey,
    hash_algorithm: HashAlgorithm,
    public_key: PublicKey,
}

impl InMemorySigner {
    /// Create a signer from an address, key index and hex private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the address or private key cannot be parsed.
    pub fn new(
        address: impl AsRef<str>,
        key_index: u32,
        private_key: impl AsRef<str>,
        signature_algorithm: SignatureAlgorithm,
        hash_algorithm: HashAlgorithm,
    ) -> Result<Self, Error> {
        let address = Address::normalize(address).map_err(ValidationError::from)?;
        let private_key = PrivateKey::from_hex(signature_algorithm, private_key.as_ref())
            .map_err(ValidationError::from)?;
        Self::from_private_key(address, key_index, private_key, hash_algorithm)
    }

    /// Create a signer from a parsed private key.
    pub fn from_private_key(
        address: Address,
        key_index: u32,
        private_key: PrivateKey,
        hash_algorithm: HashAlgorithm,
    ) -> Result<Self, Error> {
        let public_key = private_key.public_key()?;
        Ok(Self {
            address,
            key_index,
            private_key,
            hash_algorithm,
            public_key,
        })
    }
}

impl Signer for InMemorySigner {
    fn address(&self) -> Address {
        self.address
    }

    fn key_index(&self) -> u32 {
        self.key_index
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.private_key.algorithm()
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn sign(&self, message: &[u8]) -> Result<Signature, SignerError> {
        let digest = self.hash_algorithm.digest(message);
        self.private_key.sign_prehash(&digest)
    }
}

impl std::fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("address", &self.address)
            .field("key_index", &self.key_index)
            .field("signature_algorithm", &self.private_key.algorithm())
            .field("hash_algorithm", &self.hash_algorithm)
            .field("public_key", &self.public_key)
            .finish()
    }
}

// ============================================================================
// On-chain key checks
// ============================================================================

/// Check a signer against the key registered at its index.
///
/// Checks run in order: the key exists, its algorithm pair matches the
/// signer's, its public key matches, and it is not revoked.
pub fn check_key<'a>(
    signer: &dyn Signer,
    account: &'a AccountSnapshot,
) -> Result<&'a KeyEntry, ConfigError> {
    let address = signer.address();
    let key_index = signer.key_index();

    let key = account
        .key(key_index)
        .ok_or(ConfigError::KeyNotFound { address, key_index })?;

    if key.signature_algorithm != signer.signature_algorithm()
        || key.hash_algorithm != signer.hash_algorithm()
    {
        return Err(ConfigError::AlgorithmMismatch {
            address,
            key_index,
            declared_signature: signer.signature_algorithm(),
            declared_hash: signer.hash_algorithm(),
            on_chain_signature: key.signature_algorithm,
            on_chain_hash: key.hash_algorithm,
        });
    }
    if key.public_key != signer.public_key() {
        return Err(ConfigError::PublicKeyMismatch { address, key_index });
    }
    if key.revoked {
        return Err(ConfigError::KeyRevoked { address, key_index });
    }
    Ok(key)
}

/// Check that the keys signing for `address` carry full weight.
pub fn check_weight<'a>(
    address: Address,
    keys: impl IntoIterator<Item = &'a KeyEntry>,
) -> Result<(), ConfigError> {
    let weight = keys
        .into_iter()
        .fold(0u32, |sum, key| sum.saturating_add(key.weight));
    if weight < FULL_WEIGHT {
        return Err(ConfigError::InsufficientWeight { address, weight });
    }
    Ok(())
}
