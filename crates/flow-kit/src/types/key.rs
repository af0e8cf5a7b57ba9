//! Signature and hash algorithms, ECDSA keys and signatures.
//!
//! Flow accounts register keys on one of two curves and one of two hash
//! functions. A signature is produced by hashing the message with the key's
//! hash algorithm and signing the 32-byte digest with ECDSA; the result is
//! the 64-byte `r || s` concatenation.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};

use crate::error::{ParseKeyError, SignerError};

/// Curve a key signs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    /// ECDSA on NIST P-256.
    EcdsaP256,
    /// ECDSA on secp256k1.
    EcdsaSecp256k1,
}

impl SignatureAlgorithm {
    /// Name as used by the Access API.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::EcdsaP256 => "ECDSA_P256",
            SignatureAlgorithm::EcdsaSecp256k1 => "ECDSA_secp256k1",
        }
    }

    /// Numeric code used in account key encodings.
    pub fn code(&self) -> u8 {
        match self {
            SignatureAlgorithm::EcdsaP256 => 2,
            SignatureAlgorithm::EcdsaSecp256k1 => 3,
        }
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("ECDSA_P256") {
            Ok(SignatureAlgorithm::EcdsaP256)
        } else if s.eq_ignore_ascii_case("ECDSA_secp256k1") {
            Ok(SignatureAlgorithm::EcdsaSecp256k1)
        } else {
            Err(ParseKeyError::UnknownSignatureAlgorithm(s.to_string()))
        }
    }
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash function applied to a message before signing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha2_256,
    Sha3_256,
}

impl HashAlgorithm {
    /// Name as used by the Access API.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha2_256 => "SHA2_256",
            HashAlgorithm::Sha3_256 => "SHA3_256",
        }
    }

    /// Numeric code used in account key encodings.
    pub fn code(&self) -> u8 {
        match self {
            HashAlgorithm::Sha2_256 => 1,
            HashAlgorithm::Sha3_256 => 3,
        }
    }

    /// Hash `data`.
    pub fn digest(&self, data: &[u8]) -> [u8; 32] {
        let mut out = [0u8; 32];
        match self {
            HashAlgorithm::Sha2_256 => out.copy_from_slice(&Sha256::digest(data)),
            HashAlgorithm::Sha3_256 => out.copy_from_slice(&Sha3_256::digest(data)),
        }
        out
    }
}

impl FromStr for HashAlgorithm {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("SHA2_256") {
            Ok(HashAlgorithm::Sha2_256)
        } else if s.eq_ignore_ascii_case("SHA3_256") {
            Ok(HashAlgorithm::Sha3_256)
        } else {
            Err(ParseKeyError::UnknownHashAlgorithm(s.to_string()))
        }
    }
}

impl Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! serde_via_str {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s: String = Deserialize::deserialize(d)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_via_str!(SignatureAlgorithm);
serde_via_str!(HashAlgorithm);
serde_via_str!(PublicKey);
serde_via_str!(Signature);

fn decode_hex(s: &str) -> Result<Vec<u8>, ParseKeyError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| ParseKeyError::InvalidHex(e.to_string()))
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N], ParseKeyError> {
    bytes.try_into().map_err(|_| ParseKeyError::InvalidLength {
        expected: N,
        actual: bytes.len(),
    })
}

// ============================================================================
// PublicKey
// ============================================================================

/// An uncompressed ECDSA public key: the 64-byte `x || y` point without the
/// SEC1 `0x04` tag, hex encoded on the wire.
///
/// The curve is not part of the key; it comes from the account key entry the
/// key is registered under.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 64]);

impl PublicKey {
    /// Create from raw point bytes.
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get the raw 64 bytes.
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check that the point lies on the given curve.
    pub fn validate(&self, algorithm: SignatureAlgorithm) -> Result<(), ParseKeyError> {
        match algorithm {
            SignatureAlgorithm::EcdsaP256 => self.p256().map(|_| ()),
            SignatureAlgorithm::EcdsaSecp256k1 => self.k256().map(|_| ()),
        }
    }

    fn sec1(&self) -> [u8; 65] {
        let mut sec1 = [0u8; 65];
        sec1[0] = 0x04;
        sec1[1..].copy_from_slice(&self.0);
        sec1
    }

    fn p256(&self) -> Result<p256::ecdsa::VerifyingKey, ParseKeyError> {
        p256::ecdsa::VerifyingKey::from_sec1_bytes(&self.sec1())
            .map_err(|_| ParseKeyError::InvalidCurvePoint)
    }

    fn k256(&self) -> Result<k256::ecdsa::VerifyingKey, ParseKeyError> {
        k256::ecdsa::VerifyingKey::from_sec1_bytes(&self.sec1())
            .map_err(|_| ParseKeyError::InvalidCurvePoint)
    }

    fn from_sec1_uncompressed(bytes: &[u8]) -> Self {
        // Uncompressed SEC1 encodings are always 65 bytes starting with 0x04.
        let mut out = [0u8; 64];
        out.copy_from_slice(&bytes[1..65]);
        Self(out)
    }
}

impl FromStr for PublicKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s)?;
        fixed::<64>(&bytes).map(Self)
    }
}

impl Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

// ============================================================================
// PrivateKey
// ============================================================================

/// An ECDSA private key scalar bound to its curve.
///
/// The scalar is never printed; `Debug` only shows the curve.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    algorithm: SignatureAlgorithm,
    scalar: [u8; 32],
}

impl PrivateKey {
    /// Parse a 32-byte hex scalar (optionally `0x`-prefixed).
    pub fn from_hex(algorithm: SignatureAlgorithm, s: &str) -> Result<Self, ParseKeyError> {
        let bytes = decode_hex(s)?;
        Self::from_bytes(algorithm, &bytes)
    }

    /// Create from a raw 32-byte scalar.
    pub fn from_bytes(algorithm: SignatureAlgorithm, bytes: &[u8]) -> Result<Self, ParseKeyError> {
        let scalar = fixed::<32>(bytes)?;
        let valid = match algorithm {
            SignatureAlgorithm::EcdsaP256 => p256::ecdsa::SigningKey::from_slice(&scalar).is_ok(),
            SignatureAlgorithm::EcdsaSecp256k1 => {
                k256::ecdsa::SigningKey::from_slice(&scalar).is_ok()
            }
        };
        if !valid {
            return Err(ParseKeyError::InvalidScalar);
        }
        Ok(Self { algorithm, scalar })
    }

    /// Generate a fresh random key.
    pub fn generate(algorithm: SignatureAlgorithm) -> Self {
        let mut rng = rand::rngs::OsRng;
        let scalar: [u8; 32] = match algorithm {
            SignatureAlgorithm::EcdsaP256 => {
                p256::ecdsa::SigningKey::random(&mut rng).to_bytes().into()
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                k256::ecdsa::SigningKey::random(&mut rng).to_bytes().into()
            }
        };
        Self { algorithm, scalar }
    }

    /// The curve this key belongs to.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// The scalar as lowercase hex. Handle with care.
    pub fn to_hex(&self) -> String {
        hex::encode(self.scalar)
    }

    /// Derive the public key.
    pub fn public_key(&self) -> Result<PublicKey, SignerError> {
        let point = match self.algorithm {
            SignatureAlgorithm::EcdsaP256 => self
                .p256()?
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            SignatureAlgorithm::EcdsaSecp256k1 => self
                .k256()?
                .verifying_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
        };
        Ok(PublicKey::from_sec1_uncompressed(&point))
    }

    /// Sign a 32-byte digest. Nonces are derived deterministically (RFC 6979).
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<Signature, SignerError> {
        let failed = |e: k256::ecdsa::Error| SignerError::SigningFailed(e.to_string());
        let mut out = [0u8; 64];
        match self.algorithm {
            SignatureAlgorithm::EcdsaP256 => {
                let signature: p256::ecdsa::Signature =
                    self.p256()?.sign_prehash(digest).map_err(failed)?;
                out.copy_from_slice(&signature.to_bytes());
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                let signature: k256::ecdsa::Signature =
                    self.k256()?.sign_prehash(digest).map_err(failed)?;
                out.copy_from_slice(&signature.to_bytes());
            }
        }
        Ok(Signature(out))
    }

    fn p256(&self) -> Result<p256::ecdsa::SigningKey, SignerError> {
        p256::ecdsa::SigningKey::from_slice(&self.scalar)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))
    }

    fn k256(&self) -> Result<k256::ecdsa::SigningKey, SignerError> {
        k256::ecdsa::SigningKey::from_slice(&self.scalar)
            .map_err(|e| SignerError::InvalidKey(e.to_string()))
    }
}

impl Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}:***)", self.algorithm)
    }
}

// ============================================================================
// Signature
// ============================================================================

/// A 64-byte ECDSA signature, `r || s`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Verify this signature over `message` with the given key and algorithms.
    pub fn verify(
        &self,
        public_key: &PublicKey,
        signature_algorithm: SignatureAlgorithm,
        hash_algorithm: HashAlgorithm,
        message: &[u8],
    ) -> bool {
        let digest = hash_algorithm.digest(message);
        match signature_algorithm {
            SignatureAlgorithm::EcdsaP256 => {
                let Ok(key) = public_key.p256() else {
                    return false;
                };
                p256::ecdsa::Signature::from_slice(&self.0)
                    .is_ok_and(|sig| key.verify_prehash(&digest, &sig).is_ok())
            }
            SignatureAlgorithm::EcdsaSecp256k1 => {
                let Ok(key) = public_key.k256() else {
                    return false;
                };
                k256::ecdsa::Signature::from_slice(&self.0)
                    .is_ok_and(|sig| key.verify_prehash(&digest, &sig).is_ok())
            }
        }
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = ParseKeyError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        fixed::<64>(bytes).map(Self)
    }
}

impl FromStr for Signature {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(decode_hex(s)?.as_slice())
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self)
    }
}
