//! Flow account addresses.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseAddressError;

/// An 8-byte Flow account address.
///
/// Parsing accepts 16 hex characters in any case, with or without a `0x`
/// prefix. The canonical form ([`Address::to_hex`]) is 16 lowercase hex
/// characters; `Display` and JSON use the `0x`-prefixed form.
///
/// ```
/// use flow_kit::Address;
///
/// let a: Address = "0x25F823E2A115B2DC".parse().unwrap();
/// assert_eq!(a.to_hex(), "25f823e2a115b2dc");
/// assert_eq!(a.to_string(), "0x25f823e2a115b2dc");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 8]);

impl Address {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Get the raw 8 bytes.
    pub const fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Normalize any accepted textual form into an address.
    pub fn normalize(s: impl AsRef<str>) -> Result<Self, ParseAddressError> {
        s.as_ref().parse()
    }

    /// Canonical form: 16 lowercase hex characters, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = ParseAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if let Some(c) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(ParseAddressError::InvalidChar(s.to_string(), c));
        }
        if digits.len() != 16 {
            return Err(ParseAddressError::InvalidLength(s.to_string()));
        }

        let mut bytes = [0u8; 8];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| ParseAddressError::InvalidLength(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<&str> for Address {
    type Error = ParseAddressError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<[u8; 8]> for Address {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        let expected = Address::from_bytes([0x25, 0xf8, 0x23, 0xe2, 0xa1, 0x15, 0xb2, 0xdc]);
        for input in [
            "0x25f823e2a115b2dc",
            "25f823e2a115b2dc",
            "0x25F823E2A115B2DC",
            "0X25f823e2a115b2dc",
        ] {
            assert_eq!(input.parse::<Address>().unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let a = Address::normalize("0x36395F9DDE50EA27").unwrap();
        let hex = a.to_hex();
        assert_eq!(hex, "36395f9dde50ea27");
        assert_eq!(hex.len(), 16);
        assert_eq!(Address::normalize(&hex).unwrap(), a);
        assert_eq!(Address::normalize(a.to_string()).unwrap(), a);
    }

    #[test]
    fn test_rejects_wrong_length() {
        for input in ["", "0x", "0x1234", "25f823e2a115b2dc00", "0x25f823e2a115b2d"] {
            assert!(
                matches!(
                    input.parse::<Address>(),
                    Err(ParseAddressError::InvalidLength(_))
                ),
                "{input}"
            );
        }
    }

    #[test]
    fn test_rejects_non_hex() {
        assert_eq!(
            "0x25f823e2a115b2dz".parse::<Address>(),
            Err(ParseAddressError::InvalidChar(
                "0x25f823e2a115b2dz".to_string(),
                'z'
            ))
        );
        assert!(" 25f823e2a115b2dc".parse::<Address>().is_err());
        assert!("0x0x25f823e2a115b2".parse::<Address>().is_err());
    }

    #[test]
    fn test_display_and_debug() {
        let a: Address = "0000000000000001".parse().unwrap();
        assert_eq!(a.to_string(), "0x0000000000000001");
        assert_eq!(format!("{:?}", a), "Address(0x0000000000000001)");
    }

    #[test]
    fn test_serde() {
        let a: Address = "0x36395f9dde50ea27".parse().unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"0x36395f9dde50ea27\"");
        let back: Address = serde_json::from_str("\"36395F9DDE50EA27\"").unwrap();
        assert_eq!(back, a);
    }
}
