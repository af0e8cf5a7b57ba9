//! Fixed-point amounts: `UFix64` and `Fix64`.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseFixedPointError;

/// Number of fractional digits carried by Flow fixed-point types.
pub const FIX64_DECIMALS: usize = 8;
/// One whole token in raw units.
const SCALE: u64 = 100_000_000;

/// An unsigned fixed-point number with 8 fractional digits.
///
/// Balances and token amounts are `UFix64` values; the raw integer is the
/// amount in the smallest unit (10⁸ per whole token).
///
/// # Parsing
///
/// Up to 8 fractional digits are accepted and zero-padded; more are rejected
/// rather than rounded. Whole numbers such as `"10"` are accepted and
/// normalized to `10.00000000`.
///
/// ```
/// use flow_kit::UFix64;
///
/// let amount: UFix64 = "1.5".parse().unwrap();
/// assert_eq!(amount.raw(), 150_000_000);
/// assert_eq!(amount.to_string(), "1.50000000");
/// assert!("0.123456789".parse::<UFix64>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UFix64(u64);

impl UFix64 {
    /// Zero.
    pub const ZERO: Self = Self(0);
    /// One whole token.
    pub const ONE: Self = Self(SCALE);
    /// The largest representable value.
    pub const MAX: Self = Self(u64::MAX);

    /// Create from the raw smallest-unit integer.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Create from whole tokens, saturating at [`UFix64::MAX`].
    pub const fn tokens(whole: u64) -> Self {
        Self(whole.saturating_mul(SCALE))
    }

    /// The raw smallest-unit integer.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// The whole-token part.
    pub const fn whole(&self) -> u64 {
        self.0 / SCALE
    }

    /// The fractional part in raw units.
    pub const fn fraction(&self) -> u64 {
        self.0 % SCALE
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Human-readable token amount, e.g. `"12.5 FLOW"`.
    ///
    /// Trailing fractional zeros are trimmed. This only formats; the value is
    /// untouched.
    pub fn to_token_string(&self) -> String {
        let fraction = self.fraction();
        if fraction == 0 {
            return format!("{} FLOW", self.whole());
        }
        let digits = format!("{:08}", fraction);
        format!("{}.{} FLOW", self.whole(), digits.trim_end_matches('0'))
    }
}

impl FromStr for UFix64 {
    type Err = ParseFixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('-') {
            return Err(ParseFixedPointError::Negative(s.to_string()));
        }
        parse_magnitude(s, s).map(Self)
    }
}

impl Display for UFix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:08}", self.whole(), self.fraction())
    }
}

impl Serialize for UFix64 {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for UFix64 {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A signed fixed-point number with 8 fractional digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fix64(i64);

impl Fix64 {
    pub const ZERO: Self = Self(0);

    /// Create from the raw scaled integer.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw scaled integer.
    pub const fn raw(&self) -> i64 {
        self.0
    }
}

impl FromStr for Fix64 {
    type Err = ParseFixedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let magnitude = parse_magnitude(digits, s)?;
        let raw = if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        };
        raw.map(Self)
            .ok_or_else(|| ParseFixedPointError::Overflow(s.to_string()))
    }
}

impl Display for Fix64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{}.{:08}", magnitude / SCALE, magnitude % SCALE)
    }
}

impl Serialize for Fix64 {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Fix64 {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse an unsigned decimal with at most 8 fractional digits into raw units.
/// `original` is only used for error messages.
fn parse_magnitude(s: &str, original: &str) -> Result<u64, ParseFixedPointError> {
    if s.is_empty() {
        return Err(ParseFixedPointError::Empty);
    }

    let (integer_part, fraction_part) = match s.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (s, None),
    };

    let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(integer_part) {
        return Err(ParseFixedPointError::InvalidFormat(original.to_string()));
    }

    let fraction = match fraction_part {
        None => 0,
        Some(part) => {
            if !all_digits(part) {
                return Err(ParseFixedPointError::InvalidFormat(original.to_string()));
            }
            if part.len() > FIX64_DECIMALS {
                return Err(ParseFixedPointError::TooManyDecimals(original.to_string()));
            }
            let padded = format!("{:0<width$}", part, width = FIX64_DECIMALS);
            padded
                .parse::<u64>()
                .map_err(|_| ParseFixedPointError::InvalidFormat(original.to_string()))?
        }
    };

    integer_part
        .parse::<u64>()
        .ok()
        .and_then(|whole| whole.checked_mul(SCALE))
        .and_then(|scaled| scaled.checked_add(fraction))
        .ok_or_else(|| ParseFixedPointError::Overflow(original.to_string()))
}
