//! Typed transaction arguments and their JSON-Cadence encoding.
//!
//! Every argument is sent as a JSON object `{"type": ..., "value": ...}`.
//! Integers and fixed-point numbers travel as strings; `UFix64` always carries
//! exactly 8 fractional digits and addresses are `0x`-prefixed lowercase hex.

use std::fmt;
use std::str::FromStr;

use serde_json::{Value, json};

use crate::error::ValidationError;

use super::{Address, Fix64, UFix64};

/// Integer types with a decimal string encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IntegerType {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Word8,
    Word16,
    Word32,
    Word64,
}

impl IntegerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegerType::Int => "Int",
            IntegerType::Int8 => "Int8",
            IntegerType::Int16 => "Int16",
            IntegerType::Int32 => "Int32",
            IntegerType::Int64 => "Int64",
            IntegerType::Int128 => "Int128",
            IntegerType::UInt => "UInt",
            IntegerType::UInt8 => "UInt8",
            IntegerType::UInt16 => "UInt16",
            IntegerType::UInt32 => "UInt32",
            IntegerType::UInt64 => "UInt64",
            IntegerType::UInt128 => "UInt128",
            IntegerType::Word8 => "Word8",
            IntegerType::Word16 => "Word16",
            IntegerType::Word32 => "Word32",
            IntegerType::Word64 => "Word64",
        }
    }

    fn is_signed(&self) -> bool {
        matches!(
            self,
            IntegerType::Int
                | IntegerType::Int8
                | IntegerType::Int16
                | IntegerType::Int32
                | IntegerType::Int64
                | IntegerType::Int128
        )
    }

    /// Inclusive bounds for fixed-width types; `None` for `Int`/`UInt`.
    fn bounds(&self) -> Option<(i128, u128)> {
        Some(match self {
            IntegerType::Int | IntegerType::UInt => return None,
            IntegerType::Int8 => (i8::MIN as i128, i8::MAX as u128),
            IntegerType::Int16 => (i16::MIN as i128, i16::MAX as u128),
            IntegerType::Int32 => (i32::MIN as i128, i32::MAX as u128),
            IntegerType::Int64 => (i64::MIN as i128, i64::MAX as u128),
            IntegerType::Int128 => (i128::MIN, i128::MAX as u128),
            IntegerType::UInt8 | IntegerType::Word8 => (0, u8::MAX as u128),
            IntegerType::UInt16 | IntegerType::Word16 => (0, u16::MAX as u128),
            IntegerType::UInt32 | IntegerType::Word32 => (0, u32::MAX as u128),
            IntegerType::UInt64 | IntegerType::Word64 => (0, u64::MAX as u128),
            IntegerType::UInt128 => (0, u128::MAX),
        })
    }

    /// Validate a decimal literal for this type and return it unchanged.
    fn check(&self, literal: &str) -> Result<(), ValidationError> {
        let malformed = || {
            ValidationError::MalformedArgument(format!(
                "'{literal}' is not a valid {}",
                self.as_str()
            ))
        };

        let digits = match literal.strip_prefix('-') {
            Some(rest) if self.is_signed() => rest,
            Some(_) => return Err(malformed()),
            None => literal,
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }

        let Some((min, max)) = self.bounds() else {
            return Ok(());
        };
        let in_range = if literal.starts_with('-') {
            literal.parse::<i128>().is_ok_and(|v| v >= min)
        } else {
            digits.parse::<u128>().is_ok_and(|v| v <= max)
        };
        if in_range {
            Ok(())
        } else {
            Err(ValidationError::MalformedArgument(format!(
                "'{literal}' is out of range for {}",
                self.as_str()
            )))
        }
    }
}

impl FromStr for IntegerType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Int" => IntegerType::Int,
            "Int8" => IntegerType::Int8,
            "Int16" => IntegerType::Int16,
            "Int32" => IntegerType::Int32,
            "Int64" => IntegerType::Int64,
            "Int128" => IntegerType::Int128,
            "UInt" => IntegerType::UInt,
            "UInt8" => IntegerType::UInt8,
            "UInt16" => IntegerType::UInt16,
            "UInt32" => IntegerType::UInt32,
            "UInt64" => IntegerType::UInt64,
            "UInt128" => IntegerType::UInt128,
            "Word8" => IntegerType::Word8,
            "Word16" => IntegerType::Word16,
            "Word32" => IntegerType::Word32,
            "Word64" => IntegerType::Word64,
            _ => return Err(ValidationError::UnknownType(s.to_string())),
        })
    }
}

/// Storage domain of a path value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PathDomain {
    Storage,
    Public,
    Private,
}

impl PathDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathDomain::Storage => "storage",
            PathDomain::Public => "public",
            PathDomain::Private => "private",
        }
    }
}

impl FromStr for PathDomain {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "storage" => Ok(PathDomain::Storage),
            "public" => Ok(PathDomain::Public),
            "private" => Ok(PathDomain::Private),
            _ => Err(ValidationError::MalformedArgument(format!(
                "unknown path domain '{s}'"
            ))),
        }
    }
}

// ============================================================================
// Argument
// ============================================================================

/// A transaction argument.
///
/// ```
/// use flow_kit::{Address, Argument, UFix64};
///
/// let amount = Argument::ufix64("10.5").unwrap();
/// assert_eq!(amount.to_json().to_string(), r#"{"type":"UFix64","value":"10.50000000"}"#);
///
/// let to: Address = "0x36395f9dde50ea27".parse().unwrap();
/// assert_eq!(
///     Argument::Address(to).to_json().to_string(),
///     r#"{"type":"Address","value":"0x36395f9dde50ea27"}"#
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Argument {
    Void,
    Bool(bool),
    String(String),
    Character(String),
    Address(Address),
    /// An integer of the given type, as a validated decimal literal.
    Integer(IntegerType, String),
    UFix64(UFix64),
    Fix64(Fix64),
    Array(Vec<Argument>),
    Dictionary(Vec<(Argument, Argument)>),
    Optional(Option<Box<Argument>>),
    Path {
        domain: PathDomain,
        identifier: String,
    },
}

impl Argument {
    /// A `UFix64` from its decimal form (at most 8 fractional digits).
    pub fn ufix64(value: &str) -> Result<Self, ValidationError> {
        Ok(Argument::UFix64(value.parse()?))
    }

    /// An integer of any supported type from its decimal form.
    pub fn integer(ty: IntegerType, value: impl fmt::Display) -> Result<Self, ValidationError> {
        let literal = value.to_string();
        ty.check(&literal)?;
        Ok(Argument::Integer(ty, literal))
    }

    pub fn uint64(value: u64) -> Self {
        Argument::Integer(IntegerType::UInt64, value.to_string())
    }

    pub fn int(value: i64) -> Self {
        Argument::Integer(IntegerType::Int, value.to_string())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Argument::String(value.into())
    }

    pub fn some(value: Argument) -> Self {
        Argument::Optional(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Argument::Optional(None)
    }

    /// Re-check integer literals, including those nested in containers.
    ///
    /// Values built through the constructors always pass; a hand-built
    /// [`Argument::Integer`] may not.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Argument::Integer(ty, literal) => ty.check(literal),
            Argument::Array(items) => items.iter().try_for_each(Argument::validate),
            Argument::Dictionary(entries) => entries
                .iter()
                .try_for_each(|(k, v)| k.validate().and_then(|()| v.validate())),
            Argument::Optional(Some(inner)) => inner.validate(),
            _ => Ok(()),
        }
    }

    /// The JSON-Cadence type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Void => "Void",
            Argument::Bool(_) => "Bool",
            Argument::String(_) => "String",
            Argument::Character(_) => "Character",
            Argument::Address(_) => "Address",
            Argument::Integer(ty, _) => ty.as_str(),
            Argument::UFix64(_) => "UFix64",
            Argument::Fix64(_) => "Fix64",
            Argument::Array(_) => "Array",
            Argument::Dictionary(_) => "Dictionary",
            Argument::Optional(_) => "Optional",
            Argument::Path { .. } => "Path",
        }
    }

    /// Encode as a JSON-Cadence value.
    pub fn to_json(&self) -> Value {
        let ty = self.type_name();
        match self {
            Argument::Void => json!({ "type": ty }),
            Argument::Bool(b) => json!({ "type": ty, "value": b }),
            Argument::String(s) | Argument::Character(s) => json!({ "type": ty, "value": s }),
            Argument::Address(a) => json!({ "type": ty, "value": a.to_string() }),
            Argument::Integer(_, literal) => json!({ "type": ty, "value": literal }),
            Argument::UFix64(v) => json!({ "type": ty, "value": v.to_string() }),
            Argument::Fix64(v) => json!({ "type": ty, "value": v.to_string() }),
            Argument::Array(items) => {
                let items: Vec<Value> = items.iter().map(Argument::to_json).collect();
                json!({ "type": ty, "value": items })
            }
            Argument::Dictionary(entries) => {
                let entries: Vec<Value> = entries
                    .iter()
                    .map(|(k, v)| json!({ "key": k.to_json(), "value": v.to_json() }))
                    .collect();
                json!({ "type": ty, "value": entries })
            }
            Argument::Optional(inner) => {
                let inner = inner.as_ref().map(|v| v.to_json()).unwrap_or(Value::Null);
                json!({ "type": ty, "value": inner })
            }
            Argument::Path { domain, identifier } => json!({
                "type": ty,
                "value": { "domain": domain.as_str(), "identifier": identifier }
            }),
        }
    }

    /// The exact bytes placed in the transaction.
    pub fn to_bytes(&self) -> Vec<u8> {
        // Object keys serialize in sorted order, so the encoding is stable.
        self.to_json().to_string().into_bytes()
    }

    /// Decode a JSON-Cadence value.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let object = value
            .as_object()
            .ok_or_else(|| malformed("expected an object with a 'type' field"))?;
        let ty = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("missing 'type'"))?;
        let field = |name: &str| {
            object
                .get(name)
                .ok_or_else(|| malformed(&format!("{ty} value is missing '{name}'")))
        };
        let string = |name: &str| -> Result<String, ValidationError> {
            field(name)?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| malformed(&format!("{ty} value must be a string")))
        };

        Ok(match ty {
            "Void" => Argument::Void,
            "Bool" => Argument::Bool(
                field("value")?
                    .as_bool()
                    .ok_or_else(|| malformed("Bool value must be a boolean"))?,
            ),
            "String" => Argument::String(string("value")?),
            "Character" => Argument::Character(string("value")?),
            "Address" => Argument::Address(string("value")?.parse()?),
            "UFix64" => Argument::UFix64(string("value")?.parse()?),
            "Fix64" => Argument::Fix64(string("value")?.parse()?),
            "Array" => Argument::Array(
                array(field("value")?, ty)?
                    .iter()
                    .map(Argument::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            "Dictionary" => Argument::Dictionary(
                array(field("value")?, ty)?
                    .iter()
                    .map(|entry| {
                        let key = entry
                            .get("key")
                            .ok_or_else(|| malformed("dictionary entry is missing 'key'"))?;
                        let value = entry
                            .get("value")
                            .ok_or_else(|| malformed("dictionary entry is missing 'value'"))?;
                        Ok((Argument::from_json(key)?, Argument::from_json(value)?))
                    })
                    .collect::<Result<_, ValidationError>>()?,
            ),
            "Optional" => match object.get("value") {
                None | Some(Value::Null) => Argument::Optional(None),
                Some(inner) => Argument::some(Argument::from_json(inner)?),
            },
            "Path" => {
                let path = field("value")?;
                let part = |name: &str| {
                    path.get(name)
                        .and_then(Value::as_str)
                        .ok_or_else(|| malformed(&format!("Path value is missing '{name}'")))
                };
                Argument::Path {
                    domain: part("domain")?.parse()?,
                    identifier: part("identifier")?.to_string(),
                }
            }
            other => {
                let integer: IntegerType = other.parse()?;
                Argument::integer(integer, string("value")?)?
            }
        })
    }

    /// Decode the raw argument bytes of a transaction.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ValidationError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| malformed(&format!("argument is not valid JSON: {e}")))?;
        Self::from_json(&value)
    }
}

fn malformed(message: &str) -> ValidationError {
    ValidationError::MalformedArgument(message.to_string())
}

fn array<'a>(value: &'a Value, ty: &str) -> Result<&'a Vec<Value>, ValidationError> {
    value
        .as_array()
        .ok_or_else(|| malformed(&format!("{ty} value must be an array")))
}

impl From<bool> for Argument {
    fn from(value: bool) -> Self {
        Argument::Bool(value)
    }
}

impl From<Address> for Argument {
    fn from(value: Address) -> Self {
        Argument::Address(value)
    }
}

impl From<UFix64> for Argument {
    fn from(value: UFix64) -> Self {
        Argument::UFix64(value)
    }
}

impl From<String> for Argument {
    fn from(value: String) -> Self {
        Argument::String(value)
    }
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::String(value.to_string())
    }
}

// ============================================================================
// TypeTag
// ============================================================================

/// A declared parameter type, as written in a transaction's parameter list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeTag {
    Void,
    Bool,
    String,
    Character,
    Address,
    Integer(IntegerType),
    UFix64,
    Fix64,
    Array {
        element: Box<TypeTag>,
        length: Option<usize>,
    },
    Dictionary(Box<TypeTag>, Box<TypeTag>),
    Optional(Box<TypeTag>),
    /// Any path type; `None` accepts every domain.
    Path(Option<PathDomain>),
    /// Composite, reference, capability or other types whose values are not
    /// checked beyond arity.
    Other(String),
}

impl TypeTag {
    /// Whether `argument` is a valid value for this declared type.
    pub fn accepts(&self, argument: &Argument) -> bool {
        match (self, argument) {
            (TypeTag::Other(_), _) => true,
            (TypeTag::Void, Argument::Void)
            | (TypeTag::Bool, Argument::Bool(_))
            | (TypeTag::String, Argument::String(_))
            | (TypeTag::Character, Argument::Character(_))
            | (TypeTag::Address, Argument::Address(_))
            | (TypeTag::UFix64, Argument::UFix64(_))
            | (TypeTag::Fix64, Argument::Fix64(_)) => true,
            (TypeTag::Integer(expected), Argument::Integer(actual, _)) => expected == actual,
            (TypeTag::Array { element, length }, Argument::Array(items)) => {
                length.is_none_or(|n| n == items.len())
                    && items.iter().all(|item| element.accepts(item))
            }
            (TypeTag::Dictionary(key, value), Argument::Dictionary(entries)) => entries
                .iter()
                .all(|(k, v)| key.accepts(k) && value.accepts(v)),
            (TypeTag::Optional(_), Argument::Optional(None)) => true,
            (TypeTag::Optional(inner), Argument::Optional(Some(value))) => inner.accepts(value),
            (TypeTag::Path(expected), Argument::Path { domain, .. }) => {
                expected.is_none_or(|d| d == *domain)
            }
            _ => false,
        }
    }

    /// Whether values of this type are checked at all.
    pub fn is_checked(&self) -> bool {
        !matches!(self, TypeTag::Other(_))
    }
}

impl FromStr for TypeTag {
    type Err = ValidationError;

    /// Parse Cadence type syntax. Never fails for well-bracketed input:
    /// anything unrecognized becomes [`TypeTag::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ValidationError::UnknownType(String::new()));
        }

        if let Some(inner) = s.strip_suffix('?') {
            return Ok(TypeTag::Optional(Box::new(inner.parse()?)));
        }

        if let Some(inner) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            return Ok(match split_top_level(inner, ';').as_slice() {
                [element] => TypeTag::Array {
                    element: Box::new(element.parse()?),
                    length: None,
                },
                [element, length] => TypeTag::Array {
                    element: Box::new(element.parse()?),
                    length: Some(length.trim().parse().map_err(|_| {
                        ValidationError::UnknownType(s.to_string())
                    })?),
                },
                _ => return Err(ValidationError::UnknownType(s.to_string())),
            });
        }

        if let Some(inner) = s.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            if let [key, value] = split_top_level(inner, ':').as_slice() {
                return Ok(TypeTag::Dictionary(
                    Box::new(key.parse()?),
                    Box::new(value.parse()?),
                ));
            }
            return Ok(TypeTag::Other(s.to_string()));
        }

        Ok(match s {
            "Void" => TypeTag::Void,
            "Bool" => TypeTag::Bool,
            "String" => TypeTag::String,
            "Character" => TypeTag::Character,
            "Address" => TypeTag::Address,
            "UFix64" => TypeTag::UFix64,
            "Fix64" => TypeTag::Fix64,
            "Path" | "CapabilityPath" => TypeTag::Path(None),
            "StoragePath" => TypeTag::Path(Some(PathDomain::Storage)),
            "PublicPath" => TypeTag::Path(Some(PathDomain::Public)),
            "PrivatePath" => TypeTag::Path(Some(PathDomain::Private)),
            other => match other.parse::<IntegerType>() {
                Ok(integer) => TypeTag::Integer(integer),
                Err(_) => TypeTag::Other(other.to_string()),
            },
        })
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Void => f.write_str("Void"),
            TypeTag::Bool => f.write_str("Bool"),
            TypeTag::String => f.write_str("String"),
            TypeTag::Character => f.write_str("Character"),
            TypeTag::Address => f.write_str("Address"),
            TypeTag::Integer(ty) => f.write_str(ty.as_str()),
            TypeTag::UFix64 => f.write_str("UFix64"),
            TypeTag::Fix64 => f.write_str("Fix64"),
            TypeTag::Array {
                element,
                length: None,
            } => write!(f, "[{element}]"),
            TypeTag::Array {
                element,
                length: Some(n),
            } => write!(f, "[{element}; {n}]"),
            TypeTag::Dictionary(k, v) => write!(f, "{{{k}: {v}}}"),
            TypeTag::Optional(inner) => write!(f, "{inner}?"),
            TypeTag::Path(None) => f.write_str("Path"),
            TypeTag::Path(Some(PathDomain::Storage)) => f.write_str("StoragePath"),
            TypeTag::Path(Some(PathDomain::Public)) => f.write_str("PublicPath"),
            TypeTag::Path(Some(PathDomain::Private)) => f.write_str("PrivatePath"),
            TypeTag::Other(s) => f.write_str(s),
        }
    }
}

/// Split on `sep` where it is not nested in brackets.
pub(crate) fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}
