//! Reading a transaction's declared parameters and authorizer count.
//!
//! Only the transaction header matters here:
//!
//! ```text
//! transaction(amount: UFix64, to: Address) {
//!     prepare(signer: auth(BorrowValue) &Account) { ... }
//! }
//! ```
//!
//! The parameter list gives argument arity and types; the number of
//! `prepare` parameters gives the number of authorizers.

use crate::error::ValidationError;

use super::cadence::{Argument, TypeTag, split_top_level};

/// A declared transaction parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub type_tag: TypeTag,
}

/// What a transaction script expects from its caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptSignature {
    pub parameters: Vec<Parameter>,
    /// Number of `prepare` parameters, i.e. authorizers.
    pub authorizers: usize,
}

impl ScriptSignature {
    /// Parse the header of a transaction script.
    ///
    /// ```
    /// use flow_kit::ScriptSignature;
    ///
    /// let sig = ScriptSignature::parse(
    ///     "transaction(amount: UFix64, to: Address) { prepare(s: &Account) {} }",
    /// ).unwrap();
    /// assert_eq!(sig.parameters.len(), 2);
    /// assert_eq!(sig.authorizers, 1);
    /// ```
    pub fn parse(script: &str) -> Result<Self, ValidationError> {
        let code = strip_comments_and_strings(script);
        let start = find_keyword(&code, "transaction", 0).ok_or(ValidationError::NotATransaction)?;
        let mut rest = code[start + "transaction".len()..].trim_start();

        let mut parameters = Vec::new();
        if rest.starts_with('(') {
            let (inner, after) = balanced(rest).ok_or(ValidationError::NotATransaction)?;
            parameters = parse_parameters(inner)?;
            rest = after;
        }

        let (body, _) = balanced(rest.trim_start()).ok_or(ValidationError::NotATransaction)?;

        let authorizers = match find_keyword(body, "prepare", 0) {
            None => 0,
            Some(at) => {
                let after = body[at + "prepare".len()..].trim_start();
                let (inner, _) = balanced(after).ok_or(ValidationError::NotATransaction)?;
                split_top_level(inner, ',')
                    .into_iter()
                    .filter(|p| !p.trim().is_empty())
                    .count()
            }
        };

        Ok(Self {
            parameters,
            authorizers,
        })
    }

    /// Check argument arity and types, and the number of authorizers.
    pub fn check(
        &self,
        arguments: &[Argument],
        authorizer_count: usize,
    ) -> Result<(), ValidationError> {
        if arguments.len() != self.parameters.len() {
            return Err(ValidationError::ArgumentCount {
                expected: self.parameters.len(),
                actual: arguments.len(),
            });
        }
        for (index, (param, arg)) in self.parameters.iter().zip(arguments).enumerate() {
            arg.validate().map_err(|e| match e {
                ValidationError::MalformedArgument(message) => {
                    ValidationError::MalformedArgument(format!("argument {index}: {message}"))
                }
                other => other,
            })?;
            if !param.type_tag.accepts(arg) {
                return Err(ValidationError::ArgumentType {
                    index,
                    name: param.name.clone(),
                    expected: param.type_tag.to_string(),
                    actual: arg.type_name().to_string(),
                });
            }
        }
        if authorizer_count != self.authorizers {
            return Err(ValidationError::AuthorizerCount {
                expected: self.authorizers,
                actual: authorizer_count,
            });
        }
        Ok(())
    }
}

fn parse_parameters(list: &str) -> Result<Vec<Parameter>, ValidationError> {
    split_top_level(list, ',')
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .map(|param| {
            let (name, ty) = param
                .split_once(':')
                .ok_or_else(|| ValidationError::UnknownType(param.trim().to_string()))?;
            Ok(Parameter {
                name: name.trim().to_string(),
                type_tag: ty.parse()?,
            })
        })
        .collect()
}

/// Replace comments and string literals with spaces so brackets inside them
/// do not count. Byte offsets are preserved.
fn strip_comments_and_strings(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let mut block_depth = 0usize;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();

        if block_depth > 0 {
            if b == b'*' && next == Some(b'/') {
                block_depth -= 1;
                out.extend_from_slice(b"  ");
                i += 2;
            } else if b == b'/' && next == Some(b'*') {
                block_depth += 1;
                out.extend_from_slice(b"  ");
                i += 2;
            } else {
                out.push(if b == b'\n' { b'\n' } else { b' ' });
                i += 1;
            }
            continue;
        }

        match (b, next) {
            (b'/', Some(b'/')) => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out.push(b' ');
                    i += 1;
                }
            }
            (b'/', Some(b'*')) => {
                block_depth = 1;
                out.extend_from_slice(b"  ");
                i += 2;
            }
            (b'"', _) => {
                out.push(b' ');
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    let skip = if bytes[i] == b'\\' { 2 } else { 1 };
                    for _ in 0..skip.min(bytes.len() - i) {
                        out.push(b' ');
                    }
                    i += skip;
                }
                if i < bytes.len() {
                    out.push(b' ');
                    i += 1;
                }
            }
            _ => {
                out.push(b);
                i += 1;
            }
        }
    }

    // Stripped regions are blanked byte by byte, so multi-byte characters
    // are either kept whole or fully replaced.
    String::from_utf8_lossy(&out).into_owned()
}

/// Find `keyword` as a whole word at the given brace depth.
fn find_keyword(code: &str, keyword: &str, at_depth: i32) -> Option<usize> {
    let bytes = code.as_bytes();
    let mut depth = 0i32;
    let is_ident = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => depth -= 1,
            _ if depth == at_depth && bytes[i..].starts_with(keyword.as_bytes()) => {
                let before_ok = i == 0 || !is_ident(bytes[i - 1]);
                let after_ok = bytes
                    .get(i + keyword.len())
                    .is_none_or(|&next| !is_ident(next));
                if before_ok && after_ok {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Given text starting with an opening bracket, return the contents up to
/// the matching close and the remainder after it.
fn balanced(s: &str) -> Option<(&str, &str)> {
    let open = s.chars().next()?;
    let close = match open {
        '(' => ')',
        '{' => '}',
        '[' => ']',
        _ => return None,
    };
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((&s[1..i], &s[i + 1..]));
            }
        }
    }
    None
}
