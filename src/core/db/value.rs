//! Tagged value model shared by parameters and scalar results.
//!
//! `Value::Null` is the canonical no-value marker: the field is known and
//! intentionally holds nothing. Native absence (the value was never supplied,
//! or a query produced no row) is expressed with `Option::None` around a
//! `Value`, never with a sentinel.

use crate::core::{DbError, Result};
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Exact decimal number, kept in its canonical textual form.
///
/// Parsing validates the literal (optional sign, digits, at most one
/// fractional point) so the stored text is always something a database will
/// accept as a NUMERIC/DECIMAL literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decimal(String);

impl Decimal {
    /// Returns the decimal literal as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lossy conversion for callers that only need an approximation.
    pub fn to_f64(&self) -> f64 {
        // The literal was validated on construction.
        self.0.parse().unwrap_or_default()
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Decimal("0".to_string())
    }
}

impl FromStr for Decimal {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let literal = s.trim();
        let digits = literal
            .strip_prefix('-')
            .or_else(|| literal.strip_prefix('+'))
            .unwrap_or(literal);

        let mut seen_point = false;
        let mut seen_digit = false;
        for c in digits.chars() {
            match c {
                '0'..='9' => seen_digit = true,
                '.' if !seen_point => seen_point = true,
                _ => {
                    return Err(DbError::invalid_argument(
                        "value",
                        format!("'{}' is not a decimal literal", s),
                    ))
                }
            }
        }
        if !seen_digit {
            return Err(DbError::invalid_argument(
                "value",
                format!("'{}' is not a decimal literal", s),
            ));
        }

        Ok(Decimal(literal.trim_start_matches('+').to_string()))
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A database value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The no-value marker
    #[default]
    Null,
    Bool(bool),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Decimal(Decimal),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    Guid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the runtime variant, used in cast errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Byte(_) => "Byte",
            Value::Int16(_) => "Int16",
            Value::Int32(_) => "Int32",
            Value::Int64(_) => "Int64",
            Value::Decimal(_) => "Decimal",
            Value::Double(_) => "Double",
            Value::Text(_) => "String",
            Value::Bytes(_) => "Binary",
            Value::Timestamp(_) => "DateTime",
            Value::Guid(_) => "Guid",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Guid(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! impl_from_for_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_for_value! {
    bool => Bool,
    u8 => Byte,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    Decimal => Decimal,
    f64 => Double,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDateTime => Timestamp,
    Uuid => Guid,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Bytes(value.to_vec())
    }
}
