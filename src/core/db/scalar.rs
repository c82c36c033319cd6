//! Typed extraction of scalar results.
//!
//! An absent value (`None`) and the no-value marker (`Value::Null`) both yield
//! the default. Any other value must already hold the requested variant; there
//! is no numeric widening or parsing, a mismatch is `InvalidCast`.

use crate::core::db::value::{Decimal, Value};
use crate::core::{DbError, Result};
use chrono::NaiveDateTime;

/// Target types for scalar coercion.
pub trait FromScalar: Sized {
    /// Name used in `InvalidCast` errors.
    const TYPE_NAME: &'static str;

    /// Default returned for absent values when the caller gives none.
    fn zero() -> Self;

    /// Extracts `Self` if `value` holds the matching variant.
    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident, $name:literal, $zero:expr;)*) => {
        $(
            impl FromScalar for $ty {
                const TYPE_NAME: &'static str = $name;

                fn zero() -> Self {
                    $zero
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_from_scalar! {
    String => Text, "String", String::new();
    bool => Bool, "Boolean", false;
    NaiveDateTime => Timestamp, "DateTime", NaiveDateTime::default();
    Vec<u8> => Bytes, "Binary", Vec::new();
    u8 => Byte, "Byte", 0;
    i16 => Int16, "Int16", 0;
    i32 => Int32, "Int32", 0;
    i64 => Int64, "Int64", 0;
    Decimal => Decimal, "Decimal", Decimal::default();
    f64 => Double, "Double", 0.0;
}

/// Coerces `value` to `T`, falling back to `default` (or [`FromScalar::zero`]).
pub fn coerce<T: FromScalar>(value: Option<&Value>, default: Option<T>) -> Result<T> {
    match value {
        None | Some(Value::Null) => Ok(default.unwrap_or_else(T::zero)),
        Some(value) => T::from_value(value).ok_or(DbError::InvalidCast {
            expected: T::TYPE_NAME,
            found: value.type_name(),
        }),
    }
}

/// Scalar coercion helpers available on anything that may hold a [`Value`].
pub trait ScalarExt {
    fn scalar(&self) -> Option<&Value>;

    fn db_get<T: FromScalar>(&self, default: Option<T>) -> Result<T> {
        coerce(self.scalar(), default)
    }

    fn db_string(&self, default: Option<&str>) -> Result<String> {
        self.db_get(default.map(str::to_string))
    }

    fn db_bool(&self, default: Option<bool>) -> Result<bool> {
        self.db_get(default)
    }

    fn db_timestamp(&self, default: Option<NaiveDateTime>) -> Result<NaiveDateTime> {
        self.db_get(default)
    }

    fn db_bytes(&self, default: Option<Vec<u8>>) -> Result<Vec<u8>> {
        self.db_get(default)
    }

    fn db_u8(&self, default: Option<u8>) -> Result<u8> {
        self.db_get(default)
    }

    fn db_i16(&self, default: Option<i16>) -> Result<i16> {
        self.db_get(default)
    }

    fn db_i32(&self, default: Option<i32>) -> Result<i32> {
        self.db_get(default)
    }

    fn db_i64(&self, default: Option<i64>) -> Result<i64> {
        self.db_get(default)
    }

    fn db_decimal(&self, default: Option<Decimal>) -> Result<Decimal> {
        self.db_get(default)
    }

    fn db_f64(&self, default: Option<f64>) -> Result<f64> {
        self.db_get(default)
    }
}

impl ScalarExt for Value {
    fn scalar(&self) -> Option<&Value> {
        Some(self)
    }
}

impl ScalarExt for Option<Value> {
    fn scalar(&self) -> Option<&Value> {
        self.as_ref()
    }
}

impl ScalarExt for Option<&Value> {
    fn scalar(&self) -> Option<&Value> {
        *self
    }
}
