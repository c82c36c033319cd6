//! Parameter descriptors supplied by callers before a command is prepared.

use crate::core::db::value::{Decimal, Value};
use chrono::NaiveDateTime;
use std::fmt;
use uuid::Uuid;

#[cfg(test)]
use proptest_derive::Arbitrary;

/// Declared database type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum DbType {
    AnsiString,
    Binary,
    Byte,
    Boolean,
    Currency,
    Date,
    DateTime,
    Decimal,
    Double,
    Guid,
    Int16,
    Int32,
    Int64,
    Object,
    SByte,
    Single,
    #[default]
    String,
    Time,
    UInt16,
    UInt32,
    UInt64,
    VarNumeric,
    AnsiStringFixedLength,
    StringFixedLength,
    Xml,
    DateTime2,
    DateTimeOffset,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Direction of a parameter relative to the command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum Direction {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

impl Direction {
    /// Whether the parameter's value is sent to the database.
    pub fn is_input(self) -> bool {
        matches!(self, Direction::Input | Direction::InputOutput)
    }
}

/// A named, typed, directioned parameter value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameter {
    pub name: String,
    pub db_type: DbType,
    pub value: Value,
    pub direction: Direction,
}

impl Parameter {
    /// Creates an input parameter. An absent value is stored as [`Value::Null`].
    pub fn new(name: impl Into<String>, db_type: DbType, value: impl Into<ParamArg>) -> Self {
        Self::with_direction(name, db_type, value, Direction::Input)
    }

    pub fn with_direction(
        name: impl Into<String>,
        db_type: DbType,
        value: impl Into<ParamArg>,
        direction: Direction,
    ) -> Self {
        Parameter {
            name: name.into(),
            db_type,
            value: value.into().into_value(),
            direction,
        }
    }
}

/// A value handed to the binder.
///
/// Distinguishes a concrete value, an absent value and an already-built
/// parameter whose inner value should be used.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamArg {
    Absent,
    Value(Value),
    Parameter(Parameter),
}

impl ParamArg {
    /// Unwraps parameter-like arguments and maps absence to the no-value marker.
    pub fn into_value(self) -> Value {
        match self {
            ParamArg::Absent => Value::Null,
            ParamArg::Value(value) => value,
            ParamArg::Parameter(parameter) => parameter.value,
        }
    }
}

impl From<Value> for ParamArg {
    fn from(value: Value) -> Self {
        ParamArg::Value(value)
    }
}

impl From<Parameter> for ParamArg {
    fn from(parameter: Parameter) -> Self {
        ParamArg::Parameter(parameter)
    }
}

impl From<&Parameter> for ParamArg {
    fn from(parameter: &Parameter) -> Self {
        ParamArg::Parameter(parameter.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for ParamArg {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => ParamArg::Value(value.into()),
            None => ParamArg::Absent,
        }
    }
}

macro_rules! impl_from_for_param_arg {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamArg {
                fn from(value: $ty) -> Self {
                    ParamArg::Value(value.into())
                }
            }
        )*
    };
}

impl_from_for_param_arg!(
    bool,
    u8,
    i16,
    i32,
    i64,
    f64,
    Decimal,
    String,
    &str,
    Vec<u8>,
    &[u8],
    NaiveDateTime,
    Uuid,
);
