//! Error types for dbcontext.
//!
//! Validation problems raised by this crate get their own variants. Errors
//! produced by a database driver are carried through untouched in
//! [`DbError::Driver`] so callers can still downcast to the driver's type.
use thiserror::Error;

/// Boxed driver error, as returned by provider implementations.
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for every fallible operation in the crate.
#[derive(Error, Debug)]
pub enum DbError {
    /// A required input was missing or empty
    #[error("Invalid argument `{argument}`: {message}")]
    InvalidArgument {
        argument: &'static str,
        message: String,
    },

    /// No matching or no available connection-string entry
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider could not be located or failed its availability probe
    #[error("Database provider [{provider}] is not available: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// Scalar coercion found a different runtime type than requested
    #[error("Invalid cast from {found} to {expected}")]
    InvalidCast {
        expected: &'static str,
        found: &'static str,
    },

    /// The operation is not valid in the current connection state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The provider does not implement the requested feature
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Errors raised by the underlying driver, passed through unchanged
    #[error(transparent)]
    Driver(DriverError),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file parse errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl DbError {
    /// Shorthand for an [`DbError::InvalidArgument`] that names the argument.
    pub fn invalid_argument(argument: &'static str, message: impl Into<String>) -> Self {
        DbError::InvalidArgument {
            argument,
            message: message.into(),
        }
    }

    pub fn provider_unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        DbError::ProviderUnavailable {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Wraps any driver-level error without translating it.
    pub fn driver<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DbError::Driver(Box::new(error))
    }

    /// Name of the offending argument for [`DbError::InvalidArgument`].
    pub fn argument(&self) -> Option<&'static str> {
        match self {
            DbError::InvalidArgument { argument, .. } => Some(*argument),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(error: rusqlite::Error) -> Self {
        DbError::driver(error)
    }
}

/// Type alias for Result to use DbError as the error type.
pub type Result<T> = std::result::Result<T, DbError>;
