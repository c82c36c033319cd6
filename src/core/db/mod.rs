/// Database Module
///
/// This module provides the database access layer, organized into focused
/// submodules.
///
/// ## Architecture
///
/// - **Values** (`value.rs`): the tagged value model and the no-value marker
/// - **Parameters** (`parameter.rs`): named, typed, directioned parameter values
/// - **Commands** (`command.rs`): command text plus its bound parameter collection
/// - **Binding** (`binder.rs`): name normalization and value coercion onto commands
/// - **Scalar Coercion** (`scalar.rs`): typed extraction of returned values
/// - **Providers** (`provider.rs`): the driver boundary and the provider registry
/// - **Connection Strings** (`connection_string.rs`): `key=value;` parsing
/// - **Context** (`context.rs`): connection and transaction lifecycle
///
/// ## Error Handling
///
/// All database operations use the standardized `DbError` type for consistent error propagation.
pub mod binder;
pub mod command;
pub mod connection_string;
pub mod context;
pub mod parameter;
pub mod provider;
pub mod scalar;
pub mod value;

pub use binder::normalize_name;
pub use command::{Attachment, Command, CommandKind, ParameterCollection};
pub use connection_string::ConnectionStringBuilder;
pub use context::{ContextOptions, ContextState, DbContext, Transaction};
pub use parameter::{DbType, Direction, ParamArg, Parameter};
pub use provider::{
    provider_factory, register_provider, ConnectionState, DbConnection, IsolationLevel,
    ProviderFactory, ProviderRegistry,
};
pub use scalar::{coerce, FromScalar, ScalarExt};
pub use value::{Decimal, Value};
