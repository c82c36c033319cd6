//! Provider Boundary Module
//!
//! Drivers plug in by implementing [`ProviderFactory`] and [`DbConnection`].
//! Factories are looked up by provider identifier in a [`ProviderRegistry`];
//! a process-wide registry pre-populated with the SQLite provider backs the
//! convenience constructors on `DbContext`.

use crate::core::db::command::Command;
use crate::core::db::connection_string::ConnectionStringBuilder;
use crate::core::db::parameter::Parameter;
use crate::core::db::value::Value;
use crate::core::{DbError, Result};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// State of a driver connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Closed,
    Open,
    /// The connection failed and must be closed before reuse
    Broken,
}

/// Concurrency-control strength requested for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    Unspecified,
    Chaos,
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A live driver connection.
///
/// A connection owns at most one transaction at a time; commands executed
/// while a transaction is active run inside it.
pub trait DbConnection: Send {
    fn connection_string(&self) -> &str;

    fn set_connection_string(&mut self, connection_string: &str);

    fn state(&self) -> ConnectionState;

    fn open(&mut self) -> Result<()>;

    /// Closes the connection. Closing a closed connection is a no-op.
    fn close(&mut self) -> Result<()>;

    fn begin_transaction(&mut self, level: IsolationLevel) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn in_transaction(&self) -> bool;

    /// Executes `command` and returns the number of affected rows.
    fn execute_non_query(&mut self, command: &Command) -> Result<usize>;

    /// Executes `command` and returns the first column of the first row, or
    /// `None` when no row was produced.
    fn execute_scalar(&mut self, command: &Command) -> Result<Option<Value>>;
}

/// Factory for the objects of one provider.
pub trait ProviderFactory: Send + Sync {
    /// Identifier the provider is registered under by default.
    fn invariant_name(&self) -> &str;

    /// Prefix required before bound parameter names.
    fn parameter_marker(&self) -> &str {
        "@"
    }

    fn create_connection(&self) -> Option<Box<dyn DbConnection>>;

    fn create_command(&self) -> Option<Command> {
        Some(Command::new(self.parameter_marker()).with_parameter_template(self.create_parameter()))
    }

    /// Blank parameter the binder starts from when it adds a new name.
    fn create_parameter(&self) -> Parameter {
        Parameter::default()
    }

    /// Also serves as the availability probe when a context is configured.
    fn create_connection_string_builder(&self) -> Option<ConnectionStringBuilder> {
        Some(ConnectionStringBuilder::new())
    }
}

/// Provider factories keyed by provider identifier.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, Arc<dyn ProviderFactory>>,
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the providers shipped with the crate.
    pub fn with_builtin_providers() -> Self {
        let mut registry = Self::new();
        let sqlite: Arc<dyn ProviderFactory> = Arc::new(crate::sqlite::SqliteFactory);
        for name in crate::sqlite::PROVIDER_NAMES {
            registry.register_arc(name, Arc::clone(&sqlite));
        }
        registry
    }

    /// Registers `factory` under `name`, replacing any previous entry.
    pub fn register<F: ProviderFactory + 'static>(&mut self, name: &str, factory: F) {
        self.register_arc(name, Arc::new(factory));
    }

    pub fn register_arc(&mut self, name: &str, factory: Arc<dyn ProviderFactory>) {
        debug!(provider = name.trim(), "registering provider factory");
        self.factories.insert(name.trim().to_string(), factory);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderFactory>> {
        self.factories.get(name.trim()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name.trim())
    }

    /// Registered identifiers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Looks up `name` and runs the availability probe.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderFactory>> {
        let factory = self.get(name).ok_or_else(|| {
            DbError::provider_unavailable(name, "no factory is registered under this name")
        })?;
        if factory.create_connection_string_builder().is_none() {
            return Err(DbError::provider_unavailable(
                name,
                "the provider could not construct a connection string builder",
            ));
        }
        Ok(factory)
    }
}

static REGISTRY: OnceCell<RwLock<ProviderRegistry>> = OnceCell::new();

fn global_registry() -> &'static RwLock<ProviderRegistry> {
    REGISTRY.get_or_init(|| RwLock::new(ProviderRegistry::with_builtin_providers()))
}

/// Registers a provider in the process-wide registry.
pub fn register_provider<F: ProviderFactory + 'static>(name: &str, factory: F) -> Result<()> {
    let mut registry = global_registry()
        .write()
        .map_err(|_| DbError::InvalidOperation("provider registry lock is poisoned".to_string()))?;
    registry.register(name, factory);
    Ok(())
}

/// Looks up a provider in the process-wide registry.
pub fn provider_factory(name: &str) -> Option<Arc<dyn ProviderFactory>> {
    global_registry().read().ok()?.get(name)
}

/// Snapshot of the process-wide registry.
pub(crate) fn registry_snapshot() -> Result<ProviderRegistry> {
    global_registry()
        .read()
        .map(|registry| registry.clone())
        .map_err(|_| DbError::InvalidOperation("provider registry lock is poisoned".to_string()))
}
