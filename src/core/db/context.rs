//! Database Context Module
//!
//! [`DbContext`] owns one provider connection and at most one transaction.
//!
//! ## Lifecycle
//!
//! ```text
//! Configured --open--> Connected --begin--> InTransaction
//!     ^                    |  ^                 |
//!     +------close---------+  +--complete/rollback
//! ```
//!
//! Every release path (`close`, `dispose`, drop) releases the transaction
//! before the connection and may be repeated safely. `dispose` consumes the
//! context, so nothing can be called on it afterwards.

use crate::config::ConnectionStrings;
use crate::core::db::command::{Attachment, Command, CommandKind};
use crate::core::db::parameter::Parameter;
use crate::core::db::provider::{
    registry_snapshot, ConnectionState, DbConnection, IsolationLevel, ProviderFactory,
    ProviderRegistry,
};
use crate::core::db::value::Value;
use crate::core::{DbError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Flags applied when a context is constructed.
///
/// `begin` only takes effect together with `open`; [`ContextOptions::begin`]
/// sets both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextOptions {
    pub open: bool,
    pub begin: bool,
    pub isolation_level: IsolationLevel,
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the connection during construction.
    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    /// Open the connection and start a transaction at `level` during construction.
    pub fn begin(mut self, level: IsolationLevel) -> Self {
        self.open = true;
        self.begin = true;
        self.isolation_level = level;
        self
    }
}

/// Observable lifecycle state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Configured, no open connection
    Configured,
    /// Connection open, no transaction
    Connected,
    /// Connection open with an active transaction
    InTransaction,
}

/// Transaction currently owned by a context.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: Uuid,
    isolation_level: IsolationLevel,
    started_at: DateTime<Utc>,
}

impl Transaction {
    fn new(isolation_level: IsolationLevel) -> Self {
        Transaction {
            id: Uuid::new_v4(),
            isolation_level,
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

struct ConnectionSlot {
    id: Uuid,
    handle: Box<dyn DbConnection>,
}

/// Database access context over a single provider connection.
pub struct DbContext {
    factory: Arc<dyn ProviderFactory>,
    provider_name: String,
    connection_string: String,
    connection: Option<ConnectionSlot>,
    transaction: Option<Transaction>,
}

impl fmt::Debug for DbContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbContext")
            .field("provider_name", &self.provider_name)
            .field("state", &self.state())
            .field("connection", &self.connection.as_ref().map(|c| c.id))
            .field("transaction", &self.transaction)
            .finish()
    }
}

impl DbContext {
    /// Configures a context from the first configured connection string.
    pub fn new() -> Result<Self> {
        Self::with_options(ContextOptions::default())
    }

    /// Configures a context from the first configured connection string,
    /// applying `options`.
    pub fn with_options(options: ContextOptions) -> Result<Self> {
        Self::from_setting("", options)
    }

    /// Configures a context from the named connection string, or the first
    /// one when `name` is blank.
    pub fn from_setting(name: &str, options: ContextOptions) -> Result<Self> {
        let settings = crate::config::connection_strings()?;
        let registry = registry_snapshot()?;
        Self::from_settings(&settings, &registry, name, options)
    }

    /// Configures a context for an explicit provider and connection string.
    pub fn with_provider(
        provider_name: &str,
        connection_string: &str,
        options: ContextOptions,
    ) -> Result<Self> {
        let registry = registry_snapshot()?;
        Self::configure(&registry, provider_name, connection_string, options)
    }

    /// Like [`DbContext::from_setting`], against explicit settings and registry.
    pub fn from_settings(
        settings: &ConnectionStrings,
        registry: &ProviderRegistry,
        name: &str,
        options: ContextOptions,
    ) -> Result<Self> {
        let setting_name = name.trim();
        let entry = if setting_name.is_empty() {
            settings.first().ok_or_else(|| {
                DbError::Configuration("no connection strings are configured".to_string())
            })?
        } else {
            settings.get(setting_name).ok_or_else(|| {
                DbError::Configuration(format!(
                    "connection string [{}] does not exist in the configured connection strings",
                    setting_name
                ))
            })?
        };

        debug!(setting = %entry.name, "resolved connection string setting");
        Self::configure(
            registry,
            &entry.provider_name,
            &entry.connection_string,
            options,
        )
    }

    /// Like [`DbContext::with_provider`], against an explicit registry.
    pub fn configure(
        registry: &ProviderRegistry,
        provider_name: &str,
        connection_string: &str,
        options: ContextOptions,
    ) -> Result<Self> {
        let provider_name = provider_name.trim();
        if provider_name.is_empty() {
            return Err(DbError::invalid_argument(
                "provider_name",
                "database provider name is required",
            ));
        }

        let connection_string = connection_string.trim();
        if connection_string.is_empty() {
            return Err(DbError::invalid_argument(
                "connection_string",
                "connection string is required",
            ));
        }

        let factory = registry.resolve(provider_name)?;
        info!(provider = provider_name, "database context configured");

        let mut context = DbContext {
            factory,
            provider_name: provider_name.to_string(),
            connection_string: connection_string.to_string(),
            connection: None,
            transaction: None,
        };

        if options.open {
            if options.begin {
                context.begin(options.isolation_level)?;
            } else {
                context.open()?;
            }
        }
        Ok(context)
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    /// Identifier of the current connection handle, if one exists.
    pub fn connection_id(&self) -> Option<Uuid> {
        self.connection.as_ref().map(|slot| slot.id)
    }

    /// True unless the connection is missing or closed. A broken connection
    /// still counts; `close()` it before opening again.
    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .map(|slot| slot.handle.state() != ConnectionState::Closed)
            .unwrap_or(false)
    }

    pub fn state(&self) -> ContextState {
        match (self.is_connected(), self.transaction.is_some()) {
            (true, true) => ContextState::InTransaction,
            (true, false) => ContextState::Connected,
            (false, _) => ContextState::Configured,
        }
    }

    /// Opens the connection. Does nothing if it is already open.
    pub fn open(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        // drop whatever is left of a closed or failed connection
        self.close()?;

        let mut handle = self.factory.create_connection().ok_or_else(|| {
            DbError::provider_unavailable(
                &self.provider_name,
                "the provider could not create a connection",
            )
        })?;
        handle.set_connection_string(&self.connection_string);
        handle.open()?;

        let id = Uuid::new_v4();
        debug!(provider = %self.provider_name, connection = %id, "connection opened");
        self.connection = Some(ConnectionSlot { id, handle });
        Ok(())
    }

    /// Starts a transaction, discarding (never committing) any current one.
    pub fn begin(&mut self, level: IsolationLevel) -> Result<()> {
        self.open()?;
        self.rollback()?;

        let slot = self
            .connection
            .as_mut()
            .ok_or_else(|| DbError::InvalidOperation("connection is not open".to_string()))?;
        slot.handle.begin_transaction(level)?;

        let transaction = Transaction::new(level);
        info!(transaction = %transaction.id, %level, "transaction started");
        self.transaction = Some(transaction);
        Ok(())
    }

    /// Commits the active transaction if its connection is still open, then
    /// releases it.
    pub fn complete(&mut self) -> Result<()> {
        let Some(transaction) = self.transaction.take() else {
            return Ok(());
        };

        let committed = match self.connection.as_mut() {
            Some(slot) if slot.handle.state() == ConnectionState::Open => {
                slot.handle.commit().map(|_| true)
            }
            _ => Ok(false),
        };
        match &committed {
            Ok(true) => info!(transaction = %transaction.id, "transaction committed"),
            Ok(false) => warn!(transaction = %transaction.id, "connection closed before commit"),
            Err(e) => warn!(transaction = %transaction.id, error = %e, "commit failed"),
        }

        let released = self.release_driver_transaction();
        committed.map(|_| ()).and(released)
    }

    /// Releases the active transaction without committing it.
    pub fn rollback(&mut self) -> Result<()> {
        let Some(transaction) = self.transaction.take() else {
            return Ok(());
        };
        info!(transaction = %transaction.id, "transaction rolled back");
        self.release_driver_transaction()
    }

    /// Releases the transaction, then the connection. Safe in any state.
    pub fn close(&mut self) -> Result<()> {
        let transaction = self.rollback();
        let connection = self.release_connection();
        transaction.and(connection)
    }

    /// Releases everything and ends the context.
    pub fn dispose(mut self) -> Result<()> {
        let result = self.close();
        self.provider_name.clear();
        self.connection_string.clear();
        result
    }

    fn release_driver_transaction(&mut self) -> Result<()> {
        match self.connection.as_mut() {
            Some(slot)
                if slot.handle.state() == ConnectionState::Open && slot.handle.in_transaction() =>
            {
                slot.handle.rollback()
            }
            _ => Ok(()),
        }
    }

    fn release_connection(&mut self) -> Result<()> {
        let Some(mut slot) = self.connection.take() else {
            return Ok(());
        };
        if slot.handle.state() != ConnectionState::Closed {
            slot.handle.close()?;
        }
        debug!(connection = %slot.id, "connection closed");
        Ok(())
    }

    /// Builds an unattached command with trimmed text and bound parameters.
    ///
    /// Returns `Ok(None)` when the provider cannot produce a command.
    pub fn create_command(
        &self,
        kind: CommandKind,
        command_text: &str,
        parameters: &[Parameter],
    ) -> Result<Option<Command>> {
        let Some(mut command) = self.factory.create_command() else {
            warn!(provider = %self.provider_name, "provider returned no command");
            return Ok(None);
        };
        command.set_kind(kind);
        command.set_text(command_text.trim());
        command.add_parameters(parameters)?;
        Ok(Some(command))
    }

    // binds the extra parameters and associates the command with this
    // context's connection and transaction
    fn link(
        &mut self,
        command: &mut Command,
        parameters: &[Parameter],
    ) -> Result<&mut Box<dyn DbConnection>> {
        command.add_parameters(parameters)?;

        let transaction = self.transaction.as_ref().map(Transaction::id);
        let slot = match self.connection.as_mut() {
            Some(slot) if slot.handle.state() == ConnectionState::Open => slot,
            _ => {
                return Err(DbError::InvalidOperation(
                    "connection is not open; call open() or begin() first".to_string(),
                ))
            }
        };

        command.attach(Attachment {
            connection: slot.id,
            transaction,
        });
        trace!(connection = %slot.id, sql = command.text(), "executing command");
        Ok(&mut slot.handle)
    }

    /// Executes `command` on this context and returns the affected row count.
    ///
    /// The command is attached to this context's connection and transaction.
    pub fn execute_non_query(
        &mut self,
        command: &mut Command,
        parameters: &[Parameter],
    ) -> Result<usize> {
        let connection = self.link(command, parameters)?;
        connection.execute_non_query(command)
    }

    /// Executes `command` on this context and returns the first column of the
    /// first row, `None` if there was no row.
    pub fn execute_scalar(
        &mut self,
        command: &mut Command,
        parameters: &[Parameter],
    ) -> Result<Option<Value>> {
        let connection = self.link(command, parameters)?;
        connection.execute_scalar(command)
    }

    fn scoped_command(
        &self,
        kind: CommandKind,
        command_text: &str,
        parameters: &[Parameter],
    ) -> Result<Command> {
        self.create_command(kind, command_text, parameters)?
            .ok_or_else(|| {
                DbError::provider_unavailable(
                    &self.provider_name,
                    "the provider could not create a command",
                )
            })
    }

    /// Builds, executes and releases a command in one call.
    pub fn execute_non_query_text(
        &mut self,
        kind: CommandKind,
        command_text: &str,
        parameters: &[Parameter],
    ) -> Result<usize> {
        let mut command = self.scoped_command(kind, command_text, parameters)?;
        self.execute_non_query(&mut command, &[])
    }

    /// Builds, executes and releases a command in one call.
    pub fn execute_scalar_text(
        &mut self,
        kind: CommandKind,
        command_text: &str,
        parameters: &[Parameter],
    ) -> Result<Option<Value>> {
        let mut command = self.scoped_command(kind, command_text, parameters)?;
        self.execute_scalar(&mut command, &[])
    }
}

impl Drop for DbContext {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(provider = %self.provider_name, error = %e, "failed to release database context");
        }
    }
}
