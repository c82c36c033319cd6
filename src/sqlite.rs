//! SQLite provider backed by rusqlite.
//!
//! Connection string keywords: `Data Source` (or `DataSource`, `Filename`),
//! `Mode` (`ReadWriteCreate`, `ReadWrite`, `ReadOnly`, `Memory`), `Cache`
//! (`Default`, `Private`, `Shared`), `Foreign Keys` and `Default Timeout`
//! (seconds).

use crate::core::db::command::{Command, CommandKind};
use crate::core::db::connection_string::ConnectionStringBuilder;
use crate::core::db::parameter::Parameter;
use crate::core::db::provider::{ConnectionState, DbConnection, IsolationLevel, ProviderFactory};
use crate::core::db::value::Value;
use crate::core::{DbError, Result};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{Connection, OpenFlags, ToSql};
use std::time::Duration;
use tracing::{debug, trace};

/// Identifiers the SQLite provider is registered under.
pub const PROVIDER_NAMES: [&str; 3] = ["sqlite", "System.Data.SQLite", "Microsoft.Data.Sqlite"];

const DATA_SOURCE_KEYS: [&str; 3] = ["Data Source", "DataSource", "Filename"];

/// Factory for SQLite connections and commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteFactory;

impl ProviderFactory for SqliteFactory {
    fn invariant_name(&self) -> &str {
        PROVIDER_NAMES[0]
    }

    fn create_connection(&self) -> Option<Box<dyn DbConnection>> {
        Some(Box::new(SqliteConnection::default()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    ReadWriteCreate,
    ReadWrite,
    ReadOnly,
    Memory,
}

/// Options resolved from a SQLite connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SqliteOptions {
    data_source: String,
    mode: OpenMode,
    shared_cache: bool,
    foreign_keys: Option<bool>,
    busy_timeout: Option<Duration>,
}

impl SqliteOptions {
    fn parse(connection_string: &str) -> Result<Self> {
        let builder = ConnectionStringBuilder::parse(connection_string)?;

        let data_source = builder
            .get_any(&DATA_SOURCE_KEYS)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                DbError::invalid_argument("connection_string", "'Data Source' is required")
            })?
            .to_string();

        let mode = match builder.get("Mode").map(str::to_ascii_lowercase).as_deref() {
            None | Some("readwritecreate") => OpenMode::ReadWriteCreate,
            Some("readwrite") => OpenMode::ReadWrite,
            Some("readonly") => OpenMode::ReadOnly,
            Some("memory") => OpenMode::Memory,
            Some(other) => {
                return Err(DbError::invalid_argument(
                    "connection_string",
                    format!("unknown Mode '{}'", other),
                ))
            }
        };

        let shared_cache = match builder.get("Cache").map(str::to_ascii_lowercase).as_deref() {
            None | Some("default") | Some("private") => false,
            Some("shared") => true,
            Some(other) => {
                return Err(DbError::invalid_argument(
                    "connection_string",
                    format!("unknown Cache '{}'", other),
                ))
            }
        };

        Ok(SqliteOptions {
            data_source,
            mode,
            shared_cache,
            foreign_keys: builder.get_bool("Foreign Keys")?,
            busy_timeout: builder.get_u64("Default Timeout")?.map(Duration::from_secs),
        })
    }

    fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        flags |= match self.mode {
            OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY,
            OpenMode::ReadWrite => OpenFlags::SQLITE_OPEN_READ_WRITE,
            OpenMode::ReadWriteCreate | OpenMode::Memory => {
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
            }
        };
        if self.shared_cache {
            flags |= OpenFlags::SQLITE_OPEN_SHARED_CACHE;
        }
        if self.mode == OpenMode::Memory {
            flags |= OpenFlags::SQLITE_OPEN_MEMORY;
        }
        flags
    }

    /// Path handed to sqlite3_open_v2.
    fn path(&self) -> String {
        match self.mode {
            // named in-memory databases must go through a URI to be shareable
            OpenMode::Memory if self.data_source != ":memory:" => {
                let cache = if self.shared_cache { "shared" } else { "private" };
                format!("file:{}?mode=memory&cache={}", self.data_source, cache)
            }
            _ => self.data_source.clone(),
        }
    }
}

/// A rusqlite-backed [`DbConnection`].
#[derive(Debug, Default)]
pub struct SqliteConnection {
    connection_string: String,
    conn: Option<Connection>,
}

impl SqliteConnection {
    fn connection(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| DbError::InvalidOperation("connection is not open".to_string()))
    }

    fn prepare<'c>(conn: &'c Connection, command: &Command) -> Result<rusqlite::Statement<'c>> {
        if command.kind() == CommandKind::StoredProcedure {
            return Err(DbError::NotSupported(
                "SQLite does not support stored procedures".to_string(),
            ));
        }

        let mut stmt = conn.prepare(command.text())?;
        let mut missing = Vec::new();
        for index in 1..=stmt.parameter_count() {
            let placeholder = stmt
                .parameter_name(index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("?{}", index));
            match find_parameter(command, &placeholder) {
                Some(parameter) if parameter.direction.is_input() => {
                    stmt.raw_bind_parameter(index, &parameter.value)?
                }
                Some(parameter) => {
                    trace!(parameter = %parameter.name, "output parameter left unbound")
                }
                None => missing.push(placeholder),
            }
        }

        if !missing.is_empty() {
            return Err(DbError::InvalidOperation(format!(
                "must add values for the following parameters: {}",
                missing.join(", ")
            )));
        }
        Ok(stmt)
    }
}

impl DbConnection for SqliteConnection {
    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn set_connection_string(&mut self, connection_string: &str) {
        self.connection_string = connection_string.to_string();
    }

    fn state(&self) -> ConnectionState {
        if self.conn.is_some() {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Err(DbError::InvalidOperation(
                "connection is already open".to_string(),
            ));
        }

        let options = SqliteOptions::parse(&self.connection_string)?;
        let conn = Connection::open_with_flags(options.path(), options.open_flags())?;

        if let Some(enabled) = options.foreign_keys {
            conn.pragma_update(None, "foreign_keys", enabled)?;
        }
        if let Some(timeout) = options.busy_timeout {
            conn.busy_timeout(timeout)?;
        }

        debug!(data_source = %options.data_source, mode = ?options.mode, "sqlite connection opened");
        self.conn = Some(conn);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DbError::from(e))?;
        }
        Ok(())
    }

    fn begin_transaction(&mut self, level: IsolationLevel) -> Result<()> {
        let conn = self.connection()?;
        let read_uncommitted = level == IsolationLevel::ReadUncommitted;
        conn.pragma_update(None, "read_uncommitted", read_uncommitted)?;

        let statement = match level {
            IsolationLevel::Serializable => "BEGIN IMMEDIATE",
            _ => "BEGIN DEFERRED",
        };
        conn.execute_batch(statement)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.connection()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.connection()?.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.conn
            .as_ref()
            .map(|conn| !conn.is_autocommit())
            .unwrap_or(false)
    }

    fn execute_non_query(&mut self, command: &Command) -> Result<usize> {
        let conn = self.connection()?;
        let mut stmt = Self::prepare(conn, command)?;
        if stmt.column_count() == 0 {
            return Ok(stmt.raw_execute()?);
        }

        // row-returning statements are stepped to completion and the rows discarded
        let readonly = stmt.readonly();
        let mut rows = stmt.raw_query();
        while rows.next()?.is_some() {}
        drop(rows);
        Ok(if readonly { 0 } else { conn.changes() as usize })
    }

    fn execute_scalar(&mut self, command: &Command) -> Result<Option<Value>> {
        let conn = self.connection()?;
        let mut stmt = Self::prepare(conn, command)?;
        if stmt.column_count() == 0 {
            stmt.raw_execute()?;
            return Ok(None);
        }

        let mut rows = stmt.raw_query();
        match rows.next()? {
            Some(row) => Ok(Some(from_value_ref(row.get_ref(0)?))),
            None => Ok(None),
        }
    }
}

// SQLite accepts `@name`, `:name` and `$name` for the same placeholder
fn placeholder_body(name: &str) -> &str {
    name.strip_prefix(&['@', ':', '$'][..]).unwrap_or(name)
}

fn find_parameter<'a>(command: &'a Command, placeholder: &str) -> Option<&'a Parameter> {
    let body = placeholder_body(placeholder);
    command
        .parameters()
        .iter()
        .find(|parameter| placeholder_body(&parameter.name).eq_ignore_ascii_case(body))
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(v) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*v))),
            Value::Byte(v) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*v))),
            Value::Int16(v) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*v))),
            Value::Int32(v) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*v))),
            Value::Int64(v) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*v)),
            Value::Double(v) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*v)),
            Value::Decimal(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_str().as_bytes())),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            Value::Timestamp(v) => ToSqlOutput::Owned(rusqlite::types::Value::Text(
                v.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            )),
            Value::Guid(v) => ToSqlOutput::Owned(rusqlite::types::Value::Text(v.to_string())),
        })
    }
}
