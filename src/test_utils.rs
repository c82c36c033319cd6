/// # Test Utilities Module
///
/// Shared fixtures for the unit tests:
/// - a recording in-process provider (`FakeFactory`) for lifecycle tests
/// - file-backed SQLite fixtures with automatic cleanup
/// - `DbError` assertion macros

use crate::core::db::command::Command;
use crate::core::db::provider::{ConnectionState, DbConnection, IsolationLevel, ProviderFactory};
use crate::core::db::value::Value;
use crate::core::{DbError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Failure switches for the fake provider
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeBehavior {
    pub fail_open: bool,
    pub fail_commit: bool,
    pub fail_execute: bool,
    pub no_connection: bool,
    pub no_command: bool,
}

#[derive(Debug, Default)]
struct FakeShared {
    events: Mutex<Vec<String>>,
    connections: Mutex<Vec<Arc<FakeLink>>>,
}

#[derive(Debug, Default)]
struct FakeLink {
    open: AtomicBool,
    broken: AtomicBool,
}

impl FakeShared {
    fn record(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.into());
        }
    }
}

/// Provider that records every driver call in a shared event log.
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    behavior: FakeBehavior,
    shared: Arc<FakeShared>,
}

impl FakeFactory {
    pub fn with_behavior(behavior: FakeBehavior) -> Self {
        FakeFactory {
            behavior,
            shared: Arc::default(),
        }
    }

    /// Driver calls in order, e.g. `open`, `begin ReadCommitted`, `commit`.
    pub fn events(&self) -> Vec<String> {
        self.shared.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Simulates the server dropping every connection created so far.
    pub fn close_all(&self) {
        if let Ok(connections) = self.shared.connections.lock() {
            for link in connections.iter() {
                link.open.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Marks every connection created so far as broken.
    pub fn break_all(&self) {
        if let Ok(connections) = self.shared.connections.lock() {
            for link in connections.iter() {
                link.broken.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[derive(Debug)]
struct FakeDriverError(&'static str);

impl std::fmt::Display for FakeDriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for FakeDriverError {}

struct FakeConnection {
    behavior: FakeBehavior,
    shared: Arc<FakeShared>,
    connection_string: String,
    link: Arc<FakeLink>,
    in_transaction: bool,
}

impl FakeConnection {
    fn is_open(&self) -> bool {
        self.link.open.load(Ordering::SeqCst)
    }
}

impl DbConnection for FakeConnection {
    fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn set_connection_string(&mut self, connection_string: &str) {
        self.shared.record(format!("set {}", connection_string));
        self.connection_string = connection_string.to_string();
    }

    fn state(&self) -> ConnectionState {
        match (self.is_open(), self.link.broken.load(Ordering::SeqCst)) {
            (false, _) => ConnectionState::Closed,
            (true, true) => ConnectionState::Broken,
            (true, false) => ConnectionState::Open,
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.behavior.fail_open {
            return Err(DbError::driver(FakeDriverError("server unreachable")));
        }
        self.shared.record("open");
        self.link.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.shared.record("close");
        self.link.open.store(false, Ordering::SeqCst);
        self.in_transaction = false;
        Ok(())
    }

    fn begin_transaction(&mut self, level: IsolationLevel) -> Result<()> {
        self.shared.record(format!("begin {}", level));
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.behavior.fail_commit {
            return Err(DbError::driver(FakeDriverError("commit conflict")));
        }
        self.shared.record("commit");
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.shared.record("rollback");
        self.in_transaction = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction && self.is_open()
    }

    fn execute_non_query(&mut self, command: &Command) -> Result<usize> {
        if self.behavior.fail_execute {
            return Err(DbError::driver(FakeDriverError("constraint violation")));
        }
        self.shared.record(format!("execute {}", command.text()));
        Ok(0)
    }

    fn execute_scalar(&mut self, command: &Command) -> Result<Option<Value>> {
        self.execute_non_query(command).map(|_| None)
    }
}

impl ProviderFactory for FakeFactory {
    fn invariant_name(&self) -> &str {
        "fake"
    }

    fn create_connection(&self) -> Option<Box<dyn DbConnection>> {
        if self.behavior.no_connection {
            return None;
        }
        let link = Arc::new(FakeLink::default());
        if let Ok(mut connections) = self.shared.connections.lock() {
            connections.push(Arc::clone(&link));
        }
        Some(Box::new(FakeConnection {
            behavior: self.behavior,
            shared: Arc::clone(&self.shared),
            connection_string: String::new(),
            link,
            in_transaction: false,
        }))
    }

    fn create_command(&self) -> Option<Command> {
        if self.behavior.no_command {
            None
        } else {
            Some(
                Command::new(self.parameter_marker())
                    .with_parameter_template(self.create_parameter()),
            )
        }
    }
}

/// Isolated file-backed SQLite database, removed when dropped.
pub struct SqliteFixture {
    _dir: TempDir,
    pub path: std::path::PathBuf,
}

impl SqliteFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("fixture.db");
        SqliteFixture { _dir: dir, path }
    }

    pub fn connection_string(&self) -> String {
        format!("Data Source={}", self.path.display())
    }
}

#[macro_export]
macro_rules! assert_db_error {
    ($result:expr, $expected:pat, $context:expr) => {
        match $result {
            Err($expected) => {}
            Ok(_) => panic!("Expected {} but got Ok in {}", stringify!($expected), $context),
            Err(other) => panic!(
                "Expected {} but got {:?} in {}",
                stringify!($expected),
                other,
                $context
            ),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_records_events() {
        let factory = FakeFactory::default();
        let mut conn = factory.create_connection().unwrap();
        conn.set_connection_string("a=b");
        conn.open().unwrap();
        conn.begin_transaction(IsolationLevel::Snapshot).unwrap();
        assert!(conn.in_transaction());

        factory.close_all();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert!(!conn.in_transaction());
        assert_eq!(factory.events(), vec!["set a=b", "open", "begin Snapshot"]);
    }

    #[test]
    fn test_fake_broken_state() {
        let factory = FakeFactory::default();
        let mut conn = factory.create_connection().unwrap();
        conn.open().unwrap();
        factory.break_all();
        assert_eq!(conn.state(), ConnectionState::Broken);
        conn.close().unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[test]
    fn test_fake_failures() {
        let factory = FakeFactory::with_behavior(FakeBehavior {
            fail_open: true,
            ..FakeBehavior::default()
        });
        let mut conn = factory.create_connection().unwrap();
        assert_db_error!(conn.open(), DbError::Driver(_), "fake open");
    }

    #[test]
    fn test_sqlite_fixture_path() {
        let fixture = SqliteFixture::new();
        assert!(fixture.connection_string().starts_with("Data Source="));
        assert!(fixture.connection_string().ends_with("fixture.db"));
    }
}
