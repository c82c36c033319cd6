//! End-to-end tests for `DbContext` over the SQLite provider
//!
//! These tests run real statements against file-backed databases created
//! in temporary directories.

#[cfg(test)]
mod tests {
    use dbcontext::config::{self, ConnectionStringSettings, ConnectionStrings};
    use dbcontext::sqlite::SqliteFactory;
    use dbcontext::{
        register_provider, CommandKind, ContextOptions, ContextState, DbContext, DbError, DbType,
        IsolationLevel, Parameter, ScalarExt, Value,
    };
    use tempfile::TempDir;

    fn temp_database() -> (TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let connection_string = format!("Data Source={}", dir.path().join("test.db").display());
        (dir, connection_string)
    }

    fn create_table(connection_string: &str) {
        let mut ctx =
            DbContext::with_provider("sqlite", connection_string, ContextOptions::new().open())
                .unwrap();
        ctx.execute_non_query_text(
            CommandKind::Text,
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)",
            &[],
        )
        .unwrap();
        ctx.dispose().unwrap();
    }

    fn count_rows(connection_string: &str) -> i64 {
        let mut ctx =
            DbContext::with_provider("sqlite", connection_string, ContextOptions::new().open())
                .unwrap();
        let count = ctx
            .execute_scalar_text(CommandKind::Text, "SELECT COUNT(*) FROM t", &[])
            .unwrap();
        count.db_i64(None).unwrap()
    }

    #[test]
    fn test_committed_insert_is_visible_to_new_context() {
        let (_dir, connection_string) = temp_database();
        register_provider("test.provider", SqliteFactory).unwrap();
        create_table(&connection_string);

        let mut ctx = DbContext::with_provider(
            "test.provider",
            &connection_string,
            ContextOptions::new().begin(IsolationLevel::ReadCommitted),
        )
        .unwrap();
        assert_eq!(ctx.state(), ContextState::InTransaction);

        let id = Parameter::new("id", DbType::Int32, 42);
        let affected = ctx
            .execute_non_query_text(CommandKind::Text, "INSERT INTO t(id) VALUES (@id)", &[id])
            .unwrap();
        assert_eq!(affected, 1);
        ctx.complete().unwrap();
        ctx.dispose().unwrap();

        let mut reader =
            DbContext::with_provider("test.provider", &connection_string, ContextOptions::new().open())
                .unwrap();
        let value = reader
            .execute_scalar_text(CommandKind::Text, "SELECT id FROM t", &[])
            .unwrap();
        assert_eq!(value, Some(Value::Int64(42)));
    }

    #[test]
    fn test_second_begin_discards_first_transaction() {
        let (_dir, connection_string) = temp_database();
        create_table(&connection_string);

        let mut ctx =
            DbContext::with_provider("sqlite", &connection_string, ContextOptions::new()).unwrap();
        ctx.begin(IsolationLevel::ReadCommitted).unwrap();
        let first = ctx.transaction().unwrap().id();
        ctx.execute_non_query_text(CommandKind::Text, "INSERT INTO t(id) VALUES (1)", &[])
            .unwrap();

        ctx.begin(IsolationLevel::Serializable).unwrap();
        let second = ctx.transaction().unwrap();
        assert_ne!(second.id(), first);
        assert_eq!(second.isolation_level(), IsolationLevel::Serializable);

        ctx.execute_non_query_text(CommandKind::Text, "INSERT INTO t(id) VALUES (2)", &[])
            .unwrap();
        ctx.complete().unwrap();
        ctx.dispose().unwrap();

        assert_eq!(count_rows(&connection_string), 1);
    }

    #[test]
    fn test_rollback_and_drop_discard_changes() {
        let (_dir, connection_string) = temp_database();
        create_table(&connection_string);

        let mut ctx = DbContext::with_provider(
            "sqlite",
            &connection_string,
            ContextOptions::new().begin(IsolationLevel::ReadCommitted),
        )
        .unwrap();
        ctx.execute_non_query_text(CommandKind::Text, "INSERT INTO t(id) VALUES (1)", &[])
            .unwrap();
        ctx.rollback().unwrap();
        assert_eq!(ctx.state(), ContextState::Connected);

        ctx.begin(IsolationLevel::ReadCommitted).unwrap();
        ctx.execute_non_query_text(CommandKind::Text, "INSERT INTO t(id) VALUES (2)", &[])
            .unwrap();
        drop(ctx);

        assert_eq!(count_rows(&connection_string), 0);
    }

    #[test]
    fn test_close_is_idempotent_and_context_reopens() {
        let (_dir, connection_string) = temp_database();
        create_table(&connection_string);

        let mut ctx =
            DbContext::with_provider("sqlite", &connection_string, ContextOptions::new().open())
                .unwrap();
        let first = ctx.connection_id().unwrap();
        ctx.close().unwrap();
        ctx.close().unwrap();
        assert_eq!(ctx.state(), ContextState::Configured);
        assert!(ctx.connection_id().is_none());

        ctx.open().unwrap();
        assert_ne!(ctx.connection_id().unwrap(), first);
        let count = ctx
            .execute_scalar_text(CommandKind::Text, "SELECT COUNT(*) FROM t", &[])
            .unwrap();
        assert_eq!(count, Some(Value::Int64(0)));
    }

    #[test]
    fn test_explicit_command_is_attached() {
        let (_dir, connection_string) = temp_database();
        create_table(&connection_string);

        let mut ctx = DbContext::with_provider(
            "sqlite",
            &connection_string,
            ContextOptions::new().begin(IsolationLevel::ReadCommitted),
        )
        .unwrap();
        let mut command = ctx
            .create_command(
                CommandKind::Text,
                "  INSERT INTO t(id, name) VALUES (@id, @name)  ",
                &[Parameter::new("id", DbType::Int64, 7i64)],
            )
            .unwrap()
            .unwrap();
        assert_eq!(command.text(), "INSERT INTO t(id, name) VALUES (@id, @name)");
        assert!(command.attachment().is_none());

        let name = Parameter::new("@NAME", DbType::String, "seven");
        ctx.execute_non_query(&mut command, &[name]).unwrap();

        let attachment = command.attachment().unwrap();
        assert_eq!(Some(attachment.connection), ctx.connection_id());
        assert_eq!(attachment.transaction, ctx.transaction().map(|t| t.id()));

        let name = ctx
            .execute_scalar_text(
                CommandKind::Text,
                "SELECT name FROM t WHERE id = @id",
                &[Parameter::new("id", DbType::Int64, 7i64)],
            )
            .unwrap();
        assert_eq!(name.db_string(None).unwrap(), "seven");
        ctx.complete().unwrap();
    }

    #[test]
    fn test_execute_requires_open_connection() {
        let (_dir, connection_string) = temp_database();
        let mut ctx =
            DbContext::with_provider("sqlite", &connection_string, ContextOptions::new()).unwrap();
        assert_eq!(ctx.state(), ContextState::Configured);
        assert!(matches!(
            ctx.execute_scalar_text(CommandKind::Text, "SELECT 1", &[]),
            Err(DbError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_driver_errors_propagate() {
        let (_dir, connection_string) = temp_database();
        let mut ctx =
            DbContext::with_provider("sqlite", &connection_string, ContextOptions::new().open())
                .unwrap();
        let result =
            ctx.execute_non_query_text(CommandKind::Text, "INSERT INTO missing VALUES (1)", &[]);
        assert!(matches!(result, Err(DbError::Driver(_))));

        let result = ctx.execute_non_query_text(CommandKind::StoredProcedure, "sp_missing", &[]);
        assert!(matches!(result, Err(DbError::NotSupported(_))));
    }

    #[test]
    fn test_placeholders_never_store_silent_nulls() {
        let (_dir, connection_string) = temp_database();
        create_table(&connection_string);

        let mut ctx =
            DbContext::with_provider("sqlite", &connection_string, ContextOptions::new().open())
                .unwrap();
        let id = || [Parameter::new("id", DbType::Int32, 42)];

        let affected = ctx
            .execute_non_query_text(CommandKind::Text, "INSERT INTO t(id) VALUES (:id)", &id())
            .unwrap();
        assert_eq!(affected, 1);

        let typo =
            ctx.execute_non_query_text(CommandKind::Text, "INSERT INTO t(id) VALUES (@idd)", &id());
        assert!(matches!(typo, Err(DbError::InvalidOperation(_))));

        let nulls = ctx
            .execute_scalar_text(CommandKind::Text, "SELECT COUNT(*) FROM t WHERE id IS NULL", &[])
            .unwrap();
        assert_eq!(nulls, Some(Value::Int64(0)));
        assert_eq!(count_rows(&connection_string), 1);
    }

    #[test]
    fn test_non_query_accepts_row_returning_statements() {
        let (_dir, connection_string) = temp_database();
        let mut ctx =
            DbContext::with_provider("sqlite", &connection_string, ContextOptions::new().open())
                .unwrap();
        assert_eq!(
            ctx.execute_non_query_text(CommandKind::Text, "SELECT 1", &[])
                .unwrap(),
            0
        );
        ctx.execute_non_query_text(CommandKind::Text, "PRAGMA journal_mode = WAL", &[])
            .unwrap();
        let mode = ctx
            .execute_scalar_text(CommandKind::Text, "PRAGMA journal_mode", &[])
            .unwrap();
        assert_eq!(mode.db_string(None).unwrap(), "wal");
    }

    #[test]
    fn test_unknown_provider_is_unavailable() {
        match DbContext::with_provider("bogus.provider", "Data Source=x.db", ContextOptions::new()) {
            Err(DbError::ProviderUnavailable { provider, .. }) => {
                assert_eq!(provider, "bogus.provider")
            }
            other => panic!("Expected ProviderUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_parameter_name_is_rejected() {
        let (_dir, connection_string) = temp_database();
        let mut ctx =
            DbContext::with_provider("sqlite", &connection_string, ContextOptions::new().open())
                .unwrap();
        let result = ctx.execute_scalar_text(
            CommandKind::Text,
            "SELECT 1",
            &[Parameter::new("   ", DbType::Int32, 1)],
        );
        match result {
            Err(e) => assert_eq!(e.argument(), Some("name")),
            Ok(v) => panic!("Expected InvalidArgument, got {:?}", v),
        }
    }

    #[test]
    fn test_contexts_from_installed_settings() {
        let (_dir, connection_string) = temp_database();
        config::install(ConnectionStrings::from(vec![
            ConnectionStringSettings::new("main", "Microsoft.Data.Sqlite", &connection_string),
            ConnectionStringSettings::new("memory", "sqlite", "Data Source=:memory:"),
        ]))
        .unwrap();

        let ctx = DbContext::new().unwrap();
        assert_eq!(ctx.provider_name(), "Microsoft.Data.Sqlite");
        assert_eq!(ctx.state(), ContextState::Configured);

        let mut memory = DbContext::from_setting("memory", ContextOptions::new().open()).unwrap();
        let value = memory
            .execute_scalar_text(CommandKind::Text, "SELECT 'ok'", &[])
            .unwrap();
        assert_eq!(value, Some(Value::Text("ok".to_string())));

        assert!(matches!(
            DbContext::from_setting("missing", ContextOptions::new()),
            Err(DbError::Configuration(_))
        ));
    }
}
