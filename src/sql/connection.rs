use std::path::PathBuf;

use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, ConnectOptions, Connection as _, Row, TypeInfo};
use tracing::debug;

use super::query::QueryResult;
use crate::error::{AgentError, AgentResult};

/// The database engines the agent can talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// Embedded file-based engine
    Sqlite,
    /// Client/server engine
    MySql,
    /// Client/server engine
    Postgres,
}

impl DatabaseKind {
    /// Human-readable dialect name, embedded in the generation prompt
    pub fn dialect_name(&self) -> &'static str {
        match self {
            DatabaseKind::Sqlite => "SQLite",
            DatabaseKind::MySql => "MySQL",
            DatabaseKind::Postgres => "PostgreSQL",
        }
    }
}

/// Host and credential fields required by the client/server engines
#[derive(Debug, Clone)]
pub struct ServerParams {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Identifies which engine and instance to connect to
///
/// The variant carries exactly the fields its engine requires, so a config
/// can never name one engine while holding another engine's fields.
/// Immutable once a connection has been opened from it.
#[derive(Debug, Clone)]
pub enum ConnectionConfig {
    /// Embedded database file; `None` opens an in-memory database
    Sqlite { path: Option<PathBuf> },
    MySql(ServerParams),
    Postgres(ServerParams),
}

impl ConnectionConfig {
    pub fn kind(&self) -> DatabaseKind {
        match self {
            ConnectionConfig::Sqlite { .. } => DatabaseKind::Sqlite,
            ConnectionConfig::MySql(_) => DatabaseKind::MySql,
            ConnectionConfig::Postgres(_) => DatabaseKind::Postgres,
        }
    }
}

/// A live connection to one database
///
/// One connection is live per session. After `open`, callers interact only
/// through `execute`, `kind` and `close` -- no engine-specific branching
/// leaks past this module.
pub enum DbConnection {
    Sqlite {
        path: PathBuf,
        conn: rusqlite::Connection,
    },
    MySql {
        label: String,
        conn: MySqlConnection,
    },
    Postgres {
        label: String,
        conn: PgConnection,
    },
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("label", &self.label())
            .finish()
    }
}

impl DbConnection {
    /// Open a new database connection
    pub async fn open(config: &ConnectionConfig) -> AgentResult<Self> {
        match config {
            ConnectionConfig::Sqlite { path: Some(path) } => {
                debug!("Opening database connection to {}", path.display());

                let conn = rusqlite::Connection::open(path).map_err(|e| {
                    AgentError::connection(format!("{}: {}", path.display(), e))
                })?;

                Ok(Self::Sqlite {
                    path: path.clone(),
                    conn,
                })
            }
            ConnectionConfig::Sqlite { path: None } => {
                debug!("Opening in-memory database connection");

                let conn = rusqlite::Connection::open_in_memory()
                    .map_err(|e| AgentError::connection(e.to_string()))?;

                Ok(Self::Sqlite {
                    path: PathBuf::from(":memory:"),
                    conn,
                })
            }
            ConnectionConfig::MySql(params) => {
                let label = format!(
                    "mysql://{}@{}:{}/{}",
                    params.user, params.host, params.port, params.database
                );
                debug!("Opening connection to {}", label);

                let opts = MySqlConnectOptions::new()
                    .host(&params.host)
                    .port(params.port)
                    .username(&params.user)
                    .password(&params.password)
                    .database(&params.database);

                let conn = opts
                    .connect()
                    .await
                    .map_err(|e| AgentError::connection(e.to_string()))?;

                Ok(Self::MySql { label, conn })
            }
            ConnectionConfig::Postgres(params) => {
                let label = format!(
                    "postgres://{}@{}:{}/{}",
                    params.user, params.host, params.port, params.database
                );
                debug!("Opening connection to {}", label);

                let opts = PgConnectOptions::new()
                    .host(&params.host)
                    .port(params.port)
                    .username(&params.user)
                    .password(&params.password)
                    .database(&params.database);

                let conn = opts
                    .connect()
                    .await
                    .map_err(|e| AgentError::connection(e.to_string()))?;

                Ok(Self::Postgres { label, conn })
            }
        }
    }

    /// Which engine this connection talks to
    pub fn kind(&self) -> DatabaseKind {
        match self {
            DbConnection::Sqlite { .. } => DatabaseKind::Sqlite,
            DbConnection::MySql { .. } => DatabaseKind::MySql,
            DbConnection::Postgres { .. } => DatabaseKind::Postgres,
        }
    }

    /// Dialect name of the connected engine
    pub fn dialect_name(&self) -> &'static str {
        self.kind().dialect_name()
    }

    /// Short description of the connected instance, for display
    pub fn label(&self) -> String {
        match self {
            DbConnection::Sqlite { path, .. } => format!("sqlite:{}", path.display()),
            DbConnection::MySql { label, .. } => label.clone(),
            DbConnection::Postgres { label, .. } => label.clone(),
        }
    }

    /// Execute a single SQL statement and normalize the result
    ///
    /// Statements that return no rows (DDL, DML) yield an empty result.
    /// Driver failures carry the backend's message unmodified.
    pub async fn execute(&mut self, sql: &str) -> AgentResult<QueryResult> {
        debug!("Executing SQL: {}", sql);

        match self {
            DbConnection::Sqlite { conn, .. } => execute_sqlite(conn, sql),
            DbConnection::MySql { conn, .. } => {
                let rows = sqlx::query(sql)
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| AgentError::execution(e.to_string()))?;
                Ok(mysql_rows_to_result(&rows))
            }
            DbConnection::Postgres { conn, .. } => {
                let rows = sqlx::query(sql)
                    .fetch_all(&mut *conn)
                    .await
                    .map_err(|e| AgentError::execution(e.to_string()))?;
                Ok(pg_rows_to_result(&rows))
            }
        }
    }

    /// Verify the connection is usable
    pub async fn ping(&mut self) -> AgentResult<()> {
        let result = self
            .execute("SELECT 1")
            .await
            .map_err(|e| AgentError::connection(e.to_string()))?;

        if result.row_count == 1 {
            Ok(())
        } else {
            Err(AgentError::connection(
                "connection test returned no rows".to_string(),
            ))
        }
    }

    /// Close the database connection
    pub async fn close(self) -> AgentResult<()> {
        debug!("Closing database connection to {}", self.label());

        match self {
            DbConnection::Sqlite { conn, .. } => conn
                .close()
                .map_err(|(_, e)| AgentError::connection(e.to_string())),
            DbConnection::MySql { conn, .. } => conn
                .close()
                .await
                .map_err(|e| AgentError::connection(e.to_string())),
            DbConnection::Postgres { conn, .. } => conn
                .close()
                .await
                .map_err(|e| AgentError::connection(e.to_string())),
        }
    }
}

fn execute_sqlite(conn: &rusqlite::Connection, sql: &str) -> AgentResult<QueryResult> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AgentError::execution(e.to_string()))?;

    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let column_count = columns.len();

    let mut rows = stmt
        .query([])
        .map_err(|e| AgentError::execution(e.to_string()))?;

    let mut results = Vec::new();

    loop {
        let row = match rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(e) => return Err(AgentError::execution(e.to_string())),
        };

        let mut row_data = Vec::with_capacity(column_count);

        for i in 0..column_count {
            let value = match row
                .get_ref(i)
                .map_err(|e| AgentError::execution(e.to_string()))?
            {
                rusqlite::types::ValueRef::Null => "NULL".to_string(),
                rusqlite::types::ValueRef::Integer(n) => n.to_string(),
                rusqlite::types::ValueRef::Real(f) => f.to_string(),
                rusqlite::types::ValueRef::Text(s) => String::from_utf8_lossy(s).to_string(),
                rusqlite::types::ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
            };

            row_data.push(value);
        }

        results.push(row_data);
    }

    Ok(QueryResult::new(columns, results))
}

fn pg_rows_to_result(rows: &[PgRow]) -> QueryResult {
    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let data = rows
        .iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|i| decode_pg_value(row, i))
                .collect()
        })
        .collect();

    QueryResult::new(columns, data)
}

fn mysql_rows_to_result(rows: &[MySqlRow]) -> QueryResult {
    let columns: Vec<String> = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let data = rows
        .iter()
        .map(|row| {
            (0..row.columns().len())
                .map(|i| decode_mysql_value(row, i))
                .collect()
        })
        .collect();

    QueryResult::new(columns, data)
}

// Decode one Postgres cell into its display string. Decoding is driven by
// the reported type name, with a generic cascade for everything else.
fn decode_pg_value(row: &PgRow, idx: usize) -> String {
    let type_name = row.columns()[idx].type_info().name().to_string();

    match type_name.as_str() {
        "BOOL" => render(row.try_get::<Option<bool>, _>(idx)),
        "INT2" => render(row.try_get::<Option<i16>, _>(idx)),
        "INT4" => render(row.try_get::<Option<i32>, _>(idx)),
        "INT8" => render(row.try_get::<Option<i64>, _>(idx)),
        "FLOAT4" => render(row.try_get::<Option<f32>, _>(idx)),
        "FLOAT8" => render(row.try_get::<Option<f64>, _>(idx)),
        "DATE" => render(row.try_get::<Option<chrono::NaiveDate>, _>(idx)),
        "TIMESTAMP" => render(row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)),
        "TIMESTAMPTZ" => {
            render(row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx))
        }
        _ => decode_fallback(
            row.try_get::<Option<String>, _>(idx),
            row.try_get::<Option<i64>, _>(idx),
            row.try_get::<Option<f64>, _>(idx),
            row.try_get::<Option<bool>, _>(idx),
            &type_name,
        ),
    }
}

fn decode_mysql_value(row: &MySqlRow, idx: usize) -> String {
    let type_name = row.columns()[idx].type_info().name().to_string();

    match type_name.as_str() {
        "BOOLEAN" => render(row.try_get::<Option<bool>, _>(idx)),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            render(row.try_get::<Option<i64>, _>(idx))
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => render(row.try_get::<Option<u64>, _>(idx)),
        "FLOAT" => render(row.try_get::<Option<f32>, _>(idx)),
        "DOUBLE" => render(row.try_get::<Option<f64>, _>(idx)),
        "DATE" => render(row.try_get::<Option<chrono::NaiveDate>, _>(idx)),
        "DATETIME" => render(row.try_get::<Option<chrono::NaiveDateTime>, _>(idx)),
        "TIMESTAMP" => render(row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)),
        _ => decode_fallback(
            row.try_get::<Option<String>, _>(idx),
            row.try_get::<Option<i64>, _>(idx),
            row.try_get::<Option<f64>, _>(idx),
            row.try_get::<Option<bool>, _>(idx),
            &type_name,
        ),
    }
}

fn render<T: ToString>(value: Result<Option<T>, sqlx::Error>) -> String {
    match value {
        Ok(Some(v)) => v.to_string(),
        Ok(None) => "NULL".to_string(),
        Err(_) => "NULL".to_string(),
    }
}

fn decode_fallback(
    as_string: Result<Option<String>, sqlx::Error>,
    as_i64: Result<Option<i64>, sqlx::Error>,
    as_f64: Result<Option<f64>, sqlx::Error>,
    as_bool: Result<Option<bool>, sqlx::Error>,
    type_name: &str,
) -> String {
    if let Ok(v) = as_string {
        return v.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = as_i64 {
        return v.map(|n| n.to_string()).unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = as_f64 {
        return v.map(|n| n.to_string()).unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = as_bool {
        return v.map(|b| b.to_string()).unwrap_or_else(|| "NULL".to_string());
    }
    format!("<{}>", type_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_in_memory_connection() {
        let mut conn = DbConnection::open(&ConnectionConfig::Sqlite { path: None })
            .await
            .unwrap();
        assert_eq!(conn.kind(), DatabaseKind::Sqlite);

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
        conn.execute("INSERT INTO test (id, name) VALUES (1, 'test')")
            .await
            .unwrap();

        let results = conn.execute("SELECT * FROM test").await.unwrap();
        assert_eq!(results.columns, vec!["id", "name"]);
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.rows[0][0], "1");
        assert_eq!(results.rows[0][1], "test");
    }

    #[tokio::test]
    async fn test_file_connection() {
        let file = NamedTempFile::new().unwrap();
        let mut conn = DbConnection::open(&ConnectionConfig::Sqlite {
            path: Some(file.path().to_path_buf()),
        })
        .await
        .unwrap();
        assert_eq!(conn.kind(), DatabaseKind::Sqlite);

        conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
        conn.execute("INSERT INTO test (id, name) VALUES (1, 'test')")
            .await
            .unwrap();

        let results = conn.execute("SELECT * FROM test").await.unwrap();
        assert_eq!(results.rows.len(), 1);
        assert_eq!(results.rows[0][0], "1");
        assert_eq!(results.rows[0][1], "test");

        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_returns_single_row() {
        let mut conn = DbConnection::open(&ConnectionConfig::Sqlite { path: None })
            .await
            .unwrap();

        let result = conn.execute("SELECT 1").await.unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0].len(), 1);
        assert_eq!(result.rows[0][0], "1");

        conn.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_null_and_blob_rendering() {
        let mut conn = DbConnection::open(&ConnectionConfig::Sqlite { path: None })
            .await
            .unwrap();

        conn.execute("CREATE TABLE t (a TEXT, b BLOB)").await.unwrap();
        conn.execute("INSERT INTO t (a, b) VALUES (NULL, x'0102')")
            .await
            .unwrap();

        let result = conn.execute("SELECT a, b FROM t").await.unwrap();
        assert_eq!(result.rows[0][0], "NULL");
        assert_eq!(result.rows[0][1], "<BLOB: 2 bytes>");
    }

    #[tokio::test]
    async fn test_execution_error_keeps_backend_message() {
        let mut conn = DbConnection::open(&ConnectionConfig::Sqlite { path: None })
            .await
            .unwrap();

        let err = conn.execute("SELECT * FROM missing").await.unwrap_err();
        match err {
            AgentError::Execution { message } => {
                assert!(message.contains("missing"));
            }
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_config_kind() {
        let sqlite = ConnectionConfig::Sqlite { path: None };
        assert_eq!(sqlite.kind(), DatabaseKind::Sqlite);

        let params = ServerParams {
            host: "localhost".to_string(),
            port: 5432,
            database: "shop".to_string(),
            user: "app".to_string(),
            password: "secret".to_string(),
        };
        assert_eq!(
            ConnectionConfig::Postgres(params.clone()).kind(),
            DatabaseKind::Postgres
        );
        assert_eq!(
            ConnectionConfig::MySql(params).kind(),
            DatabaseKind::MySql
        );
        assert_eq!(DatabaseKind::Postgres.dialect_name(), "PostgreSQL");
    }
}
