use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use super::generator::SqlGenerator;
use crate::error::{AgentError, AgentResult};
use crate::sql::connection::{ConnectionConfig, DbConnection};
use crate::sql::query::QueryResult;
use crate::sql::schema::{self, SchemaDescription};

/// One generated query, kept for recall
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub question: String,
    pub sql: String,
    pub asked_at: DateTime<Local>,
}

/// A single-user interactive session
///
/// Owns at most one live connection, the generator, and the query history.
/// Everything is session-local and single-threaded: one request/response
/// cycle at a time, no background work, no shared state.
pub struct Session {
    connection: Option<DbConnection>,
    generator: SqlGenerator,
    history: Vec<HistoryEntry>,
}

impl Session {
    pub fn new(generator: SqlGenerator) -> Self {
        Self {
            connection: None,
            generator,
            history: Vec::new(),
        }
    }

    /// Open a connection, replacing and closing any prior one
    ///
    /// The new connection is smoke-tested before it is stored, so a
    /// successful return means `execute` will reach a live database.
    pub async fn connect(&mut self, config: &ConnectionConfig) -> AgentResult<()> {
        if let Some(old) = self.connection.take() {
            debug!("Closing previous connection to {}", old.label());
            if let Err(e) = old.close().await {
                // the handle is consumed either way, nothing leaks
                warn!("Error closing previous connection: {}", e);
            }
        }

        let mut conn = DbConnection::open(config).await?;
        conn.ping().await?;

        info!("Connected to {}", conn.label());
        self.connection = Some(conn);

        Ok(())
    }

    /// Close the live connection, if any
    pub async fn disconnect(&mut self) -> AgentResult<()> {
        if let Some(conn) = self.connection.take() {
            conn.close().await?;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Label of the live connection, for display
    pub fn connection_label(&self) -> Option<String> {
        self.connection.as_ref().map(|c| c.label())
    }

    /// Introspect the schema of the live connection
    pub async fn schema(&mut self) -> AgentResult<SchemaDescription> {
        let conn = self.require_connection()?;
        schema::describe(conn).await
    }

    /// Run the full generation pipeline for one question
    ///
    /// Introspects the current schema, builds the prompt, calls the model,
    /// extracts a single statement, and records it in history. The
    /// statement is returned for human review; nothing is executed here.
    pub async fn generate(&mut self, question: &str) -> AgentResult<String> {
        let conn = self.require_connection()?;
        let dialect = conn.dialect_name();
        let schema_text = schema::describe(conn).await?.render();

        let sql = self
            .generator
            .generate(dialect, &schema_text, question)
            .await?;

        self.history.push(HistoryEntry {
            question: question.to_string(),
            sql: sql.clone(),
            asked_at: Local::now(),
        });

        Ok(sql)
    }

    /// Execute reviewed (possibly edited) SQL on the live connection
    pub async fn run(&mut self, sql: &str) -> AgentResult<QueryResult> {
        let conn = self.require_connection()?;
        let result = conn.execute(sql).await?;

        info!("Query returned {} row(s)", result.row_count);

        Ok(result)
    }

    /// Past generations, most recent first
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter().rev()
    }

    fn require_connection(&mut self) -> AgentResult<&mut DbConnection> {
        self.connection
            .as_mut()
            .ok_or_else(|| AgentError::connection("no database connection is open"))
    }
}
