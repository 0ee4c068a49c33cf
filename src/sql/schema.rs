use tracing::debug;

use super::connection::{DatabaseKind, DbConnection};
use crate::error::{AgentError, AgentResult};

/// One column of a user table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub type_name: String,
    pub primary_key: bool,
}

/// One user table with its columns in engine-reported order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
}

/// Enumeration of the connected database's user tables
///
/// Rebuilt on every new connection, never cached across reconnects.
/// Tables are ordered by name and columns by ordinal position, so the
/// rendered text is byte-identical for an unchanged schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDescription {
    pub tables: Vec<TableDescriptor>,
}

impl SchemaDescription {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Render the compact text form embedded in the generation prompt
    ///
    /// A schema with no tables renders to an empty string.
    pub fn render(&self) -> String {
        let mut blocks = Vec::with_capacity(self.tables.len());

        for table in &self.tables {
            let mut block = format!("Table: {}\nColumns:\n", table.name);
            for col in &table.columns {
                block.push_str(&format!("  - {} ({})", col.name, col.type_name));
                if col.primary_key {
                    block.push_str(" PRIMARY KEY");
                }
                block.push('\n');
            }
            blocks.push(block);
        }

        blocks.join("\n")
    }
}

/// Enumerate every user table and its columns on the open connection
///
/// System and catalog tables are excluded. Catalog queries differ per
/// engine but all run through the uniform `execute` surface and all
/// return (name, type, pk) rows.
pub async fn describe(conn: &mut DbConnection) -> AgentResult<SchemaDescription> {
    let kind = conn.kind();
    debug!("Introspecting schema on {} connection", kind.dialect_name());

    let table_result = conn
        .execute(table_query(kind))
        .await
        .map_err(as_introspection)?;

    let mut tables = Vec::with_capacity(table_result.rows.len());

    for row in &table_result.rows {
        let table_name = row[0].clone();

        let column_result = conn
            .execute(&column_query(kind, &table_name))
            .await
            .map_err(as_introspection)?;

        let columns = column_result
            .rows
            .iter()
            .map(|col| ColumnDescriptor {
                name: col[0].clone(),
                type_name: col[1].clone(),
                // sqlite reports the 1-based position within a composite key
                primary_key: col[2] != "0",
            })
            .collect();

        tables.push(TableDescriptor {
            name: table_name,
            columns,
        });
    }

    debug!("Found {} user table(s)", tables.len());

    Ok(SchemaDescription { tables })
}

// Schema enumeration runs on an otherwise-open connection, so failures are
// introspection problems, not execution problems.
fn as_introspection(err: AgentError) -> AgentError {
    match err {
        AgentError::Execution { message } => AgentError::introspection(message),
        other => other,
    }
}

fn table_query(kind: DatabaseKind) -> &'static str {
    match kind {
        DatabaseKind::Sqlite => {
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name"
        }
        DatabaseKind::MySql => {
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE' \
             ORDER BY table_name"
        }
        DatabaseKind::Postgres => {
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'public' AND table_type = 'BASE TABLE' \
             ORDER BY table_name"
        }
    }
}

fn column_query(kind: DatabaseKind, table: &str) -> String {
    // Table names come from the engine's own catalog; quoting guards
    // against names containing a quote character.
    let quoted = table.replace('\'', "''");

    match kind {
        DatabaseKind::Sqlite => format!(
            "SELECT name, type, pk FROM pragma_table_info('{quoted}') ORDER BY cid"
        ),
        DatabaseKind::MySql => format!(
            "SELECT column_name, data_type, IF(column_key = 'PRI', 1, 0) \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = '{quoted}' \
             ORDER BY ordinal_position"
        ),
        DatabaseKind::Postgres => format!(
            "SELECT c.column_name, c.data_type, \
                    CASE WHEN kcu.column_name IS NOT NULL THEN 1 ELSE 0 END \
             FROM information_schema.columns c \
             LEFT JOIN information_schema.table_constraints tc \
                    ON tc.table_schema = c.table_schema \
                   AND tc.table_name = c.table_name \
                   AND tc.constraint_type = 'PRIMARY KEY' \
             LEFT JOIN information_schema.key_column_usage kcu \
                    ON kcu.constraint_name = tc.constraint_name \
                   AND kcu.table_schema = c.table_schema \
                   AND kcu.column_name = c.column_name \
             WHERE c.table_schema = 'public' AND c.table_name = '{quoted}' \
             ORDER BY c.ordinal_position"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::connection::ConnectionConfig;

    async fn sample_connection() -> DbConnection {
        let mut conn = DbConnection::open(&ConnectionConfig::Sqlite { path: None })
            .await
            .unwrap();

        conn.execute("CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, amount REAL)")
            .await
            .unwrap();
        conn.execute("CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        conn
    }

    #[tokio::test]
    async fn test_describe_enumerates_all_tables() {
        let mut conn = sample_connection().await;
        let schema = describe(&mut conn).await.unwrap();

        assert_eq!(schema.tables.len(), 2);
        // ordered by name, not creation order
        assert_eq!(schema.tables[0].name, "customers");
        assert_eq!(schema.tables[1].name, "orders");

        let orders = &schema.tables[1];
        let names: Vec<&str> = orders.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "customer_id", "amount"]);
        assert!(orders.columns[0].primary_key);
        assert!(!orders.columns[1].primary_key);
    }

    #[tokio::test]
    async fn test_describe_is_deterministic() {
        let mut conn = sample_connection().await;

        let first = describe(&mut conn).await.unwrap().render();
        let second = describe(&mut conn).await.unwrap().render();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_render_format() {
        let mut conn = sample_connection().await;
        let rendered = describe(&mut conn).await.unwrap().render();

        assert!(rendered.contains("Table: customers"));
        assert!(rendered.contains("Table: orders"));
        assert!(rendered.contains("  - id (INTEGER) PRIMARY KEY"));
        assert!(rendered.contains("  - name (TEXT)"));
        assert!(rendered.contains("  - amount (REAL)"));
    }

    #[tokio::test]
    async fn test_empty_schema_is_not_an_error() {
        let mut conn = DbConnection::open(&ConnectionConfig::Sqlite { path: None })
            .await
            .unwrap();

        let schema = describe(&mut conn).await.unwrap();
        assert!(schema.is_empty());
        assert_eq!(schema.render(), "");
    }

    #[tokio::test]
    async fn test_system_tables_are_excluded() {
        let mut conn = sample_connection().await;
        // indexes land in sqlite_master too, but not as type = 'table'
        conn.execute("CREATE INDEX idx_customer_name ON customers (name)")
            .await
            .unwrap();

        let schema = describe(&mut conn).await.unwrap();
        assert_eq!(schema.tables.len(), 2);
        assert!(schema.tables.iter().all(|t| !t.name.starts_with("sqlite_")));
    }
}
