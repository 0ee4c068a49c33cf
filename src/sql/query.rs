use serde::{Deserialize, Serialize};

/// Represents a query result
///
/// The uniform shape every backend normalizes into. Cell values are
/// rendered as strings; SQL NULL becomes the literal string "NULL".
/// An empty `rows` is a valid result, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rows of data
    pub rows: Vec<Vec<String>>,
    /// Number of rows returned
    pub row_count: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Serialize the result as CSV, header row first
    ///
    /// Fields containing a comma, double quote, or newline are quoted;
    /// embedded quotes are doubled.
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        write_csv_record(&mut output, &self.columns);
        for row in &self.rows {
            write_csv_record(&mut output, row);
        }
        output
    }
}

fn write_csv_record(output: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            output.push(',');
        }
        if field.contains(',') || field.contains('"') || field.contains('\n') {
            output.push('"');
            output.push_str(&field.replace('"', "\"\""));
            output.push('"');
        } else {
            output.push_str(field);
        }
    }
    output.push('\n');
}

/// Format query results as a table string
pub fn format_results_as_table(result: &QueryResult) -> String {
    if result.rows.is_empty() {
        return "No results found.".to_string();
    }

    // Calculate column widths
    let mut col_widths = result
        .columns
        .iter()
        .map(|col| col.len())
        .collect::<Vec<_>>();

    for row in &result.rows {
        for (i, cell) in row.iter().enumerate() {
            if i < col_widths.len() {
                col_widths[i] = col_widths[i].max(cell.len());
            }
        }
    }

    let mut output = String::new();

    // Header row
    for (i, col) in result.columns.iter().enumerate() {
        if i > 0 {
            output.push_str(" | ");
        }
        output.push_str(&format!("{:width$}", col, width = col_widths[i]));
    }
    output.push('\n');

    // Separator row
    for (i, width) in col_widths.iter().enumerate() {
        if i > 0 {
            output.push_str("-+-");
        }
        output.push_str(&"-".repeat(*width));
    }
    output.push('\n');

    // Data rows
    for row in &result.rows {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                output.push_str(" | ");
            }
            if i < col_widths.len() {
                output.push_str(&format!("{:width$}", cell, width = col_widths[i]));
            } else {
                output.push_str(cell);
            }
        }
        output.push('\n');
    }

    output.push_str(&format!("\n{} row(s) returned", result.row_count));

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec!["id".to_string(), "name".to_string()],
            vec![
                vec!["1".to_string(), "Alice".to_string()],
                vec!["2".to_string(), "Bob".to_string()],
                vec!["3".to_string(), "Charlie".to_string()],
            ],
        )
    }

    #[test]
    fn test_format_results() {
        let formatted = format_results_as_table(&sample());
        let expected = "id | name   \n---+--------\n1  | Alice  \n2  | Bob    \n3  | Charlie\n\n3 row(s) returned";

        assert_eq!(formatted, expected);
    }

    #[test]
    fn test_empty_results() {
        let result = QueryResult::new(vec!["id".to_string(), "name".to_string()], Vec::new());
        assert!(result.is_empty());
        assert_eq!(result.row_count, 0);
        assert_eq!(format_results_as_table(&result), "No results found.");
    }

    #[test]
    fn test_to_csv() {
        let csv = sample().to_csv();
        assert_eq!(csv, "id,name\n1,Alice\n2,Bob\n3,Charlie\n");
    }

    #[test]
    fn test_to_csv_quoting() {
        let result = QueryResult::new(
            vec!["note".to_string()],
            vec![
                vec!["hello, world".to_string()],
                vec!["she said \"hi\"".to_string()],
                vec!["line\nbreak".to_string()],
            ],
        );

        let csv = result.to_csv();
        assert_eq!(
            csv,
            "note\n\"hello, world\"\n\"she said \"\"hi\"\"\"\n\"line\nbreak\"\n"
        );
    }
}
