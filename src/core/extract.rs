use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{AgentError, AgentResult};

/// Pull a single executable SQL statement out of a model response
///
/// The response is untrusted free text. The transformations are applied in
/// a fixed order so the behavior is reproducible:
///
/// 1. If the text contains a fenced code block, keep only the content of
///    the first block (this also discards prose around the fence).
/// 2. Drop everything before the first recognizable SQL keyword; a leading
///    language tag like `sql` falls away here too.
/// 3. Truncate after the first statement terminator that sits outside a
///    quoted literal, keeping the terminator. A second statement never
///    passes through.
/// 4. Trim trailing whitespace.
///
/// If no SQL keyword is present at step 2 the response contains nothing
/// executable and extraction fails with `AgentError::NoStatement`.
pub fn extract_statement(raw: &str) -> AgentResult<String> {
    let text = fenced_block(raw).unwrap_or(raw);

    let start = SQL_KEYWORD
        .find(text)
        .ok_or(AgentError::NoStatement)?
        .start();

    let statement = truncate_at_terminator(&text[start..]);

    Ok(statement.trim_end().to_string())
}

static SQL_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(SELECT|WITH|INSERT|UPDATE|DELETE|CREATE|DROP|ALTER|REPLACE|TRUNCATE|SHOW|DESCRIBE|EXPLAIN|PRAGMA|VALUES)\b",
    )
    .expect("keyword pattern is valid")
});

/// Content of the first ``` fenced block, if the text has one
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];

    match after.find("```") {
        Some(close) => Some(&after[..close]),
        // unterminated fence: the model ran out of tokens mid-block
        None => Some(after),
    }
}

/// Cut after the first `;` that is not inside a quoted literal
fn truncate_at_terminator(sql: &str) -> &str {
    let mut in_single = false;
    let mut in_double = false;

    for (i, ch) in sql.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => return &sql[..=i],
            _ => {}
        }
    }

    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_statement_passes_through() {
        let sql = extract_statement("SELECT * FROM orders;").unwrap();
        assert_eq!(sql, "SELECT * FROM orders;");
    }

    #[test]
    fn test_strips_code_fences() {
        let sql = extract_statement("```sql\nSELECT * FROM orders;\n```").unwrap();
        assert_eq!(sql, "SELECT * FROM orders;");
    }

    #[test]
    fn test_strips_fence_without_language_tag() {
        let sql = extract_statement("```\nSELECT name FROM customers\n```").unwrap();
        assert_eq!(sql, "SELECT name FROM customers");
    }

    #[test]
    fn test_strips_leading_commentary() {
        let raw = "Here is the query you asked for:\n\nSELECT id, name FROM customers;";
        let sql = extract_statement(raw).unwrap();
        assert_eq!(sql, "SELECT id, name FROM customers;");
    }

    #[test]
    fn test_strips_commentary_around_fence() {
        let raw = "Sure! This should work:\n```sql\nSELECT COUNT(*) FROM orders;\n```\nLet me know if you need anything else.";
        let sql = extract_statement(raw).unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM orders;");
    }

    #[test]
    fn test_truncates_at_first_terminator() {
        let raw = "SELECT * FROM orders; DROP TABLE orders;";
        let sql = extract_statement(raw).unwrap();
        assert_eq!(sql, "SELECT * FROM orders;");
    }

    #[test]
    fn test_terminator_inside_literal_is_kept() {
        let raw = "SELECT * FROM notes WHERE body = 'a;b'; SELECT 1;";
        let sql = extract_statement(raw).unwrap();
        assert_eq!(sql, "SELECT * FROM notes WHERE body = 'a;b';");
    }

    #[test]
    fn test_unterminated_fence() {
        let sql = extract_statement("```sql\nSELECT 1").unwrap();
        assert_eq!(sql, "SELECT 1");
    }

    #[test]
    fn test_with_cte_is_recognized() {
        let raw = "WITH totals AS (SELECT customer_id, SUM(amount) AS total FROM orders GROUP BY customer_id) SELECT * FROM totals;";
        let sql = extract_statement(raw).unwrap();
        assert_eq!(sql, raw);
    }

    #[test]
    fn test_no_statement_found() {
        let err = extract_statement("I am not able to answer that question.").unwrap_err();
        assert!(matches!(err, AgentError::NoStatement));
    }

    #[test]
    fn test_empty_response() {
        let err = extract_statement("").unwrap_err();
        assert!(matches!(err, AgentError::NoStatement));
    }
}
