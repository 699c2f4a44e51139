//! SQL extraction
//!
//! Model replies rarely contain bare SQL: they come fenced in markdown,
//! wrapped in prose, or occasionally with no SQL at all. This module digs
//! the statement out without ever judging whether it is safe to run; that
//! is the guard's job.

use regex::Regex;
use std::sync::OnceLock;

static FENCED_BLOCK: OnceLock<Regex> = OnceLock::new();
static LEADING_STATEMENT: OnceLock<Regex> = OnceLock::new();

fn fenced_block() -> &'static Regex {
    FENCED_BLOCK.get_or_init(|| {
        Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("hardcoded fence pattern")
    })
}

fn leading_statement() -> &'static Regex {
    LEADING_STATEMENT.get_or_init(|| {
        Regex::new(r"(?is)\b(?:SELECT|SHOW|DESCRIBE|EXPLAIN)\s.+").expect("hardcoded statement pattern")
    })
}

/// Pull a single SQL statement out of raw model output.
///
/// Resolution order: first fenced code block (with or without an `sql`
/// tag), then the first read-statement keyword and everything after it,
/// then the whole reply as-is. Returns an empty string when there is
/// nothing to run; callers treat that as its own terminal state, not as an
/// error.
pub fn extract_sql(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Some(captures) = fenced_block().captures(trimmed) {
        return captures[1].trim().to_string();
    }

    if let Some(matched) = leading_statement().find(trimmed) {
        return matched.as_str().trim().to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_from_tagged_fence() {
        let reply = "Here is the query:\n```sql\nSELECT * FROM accounts\n```\nEnjoy!";
        assert_eq!(extract_sql(reply), "SELECT * FROM accounts");
        // Closing fence glued to the statement, no trailing newline.
        assert_eq!(
            extract_sql("```sql\nSELECT * FROM accounts```"),
            "SELECT * FROM accounts"
        );
    }

    #[test]
    fn test_extracts_from_untagged_fence() {
        let reply = "```\nSHOW TABLES\n```";
        assert_eq!(extract_sql(reply), "SHOW TABLES");
    }

    #[test]
    fn test_first_fence_wins() {
        let reply = "```sql\nSELECT 1\n```\nor alternatively\n```sql\nSELECT 2\n```";
        assert_eq!(extract_sql(reply), "SELECT 1");
    }

    #[test]
    fn test_falls_back_to_leading_keyword() {
        let reply = "Sure thing! SELECT categoryName FROM categories ORDER BY categoryName";
        assert_eq!(
            extract_sql(reply),
            "SELECT categoryName FROM categories ORDER BY categoryName"
        );
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let reply = "try: select amount from transactions";
        assert_eq!(extract_sql(reply), "select amount from transactions");
    }

    #[test]
    fn test_keyword_must_be_a_whole_word() {
        // "UNSELECTED" must not count as a SELECT statement.
        let reply = "UNSELECTED text without any query";
        assert_eq!(extract_sql(reply), reply);
    }

    #[test]
    fn test_plain_statement_is_idempotent() {
        let sql = "SELECT SUM(amount) FROM transactions";
        assert_eq!(extract_sql(sql), sql);
        assert_eq!(extract_sql(&extract_sql(sql)), sql);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert_eq!(extract_sql(""), "");
        assert_eq!(extract_sql("   \n\t  "), "");
    }

    #[test]
    fn test_empty_fence_yields_empty() {
        assert_eq!(extract_sql("```sql\n```"), "");
        assert_eq!(extract_sql("``` ```"), "");
    }

    #[test]
    fn test_reply_without_sql_passes_through() {
        let reply = "I cannot answer that from the ledger.";
        assert_eq!(extract_sql(reply), reply);
    }

    #[test]
    fn test_multiline_statement_survives() {
        let reply = "```sql\nSELECT t.amount,\n       c.categoryName\nFROM transactions t\nJOIN categories c ON t.categoryId = c.categoryId\n```";
        let sql = extract_sql(reply);
        assert!(sql.starts_with("SELECT t.amount,"));
        assert!(sql.ends_with("ON t.categoryId = c.categoryId"));
    }
}
