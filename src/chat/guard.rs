//! Read-only guard
//!
//! Classifies generated SQL before anything touches the database. The guard
//! is pure text analysis: it never executes a statement and it fails
//! closed, so anything it cannot positively classify as a read is refused.
//!
//! Two interchangeable strategies implement [`SqlPolicy`]: the keyword
//! blacklist that mirrors what the service has always done, and an AST
//! policy that parses the statement and allows only plain read shapes.

use regex::Regex;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::fmt;

/// Keywords that disqualify a statement wherever they appear as a whole
/// word, even inside subqueries or comments.
pub const DISALLOWED_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "REPLACE", "GRANT",
    "REVOKE",
];

/// The only keywords a statement may begin with.
pub const ALLOWED_LEADING_KEYWORDS: &[&str] = &["SELECT", "SHOW", "DESCRIBE", "EXPLAIN"];

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    EmptyStatement,
    DisallowedKeyword(String),
    StatementStacking,
    MissingLeadingKeyword,
    NotAPlainRead(String),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::EmptyStatement => write!(f, "empty statement"),
            Violation::DisallowedKeyword(kw) => write!(f, "disallowed keyword {}", kw),
            Violation::StatementStacking => write!(f, "multiple statements"),
            Violation::MissingLeadingKeyword => {
                write!(f, "statement does not begin with an allowed keyword")
            }
            Violation::NotAPlainRead(detail) => write!(f, "not a plain read: {}", detail),
        }
    }
}

/// Result of classifying one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub safe: bool,
    pub violation: Option<Violation>,
}

impl SafetyVerdict {
    pub fn pass() -> Self {
        Self {
            safe: true,
            violation: None,
        }
    }

    pub fn reject(violation: Violation) -> Self {
        Self {
            safe: false,
            violation: Some(violation),
        }
    }
}

/// Strategy seam for SQL classification. Implementations must be pure
/// functions of the statement text.
pub trait SqlPolicy: Send + Sync {
    fn check(&self, sql: &str) -> SafetyVerdict;
}

/// Textual blacklist policy.
///
/// Rejects on any disallowed keyword anywhere in the statement, on stacked
/// statements, and on statements that do not begin with an allow-listed
/// read keyword. Deliberately blunt: `SELECT 'UPDATE'` is refused too.
pub struct KeywordPolicy {
    disallowed: Regex,
    leading: Vec<String>,
}

impl KeywordPolicy {
    pub fn new() -> Self {
        Self::with_lists(DISALLOWED_KEYWORDS, ALLOWED_LEADING_KEYWORDS)
    }

    /// Build a policy from custom keyword lists. Keywords are matched
    /// case-insensitively as whole words.
    pub fn with_lists(disallowed: &[&str], leading: &[&str]) -> Self {
        let escaped: Vec<String> = disallowed.iter().map(|kw| regex::escape(kw)).collect();
        let pattern = format!(r"(?i)\b(?:{})\b", escaped.join("|"));
        Self {
            // Escaped literal alternation, cannot fail to compile.
            disallowed: Regex::new(&pattern).expect("keyword alternation pattern"),
            leading: leading.iter().map(|kw| kw.to_uppercase()).collect(),
        }
    }

    fn begins_with_allowed_keyword(&self, sql: &str) -> bool {
        let upper = sql.to_uppercase();
        self.leading.iter().any(|kw| {
            upper.starts_with(kw.as_str())
                && upper[kw.len()..]
                    .chars()
                    .next()
                    .map_or(true, |c| !c.is_alphanumeric() && c != '_')
        })
    }
}

impl Default for KeywordPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlPolicy for KeywordPolicy {
    fn check(&self, sql: &str) -> SafetyVerdict {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return SafetyVerdict::reject(Violation::EmptyStatement);
        }

        if let Some(matched) = self.disallowed.find(trimmed) {
            return SafetyVerdict::reject(Violation::DisallowedKeyword(
                matched.as_str().to_uppercase(),
            ));
        }

        if has_stacked_statement(trimmed) {
            return SafetyVerdict::reject(Violation::StatementStacking);
        }

        if !self.begins_with_allowed_keyword(trimmed) {
            return SafetyVerdict::reject(Violation::MissingLeadingKeyword);
        }

        SafetyVerdict::pass()
    }
}

/// A `;` only counts as stacking when something non-blank follows it. A
/// single trailing semicolon stays legal.
fn has_stacked_statement(sql: &str) -> bool {
    match sql.find(';') {
        Some(idx) => !sql[idx + 1..].trim().is_empty(),
        None => false,
    }
}

/// AST policy: parse with the MySQL dialect and allow only statement shapes
/// that are reads by construction. Anything that fails to parse is refused.
pub struct ParserPolicy;

impl SqlPolicy for ParserPolicy {
    fn check(&self, sql: &str) -> SafetyVerdict {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return SafetyVerdict::reject(Violation::EmptyStatement);
        }

        let statements = match Parser::parse_sql(&MySqlDialect {}, trimmed) {
            Ok(statements) => statements,
            Err(e) => return SafetyVerdict::reject(Violation::NotAPlainRead(e.to_string())),
        };

        if statements.len() != 1 {
            return SafetyVerdict::reject(Violation::StatementStacking);
        }

        if is_read_only_statement(&statements[0]) {
            SafetyVerdict::pass()
        } else {
            SafetyVerdict::reject(Violation::NotAPlainRead(
                "statement shape is not an allowed read".to_string(),
            ))
        }
    }
}

fn is_read_only_statement(statement: &Statement) -> bool {
    match statement {
        Statement::Query(query) => is_plain_read_query(query),
        Statement::Explain { statement, .. } => is_read_only_statement(statement),
        Statement::ExplainTable { .. } => true,
        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowCollation { .. }
        | Statement::ShowFunctions { .. } => true,
        _ => false,
    }
}

fn is_plain_read_query(query: &Query) -> bool {
    // FOR UPDATE / FOR SHARE take locks, which is not a plain read.
    if !query.locks.is_empty() {
        return false;
    }

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            if !is_plain_read_query(&cte.query) {
                return false;
            }
        }
    }

    is_plain_read_body(query.body.as_ref())
}

fn is_plain_read_body(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(query) => is_plain_read_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            is_plain_read_body(left) && is_plain_read_body(right)
        }
        SetExpr::Table(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyword(sql: &str) -> SafetyVerdict {
        KeywordPolicy::new().check(sql)
    }

    fn parser(sql: &str) -> SafetyVerdict {
        ParserPolicy.check(sql)
    }

    #[test]
    fn test_every_disallowed_keyword_is_rejected_in_any_case() {
        for kw in DISALLOWED_KEYWORDS {
            for variant in [kw.to_string(), kw.to_lowercase(), title_case(kw)] {
                let sql = format!("{} something", variant);
                let verdict = keyword(&sql);
                assert!(!verdict.safe, "{} slipped through", sql);
                assert_eq!(
                    verdict.violation,
                    Some(Violation::DisallowedKeyword(kw.to_string()))
                );
            }
        }
    }

    fn title_case(kw: &str) -> String {
        let mut chars = kw.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
            None => String::new(),
        }
    }

    #[test]
    fn test_plain_select_passes() {
        assert!(keyword("SELECT * FROM accounts").safe);
        assert!(keyword("  select balance from accounts  ").safe);
        assert!(keyword("SHOW TABLES").safe);
        assert!(keyword("DESCRIBE transactions").safe);
        assert!(keyword("EXPLAIN SELECT 1").safe);
    }

    #[test]
    fn test_keyword_inside_identifier_is_not_a_violation() {
        // updated_at contains UPDATE but not as a whole word.
        assert!(keyword("SELECT updated_at FROM transactions").safe);
        assert!(keyword("SELECT dropped FROM audit_log").safe);
    }

    #[test]
    fn test_disallowed_keyword_in_subquery_is_rejected() {
        let verdict = keyword("SELECT * FROM (SELECT 1) x WHERE EXISTS (DELETE FROM t)");
        assert!(!verdict.safe);
        assert_eq!(
            verdict.violation,
            Some(Violation::DisallowedKeyword("DELETE".to_string()))
        );
    }

    #[test]
    fn test_stacked_statements_are_rejected() {
        let verdict = keyword("SELECT 1; SELECT 2");
        assert!(!verdict.safe);
        assert_eq!(verdict.violation, Some(Violation::StatementStacking));
    }

    #[test]
    fn test_trailing_semicolon_is_allowed() {
        assert!(keyword("SELECT 1;").safe);
        assert!(keyword("SELECT 1;   \n").safe);
    }

    #[test]
    fn test_semicolon_then_second_statement_is_rejected() {
        assert!(!keyword("SELECT 1; ;").safe);
        assert!(!keyword("SHOW TABLES; DROP TABLE accounts").safe);
    }

    #[test]
    fn test_empty_statement_is_unsafe() {
        let verdict = keyword("");
        assert!(!verdict.safe);
        assert_eq!(verdict.violation, Some(Violation::EmptyStatement));
        assert!(!keyword("   \t ").safe);
    }

    #[test]
    fn test_statement_without_read_keyword_is_rejected() {
        let verdict = keyword("USE expenses");
        assert!(!verdict.safe);
        assert_eq!(verdict.violation, Some(Violation::MissingLeadingKeyword));
        // WITH is not on the allow list, so the blunt policy refuses CTEs.
        assert!(!keyword("WITH x AS (SELECT 1) SELECT * FROM x").safe);
    }

    #[test]
    fn test_leading_keyword_without_space_still_counts() {
        assert!(keyword("SELECT*FROM accounts").safe);
        // SELECTION is not SELECT.
        assert!(!keyword("SELECTION FROM accounts").safe);
    }

    #[test]
    fn test_parser_policy_accepts_reads() {
        assert!(parser("SELECT balance, currency FROM accounts").safe);
        assert!(parser("SELECT 1;").safe);
        assert!(parser("SHOW TABLES").safe);
        assert!(parser("DESCRIBE transactions").safe);
        assert!(parser("EXPLAIN SELECT * FROM accounts").safe);
        assert!(parser("WITH x AS (SELECT 1) SELECT * FROM x").safe);
        assert!(parser("SELECT 1 UNION SELECT 2").safe);
    }

    #[test]
    fn test_parser_policy_rejects_writes_and_stacking() {
        assert!(!parser("INSERT INTO accounts VALUES (1)").safe);
        assert!(!parser("DROP TABLE accounts").safe);
        assert!(!parser("UPDATE accounts SET balance = '0'").safe);
        let verdict = parser("SELECT 1; SELECT 2");
        assert_eq!(verdict.violation, Some(Violation::StatementStacking));
    }

    #[test]
    fn test_parser_policy_rejects_locking_reads() {
        assert!(!parser("SELECT * FROM accounts FOR UPDATE").safe);
    }

    #[test]
    fn test_parser_policy_rejects_garbage() {
        assert!(!parser("this is not sql at all").safe);
        assert!(!parser("").safe);
    }
}
