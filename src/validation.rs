//! Read-only SQL validation
//!
//! Two policies are available:
//! - `Denylist` rejects any statement whose text contains a mutating keyword
//!   anywhere, including inside identifiers, literals and comments.
//! - `Tokenized` only looks at unquoted keyword tokens and additionally
//!   requires the text to parse as exactly one query.
//!
//! Both require the statement to start with `select` or `with`.

use crate::extract::starts_like_sql;
use serde::Deserialize;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const MUTATING_KEYWORDS: [&str; 7] = [
    "drop", "delete", "truncate", "alter", "create", "insert", "update",
];

const MUTATING_TOKENS: [Keyword; 7] = [
    Keyword::DROP,
    Keyword::DELETE,
    Keyword::TRUNCATE,
    Keyword::ALTER,
    Keyword::CREATE,
    Keyword::INSERT,
    Keyword::UPDATE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    #[default]
    Denylist,
    Tokenized,
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "denylist" => Ok(ValidationPolicy::Denylist),
            "tokenized" => Ok(ValidationPolicy::Tokenized),
            other => Err(format!("unknown validation policy '{}'", other)),
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Denylist => write!(f, "denylist"),
            ValidationPolicy::Tokenized => write!(f, "tokenized"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlValidator {
    policy: ValidationPolicy,
}

impl SqlValidator {
    pub fn new(policy: ValidationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// True if `sql` is safe to send to the query gateway.
    pub fn validate(&self, sql: &str) -> bool {
        if sql.trim().is_empty() {
            return false;
        }

        let allowed = match self.policy {
            ValidationPolicy::Denylist => passes_denylist(sql),
            ValidationPolicy::Tokenized => passes_tokenized(sql),
        };
        if !allowed {
            warn!("Potentially dangerous SQL detected: {}", sql);
            return false;
        }

        starts_like_sql(sql)
    }
}

fn passes_denylist(sql: &str) -> bool {
    let lower = sql.to_lowercase();
    !MUTATING_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

fn passes_tokenized(sql: &str) -> bool {
    let dialect = PostgreSqlDialect {};

    let tokens = match Tokenizer::new(&dialect, sql).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!("Failed to tokenize SQL: {}", e);
            return false;
        }
    };
    let has_mutating_keyword = tokens.iter().any(|token| match token {
        Token::Word(word) => word.quote_style.is_none() && MUTATING_TOKENS.contains(&word.keyword),
        _ => false,
    });
    if has_mutating_keyword {
        return false;
    }

    match Parser::parse_sql(&dialect, sql) {
        Ok(statements) => {
            statements.len() == 1 && matches!(statements[0], sqlparser::ast::Statement::Query(_))
        }
        Err(e) => {
            warn!("Failed to parse SQL: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denylist_accepts_plain_selects() {
        let validator = SqlValidator::default();
        assert!(validator.validate("SELECT * FROM employees LIMIT 100"));
        assert!(validator.validate("  with t as (select 1) select * from t"));
    }

    #[test]
    fn test_denylist_rejects_mutations_and_blanks() {
        let validator = SqlValidator::default();
        assert!(!validator.validate(""));
        assert!(!validator.validate("   "));
        assert!(!validator.validate("DROP TABLE employees"));
        assert!(!validator.validate("SELECT 1; DELETE FROM employees"));
        assert!(!validator.validate("EXPLAIN SELECT 1"));
    }

    #[test]
    fn test_denylist_matches_substrings() {
        let validator = SqlValidator::default();
        assert!(!validator.validate("SELECT last_update FROM jobs"));
        assert!(!validator.validate("SELECT 'please insert results' AS note"));
        assert!(!validator.validate("SELECT created_at FROM jobs"));
        assert!(validator.validate("SELECT hired_on FROM jobs"));
    }

    #[test]
    fn test_tokenized_ignores_literals_and_quoted_identifiers() {
        let validator = SqlValidator::new(ValidationPolicy::Tokenized);
        assert!(validator.validate("SELECT last_update FROM jobs LIMIT 10"));
        assert!(validator.validate("SELECT created_at FROM jobs"));
        assert!(validator.validate("SELECT 'please insert results' AS note"));
        assert!(validator.validate("SELECT \"delete\" FROM flags"));
    }

    #[test]
    fn test_tokenized_rejects_mutations_and_multiple_statements() {
        let validator = SqlValidator::new(ValidationPolicy::Tokenized);
        assert!(!validator.validate("DROP TABLE employees"));
        assert!(!validator.validate("SELECT 1; SELECT 2"));
        assert!(!validator.validate("SELECT (1 FROM jobs"));
        assert!(!validator.validate(
            "WITH gone AS (DELETE FROM employees RETURNING *) SELECT * FROM gone"
        ));
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("Tokenized".parse::<ValidationPolicy>(), Ok(ValidationPolicy::Tokenized));
        assert!("allowlist".parse::<ValidationPolicy>().is_err());
    }
}
