//! Extraction of a SQL statement from free-form model output.
//!
//! Three strategies are tried in order and the first accepted candidate wins:
//! 1. the body of a fenced code block
//! 2. an inline `SELECT ...` run ending at end of text or at a blank line
//! 3. a line scan that drops conversational noise and joins the SQL lines
//!
//! Accepted candidates are normalised by `format_sql`.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{trace, warn};

lazy_static! {
    static ref FENCED_BLOCK: Regex = Regex::new(r"```(?:sql)?\s*([\s\S]*?)\s*```").unwrap();
    static ref INLINE_SELECT: Regex = Regex::new(r"(?is)(SELECT\s+.*?)(?:$|\n{2,})").unwrap();
    static ref FENCE_MARKERS: Regex = Regex::new(r"```(?:sql)?|```|`").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref LIMIT_CLAUSE: Regex = Regex::new(r"(?i)\blimit\b\s*\d+").unwrap();
}

const NOISE_PREFIXES: [&str; 4] = ["here's", "sql:", "query:", "answer:"];
const NOISE_WORDS: [&str; 2] = ["convert", "question"];
const MAX_PROSE_LINE: usize = 50;

#[derive(Debug, Clone)]
pub struct ResponseExtractor {
    default_limit: usize,
}

impl ResponseExtractor {
    pub fn new(default_limit: usize) -> Self {
        Self { default_limit }
    }

    /// Pull a SQL statement out of raw model text, or `None` if there is none.
    pub fn extract(&self, raw: &str) -> Option<String> {
        if raw.trim().is_empty() {
            warn!("LLM returned null or empty response");
            return None;
        }
        trace!("Raw LLM response: {}", raw);

        if let Some(sql) = self.from_fenced_block(raw) {
            trace!("Extracted SQL from markdown: {}", sql);
            return Some(self.format_sql(&sql));
        }

        if let Some(sql) = self.from_inline_select(raw) {
            trace!("Extracted SQL from regex: {}", sql);
            return Some(self.format_sql(&sql));
        }

        if let Some(sql) = self.from_line_scan(raw) {
            trace!("Extracted SQL from lines: {}", sql);
            return Some(self.format_sql(&sql));
        }

        warn!("No valid SQL found in response: {}", raw);
        None
    }

    fn from_fenced_block(&self, raw: &str) -> Option<String> {
        let captures = FENCED_BLOCK.captures(raw)?;
        let sql = captures.get(1)?.as_str().trim();
        starts_like_sql(sql).then(|| sql.to_string())
    }

    fn from_inline_select(&self, raw: &str) -> Option<String> {
        let captures = INLINE_SELECT.captures(raw)?;
        let sql = captures.get(1)?.as_str().trim();
        starts_like_sql(sql).then(|| sql.to_string())
    }

    fn from_line_scan(&self, raw: &str) -> Option<String> {
        let stripped = FENCE_MARKERS.replace_all(raw, "");
        let mut parts: Vec<&str> = Vec::new();
        let mut found_sql = false;

        for line in stripped.lines().map(str::trim) {
            if line.is_empty() {
                continue;
            }
            if is_noise(line) {
                trace!("Skipping line: {}", line);
                continue;
            }
            if found_sql || starts_like_sql(line) {
                found_sql = true;
                parts.push(line);
            }
        }

        let sql = parts.join(" ");
        starts_like_sql(&sql).then_some(sql)
    }

    /// Collapse whitespace, drop a trailing semicolon and add the default
    /// `LIMIT` when the statement has none.
    pub fn format_sql(&self, sql: &str) -> String {
        let collapsed = WHITESPACE_RUN.replace_all(sql, " ");
        let trimmed = collapsed.trim();
        let mut formatted = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end().to_string();
        if !LIMIT_CLAUSE.is_match(&formatted) {
            formatted.push_str(&format!(" LIMIT {}", self.default_limit));
        }
        formatted
    }
}

/// True when the trimmed text begins with `select` or `with`, ignoring case.
pub fn starts_like_sql(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    !lower.is_empty() && (lower.starts_with("select") || lower.starts_with("with"))
}

fn is_noise(line: &str) -> bool {
    let lower = line.to_lowercase();
    NOISE_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
        || NOISE_WORDS.iter().any(|word| lower.contains(word))
        || (lower.chars().count() > MAX_PROSE_LINE && !lower.contains("select"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ResponseExtractor {
        ResponseExtractor::new(100)
    }

    #[test]
    fn test_fenced_block() {
        assert_eq!(
            extractor().extract("```sql\nSELECT name FROM employees\n```"),
            Some("SELECT name FROM employees LIMIT 100".to_string())
        );
    }

    #[test]
    fn test_untagged_fence_keeps_existing_limit() {
        assert_eq!(
            extractor().extract("Sure!\n```\nSELECT *\nFROM employees\nLIMIT 5;\n```"),
            Some("SELECT * FROM employees LIMIT 5".to_string())
        );
    }

    #[test]
    fn test_inline_select_stops_at_blank_line() {
        let raw = "Here is your query: select id, name from employees where age > 30\n\nThis returns everyone over thirty.";
        assert_eq!(
            extractor().extract(raw),
            Some("select id, name from employees where age > 30 LIMIT 100".to_string())
        );
    }

    #[test]
    fn test_fence_with_prose_falls_through_to_inline_match() {
        let raw = "```\nThe answer is below\n```\nSELECT count(*) FROM departments";
        assert_eq!(
            extractor().extract(raw),
            Some("SELECT count(*) FROM departments LIMIT 100".to_string())
        );
    }

    #[test]
    fn test_line_scan_skips_noise() {
        let raw = "Here's what you asked for\n`SELECT*FROM employees`\nORDER BY id";
        assert_eq!(
            extractor().extract(raw),
            Some("SELECT*FROM employees ORDER BY id LIMIT 100".to_string())
        );
    }

    #[test]
    fn test_line_scan_skips_noise_after_sql_started() {
        let raw = "WITH t AS (VALUES (1))\nI had to convert your question\nTABLE t";
        assert_eq!(
            extractor().extract(raw),
            Some("WITH t AS (VALUES (1)) TABLE t LIMIT 100".to_string())
        );
    }

    #[test]
    fn test_nothing_usable() {
        assert_eq!(extractor().extract(""), None);
        assert_eq!(extractor().extract("   \n "), None);
        assert_eq!(extractor().extract("I cannot help with that."), None);
        assert_eq!(extractor().extract("DROP TABLE employees"), None);
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let ex = extractor();
        for raw in [
            "```sql\nSELECT name FROM employees\n```",
            "select * from jobs limit 3;",
            "SELECT*FROM employees",
            "SELECT name FROM employees ;",
            "SELECT name FROM employees LIMIT 5 ;",
        ] {
            let once = ex.extract(raw).unwrap();
            assert_eq!(ex.extract(&once), Some(once.clone()));
        }
    }

    #[test]
    fn test_limit_detection_is_case_insensitive() {
        assert_eq!(
            extractor().format_sql("SELECT * FROM t limit 10"),
            "SELECT * FROM t limit 10"
        );
        assert_eq!(
            extractor().format_sql("SELECT limited FROM t"),
            "SELECT limited FROM t LIMIT 100"
        );
    }

    #[test]
    fn test_spaced_semicolon_leaves_single_spaces() {
        let ex = extractor();
        assert_eq!(
            ex.format_sql("SELECT name FROM employees ;"),
            "SELECT name FROM employees LIMIT 100"
        );
        assert_eq!(
            ex.format_sql("SELECT name FROM employees LIMIT 5 ;"),
            "SELECT name FROM employees LIMIT 5"
        );
    }
}
