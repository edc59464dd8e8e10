//! Deterministic SQL used when no model produced a usable query.

use crate::schema::quote_ident;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

lazy_static! {
    static ref FIRST_N: Regex = Regex::new(r"(?i)first\s+(\d{1,3})").unwrap();
}

pub const EMPTY_CATALOG_SQL: &str = "SELECT 1 as result LIMIT 1";

#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    default_limit: usize,
}

impl FallbackGenerator {
    pub fn new(default_limit: usize) -> Self {
        Self { default_limit }
    }

    /// `SELECT * FROM <table> LIMIT <n>` for the first table named in the question.
    pub fn generate(&self, question: &str, tables: &[String]) -> String {
        let Some(first) = tables.first() else {
            warn!("No tables available for default SQL");
            return EMPTY_CATALOG_SQL.to_string();
        };

        let lower_question = question.to_lowercase();
        let table = tables
            .iter()
            .find(|table| lower_question.contains(&table.to_lowercase()))
            .unwrap_or(first);

        let limit = FIRST_N
            .captures(&lower_question)
            .and_then(|captures| captures.get(1))
            .and_then(|n| n.as_str().parse::<usize>().ok())
            .unwrap_or(self.default_limit);

        let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), limit);
        debug!("Generated default SQL: {}", sql);
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables() -> Vec<String> {
        vec!["employees".to_string(), "departments".to_string()]
    }

    #[test]
    fn test_picks_named_table_and_row_count() {
        let generator = FallbackGenerator::new(100);
        assert_eq!(
            generator.generate("show first 5 employees", &tables()),
            "SELECT * FROM \"employees\" LIMIT 5"
        );
        assert_eq!(
            generator.generate("List all DEPARTMENTS", &tables()),
            "SELECT * FROM \"departments\" LIMIT 100"
        );
    }

    #[test]
    fn test_defaults_to_first_table() {
        let generator = FallbackGenerator::new(100);
        assert_eq!(
            generator.generate("what are the job titles?", &tables()),
            "SELECT * FROM \"employees\" LIMIT 100"
        );
    }

    #[test]
    fn test_first_without_number_uses_default_limit() {
        let generator = FallbackGenerator::new(20);
        assert_eq!(
            generator.generate("first departments please", &tables()),
            "SELECT * FROM \"departments\" LIMIT 20"
        );
    }

    #[test]
    fn test_empty_catalog() {
        assert_eq!(FallbackGenerator::new(100).generate("anything", &[]), EMPTY_CATALOG_SQL);
    }

    #[test]
    fn test_output_shape() {
        let shape = Regex::new(r#"^SELECT \* FROM "?.+"? LIMIT \d+$"#).unwrap();
        let generator = FallbackGenerator::new(100);
        for question in ["", "first 999 employees", "who works in sales?", "we\"ird"] {
            assert!(shape.is_match(&generator.generate(question, &tables())));
        }
    }
}
