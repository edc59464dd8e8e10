//! Prompt construction for natural-language-to-SQL generation.
//!
//! The prompt is a pure function of the question and the schema snapshot:
//! tables keep catalog order, columns keep ordinal order and sample values
//! keep column order, so identical inputs give byte-identical prompts.

use crate::schema::SchemaSnapshot;
use serde_json::Value;

/// Number of `key=value` pairs shown from a table's first sample row.
const SAMPLE_PAIRS: usize = 3;

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    default_limit: usize,
}

impl PromptBuilder {
    pub fn new(default_limit: usize) -> Self {
        Self { default_limit }
    }

    pub fn build(&self, question: &str, snapshot: &SchemaSnapshot) -> String {
        let mut prompt = String::new();

        prompt.push_str("You are a PostgreSQL expert. Convert the following natural language question to a valid PostgreSQL query. ");
        prompt.push_str("Return ONLY the SQL query, no explanations, no markdown, no code blocks, no extra text. ");
        prompt.push_str("Use the exact table and column names provided below. Ensure the query is safe and matches the user's intent.\n\n");
        prompt.push_str("Instructions:\n");
        prompt.push_str("- For queries requesting a specific number of rows (e.g., 'first five employees'), use LIMIT with the exact number (e.g., LIMIT 5).\n");
        prompt.push_str("- For filters (e.g., 'employees where age > 30'), include a WHERE clause (e.g., WHERE age > 30).\n");
        prompt.push_str("- For sorting (e.g., 'top 5 employees by salary'), use ORDER BY with DESC/ASC and LIMIT (e.g., ORDER BY salary DESC LIMIT 5).\n");
        prompt.push_str("- Use table and column names exactly as listed in the schema.\n\n");

        self.push_schema(&mut prompt, snapshot);
        self.push_rules(&mut prompt);

        prompt.push_str("Question: ");
        prompt.push_str(question);
        prompt.push_str("\nSQL:");
        prompt
    }

    fn push_schema(&self, prompt: &mut String, snapshot: &SchemaSnapshot) {
        prompt.push_str("Database schema:\n");

        for table in &snapshot.tables {
            prompt.push_str(&format!("\nTable: {}\n", table));
            prompt.push_str("Columns:\n");
            for column in snapshot.columns_of(table) {
                prompt.push_str(&format!("  - {} ({})\n", column.name, column.describe()));
            }

            if let Some(first_row) = snapshot.samples_of(table).first() {
                let pairs: Vec<String> = first_row
                    .iter()
                    .take(SAMPLE_PAIRS)
                    .map(|(key, value)| format!("{}={}", key, render_value(value)))
                    .collect();
                prompt.push_str("Sample data: ");
                prompt.push_str(&pairs.join(", "));
                prompt.push('\n');
            }
        }
    }

    fn push_rules(&self, prompt: &mut String) {
        prompt.push_str("\nRules:\n");
        prompt.push_str("- Return only the SQL query\n");
        prompt.push_str("- No markdown, no code blocks, no explanations\n");
        prompt.push_str("- Use exact table and column names from the schema\n");
        prompt.push_str(&format!(
            "- Include LIMIT for specific row counts (e.g., 'first 5' -> LIMIT 5), otherwise use LIMIT {}\n",
            self.default_limit
        ));
        prompt.push_str("- Use WHERE for filters (e.g., 'age > 30' -> WHERE age > 30)\n");
        prompt.push_str("- Use ORDER BY for sorting (e.g., 'top 5 by salary' -> ORDER BY salary DESC LIMIT 5)\n");
        prompt.push_str("- No semicolon at end\n");
        prompt.push_str("- Ensure the query matches the user's intent (e.g., use 'employees' table for queries about employees)\n\n");
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnInfo, Row};
    use serde_json::json;
    use std::collections::HashMap;

    fn snapshot() -> SchemaSnapshot {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(1));
        row.insert("name".to_string(), json!("Ada"));
        row.insert("manager_id".to_string(), Value::Null);
        row.insert("salary".to_string(), json!(5000.5));

        let mut columns = HashMap::new();
        columns.insert(
            "employees".to_string(),
            vec![
                ColumnInfo::new("id", "integer").not_null(),
                ColumnInfo::new("name", "text"),
            ],
        );
        columns.insert("departments".to_string(), Vec::new());

        let mut samples = HashMap::new();
        samples.insert("employees".to_string(), vec![row]);

        SchemaSnapshot {
            tables: vec!["departments".to_string(), "employees".to_string()],
            columns,
            samples,
        }
    }

    #[test]
    fn test_prompt_is_deterministic() {
        let builder = PromptBuilder::new(100);
        let snapshot = snapshot();
        assert_eq!(
            builder.build("show employees", &snapshot),
            builder.build("show employees", &snapshot)
        );
    }

    #[test]
    fn test_prompt_renders_tables_in_order() {
        let prompt = PromptBuilder::new(100).build("show employees", &snapshot());
        let departments = prompt.find("Table: departments").unwrap();
        let employees = prompt.find("Table: employees").unwrap();
        assert!(departments < employees);
        assert!(prompt.contains("  - id (integer NOT NULL)\n  - name (text)\n"));
    }

    #[test]
    fn test_prompt_shows_first_three_sample_pairs() {
        let prompt = PromptBuilder::new(100).build("show employees", &snapshot());
        assert!(prompt.contains("Sample data: id=1, name=Ada, manager_id=null\n"));
        assert!(!prompt.contains("salary=5000.5"));
    }

    #[test]
    fn test_prompt_ends_with_question() {
        let prompt = PromptBuilder::new(42).build("how many employees?", &snapshot());
        assert!(prompt.contains("otherwise use LIMIT 42\n"));
        assert!(prompt.ends_with("Question: how many employees?\nSQL:"));
    }
}
