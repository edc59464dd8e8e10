//! Schema Module - catalog of the target database
//!
//! - `MetadataSource` trait for the introspection backend
//! - `SchemaCatalog` for cached table, column and sample lookups
//! - `TtlCache` for the single-flight, invalidatable cache behind it
//! - `PgMetadataSource` reading `information_schema` through sqlx

pub mod cache;
pub mod catalog;
pub mod postgres;

pub use cache::TtlCache;
pub use catalog::SchemaCatalog;
pub use postgres::{connect, PgMetadataSource};

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One sample row, keyed by column name in column order.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Column metadata as reported by introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// `type [NOT NULL] [DEFAULT x]`
    pub fn describe(&self) -> String {
        let mut desc = self.data_type.clone();
        if !self.nullable {
            desc.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            desc.push_str(" DEFAULT ");
            desc.push_str(default);
        }
        desc
    }
}

/// Immutable view of the catalog used for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<String>,
    pub columns: HashMap<String, Vec<ColumnInfo>>,
    pub samples: HashMap<String, Vec<Row>>,
}

impl SchemaSnapshot {
    pub fn columns_of(&self, table: &str) -> &[ColumnInfo] {
        self.columns.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn samples_of(&self, table: &str) -> &[Row] {
        self.samples.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Backend that can list tables, describe them and return sample rows.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Base tables of the public schema, ordered by name.
    async fn table_names(&self) -> Result<Vec<String>>;

    /// Columns of one table, ordered by ordinal position.
    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// At most `limit` rows of one table. `table` must come from `table_names`.
    async fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<Row>>;
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_column() {
        assert_eq!(ColumnInfo::new("id", "integer").describe(), "integer");
        assert_eq!(
            ColumnInfo::new("id", "integer")
                .not_null()
                .with_default("nextval('employees_id_seq'::regclass)")
                .describe(),
            "integer NOT NULL DEFAULT nextval('employees_id_seq'::regclass)"
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("employees"), "\"employees\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
