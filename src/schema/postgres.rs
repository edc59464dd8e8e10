//! PostgreSQL metadata source using sqlx

use crate::error::{NlqError, Result};
use crate::schema::{quote_ident, ColumnInfo, MetadataSource, Row};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::trace;

const TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = 'public'
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT column_name::text, data_type::text, is_nullable::text, column_default::text
    FROM information_schema.columns
    WHERE table_schema = 'public' AND table_name = $1
    ORDER BY ordinal_position
"#;

/// Initialize the introspection connection pool
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    Ok(pool)
}

pub struct PgMetadataSource {
    pool: PgPool,
}

impl PgMetadataSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sample query for one table. Only ever called with names from `table_names`.
    fn sample_sql(table: &str) -> String {
        // row_to_json keeps column order and turns every Postgres type into JSON
        format!(
            "SELECT row_to_json(t)::text FROM (SELECT * FROM {} LIMIT $1) AS t",
            quote_ident(table)
        )
    }
}

#[async_trait]
impl MetadataSource for PgMetadataSource {
    async fn table_names(&self) -> Result<Vec<String>> {
        let tables = sqlx::query_scalar::<_, String>(TABLES_SQL)
            .fetch_all(&self.pool)
            .await?;
        Ok(tables)
    }

    async fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let rows = sqlx::query_as::<_, (String, String, String, Option<String>)>(COLUMNS_SQL)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, is_nullable, default)| ColumnInfo {
                name,
                data_type,
                nullable: is_nullable != "NO",
                default,
            })
            .collect())
    }

    async fn sample_rows(&self, table: &str, limit: usize) -> Result<Vec<Row>> {
        let sql = Self::sample_sql(table);
        trace!("Sample query: {}", sql);

        let raw_rows = sqlx::query_scalar::<_, String>(&sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        raw_rows
            .iter()
            .map(|raw| serde_json::from_str::<Row>(raw).map_err(NlqError::from))
            .collect()
    }
}
