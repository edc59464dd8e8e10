//! Schema Catalog
//!
//! Cached access to table names, column metadata and sample rows. Every
//! lookup degrades instead of failing: an unreachable database yields an
//! empty table list, a broken table yields no columns or no samples.

use crate::error::NlqError;
use crate::schema::cache::TtlCache;
use crate::schema::{ColumnInfo, MetadataSource, Row, SchemaSnapshot};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

pub struct SchemaCatalog {
    source: Arc<dyn MetadataSource>,
    max_sample_rows: usize,
    tables: TtlCache<(), Vec<String>>,
    columns: TtlCache<Vec<String>, HashMap<String, Vec<ColumnInfo>>>,
    samples: TtlCache<Vec<String>, HashMap<String, Vec<Row>>>,
}

impl SchemaCatalog {
    pub fn new(source: Arc<dyn MetadataSource>, max_sample_rows: usize, ttl: Option<Duration>) -> Self {
        Self {
            source,
            max_sample_rows,
            tables: TtlCache::new(ttl),
            columns: TtlCache::new(ttl),
            samples: TtlCache::new(ttl),
        }
    }

    /// Public base tables, ordered by name. Empty if introspection fails.
    pub async fn list_tables(&self) -> Vec<String> {
        let result = self
            .tables
            .get_or_try_load((), || async {
                let tables = self.source.table_names().await?;
                info!("Available tables: {:?}", tables);
                Ok::<_, NlqError>(tables)
            })
            .await;

        match result {
            Ok(tables) => tables,
            Err(e) => {
                error!("Error fetching table names: {}", e);
                Vec::new()
            }
        }
    }

    /// Column metadata per table; a table that cannot be described maps to no columns.
    pub async fn describe_tables(&self, tables: &[String]) -> HashMap<String, Vec<ColumnInfo>> {
        let result = self
            .columns
            .get_or_try_load(tables.to_vec(), || async {
                let mut schemas = HashMap::with_capacity(tables.len());
                for table in tables {
                    let columns = match self.source.columns(table).await {
                        Ok(columns) => columns,
                        Err(e) => {
                            error!("Error fetching columns for table {}: {}", table, e);
                            Vec::new()
                        }
                    };
                    schemas.insert(table.clone(), columns);
                }
                Ok::<_, Infallible>(schemas)
            })
            .await;

        match result {
            Ok(schemas) => schemas,
            Err(never) => match never {},
        }
    }

    /// Up to `max_sample_rows` rows per table; a table that cannot be read maps to no rows.
    pub async fn sample_tables(&self, tables: &[String]) -> HashMap<String, Vec<Row>> {
        let limit = self.max_sample_rows;
        let result = self
            .samples
            .get_or_try_load(tables.to_vec(), || async {
                let mut samples = HashMap::with_capacity(tables.len());
                for table in tables {
                    let rows = match self.source.sample_rows(table, limit).await {
                        Ok(rows) => rows,
                        Err(e) => {
                            error!("Error fetching sample data for {}: {}", table, e);
                            Vec::new()
                        }
                    };
                    samples.insert(table.clone(), rows);
                }
                Ok::<_, Infallible>(samples)
            })
            .await;

        match result {
            Ok(samples) => samples,
            Err(never) => match never {},
        }
    }

    /// Columns and samples for `tables`, bundled for one request.
    pub async fn snapshot(&self, tables: &[String]) -> Arc<SchemaSnapshot> {
        let columns = self.describe_tables(tables).await;
        let samples = self.sample_tables(tables).await;
        debug!("Built schema snapshot for {} tables", tables.len());
        Arc::new(SchemaSnapshot {
            tables: tables.to_vec(),
            columns,
            samples,
        })
    }

    /// Forget everything fetched so far.
    pub fn invalidate(&self) {
        info!("Invalidating schema cache");
        self.tables.invalidate();
        self.columns.invalidate();
        self.samples.invalidate();
    }
}
