//! Execution Module - query-serving backends
//!
//! - `QueryExecutor` trait for submitting validated SQL
//! - `MetabaseExecutor` for Metabase's native dataset API

pub mod metabase;

pub use metabase::MetabaseExecutor;

use crate::error::Result;
use async_trait::async_trait;

/// Backend payload, passed through to the caller unmodified.
pub type QueryResult = serde_json::Value;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Backend name, for logs and diagnostics
    fn name(&self) -> &'static str;

    /// Run one read-only statement and return the backend's body.
    async fn execute(&self, sql: &str) -> Result<QueryResult>;
}
