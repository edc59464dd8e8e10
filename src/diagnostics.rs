//! Read-only diagnostics: catalog description, backend connectivity,
//! health summary and a step-by-step view of both model attempts.

use crate::execution::QueryResult;
use crate::orchestrator::{ModelRole, Orchestrator};
use crate::schema::ColumnInfo;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{error, info};

pub const CONNECTIVITY_PROBE_SQL: &str = "SELECT 1 as test_column";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub tables: Vec<String>,
    pub detailed_schemas: HashMap<String, Vec<ColumnInfo>>,
    pub metabase_token: String,
    pub database_id: i64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectivityReport {
    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub database: String,
    pub table_count: usize,
    pub metabase: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReport {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    pub prompt: String,
    pub tables: Vec<String>,
    pub primary: AttemptReport,
    pub fallback: AttemptReport,
}

impl Orchestrator {
    /// Table names of the catalog.
    pub async fn list_tables(&self) -> Vec<String> {
        self.catalog.list_tables().await
    }

    /// Tables with their column metadata.
    pub async fn describe_database(&self) -> DatabaseInfo {
        let tables = self.catalog.list_tables().await;
        let detailed_schemas = self.catalog.describe_tables(&tables).await;

        DatabaseInfo {
            tables,
            detailed_schemas,
            metabase_token: self.config.masked_session_token(),
            database_id: self.config.metabase_database_id,
            status: "success".to_string(),
        }
    }

    /// Run a trivial query through the execution backend.
    pub async fn check_backend_connectivity(&self) -> ConnectivityReport {
        match self.executor.execute(CONNECTIVITY_PROBE_SQL).await {
            Ok(response) => ConnectivityReport {
                status: "connected".to_string(),
                response: Some(response),
                error: None,
            },
            Err(e) => {
                error!("{} connection test failed: {}", self.executor.name(), e);
                ConnectivityReport {
                    status: "failed".to_string(),
                    response: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn health(&self) -> HealthReport {
        let tables = self.catalog.list_tables().await;
        let backend = self.check_backend_connectivity().await;
        let healthy = !tables.is_empty() && backend.is_connected();

        HealthReport {
            database: if tables.is_empty() { "unavailable" } else { "connected" }.to_string(),
            table_count: tables.len(),
            metabase: backend.status,
            status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        }
    }

    /// Call both models directly, without health probes, and report every step.
    pub async fn debug_translation(&self, question: &str) -> DebugReport {
        let tables = self.catalog.list_tables().await;
        let snapshot = self.catalog.snapshot(&tables).await;
        let prompt = self.gateway.prompt_builder().build(question, &snapshot);
        info!("Debugging translation for: {}", question);

        let primary = self.debug_attempt(ModelRole::Primary, &prompt).await;
        let fallback = self.debug_attempt(ModelRole::Fallback, &prompt).await;

        DebugReport {
            prompt,
            tables,
            primary,
            fallback,
        }
    }

    async fn debug_attempt(&self, role: ModelRole, prompt: &str) -> AttemptReport {
        let model = self.model_for(role);
        let mut report = AttemptReport {
            model: model.to_string(),
            ..Default::default()
        };

        match self.gateway.complete(prompt, model, self.max_tokens_for(role)).await {
            Ok(completion) => {
                let cleaned = self.extractor.extract(&completion.text);
                report.is_valid = Some(
                    cleaned
                        .as_deref()
                        .map(|sql| self.validator.validate(sql))
                        .unwrap_or(false),
                );
                report.raw_response = Some(completion.body);
                report.raw_text = Some(completion.text);
                report.cleaned_sql = cleaned;
            }
            Err(e) => report.error = Some(e.to_string()),
        }
        report
    }
}
