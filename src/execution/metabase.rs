//! Metabase Execution Backend
//!
//! Metabase REST API: POST /api/dataset with a native query payload.
//! Headers: X-Metabase-Session

use crate::config::NlqConfig;
use crate::error::{NlqError, Result};
use crate::execution::{QueryExecutor, QueryResult};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

pub const SESSION_HEADER: &str = "X-Metabase-Session";

pub struct MetabaseExecutor {
    client: Client,
    dataset_url: String,
    session_token: String,
    database_id: i64,
}

impl MetabaseExecutor {
    pub fn new(config: &NlqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            dataset_url: config.metabase_url.clone(),
            session_token: config.metabase_session_token.clone(),
            database_id: config.metabase_database_id,
        })
    }

    pub fn payload(&self, sql: &str) -> Value {
        json!({
            "type": "native",
            "native": { "query": sql },
            "database": self.database_id,
        })
    }
}

#[async_trait]
impl QueryExecutor for MetabaseExecutor {
    fn name(&self) -> &'static str {
        "metabase"
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult> {
        debug!("Submitting query to Metabase: {}", sql);

        let response = self
            .client
            .post(&self.dataset_url)
            .header(SESSION_HEADER, &self.session_token)
            .json(&self.payload(sql))
            .send()
            .await
            .map_err(|e| {
                error!("Error executing query in Metabase: {}", e);
                NlqError::ExecutionFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Metabase returned status {}: {}", status, text);
            return Err(NlqError::ExecutionFailed(format!(
                "Metabase returned status {}: {}",
                status, text
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| NlqError::ExecutionFailed(format!("Failed to parse Metabase response: {}", e)))?;

        if let Some(err) = body.get("error").filter(|err| !err.is_null()) {
            let detail = match err {
                Value::String(message) => message.clone(),
                other => other.to_string(),
            };
            warn!("Metabase query error: {}", detail);
            return Err(NlqError::ExecutionFailed(format!("Metabase query error: {}", detail)));
        }

        Ok(body)
    }
}
