//! Orchestrator
//!
//! Runs one question through the pipeline:
//! tables -> primary model -> fallback model -> deterministic SQL -> validation -> execution.
//!
//! Model attempts are strictly sequential. Each one is bounded by the
//! per-attempt timeout and by what is left of the shared model budget; an
//! attempt that runs out of time is dropped and counts as a failure.

use crate::config::NlqConfig;
use crate::envelope::{Provenance, ResponseEnvelope, SqlCandidate};
use crate::error::{ModelError, NlqError, Result};
use crate::execution::QueryExecutor;
use crate::extract::ResponseExtractor;
use crate::fallback::FallbackGenerator;
use crate::llm::ModelGateway;
use crate::schema::SchemaCatalog;
use crate::validation::SqlValidator;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Primary,
    Fallback,
}

impl ModelRole {
    pub fn provenance(self) -> Provenance {
        match self {
            ModelRole::Primary => Provenance::PrimaryModel,
            ModelRole::Fallback => Provenance::FallbackModel,
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelRole::Primary => write!(f, "primary"),
            ModelRole::Fallback => write!(f, "fallback"),
        }
    }
}

pub struct Orchestrator {
    pub(crate) config: Arc<NlqConfig>,
    pub(crate) catalog: Arc<SchemaCatalog>,
    pub(crate) gateway: Arc<dyn ModelGateway>,
    pub(crate) executor: Arc<dyn QueryExecutor>,
    pub(crate) extractor: ResponseExtractor,
    pub(crate) validator: SqlValidator,
    pub(crate) fallback: FallbackGenerator,
}

impl Orchestrator {
    pub fn new(
        config: Arc<NlqConfig>,
        catalog: Arc<SchemaCatalog>,
        gateway: Arc<dyn ModelGateway>,
        executor: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            extractor: ResponseExtractor::new(config.default_limit),
            validator: SqlValidator::new(config.validation_policy),
            fallback: FallbackGenerator::new(config.default_limit),
            config,
            catalog,
            gateway,
            executor,
        }
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Translate `question` into SQL, run it and wrap the outcome.
    ///
    /// Never fails: every error, and any panic in a collaborator, becomes an
    /// error envelope.
    pub async fn translate_and_execute(&self, question: &str) -> ResponseEnvelope {
        let request_id = Uuid::new_v4();
        match AssertUnwindSafe(self.run(question, request_id)).catch_unwind().await {
            Ok(Ok(envelope)) => envelope,
            Ok(Err(e)) => {
                warn!(%request_id, "Request failed: {}", e);
                ResponseEnvelope::error(envelope_message(&e))
            }
            Err(panic) => {
                let detail = panic_detail(panic.as_ref());
                error!(%request_id, "Request panicked: {}", detail);
                ResponseEnvelope::error(format!("Failed to process query: {}", detail))
            }
        }
    }

    async fn run(&self, question: &str, request_id: Uuid) -> Result<ResponseEnvelope> {
        if question.trim().is_empty() {
            return Err(NlqError::EmptyInput);
        }
        info!(%request_id, "Processing natural language query: {}", question);

        let tables = self.catalog.list_tables().await;
        if tables.is_empty() {
            return Err(NlqError::SchemaUnavailable);
        }

        let candidate = self.produce_sql(question, &tables).await;
        info!(%request_id, provenance = %candidate.provenance, "Generated SQL: {}", candidate.sql);

        if !self.validator.validate(&candidate.sql) {
            warn!(%request_id, "Generated SQL failed validation: {}", candidate.sql);
            return Err(NlqError::ValidationFailed);
        }

        let data = self
            .executor
            .execute(&candidate.sql)
            .await
            .map_err(|e| match e {
                NlqError::ExecutionFailed(_) => e,
                other => NlqError::ExecutionFailed(other.to_string()),
            })?;

        Ok(ResponseEnvelope::success(candidate, tables, data))
    }

    /// Best SQL for `question`: primary model, then fallback model, then the deterministic generator.
    pub async fn produce_sql(&self, question: &str, tables: &[String]) -> SqlCandidate {
        let deadline = Instant::now() + self.config.model_budget();

        for role in [ModelRole::Primary, ModelRole::Fallback] {
            match self.attempt(role, question, tables, deadline).await {
                Ok(sql) => return SqlCandidate::new(sql, role.provenance()),
                Err(e) => warn!("{} model {} did not produce SQL: {}", role, self.model_for(role), e),
            }
        }

        error!("Both primary and fallback models failed, using default SQL");
        SqlCandidate::new(self.fallback.generate(question, tables), Provenance::Deterministic)
    }

    async fn attempt(
        &self,
        role: ModelRole,
        question: &str,
        tables: &[String],
        deadline: Instant,
    ) -> std::result::Result<String, ModelError> {
        let model = self.model_for(role);
        let remaining = deadline.saturating_duration_since(Instant::now());
        let limit = remaining.min(self.config.attempt_timeout());
        if limit.is_zero() {
            return Err(ModelError::TimedOut(model.to_string()));
        }
        debug!("Attempting LLM call with {} model: {}", role, model);

        let call = async {
            if !self.gateway.probe_health(model).await {
                return Err(ModelError::Unhealthy(model.to_string()));
            }
            let snapshot = self.catalog.snapshot(tables).await;
            let raw = self
                .gateway
                .generate(question, &snapshot, model, self.max_tokens_for(role))
                .await?;
            self.extractor
                .extract(&raw)
                .ok_or_else(|| ModelError::ExtractionFailed(model.to_string()))
        };

        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(ModelError::TimedOut(model.to_string())),
        }
    }

    pub(crate) fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Primary => &self.config.llm_model,
            ModelRole::Fallback => &self.config.llm_fallback_model,
        }
    }

    pub(crate) fn max_tokens_for(&self, role: ModelRole) -> u32 {
        match role {
            ModelRole::Primary => self.config.primary_max_tokens,
            ModelRole::Fallback => self.config.fallback_max_tokens,
        }
    }
}

/// Message placed in the error envelope for `e`.
fn envelope_message(e: &NlqError) -> String {
    match e {
        NlqError::EmptyInput
        | NlqError::SchemaUnavailable
        | NlqError::ValidationFailed
        | NlqError::ExecutionFailed(_) => e.to_string(),
        other => format!("Failed to process query: {}", other),
    }
}

fn panic_detail(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_detail() {
        assert_eq!(panic_detail(&"boom"), "boom");
        assert_eq!(panic_detail(&"index 3".to_string()), "index 3");
        assert_eq!(panic_detail(&42u8), "unexpected panic");
    }

    #[test]
    fn test_envelope_messages() {
        assert_eq!(envelope_message(&NlqError::EmptyInput), "Input query cannot be empty");
        assert_eq!(
            envelope_message(&NlqError::ExecutionFailed("boom".to_string())),
            "Failed to execute query in Metabase: boom"
        );
        assert_eq!(
            envelope_message(&NlqError::Config("bad".to_string())),
            "Failed to process query: Configuration error: bad"
        );
    }

    #[test]
    fn test_role_provenance() {
        assert_eq!(ModelRole::Primary.provenance().to_string(), "model:primary");
        assert_eq!(ModelRole::Fallback.provenance().to_string(), "model:fallback");
    }
}
