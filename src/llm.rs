use crate::config::NlqConfig;
use crate::error::{ModelError, Result};
use crate::prompt::PromptBuilder;
use crate::schema::SchemaSnapshot;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

pub const TOP_P: f64 = 0.9;
pub const STOP_SEQUENCES: [&str; 4] = ["\n\n", "Question:", "question:", "QUESTION:"];
const PROBE_PROMPT: &str = "SELECT 1";

/// Body of one generation call.
#[derive(Debug, Clone, Serialize)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub num_predict: u32,
    pub top_p: f64,
    pub stop: Vec<String>,
}

/// Raw result of a generation call: the text field plus the whole body.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Text-generation service as seen by the orchestrator.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    fn prompt_builder(&self) -> &PromptBuilder;

    /// True iff the service lists `model` by exact name. Never fails.
    async fn is_model_available(&self, model: &str) -> bool;

    /// True iff `model` is listed and answers a minimal generation request.
    async fn probe_health(&self, model: &str) -> bool;

    /// One non-streaming generation call with an already rendered prompt.
    async fn complete(&self, prompt: &str, model: &str, max_tokens: u32) -> std::result::Result<Completion, ModelError>;

    /// Render the prompt for `question` and return the model's raw text.
    async fn generate(
        &self,
        question: &str,
        snapshot: &SchemaSnapshot,
        model: &str,
        max_tokens: u32,
    ) -> std::result::Result<String, ModelError> {
        let prompt = self.prompt_builder().build(question, snapshot);
        trace!("LLM Prompt for model {}: {}", model, prompt);
        Ok(self.complete(&prompt, model, max_tokens).await?.text)
    }
}

/// Client for an Ollama-style `/api/generate` + `/api/tags` service.
pub struct OllamaGateway {
    client: Client,
    generate_url: String,
    tags_url: String,
    temperature: f64,
    prompt_builder: PromptBuilder,
}

impl OllamaGateway {
    pub fn new(config: &NlqConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            generate_url: config.llm_url.clone(),
            tags_url: config.llm_tags_url(),
            temperature: config.temperature,
            prompt_builder: PromptBuilder::new(config.default_limit),
        })
    }

    pub fn request_for(&self, prompt: &str, model: &str, max_tokens: u32) -> ModelRequest {
        ModelRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            stream: false,
            options: GenerationOptions {
                temperature: self.temperature,
                num_predict: max_tokens,
                top_p: TOP_P,
                stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    async fn list_models(&self) -> reqwest::Result<Vec<String>> {
        let tags: TagsResponse = self
            .client
            .get(&self.tags_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ModelGateway for OllamaGateway {
    fn prompt_builder(&self) -> &PromptBuilder {
        &self.prompt_builder
    }

    async fn is_model_available(&self, model: &str) -> bool {
        match self.list_models().await {
            Ok(models) if models.iter().any(|name| name == model) => {
                debug!("Model {} is available", model);
                true
            }
            Ok(_) => {
                warn!("Model {} not found in available models", model);
                false
            }
            Err(e) => {
                error!("Failed to check model availability: {}", e);
                false
            }
        }
    }

    async fn probe_health(&self, model: &str) -> bool {
        if !self.is_model_available(model).await {
            warn!("Model {} is not available in LLM service", model);
            return false;
        }

        let body = serde_json::json!({
            "model": model,
            "prompt": PROBE_PROMPT,
            "stream": false,
        });
        match self.client.post(&self.generate_url).json(&body).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                debug!(
                    "LLM test request for model {}: {}",
                    model,
                    if healthy { "Successful" } else { "Failed" }
                );
                healthy
            }
            Err(e) => {
                warn!("LLM service test request for model {} failed: {}", model, e);
                false
            }
        }
    }

    async fn complete(&self, prompt: &str, model: &str, max_tokens: u32) -> std::result::Result<Completion, ModelError> {
        let request = self.request_for(prompt, model, max_tokens);
        debug!("Calling LLM at URL: {} with model: {}", self.generate_url, model);

        let response = self
            .client
            .post(&self.generate_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Error calling LLM with model {}: {}", model, e);
                ModelError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        debug!("LLM response status: {}", status);
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if text.contains("more system memory") {
                warn!("Memory error detected for model {}", model);
            }
            error!("LLM call with model {} failed with status {}: {}", model, status, text);
            return Err(ModelError::NonSuccessStatus(status.as_u16()));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ModelError::MalformedResponse(format!("response body is not JSON: {}", e)))?;
        trace!("LLM response body: {}", body);

        let text = body
            .get("response")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                error!("LLM response missing 'response' key. Body: {}", body);
                ModelError::MalformedResponse("missing 'response' field".to_string())
            })?
            .to_string();

        Ok(Completion { text, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let gateway = OllamaGateway::new(&NlqConfig::new("token")).unwrap();
        let body = serde_json::to_value(gateway.request_for("Question: x\nSQL:", "codellama:7b", 50)).unwrap();

        assert_eq!(body["model"], "codellama:7b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 50);
        assert_eq!(body["options"]["temperature"], 0.1);
        assert_eq!(body["options"]["top_p"], 0.9);
        assert_eq!(
            body["options"]["stop"],
            serde_json::json!(["\n\n", "Question:", "question:", "QUESTION:"])
        );
    }
}
