use thiserror::Error;

/// Failures of a single model attempt.
///
/// None of these reach the caller: the orchestrator treats each one as
/// "this model did not produce usable SQL" and moves down the chain.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("LLM service unreachable: {0}")]
    Unreachable(String),

    #[error("Invalid response from LLM: {0}")]
    MalformedResponse(String),

    #[error("LLM service returned status {0}")]
    NonSuccessStatus(u16),

    #[error("Model {0} is not available or not healthy")]
    Unhealthy(String),

    #[error("Model {0} did not answer within its deadline")]
    TimedOut(String),

    #[error("No valid SQL found in response from model {0}")]
    ExtractionFailed(String),
}

#[derive(Error, Debug)]
pub enum NlqError {
    #[error("Input query cannot be empty")]
    EmptyInput,

    #[error("No tables found in database")]
    SchemaUnavailable,

    #[error("Generated SQL query failed validation")]
    ValidationFailed,

    #[error("Failed to execute query in Metabase: {0}")]
    ExecutionFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NlqError>;
