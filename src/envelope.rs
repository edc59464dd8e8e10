use crate::execution::QueryResult;
use serde::Serialize;
use std::fmt;

/// Where a SQL candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provenance {
    #[serde(rename = "model:primary")]
    PrimaryModel,
    #[serde(rename = "model:fallback")]
    FallbackModel,
    #[serde(rename = "fallback")]
    Deterministic,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::PrimaryModel => write!(f, "model:primary"),
            Provenance::FallbackModel => write!(f, "model:fallback"),
            Provenance::Deterministic => write!(f, "fallback"),
        }
    }
}

/// SQL that has not been validated yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCandidate {
    pub sql: String,
    pub provenance: Provenance,
}

impl SqlCandidate {
    pub fn new(sql: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            sql: sql.into(),
            provenance,
        }
    }
}

/// Caller-facing result of one translation. Carries either data or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ResponseEnvelope {
    Success {
        sql: String,
        provenance: Provenance,
        #[serde(rename = "availableTables")]
        available_tables: Vec<String>,
        data: QueryResult,
        timestamp: i64,
    },
    Error {
        error: String,
        timestamp: i64,
    },
}

impl ResponseEnvelope {
    pub fn success(candidate: SqlCandidate, available_tables: Vec<String>, data: QueryResult) -> Self {
        ResponseEnvelope::Success {
            sql: candidate.sql,
            provenance: candidate.provenance,
            available_tables,
            data,
            timestamp: now_millis(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResponseEnvelope::Error {
            error: message.into(),
            timestamp: now_millis(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ResponseEnvelope::Success { .. })
    }

    pub fn sql(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Success { sql, .. } => Some(sql),
            ResponseEnvelope::Error { .. } => None,
        }
    }

    pub fn provenance(&self) -> Option<Provenance> {
        match self {
            ResponseEnvelope::Success { provenance, .. } => Some(*provenance),
            ResponseEnvelope::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ResponseEnvelope::Success { .. } => None,
            ResponseEnvelope::Error { error, .. } => Some(error),
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_serialization() {
        let envelope = ResponseEnvelope::success(
            SqlCandidate::new("SELECT 1", Provenance::FallbackModel),
            vec!["employees".to_string()],
            json!({"data": {"rows": [[1]]}}),
        );
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["status"], "success");
        assert_eq!(value["sql"], "SELECT 1");
        assert_eq!(value["provenance"], "model:fallback");
        assert_eq!(value["availableTables"], json!(["employees"]));
        assert!(value.get("error").is_none());
        assert!(value["timestamp"].as_i64().unwrap() > 0);
    }

    #[test]
    fn test_error_serialization() {
        let value = serde_json::to_value(ResponseEnvelope::error("No tables found in database")).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["error"], "No tables found in database");
        assert!(value.get("data").is_none());
    }
}
