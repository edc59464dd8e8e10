//! Natural-language questions to validated, read-only SQL.
//!
//! The `Orchestrator` ties the pieces together; everything else is usable on
//! its own.

pub mod config;
pub mod diagnostics;
pub mod envelope;
pub mod error;
pub mod execution;
pub mod extract;
pub mod fallback;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod schema;
pub mod validation;

pub use config::NlqConfig;
pub use envelope::{Provenance, ResponseEnvelope, SqlCandidate};
pub use error::{ModelError, NlqError, Result};
pub use orchestrator::Orchestrator;
