use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nlq_engine::execution::MetabaseExecutor;
use nlq_engine::llm::OllamaGateway;
use nlq_engine::schema::{self, PgMetadataSource, SchemaCatalog};
use nlq_engine::{NlqConfig, Orchestrator};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nlq")]
#[command(about = "Answer natural-language questions with read-only SQL")]
struct Args {
    /// Primary model (or set LLM_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Fallback model (or set LLM_FALLBACK_MODEL)
    #[arg(long, global = true)]
    fallback_model: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate a question to SQL and execute it
    Ask { question: String },
    /// List the tables visible to the catalog
    Tables,
    /// Show tables with their column metadata
    Describe,
    /// Check connectivity to the query gateway
    Check,
    /// Database and query gateway health summary
    Health,
    /// Show the prompt and both raw model answers for a question
    Debug { question: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = NlqConfig::from_env()?;
    if let Some(model) = args.model {
        config.llm_model = model;
    }
    if let Some(model) = args.fallback_model {
        config.llm_fallback_model = model;
    }

    let orchestrator = build_orchestrator(config).await?;

    match args.command {
        Command::Ask { question } => print_json(&orchestrator.translate_and_execute(&question).await),
        Command::Tables => print_json(&serde_json::json!({ "tables": orchestrator.list_tables().await })),
        Command::Describe => print_json(&orchestrator.describe_database().await),
        Command::Check => print_json(&orchestrator.check_backend_connectivity().await),
        Command::Health => print_json(&orchestrator.health().await),
        Command::Debug { question } => print_json(&orchestrator.debug_translation(&question).await),
    }
}

async fn build_orchestrator(config: NlqConfig) -> Result<Orchestrator> {
    let database_url = config
        .database_url
        .clone()
        .context("DATABASE_URL must be set for schema introspection")?;

    let pool = schema::connect(&database_url)
        .await
        .context("Failed to connect to the introspection database")?;
    info!("Connected to introspection database");

    let catalog = Arc::new(SchemaCatalog::new(
        Arc::new(PgMetadataSource::new(pool)),
        config.max_sample_rows,
        config.schema_cache_ttl(),
    ));
    let gateway = Arc::new(OllamaGateway::new(&config)?);
    let executor = Arc::new(MetabaseExecutor::new(&config)?);

    info!(
        "Using models {} (primary) and {} (fallback), validation policy {}",
        config.llm_model, config.llm_fallback_model, config.validation_policy
    );
    Ok(Orchestrator::new(Arc::new(config), catalog, gateway, executor))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
