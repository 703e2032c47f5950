//! Runs a JSON file of raw records through the pipeline and prints the report.
//!
//! Usage: `import_leads <records.json> [--persist]`
//!
//! The file holds either `{"records": [...]}` or a bare array of
//! `{"source", "payload", "retrieved_at"?}` objects. With `--persist` the
//! batch is merged into the configured store; otherwise it runs against an
//! empty in-memory index.

use anyhow::Context;
use dotenvy::dotenv;
use std::env;

use rust_leadgen_api::config::Config;
use rust_leadgen_api::db::Database;
use rust_leadgen_api::models::{IngestRecord, IngestRequest};
use rust_leadgen_api::pipeline::LeadPipeline;
use rust_leadgen_api::services::LeadService;
use rust_leadgen_api::store::LeadStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_leadgen_api=info".into()),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .context("usage: import_leads <records.json> [--persist]")?;
    let persist = args.iter().any(|a| a == "--persist");

    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let records: Vec<IngestRecord> = match serde_json::from_str::<IngestRequest>(&raw) {
        Ok(request) => request.records,
        Err(_) => serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?,
    };

    let config = Config::from_env()?;
    let settings = config.pipeline_settings()?;

    let store = match (&config.database_url, persist) {
        (Some(url), true) => LeadStore::postgres(Database::new(url).await?.pool),
        (None, true) => anyhow::bail!("--persist needs DATABASE_URL"),
        _ => LeadStore::memory(),
    };

    let service = LeadService::new(
        LeadPipeline::from_settings(&settings),
        settings.matching.clone(),
        store,
    )
    .await?;
    let report = service.ingest(records).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    eprintln!("{}", report.summary());

    Ok(())
}
