//! Marcanet - trademark registry searches from the command line.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use marcanet_browser::ChromiumFactory;
use marcanet_core::{AppConfig, PhoneticResult, QueryRequest};
use marcanet_search::{HeuristicRanker, RankingRequest, RiskRanker, SearchError, SearchOrchestrator};
use serde_json::json;
use tracing::{info, warn};

use cli::{Cli, Commands};

fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,marcanet=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            config.validate().context("invalid configuration")?;
            Ok(config)
        }
        None => AppConfig::load_with_env().context("failed to load configuration"),
    }
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Counts by status and class alongside the records.
fn overview(result: &PhoneticResult) -> serde_json::Value {
    let per_class: std::collections::BTreeMap<u8, usize> = result
        .by_class()
        .into_iter()
        .map(|(class, records)| (class, records.len()))
        .collect();
    json!({
        "in_force": result.in_force().count(),
        "by_status": result.count_by_status(),
        "by_class": per_class,
    })
}

async fn run(search: &SearchOrchestrator<ChromiumFactory>, command: Commands) -> Result<()> {
    match command {
        Commands::Denomination { mark } => {
            let result = search
                .search_denomination(&mark)
                .await
                .with_context(|| format!("denomination search for {mark:?} failed"))?;
            print_json(&json!({ "mark": mark, "result": result }))
        }
        Commands::Phonetic {
            mark,
            nice_class,
            assess,
        } => {
            let result = match search.search_phonetic_exhaustive(&mark, nice_class).await {
                Ok(result) => result,
                Err(SearchError::Timeout { elapsed, partial }) if !partial.is_empty() => {
                    warn!(
                        "Search timed out after {:?}; printing {} partial records",
                        elapsed,
                        partial.len()
                    );
                    return print_json(&json!({
                        "mark": mark,
                        "timed_out": true,
                        "records": partial,
                    }));
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("phonetic search for {mark:?} failed"))
                }
            };

            if !assess {
                return print_json(&json!({
                    "mark": mark,
                    "overview": overview(&result),
                    "result": result,
                }));
            }

            let request = QueryRequest::phonetic(&mark, nice_class)?;
            let ranking = RankingRequest::from_search(&request, &result);
            let assessment = HeuristicRanker::default().assess(&ranking).await?;
            print_json(&json!({
                "mark": mark,
                "overview": overview(&result),
                "result": result,
                "assessment": assessment,
                "viability_band": assessment.band(),
                "summary": assessment.summary(&ranking),
            }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    info!("Starting Marcanet v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let search = SearchOrchestrator::new(ChromiumFactory::new(config.browser.clone()), &config)
        .context("failed to set up search engine")?;

    let outcome = run(&search, cli.command).await;
    search.pool().shutdown().await;
    outcome
}
