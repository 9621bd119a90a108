//! `ensemble` command-line front end: run queries, probe health, list workers.

use anyhow::Context;
use clap::{Parser, Subcommand};
use ensemble_orchestrator::{HealthStatus, Orchestrator, OrchestratorConfig, QueryOptions};
use ensemble_workers::{load_all, WorkerConfig, WorkerRegistry};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ensemble", about = "Ensemble multi-agent task orchestration")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "ensemble.toml")]
    config: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one query with the configured workers
    Run {
        /// The request to orchestrate
        query: String,
        /// Reuse a session id
        #[arg(long)]
        session_id: Option<String>,
        /// Caller context as a JSON document
        #[arg(long)]
        context: Option<String>,
    },
    /// Probe every configured worker
    Health,
    /// List configured workers
    Workers,
}

#[derive(Deserialize, Default)]
struct EnsembleConfig {
    #[serde(default)]
    orchestrator: OrchestratorConfig,
    #[serde(default)]
    workers: Vec<WorkerConfig>,
}

/// Read the config file; a missing file means defaults and no workers.
async fn load_config(path: &Path) -> anyhow::Result<EnsembleConfig> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file '{}'", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(EnsembleConfig::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read config file '{}'", path.display())),
    }
}

fn build_orchestrator(config: EnsembleConfig, config_dir: &Path) -> anyhow::Result<Orchestrator> {
    let mut registry = WorkerRegistry::new();
    let loaded = load_all(&config.workers, config_dir, &mut registry);
    info!(count = loaded, "Workers loaded from config");
    Ok(Orchestrator::new(config.orchestrator, registry)?)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = load_config(&cli.config).await?;

    // Resolve config base directory (for relative worker paths)
    let config_dir = cli
        .config
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let engine = build_orchestrator(config, &config_dir)?;

    match cli.command {
        Commands::Run {
            query,
            session_id,
            context,
        } => {
            let mut options = QueryOptions::default();
            if let Some(id) = session_id {
                options = options.with_session_id(id);
            }
            if let Some(raw) = context {
                let value: serde_json::Value =
                    serde_json::from_str(&raw).context("--context must be valid JSON")?;
                options = options.with_context(value);
            }

            let sweeper = engine.spawn_session_sweeper();
            let response = engine.process_query(&query, options).await?;
            sweeper.abort();
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Health => {
            let report = engine.health_check().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.status == HealthStatus::Unhealthy {
                anyhow::bail!("engine is unhealthy");
            }
        }
        Commands::Workers => {
            let workers = engine.workers();
            if workers.is_empty() {
                println!("No workers registered.");
                println!("Configure workers in ensemble.toml under [[workers]]");
            } else {
                println!("Registered workers:");
                for worker in &workers {
                    println!("  {} — {}", worker.name, worker.description);
                    if let Some(category) = &worker.category {
                        println!("    category: {category}");
                    }
                    if !worker.keywords.is_empty() {
                        println!("    keywords: {}", worker.keywords.join(", "));
                    }
                }
                println!("\nTotal: {} worker(s)", workers.len());
            }
        }
    }

    Ok(())
}
