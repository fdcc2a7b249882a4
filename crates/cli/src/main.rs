use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cli::server::{self, AppState};
use hscode_core::config::{self, AppConfig};
use hscode_core::models::{ClassificationQuery, SearchResponse};
use hscode_core::pipeline;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { source, out, json } => run_extract(cfg, source, out, json),
        Commands::Classify {
            description,
            follow_up,
        } => run_classify(cfg, description.join(" "), follow_up).await,
        Commands::Models { json } => run_models(cfg, json).await,
        Commands::Serve { host, port } => run_serve(cfg, host, port).await,
    }
}

#[derive(Parser)]
#[command(name = "hscode")]
#[command(about = "Indian customs HS code classifier", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract HS code records from a tariff document and write artifacts
    Extract {
        /// Tariff document (plain text, or PDF with the `pdf` feature)
        source: PathBuf,
        /// Output directory for hs-codes.json, hs-codes.txt and tariff-raw.txt
        #[arg(short, long, default_value = "data")]
        out: PathBuf,
        /// Output JSON summary
        #[arg(long)]
        json: bool,
    },
    /// Classify a product description
    Classify {
        #[arg(required = true)]
        description: Vec<String>,
        /// The description already includes answers to clarification questions
        #[arg(long)]
        follow_up: bool,
    },
    /// List models offered by the backend
    Models {
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn run_extract(cfg: AppConfig, source: PathBuf, out: PathBuf, json: bool) -> Result<()> {
    let (index, paths) = pipeline::extract_to_dir(&source, &out, &cfg.tariff)?;
    if json {
        let summary = serde_json::json!({
            "source": source.display().to_string(),
            "totalCodes": index.records().len(),
            "contextLength": index.context().len(),
            "artifacts": paths,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("extracted codes: {}", index.records().len());
        println!("codes json: {}", paths.codes_json.display());
        println!("codes text: {}", paths.codes_text.display());
        println!("raw text: {}", paths.raw_text.display());
    }
    Ok(())
}

async fn run_classify(cfg: AppConfig, description: String, follow_up: bool) -> Result<()> {
    let index = pipeline::load_index(&cfg.tariff)?;
    let registry = pipeline::build_registry(&cfg);
    let classifier = pipeline::build_classifier(&cfg, &registry);
    let query = ClassificationQuery {
        description,
        is_follow_up: follow_up,
    };

    match classifier.classify(Some(&index), &query).await {
        Ok(outcome) => {
            info!(source = ?outcome.source, "classified");
            let response = SearchResponse::from_resolution(&outcome.resolution);
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            let response = SearchResponse::from_error(e.public_message());
            println!("{}", serde_json::to_string_pretty(&response)?);
            Err(e).context("classification failed")
        }
    }
}

async fn run_models(cfg: AppConfig, json: bool) -> Result<()> {
    let registry = pipeline::build_registry(&cfg);
    let llm = registry
        .llm(None)
        .with_context(|| format!("no backend configured (set {})", cfg.llm.api_key_env))?;
    let models = llm.list_models().await.context("list models")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&models)?);
    } else {
        for m in models {
            println!("{m}");
        }
    }
    Ok(())
}

async fn run_serve(cfg: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let registry = pipeline::build_registry(&cfg);
    let classifier = Arc::new(pipeline::build_classifier(&cfg, &registry));
    let state = actix_web::web::Data::new(AppState::new(classifier));

    // Serve immediately; requests get 503 until the index is published.
    let loader = state.clone();
    let tariff = cfg.tariff.clone();
    tokio::spawn(async move {
        match tokio::task::spawn_blocking(move || pipeline::load_index(&tariff)).await {
            Ok(Ok(index)) => {
                info!(records = index.records().len(), "tariff index ready");
                loader.set_index(index);
            }
            Ok(Err(e)) => {
                let message = format!("{e:#}");
                error!(error = %message, "loading tariff data failed");
                loader.set_load_error(message);
            }
            Err(e) => {
                error!(error = %e, "tariff loader panicked");
                loader.set_load_error(e.to_string());
            }
        }
    });

    let host = host.unwrap_or(cfg.server.host);
    let port = port.unwrap_or(cfg.server.port);
    server::start_server(state, &host, port)
        .with_context(|| format!("bind {host}:{port}"))?
        .await
        .context("http server")?;
    Ok(())
}
