use std::sync::Arc;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use tabgpt::cli::{Cli, Parser};
use tabgpt::config::Config;
use tabgpt::dataset::DataFrame;
use tabgpt::engine::{AnalysisResult, Engine};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    // CLI flags override the rc file and the environment
    let mut cfg = Config::load();
    if let Some(model) = &args.model {
        cfg.set("DEFAULT_MODEL", model);
    }
    if let Some(t) = args.temperature {
        cfg.set("DEFAULT_TEMPERATURE", &t.to_string());
    }
    if let Some(dir) = &args.output_dir {
        cfg.set("OUTPUT_PATH", dir);
    }
    if let Some(secs) = args.timeout {
        cfg.set("PIPELINE_TIMEOUT", &secs.to_string());
    }

    let df = DataFrame::from_csv_path(&args.csv_path)
        .with_context(|| format!("failed to load dataset from {}", args.csv_path))?;
    tracing::info!(shape = ?df.shape(), schema = %df.summary(), "dataset loaded");
    let df = Arc::new(df);

    let engine = Engine::new(cfg);
    let result = engine.analyze(df, &args.question).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match result {
        AnalysisResult::Analysis { response } => println!("{response}"),
        AnalysisResult::Visualization { image_url, .. } => {
            println!("{} {image_url}", "Chart saved:".green().bold());
        }
        AnalysisResult::Error { error } => eprintln!("{} {error}", "Error:".red().bold()),
        AnalysisResult::Timeout { message } => eprintln!("{} {message}", "Timeout:".yellow().bold()),
    }

    Ok(())
}
