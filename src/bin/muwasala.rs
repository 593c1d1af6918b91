//! CLI binary for muwasala.
//!
//! Results go to stdout; all tracing output goes to stderr so `--json`
//! output stays machine-readable.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use muwasala::{AppConfig, build_aggregator};
use muwasala_search::{AggregatedResponse, HealthReport, SearchRequest};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Muwasala: ask once, search many Islamic knowledge sources.
#[derive(Parser)]
#[command(name = "muwasala", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    command: Command,
}

/// Available commands.
#[derive(Subcommand)]
enum Command {
    /// Search every relevant source and print a ranked answer.
    Search {
        /// The question.
        query: String,
        /// Query language code.
        #[arg(short, long, default_value = "en")]
        language: String,
        /// 1-based page number.
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Results per page (0 uses the configured default).
        #[arg(long, default_value_t = 0)]
        page_size: usize,
        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show circuit state for every source.
    Health {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML.
    PrintConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("muwasala=info,muwasala_search=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Search {
            query,
            language,
            page,
            page_size,
            json,
        } => {
            let request = SearchRequest {
                query,
                language,
                page,
                page_size,
            };
            run_search(&config, request, json).await
        }
        Command::Health { json } => run_health(&config, json).await,
        Command::PrintConfig => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn run_search(config: &AppConfig, request: SearchRequest, json: bool) -> anyhow::Result<()> {
    let aggregator = build_aggregator(config)?;

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, cancelling search...");
            cancel_clone.cancel();
        }
    });

    let result = aggregator.search(request, &cancel).await;
    aggregator.shutdown().await;
    let response = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }
    Ok(())
}

async fn run_health(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let aggregator = build_aggregator(config)?;
    let report = aggregator.health();
    aggregator.shutdown().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_health(&report);
    }
    Ok(())
}

fn print_response(response: &AggregatedResponse) {
    println!("{}\n", response.answer);
    for (i, result) in response.results.iter().enumerate() {
        let rank = (response.page - 1) * response.page_size + i + 1;
        println!("{rank:>3}. {} [{}]", result.title, result.source);
        println!("     {}", result.url);
        if !result.snippet.is_empty() {
            println!("     {}", result.snippet);
        }
    }
    if !response.suggestions.is_empty() {
        println!("\nTry also:");
        for suggestion in &response.suggestions {
            println!("  - {suggestion}");
        }
    }
    println!(
        "\n{} result(s), page {}, via {} in {} ms",
        response.total_found,
        response.page,
        response.origin,
        response.elapsed.as_millis()
    );
}

fn print_health(report: &HealthReport) {
    println!("status: {:?}", report.status);
    for source in &report.sources {
        let retry = source
            .retry_in_secs
            .map(|s| format!(", retry in {s}s"))
            .unwrap_or_default();
        println!(
            "  {:<12} {:?} ({} consecutive failures{retry})",
            source.name, source.state, source.consecutive_failures
        );
    }
}
