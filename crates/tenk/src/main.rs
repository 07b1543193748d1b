//! `tenk` command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn};

use tenk::{
    Company, Config, EdgarRegistry, FilingOutcome, IngestReport, Orchestrator, RateGate, SqliteStore, Ticker,
    keywords_frame, metrics_frame,
};

/// Exit code when any filing or company failed.
const EXIT_FAILURE: u8 = 1;

/// Exit code for configuration and startup errors.
const EXIT_STARTUP: u8 = 2;

/// Exit code for a run stopped by Ctrl-C before every filing was processed.
const EXIT_INTERRUPTED: u8 = 130;

/// tenk - SEC 10-K ingestion pipeline.
#[derive(Parser, Debug)]
#[command(name = "tenk")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch, extract and store the configured companies' 10-K filings
    Ingest {
        /// Path to the configuration file
        #[arg(short, long, default_value = "tenk.toml")]
        config: PathBuf,

        /// Only ingest these tickers (repeatable)
        #[arg(short, long = "ticker", value_name = "TICKER")]
        tickers: Vec<String>,
    },

    /// Print stored metrics and keyword counts
    Report {
        /// Path to the configuration file
        #[arg(short, long, default_value = "tenk.toml")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let path = match &cli.command {
        Commands::Ingest { config, .. } | Commands::Report { config } => config,
    };
    let config = match Config::load(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    config.init_logging();

    let result = match &cli.command {
        Commands::Ingest { tickers, .. } => ingest(&config, tickers).await,
        Commands::Report { .. } => report(&config).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Fatal error");
            eprintln!("{e}");
            ExitCode::from(EXIT_STARTUP)
        }
    }
}

fn select_companies(config: &Config, tickers: &[String]) -> tenk::Result<Vec<Company>> {
    let companies = config.companies()?;
    if tickers.is_empty() {
        return Ok(companies);
    }

    let wanted = tickers
        .iter()
        .map(Ticker::new)
        .collect::<tenk::Result<Vec<_>>>()?;
    if let Some(unknown) = wanted
        .iter()
        .find(|t| !companies.iter().any(|c| &c.ticker == *t))
    {
        return Err(tenk::Error::Config(format!(
            "{unknown} is not a configured company"
        )));
    }

    Ok(companies
        .into_iter()
        .filter(|c| wanted.contains(&c.ticker))
        .collect())
}

async fn ingest(config: &Config, tickers: &[String]) -> tenk::Result<ExitCode> {
    let companies = select_companies(config, tickers)?;

    let registry = EdgarRegistry::new(&config.user_agent)?
        .with_gate(Arc::new(RateGate::per_second(config.requests_per_second)?))
        .with_retry(config.retry_policy())
        .with_filings_per_company(config.filings_per_company);
    let store = SqliteStore::new(&config.database)?;

    let orchestrator = Orchestrator::new(Arc::new(registry), Arc::new(store))?
        .with_concurrency(config.concurrency)?
        .on_progress(Arc::new(|outcome: &FilingOutcome| println!("{outcome}")));

    let stop = orchestrator.stop_signal();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, finishing current filing");
            stop.request_stop();
        }
    });

    info!(
        companies = companies.len(),
        database = %config.database.display(),
        "tenk starting"
    );
    let report = orchestrator.run(&companies).await;

    println!();
    println!("Summary: {report}");
    for failure in &report.company_failures {
        println!("  company {} failed: {}", failure.ticker, failure.error);
    }
    for outcome in report.failed() {
        println!("  {outcome}");
    }
    if !report.companies_skipped.is_empty() {
        let skipped: Vec<&str> = report.companies_skipped.iter().map(Ticker::as_str).collect();
        println!("  not started: {}", skipped.join(", "));
    }

    Ok(ExitCode::from(exit_status(&report)))
}

/// Failures win over an interrupted run.
fn exit_status(report: &IngestReport) -> u8 {
    if !report.is_success() {
        EXIT_FAILURE
    } else if !report.is_complete() {
        EXIT_INTERRUPTED
    } else {
        0
    }
}

async fn report(config: &Config) -> tenk::Result<ExitCode> {
    let store = SqliteStore::new(&config.database)?;

    println!("{}", metrics_frame(&store).await?);
    println!("{}", keywords_frame(&store).await?);
    Ok(ExitCode::SUCCESS)
}
