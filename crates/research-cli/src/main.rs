//! Equity research assistant
//!
//! Prints a market snapshot for a ticker and, unless `--snapshot-only` is
//! given, runs the research agent and prints its report.
//!
//! # Usage
//!
//! ```bash
//! export OPENAI_API_KEY="sk-..."
//! export SERPER_API_KEY="..."
//!
//! cargo run -p research-cli -- AAPL --lookback 90
//! ```

mod render;

use anyhow::Context;
use clap::Parser;
use equity_research::{Lookback, ResearchConfig, ResearchSession};
use research_utils::{LogFormat, init_tracing, load_dotenv};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "equity-research")]
#[command(about = "Market snapshot and agent-written research report for a stock ticker", long_about = None)]
struct Args {
    /// Stock ticker symbol, e.g. AAPL
    ticker: String,

    /// Price history window in days (30, 90 or 180)
    #[arg(long, default_value = "90", value_parser = parse_lookback)]
    lookback: Lookback,

    /// Only print the market snapshot
    #[arg(long)]
    snapshot_only: bool,

    /// Wall-clock limit for the research run, in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Load environment variables from this file instead of ./.env
    #[arg(long)]
    env_file: Option<PathBuf>,
}

fn parse_lookback(value: &str) -> Result<Lookback, String> {
    let days: u32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number of days"))?;
    Lookback::try_from(days).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    load_dotenv(args.env_file.as_deref())?;
    let format = if args.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_tracing(format, "warn,equity_research=info");

    let mut config = ResearchConfig::from_env().context("invalid configuration")?;
    if let Some(secs) = args.timeout {
        config.run_timeout = Some(Duration::from_secs(secs));
        config.validate().context("invalid --timeout")?;
    }
    if let Err(e) = config.preflight() {
        if args.snapshot_only {
            info!(error = %e, "Research credentials not configured");
        } else {
            warn!(error = %e, "Research run will fail");
        }
    }

    let session = ResearchSession::new(config)?;
    let ticker = args.ticker.trim().to_uppercase();
    info!(ticker = %ticker, lookback = %args.lookback, "Starting");

    let snapshot = async {
        match session.get_snapshot(&ticker, args.lookback).await {
            Ok(snapshot) => println!("{}\n", render::snapshot(&snapshot)),
            Err(e) => eprintln!("Warning: {e}"),
        }
    };

    if args.snapshot_only {
        snapshot.await;
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling research run");
            interrupt.cancel();
        }
    });

    let research = async {
        let mut run = session.run_research(ticker.clone(), cancel.clone());
        while let Some(event) = run.next_event().await {
            eprintln!("{}", render::progress(&event));
        }
        run.outcome().await
    };

    let ((), outcome) = tokio::join!(snapshot, research);
    match outcome {
        Ok(report) => {
            println!("{}", render::report(&report));
            info!(
                run_id = %report.run_id,
                tool_calls = report.tool_calls,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Research finished"
            );
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("research on {ticker} failed"))),
    }
}
