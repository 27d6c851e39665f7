//! Caller-facing entry points
//!
//! A [`ResearchSession`] owns the configuration for one interactive session
//! and exposes the two operations a presenter needs: a market snapshot for a
//! ticker, and a streamed research run. Failures never escape as panics;
//! every run ends in a [`RunResult`].

use crate::config::ResearchConfig;
use crate::error::{ConfigError, FetchError, RunError};
use crate::market::{Lookback, MarketDataProvider, MarketSnapshot, SnapshotFetcher, YahooMarketData};
use crate::orchestrator::{
    LlmResearchExecutor, ResearchExecutor, ResearchOrchestrator, ResearchRun, RunResult,
    SearchFactory,
};
use crate::progress::{ProgressSink, ProgressTracker};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Clone)]
pub struct ResearchSession {
    config: Arc<ResearchConfig>,
    fetcher: SnapshotFetcher,
    executor: Option<Arc<dyn ResearchExecutor>>,
    search_factory: Option<SearchFactory>,
}

impl ResearchSession {
    /// Session backed by Yahoo market data, Serper search and the configured LLM
    pub fn new(config: ResearchConfig) -> Result<Self, ConfigError> {
        let market = YahooMarketData::new(config.market_data_timeout).map_err(|e| ConfigError::Invalid {
            field: "market_data_timeout",
            detail: e.to_string(),
        })?;
        Ok(Self::with_market_data(config, Arc::new(market)))
    }

    pub fn with_market_data(config: ResearchConfig, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher: SnapshotFetcher::new(provider),
            executor: None,
            search_factory: None,
        }
    }

    /// Replace the LLM-backed executor
    pub fn with_executor(mut self, executor: Arc<dyn ResearchExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Replace the Serper search backend
    pub fn with_search_factory(mut self, factory: SearchFactory) -> Self {
        self.search_factory = Some(factory);
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    /// Report missing credentials without attempting anything
    pub fn preflight(&self) -> Result<(), ConfigError> {
        self.config.preflight()
    }

    pub async fn get_snapshot(&self, ticker: &str, lookback: Lookback) -> Result<MarketSnapshot, FetchError> {
        self.fetcher.fetch(ticker, lookback).await
    }

    /// Run research for `ticker` on the current task, reporting into `sink`
    ///
    /// Missing credentials fail the run as a configuration error before
    /// any tool is bound.
    pub async fn research(&self, ticker: &str, sink: &dyn ProgressSink, cancel: CancellationToken) -> RunResult {
        match self.orchestrator() {
            Ok(orchestrator) => orchestrator.run_with_cancel(ticker, sink, cancel).await,
            Err(err) => {
                warn!(ticker, error = %err, "Research run rejected before start");
                ProgressTracker::new(sink).fail(&err);
                Err(err)
            }
        }
    }

    /// Spawn a research run and stream its progress
    pub fn run_research(&self, ticker: impl Into<String>, cancel: CancellationToken) -> ResearchRun {
        let session = self.clone();
        let ticker = ticker.into();
        ResearchRun::spawn(move |sink| async move { session.research(&ticker, sink.as_ref(), cancel).await })
    }

    fn orchestrator(&self) -> Result<ResearchOrchestrator, RunError> {
        self.config.preflight()?;

        let executor = match &self.executor {
            Some(executor) => executor.clone(),
            None => {
                let executor = LlmResearchExecutor::from_config(&self.config)?;
                info!(model = executor.model(), "Using LLM research executor");
                Arc::new(executor)
            }
        };

        Ok(match &self.search_factory {
            Some(factory) => {
                ResearchOrchestrator::with_search_factory(self.config.clone(), executor, factory.clone())
            }
            None => ResearchOrchestrator::new(self.config.clone(), executor),
        })
    }
}
