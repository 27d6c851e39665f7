//! Equity research pipeline
//!
//! Given a ticker this crate
//!
//! - fetches recent price bars and fundamental metrics ([`market`])
//! - binds a web-search tool for the research agent ([`search`])
//! - builds the bounded research task ([`task`])
//! - runs it through the staged orchestrator, emitting progress
//!   milestones and a final report or typed failure ([`orchestrator`])
//!
//! # Architecture
//!
//! Every external capability sits behind a trait so it can be swapped in
//! tests: [`MarketDataProvider`] (Yahoo Finance), [`SearchProvider`] (Serper)
//! and [`ResearchExecutor`] (an LLM driven through
//! `research_runtime::AgentExecutor`). Configuration is passed explicitly;
//! nothing reads the environment except [`ResearchConfig::from_env`].
//!
//! # Example
//!
//! ```rust,ignore
//! use equity_research::{Lookback, ResearchConfig, ResearchSession};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = ResearchSession::new(ResearchConfig::from_env()?)?;
//!
//!     let snapshot = session.get_snapshot("AAPL", Lookback::ThreeMonths).await?;
//!     println!("{} closed at {:?}", snapshot.company_name, snapshot.bars.last());
//!
//!     let mut run = session.run_research("AAPL", CancellationToken::new());
//!     while let Some(event) = run.next_event().await {
//!         println!("{event:?}");
//!     }
//!     println!("{}", run.outcome().await?.text);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod coverage;
pub mod error;
pub mod market;
pub mod orchestrator;
pub mod progress;
pub mod search;
pub mod session;
pub mod task;

pub use config::{Credentials, ExecutionBounds, ResearchConfig, ResearchConfigBuilder, SearchSettings};
pub use coverage::SectionCoverage;
pub use error::{ConfigError, FailureKind, FetchError, RunError, SearchError};
pub use market::{
    Bar, FundamentalMetrics, Lookback, MarketDataProvider, MarketSnapshot, PriceFrame,
    ProfileFields, SnapshotFetcher, SnapshotSummary, YahooMarketData,
};
pub use orchestrator::{
    LlmResearchExecutor, ResearchExecutor, ResearchOrchestrator, ResearchReport, ResearchRun,
    RunResult, RunState, SearchFactory,
};
pub use progress::{NoProgress, ProgressEvent, ProgressSink};
pub use search::{SearchHit, SearchKind, SearchProvider, SerperSearch, WebSearchTool};
pub use session::ResearchSession;
pub use task::{ReportSection, ResearchTaskSpec};
