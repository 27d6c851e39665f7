//! Market-data provider boundary

use super::frame::PriceFrame;
use super::snapshot::ProfileFields;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure reported by a market-data provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketDataError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),
}

/// Source of price history and descriptive fields
///
/// A single-ticker `price_frame` request comes back [`PriceFrame::Flat`];
/// several tickers come back [`PriceFrame::TickerQualified`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars for `tickers` between `start` and `end`
    async fn price_frame(
        &self,
        tickers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceFrame, MarketDataError>;

    /// Named descriptive and fundamental fields for one ticker
    async fn profile(&self, ticker: &str) -> Result<ProfileFields, MarketDataError>;
}
