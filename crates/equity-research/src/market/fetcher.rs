//! Market snapshot fetcher

use super::lookback::Lookback;
use super::provider::MarketDataProvider;
use super::snapshot::{MarketSnapshot, ProfileFields};
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Builds a fresh [`MarketSnapshot`] per call
///
/// No retries and nothing is kept between calls.
#[derive(Clone)]
pub struct SnapshotFetcher {
    provider: Arc<dyn MarketDataProvider>,
}

impl SnapshotFetcher {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }

    /// Snapshot for the window ending now
    pub async fn fetch(&self, ticker: &str, lookback: Lookback) -> Result<MarketSnapshot, FetchError> {
        self.fetch_at(ticker, lookback, Utc::now()).await
    }

    /// Snapshot for the window ending at `end`
    ///
    /// Price history and profile are requested concurrently. A failed
    /// profile lookup only blanks the descriptive fields; a failed or
    /// malformed price series fails the fetch, and an empty one is
    /// [`FetchError::NoData`].
    #[instrument(skip(self), fields(lookback_days = lookback.days()))]
    pub async fn fetch_at(
        &self,
        ticker: &str,
        lookback: Lookback,
        end: DateTime<Utc>,
    ) -> Result<MarketSnapshot, FetchError> {
        let ticker = ticker.trim().to_uppercase();
        if ticker.is_empty() {
            return Err(FetchError::retrieval(&ticker, "ticker symbol is empty"));
        }

        let (start, end) = lookback.window_ending(end);
        let tickers = [ticker.clone()];
        let (frame, profile) = tokio::join!(
            self.provider.price_frame(&tickers, start, end),
            self.provider.profile(&ticker),
        );

        let frame = frame.map_err(|e| FetchError::retrieval(&ticker, e.to_string()))?;
        let bars: Vec<_> = frame
            .bars_for(&ticker)
            .map_err(|e| FetchError::retrieval(&ticker, e.to_string()))?
            .into_iter()
            .filter(|b| b.timestamp >= start && b.timestamp <= end)
            .collect();

        if bars.is_empty() {
            warn!(ticker = %ticker, "Provider returned no price data");
            return Err(FetchError::NoData { ticker });
        }

        let profile = profile.unwrap_or_else(|e| {
            warn!(ticker = %ticker, error = %e, "Continuing without profile fields");
            ProfileFields::new()
        });

        let snapshot = MarketSnapshot::from_parts(&ticker, lookback, bars, &profile);
        info!(
            ticker = %snapshot.ticker,
            company = %snapshot.company_name,
            bars = snapshot.bars.len(),
            "Market snapshot ready"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::frame::{Bar, PriceFrame};
    use crate::market::provider::{MarketDataError, MockMarketDataProvider};
    use chrono::{Duration, TimeZone};

    fn end() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 28, 20, 0, 0).unwrap()
    }

    fn bars_back_from(end: DateTime<Utc>, days: i64) -> Vec<Bar> {
        (0..days)
            .map(|i| Bar {
                timestamp: end - Duration::days(days - i),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.5,
                volume: Some(10),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_normalizes_and_uppercases() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_price_frame()
            .withf(|tickers, _, _| tickers.len() == 1 && tickers[0] == "AAPL")
            .times(1)
            .returning(|_, _, _| Ok(PriceFrame::flat(&bars_back_from(end(), 10))));
        provider
            .expect_profile()
            .withf(|ticker| ticker == "AAPL")
            .times(1)
            .returning(|_| Ok(ProfileFields::new().with("longName", "Apple Inc.")));

        let fetcher = SnapshotFetcher::new(Arc::new(provider));
        let snapshot = fetcher.fetch_at(" aapl ", Lookback::OneMonth, end()).await.unwrap();

        assert_eq!(snapshot.ticker, "AAPL");
        assert_eq!(snapshot.company_name, "Apple Inc.");
        assert_eq!(snapshot.bars.len(), 10);
    }

    #[tokio::test]
    async fn test_bars_outside_window_are_dropped() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_price_frame()
            .returning(|_, _, _| Ok(PriceFrame::flat(&bars_back_from(end(), 45))));
        provider.expect_profile().returning(|_| Ok(ProfileFields::new()));

        let fetcher = SnapshotFetcher::new(Arc::new(provider));
        let snapshot = fetcher.fetch_at("AAPL", Lookback::OneMonth, end()).await.unwrap();

        assert_eq!(snapshot.bars.len(), 30);
        let (start, _) = Lookback::OneMonth.window_ending(end());
        assert!(snapshot.bars.iter().all(|b| b.timestamp >= start));
    }

    #[tokio::test]
    async fn test_profile_failure_degrades() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_price_frame()
            .returning(|_, _, _| Ok(PriceFrame::flat(&bars_back_from(end(), 5))));
        provider
            .expect_profile()
            .returning(|_| Err(MarketDataError::Request("crumb refused".to_string())));

        let fetcher = SnapshotFetcher::new(Arc::new(provider));
        let snapshot = fetcher.fetch_at("AAPL", Lookback::OneMonth, end()).await.unwrap();
        assert_eq!(snapshot.company_name, "AAPL");
        assert_eq!(snapshot.metrics.market_cap_display(), "N/A");
    }

    #[tokio::test]
    async fn test_price_failure_is_retrieval_error() {
        let mut provider = MockMarketDataProvider::new();
        provider
            .expect_price_frame()
            .returning(|_, _, _| Err(MarketDataError::Timeout(30)));
        provider.expect_profile().returning(|_| Ok(ProfileFields::new()));

        let fetcher = SnapshotFetcher::new(Arc::new(provider));
        let err = fetcher.fetch_at("AAPL", Lookback::OneMonth, end()).await.unwrap_err();
        assert!(matches!(err, FetchError::Retrieval { .. }));
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_ticker_rejected_without_calling_provider() {
        let provider = MockMarketDataProvider::new();
        let fetcher = SnapshotFetcher::new(Arc::new(provider));
        let err = fetcher.fetch_at("   ", Lookback::OneMonth, end()).await.unwrap_err();
        assert!(matches!(err, FetchError::Retrieval { .. }));
    }
}
