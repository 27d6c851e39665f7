//! Yahoo Finance market-data provider
//!
//! Price history goes through `yahoo_finance_api`. Descriptive fields come
//! from the quote-summary endpoint, which needs a session cookie and a
//! crumb token obtained fresh for each lookup.

use super::frame::{Bar, PriceFrame};
use super::provider::{MarketDataError, MarketDataProvider};
use super::snapshot::ProfileFields;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};
use yahoo_finance_api as yahoo;

const COOKIE_URL: &str = "https://fc.yahoo.com";
const CRUMB_URLS: [&str; 2] = [
    "https://query1.finance.yahoo.com/v1/test/getcrumb",
    "https://query2.finance.yahoo.com/v1/test/getcrumb",
];
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const SUMMARY_MODULES: &str = "price,assetProfile,summaryDetail";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Yahoo Finance implementation of [`MarketDataProvider`]
pub struct YahooMarketData {
    http: reqwest::Client,
    timeout: Duration,
}

impl YahooMarketData {
    /// Create a provider whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Request(e.to_string()))?;
        Ok(Self { http, timeout })
    }

    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, MarketDataError>>,
    ) -> Result<T, MarketDataError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| MarketDataError::Timeout(self.timeout.as_secs()))?
    }

    async fn history(
        connector: &yahoo::YahooConnector,
        ticker: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let response = connector
            .get_quote_history(ticker, start, end)
            .await
            .map_err(|e| MarketDataError::Request(format!("{ticker}: {e}")))?;
        let quotes = response
            .quotes()
            .map_err(|e| MarketDataError::Parse(format!("{ticker}: {e}")))?;

        Ok(quotes
            .iter()
            .filter_map(|q| {
                Some(Bar {
                    timestamp: DateTime::from_timestamp(q.timestamp as i64, 0)?,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: Some(q.volume),
                })
            })
            .collect())
    }

    /// Session cookie lands in the client's jar; the crumb is returned
    async fn crumb(&self) -> Result<String, MarketDataError> {
        // fc.yahoo.com answers 404 but still sets the cookie
        if let Err(e) = self
            .http
            .get(COOKIE_URL)
            .header("referer", "https://finance.yahoo.com/")
            .send()
            .await
        {
            debug!(error = %e, "Cookie request failed, trying crumb anyway");
        }

        for url in CRUMB_URLS {
            let response = match self.http.get(url).send().await {
                Ok(r) if r.status().is_success() => r,
                Ok(r) => {
                    debug!(url, status = %r.status(), "Crumb endpoint refused");
                    continue;
                }
                Err(e) => {
                    debug!(url, error = %e, "Crumb request failed");
                    continue;
                }
            };
            let body = response
                .text()
                .await
                .map_err(|e| MarketDataError::Request(e.to_string()))?;
            let crumb = body.trim();
            if !crumb.is_empty() && crumb.len() < 100 && !crumb.contains(' ') && !crumb.contains('<') {
                return Ok(crumb.to_string());
            }
        }

        Err(MarketDataError::Request(
            "unable to obtain Yahoo crumb".to_string(),
        ))
    }

    async fn fetch_profile(&self, ticker: &str) -> Result<ProfileFields, MarketDataError> {
        let crumb = self.crumb().await?;
        let response = self
            .http
            .get(format!("{QUOTE_SUMMARY_URL}/{ticker}"))
            .query(&[("modules", SUMMARY_MODULES), ("crumb", crumb.as_str())])
            .send()
            .await
            .map_err(|e| MarketDataError::Request(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;
        if !status.is_success() {
            let detail = body["quoteSummary"]["error"]["description"]
                .as_str()
                .unwrap_or("no detail")
                .to_string();
            return Err(MarketDataError::Request(format!("HTTP {status}: {detail}")));
        }

        flatten_quote_summary(&body)
    }
}

#[async_trait]
impl MarketDataProvider for YahooMarketData {
    #[instrument(skip(self), fields(ticker_count = tickers.len()))]
    async fn price_frame(
        &self,
        tickers: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceFrame, MarketDataError> {
        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| MarketDataError::Request(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| MarketDataError::Request(format!("Invalid end timestamp: {e}")))?;

        let connector =
            yahoo::YahooConnector::new().map_err(|e| MarketDataError::Request(e.to_string()))?;

        let downloads = tickers.iter().map(|ticker| {
            let connector = &connector;
            async move {
                Self::history(connector, ticker, start_odt, end_odt)
                    .await
                    .map(|bars| (ticker.clone(), bars))
            }
        });
        let mut per_ticker = self.with_timeout(try_join_all(downloads)).await?;
        debug!(rows = per_ticker.iter().map(|(_, b)| b.len()).sum::<usize>(), "Price history received");

        Ok(match per_ticker.len() {
            1 => {
                let (_, bars) = per_ticker.remove(0);
                PriceFrame::flat(&bars)
            }
            _ => PriceFrame::ticker_qualified(&per_ticker),
        })
    }

    #[instrument(skip(self))]
    async fn profile(&self, ticker: &str) -> Result<ProfileFields, MarketDataError> {
        let profile = self.with_timeout(self.fetch_profile(ticker)).await;
        if let Err(e) = &profile {
            warn!(error = %e, "Profile lookup failed");
        }
        profile
    }
}

/// Flatten the quote-summary modules into one field map
///
/// Numeric fields arrive as `{"raw": 1.0, "fmt": "1.00"}`; the raw value is
/// kept. The first module providing a field wins.
pub fn flatten_quote_summary(body: &Value) -> Result<ProfileFields, MarketDataError> {
    let summary = &body["quoteSummary"];
    if let Some(description) = summary["error"]["description"].as_str() {
        return Err(MarketDataError::Request(description.to_string()));
    }
    let result = summary["result"]
        .get(0)
        .ok_or_else(|| MarketDataError::Parse("quoteSummary has no result".to_string()))?;
    let modules = result
        .as_object()
        .ok_or_else(|| MarketDataError::Parse("quoteSummary result is not an object".to_string()))?;

    let mut fields = ProfileFields::new();
    let mut seen = std::collections::BTreeSet::new();
    for module in modules.values().filter_map(Value::as_object) {
        for (name, value) in module {
            let value = match value {
                Value::Object(inner) => match inner.get("raw") {
                    Some(raw) if !raw.is_null() => raw.clone(),
                    _ => continue,
                },
                Value::String(_) | Value::Number(_) => value.clone(),
                _ => continue,
            };
            if seen.insert(name.clone()) {
                fields.insert(name.clone(), value);
            }
        }
    }
    Ok(fields)
}
