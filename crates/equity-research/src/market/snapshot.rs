//! Market snapshot: price bars plus descriptive and fundamental fields

use super::frame::Bar;
use super::lookback::Lookback;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Marker rendered for any absent field
pub const NOT_AVAILABLE: &str = "N/A";

/// Named descriptive fields returned by a provider's profile lookup
///
/// Any field may be missing. Values are kept as JSON so providers can pass
/// through whatever shape they receive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileFields(BTreeMap<String, Value>);

impl ProfileFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Builder-style insert, handy in tests and fixtures
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Non-empty string field
    pub fn text(&self, name: &str) -> Option<String> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    /// Finite numeric field
    pub fn number(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(Value::as_f64).filter(|n| n.is_finite())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Scalar metrics shown beside the chart, each independently optional
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    /// Fraction, `0.0052` for 0.52%
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

impl FundamentalMetrics {
    pub fn from_profile(profile: &ProfileFields) -> Self {
        Self {
            market_cap: profile.number("marketCap"),
            pe_ratio: profile.number("trailingPE"),
            dividend_yield: profile.number("dividendYield"),
            fifty_two_week_high: profile.number("fiftyTwoWeekHigh"),
            fifty_two_week_low: profile.number("fiftyTwoWeekLow"),
        }
    }

    /// Market cap in billions, e.g. `$2950.12B`
    pub fn market_cap_display(&self) -> String {
        self.market_cap
            .map_or_else(na, |cap| format!("${:.2}B", cap / 1_000_000_000.0))
    }

    pub fn pe_ratio_display(&self) -> String {
        self.pe_ratio.map_or_else(na, |pe| format!("{pe:.2}"))
    }

    /// Dividend yield as a percentage, e.g. `0.52%`
    pub fn dividend_yield_display(&self) -> String {
        self.dividend_yield
            .map_or_else(na, |y| format!("{:.2}%", y * 100.0))
    }

    /// 52-week range, e.g. `$199.62/164.08`
    ///
    /// A missing side renders as `N/A` on its own; both missing is `N/A`.
    pub fn fifty_two_week_display(&self) -> String {
        match (self.fifty_two_week_high, self.fifty_two_week_low) {
            (None, None) => na(),
            (high, low) => format!("${}/{}", price_or_na(high), price_or_na(low)),
        }
    }
}

fn na() -> String {
    NOT_AVAILABLE.to_string()
}

fn price_or_na(value: Option<f64>) -> String {
    value.map_or_else(na, |v| format!("{v:.2}"))
}

/// Point-in-time price history and fundamentals for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub ticker: String,
    /// Long name, falling back to the ticker
    pub company_name: String,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub lookback: Lookback,
    /// Oldest first
    pub bars: Vec<Bar>,
    pub metrics: FundamentalMetrics,
}

impl MarketSnapshot {
    pub fn from_parts(ticker: &str, lookback: Lookback, bars: Vec<Bar>, profile: &ProfileFields) -> Self {
        Self {
            ticker: ticker.to_string(),
            company_name: profile
                .text("longName")
                .or_else(|| profile.text("shortName"))
                .unwrap_or_else(|| ticker.to_string()),
            sector: profile.text("sector"),
            industry: profile.text("industry"),
            lookback,
            bars,
            metrics: FundamentalMetrics::from_profile(profile),
        }
    }

    pub fn sector_display(&self) -> &str {
        self.sector.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    pub fn industry_display(&self) -> &str {
        self.industry.as_deref().unwrap_or(NOT_AVAILABLE)
    }

    /// Headline numbers over the bar series; `None` without bars
    pub fn summary(&self) -> Option<SnapshotSummary> {
        let first = self.bars.first()?;
        let last = self.bars.last()?;
        let high = self.bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        let low = self.bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        let change_percent = if first.close == 0.0 {
            0.0
        } else {
            (last.close - first.close) / first.close * 100.0
        };

        Some(SnapshotSummary {
            first_close: first.close,
            last_close: last.close,
            change_percent,
            period_high: high,
            period_low: low,
            trading_days: self.bars.len(),
        })
    }
}

/// Derived figures for the presenter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub first_close: f64,
    pub last_close: f64,
    pub change_percent: f64,
    pub period_high: f64,
    pub period_low: f64,
    pub trading_days: usize,
}
