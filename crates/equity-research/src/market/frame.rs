//! Tabular price frames and their normalization into bars
//!
//! Providers hand back price history in one of two column layouts. A
//! single-ticker download uses flat labels (`"Close"`); a multi-ticker
//! download qualifies every label with the ticker (`("Close", "AAPL")`).
//! [`PriceFrame::bars_for`] maps either layout onto the same [`Bar`] rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

pub const OPEN: &str = "Open";
pub const HIGH: &str = "High";
pub const LOW: &str = "Low";
pub const CLOSE: &str = "Close";
pub const VOLUME: &str = "Volume";

/// One column of a frame; `None` marks a gap in an aligned index
pub type Series = Vec<Option<f64>>;

/// One trading-day price bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<u64>,
}

/// Price history as returned by a market-data provider
#[derive(Debug, Clone, PartialEq)]
pub enum PriceFrame {
    /// Columns keyed by field label
    Flat {
        index: Vec<DateTime<Utc>>,
        columns: BTreeMap<String, Series>,
    },
    /// Columns keyed by `(field, ticker)`
    TickerQualified {
        index: Vec<DateTime<Utc>>,
        columns: BTreeMap<(String, String), Series>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("column '{column}' has {len} values for {rows} rows")]
    LengthMismatch {
        column: String,
        len: usize,
        rows: usize,
    },
}

impl PriceFrame {
    /// Shared date index
    pub fn index(&self) -> &[DateTime<Utc>] {
        match self {
            Self::Flat { index, .. } | Self::TickerQualified { index, .. } => index,
        }
    }

    pub fn len(&self) -> usize {
        self.index().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index().is_empty()
    }

    /// Flat frame holding a single ticker's bars
    pub fn flat(bars: &[Bar]) -> Self {
        let index = bars.iter().map(|b| b.timestamp).collect();
        let mut columns = BTreeMap::new();
        for (label, values) in bar_columns(bars.iter().map(Some)) {
            columns.insert(label.to_string(), values);
        }
        Self::Flat { index, columns }
    }

    /// Ticker-qualified frame over the union of all tickers' dates
    ///
    /// A ticker without a bar on some date gets a gap in that row.
    pub fn ticker_qualified(per_ticker: &[(String, Vec<Bar>)]) -> Self {
        let index: Vec<DateTime<Utc>> = per_ticker
            .iter()
            .flat_map(|(_, bars)| bars.iter().map(|b| b.timestamp))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns = BTreeMap::new();
        for (ticker, bars) in per_ticker {
            let by_time: BTreeMap<DateTime<Utc>, &Bar> =
                bars.iter().map(|b| (b.timestamp, b)).collect();
            let aligned = index.iter().map(|t| by_time.get(t).copied());
            for (label, values) in bar_columns(aligned) {
                columns.insert((label.to_string(), ticker.clone()), values);
            }
        }
        Self::TickerQualified { index, columns }
    }

    fn column(&self, field: &str, ticker: &str) -> Option<&Series> {
        match self {
            Self::Flat { columns, .. } => columns.get(field),
            Self::TickerQualified { columns, .. } => {
                columns.get(&(field.to_string(), ticker.to_string()))
            }
        }
    }

    fn required(&self, field: &str, ticker: &str) -> Result<&Series, FrameError> {
        let series = self.column(field, ticker).ok_or_else(|| match self {
            Self::Flat { .. } => FrameError::MissingColumn(field.to_string()),
            Self::TickerQualified { .. } => FrameError::MissingColumn(format!("{field}/{ticker}")),
        })?;
        if series.len() != self.len() {
            return Err(FrameError::LengthMismatch {
                column: field.to_string(),
                len: series.len(),
                rows: self.len(),
            });
        }
        Ok(series)
    }

    /// Normalize the frame into one bar per complete row for `ticker`
    ///
    /// Rows with a gap in any of open/high/low/close are dropped. Volume is
    /// optional and absent when the provider does not supply it.
    pub fn bars_for(&self, ticker: &str) -> Result<Vec<Bar>, FrameError> {
        let open = self.required(OPEN, ticker)?;
        let high = self.required(HIGH, ticker)?;
        let low = self.required(LOW, ticker)?;
        let close = self.required(CLOSE, ticker)?;
        let volume = self.column(VOLUME, ticker).filter(|v| v.len() == self.len());

        let bars = self
            .index()
            .iter()
            .enumerate()
            .filter_map(|(i, &timestamp)| {
                Some(Bar {
                    timestamp,
                    open: open[i]?,
                    high: high[i]?,
                    low: low[i]?,
                    close: close[i]?,
                    volume: volume.and_then(|v| v[i]).map(|v| v as u64),
                })
            })
            .collect();
        Ok(bars)
    }
}

fn bar_columns<'a>(rows: impl Iterator<Item = Option<&'a Bar>> + Clone) -> [(&'static str, Series); 5] {
    let pick = |f: fn(&Bar) -> Option<f64>| rows.clone().map(|b| b.and_then(f)).collect::<Series>();
    [
        (OPEN, pick(|b| Some(b.open))),
        (HIGH, pick(|b| Some(b.high))),
        (LOW, pick(|b| Some(b.low))),
        (CLOSE, pick(|b| Some(b.close))),
        (VOLUME, pick(|b| b.volume.map(|v| v as f64))),
    ]
}
