//! Lookback windows offered for the price history

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of the price-history window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Lookback {
    OneMonth,
    #[default]
    ThreeMonths,
    SixMonths,
}

impl Lookback {
    /// Every supported window, shortest first
    pub const ALL: [Lookback; 3] = [Self::OneMonth, Self::ThreeMonths, Self::SixMonths];

    /// Window length in calendar days
    pub fn days(self) -> u32 {
        match self {
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::SixMonths => 180,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneMonth => "1 Month",
            Self::ThreeMonths => "3 Months",
            Self::SixMonths => "6 Months",
        }
    }

    /// `[end - days, end]`
    pub fn window_ending(self, end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (end - Duration::days(i64::from(self.days())), end)
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejected lookback length
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported lookback of {0} days (expected 30, 90 or 180)")]
pub struct UnsupportedLookback(pub u32);

impl TryFrom<u32> for Lookback {
    type Error = UnsupportedLookback;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        match days {
            30 => Ok(Self::OneMonth),
            90 => Ok(Self::ThreeMonths),
            180 => Ok(Self::SixMonths),
            other => Err(UnsupportedLookback(other)),
        }
    }
}
