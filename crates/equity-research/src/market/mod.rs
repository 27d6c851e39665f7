//! Market snapshot: provider boundary, frame normalization and fetcher

pub mod fetcher;
pub mod frame;
pub mod lookback;
pub mod provider;
pub mod snapshot;
pub mod yahoo;

pub use fetcher::SnapshotFetcher;
pub use frame::{Bar, FrameError, PriceFrame};
pub use lookback::{Lookback, UnsupportedLookback};
pub use provider::{MarketDataError, MarketDataProvider};
pub use snapshot::{FundamentalMetrics, MarketSnapshot, ProfileFields, SnapshotSummary};
pub use yahoo::YahooMarketData;
