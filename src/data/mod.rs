pub mod ingestion;
pub mod processing;

pub use ingestion::{download_prices, DataIngestion, MarketData, PriceHistory, PriceSource};
pub use processing::{rolling_mean, CorrelationMatrix, PriceTable};
