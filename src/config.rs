use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Assets the dashboard can chart, in the order they are offered.
pub const TICKER_UNIVERSE: [&str; 10] = [
    "TSLA", "AAPL", "MSFT", "GOOGL", "AMZN", "BTC-USD", "ETH-USD", "DOGE-USD", "SPY", "QQQ",
];

/// Moving-average overlay windows (days) the user may pick from.
pub const MA_OPTIONS: [usize; 5] = [10, 20, 50, 100, 200];

/// Overlays selected when the user does not choose any.
pub const DEFAULT_MA_WINDOWS: [usize; 2] = [20, 50];

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default start of the date range.
pub fn default_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap_or_default()
}

/// Settings for the market-data provider, read from the environment.
///
/// * `MARKET_DATA_BASE_URL`: chart endpoint, the symbol is appended as a path segment
/// * `MARKET_DATA_USER_AGENT`: the provider rejects requests without a browser-like agent
/// * `MARKET_DATA_TIMEOUT_SECS`: per-request timeout
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SourceConfig {
    /// Reads provider settings from the process environment, falling back to defaults.
    ///
    /// # Errors
    /// Returns an error if `MARKET_DATA_TIMEOUT_SECS` is set but is not a whole number
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let base_url = lookup("MARKET_DATA_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);
        let user_agent = lookup("MARKET_DATA_USER_AGENT").unwrap_or(defaults.user_agent);
        let timeout = match lookup("MARKET_DATA_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.trim()
                    .parse()
                    .with_context(|| format!("MARKET_DATA_TIMEOUT_SECS is not a number: {raw}"))?,
            ),
            None => defaults.timeout,
        };

        Ok(Self {
            base_url,
            user_agent,
            timeout,
        })
    }
}

/// Everything the user chose for one render of the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub tickers: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub ma_windows: Vec<usize>,
    pub output_dir: Option<PathBuf>,
    pub source: SourceConfig,
}

impl DashboardConfig {
    /// Validates the user's selections and builds the configuration.
    ///
    /// Tickers are upper-cased and de-duplicated in the order given. Both tickers
    /// and moving-average windows must come from the offered options.
    ///
    /// # Errors
    /// Returns an error for an unknown ticker, an unsupported window, or a start
    /// date after the end date
    pub fn new(
        tickers: &[String],
        start: NaiveDate,
        end: NaiveDate,
        ma_windows: &[usize],
        output_dir: Option<PathBuf>,
        source: SourceConfig,
    ) -> Result<Self> {
        if start > end {
            return Err(anyhow!("start date {start} is after end date {end}"));
        }

        Ok(Self {
            tickers: normalize_tickers(tickers)?,
            start,
            end,
            ma_windows: validate_windows(ma_windows)?,
            output_dir,
            source,
        })
    }
}

fn normalize_tickers(tickers: &[String]) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::with_capacity(tickers.len());

    for raw in tickers {
        let symbol = raw.trim().to_uppercase();
        if symbol.is_empty() {
            continue;
        }
        if !TICKER_UNIVERSE.contains(&symbol.as_str()) {
            return Err(anyhow!(
                "unknown ticker {symbol}, pick from: {}",
                TICKER_UNIVERSE.join(", ")
            ));
        }
        if !selected.contains(&symbol) {
            selected.push(symbol);
        }
    }

    Ok(selected)
}

fn validate_windows(windows: &[usize]) -> Result<Vec<usize>> {
    let mut selected = Vec::with_capacity(windows.len());

    for &window in windows {
        if !MA_OPTIONS.contains(&window) {
            return Err(anyhow!(
                "unsupported moving-average window {window}, pick from: {:?}",
                MA_OPTIONS
            ));
        }
        if !selected.contains(&window) {
            selected.push(window);
        }
    }

    Ok(selected)
}
