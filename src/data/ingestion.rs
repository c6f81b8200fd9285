use super::processing::PriceTable;
use crate::config::SourceConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// One daily bar for a financial instrument.
///
/// # Fields
/// * `date`: The trading day in the exchange's local calendar
/// * `symbol`: The ticker the bar belongs to
/// * `open`, `high`, `low`, `close`: Unadjusted prices for the day
/// * `adj_close`: Closing price adjusted for dividends and splits
/// * `volume`: Units traded during the day
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    pub date: NaiveDate,
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: f64,
}

/// A provider of daily price history.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetches daily bars for `symbol` from `start` (inclusive) to `end` (exclusive),
    /// sorted from oldest to newest.
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarketData>>;
}

/// Fetches daily price history from the Yahoo Finance chart API.
///
/// The endpoint returns one JSON document per symbol with parallel arrays of
/// timestamps and OHLCV values. Missing values come back as `null`.
pub struct DataIngestion {
    base_url: String,
    client: reqwest::Client,
}

impl DataIngestion {
    /// Creates a new `DataIngestion` with an HTTP client configured from `config`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            client,
        })
    }
}

#[async_trait]
impl PriceSource for DataIngestion {
    async fn fetch_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<MarketData>> {
        let url = format!("{}/{}", self.base_url, symbol);
        let period1 = midnight_utc(start);
        let period2 = midnight_utc(end);

        debug!(%url, period1, period2, "requesting price history");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,split".to_string()),
            ])
            .send()
            .await
            .with_context(|| format!("failed to request price history for {symbol}"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read price history for {symbol}"))?;

        // The provider reports unknown symbols as 404 with a JSON error body.
        if !status.is_success() {
            if let Ok(parsed) = serde_json::from_str::<ChartResponse>(&body) {
                if let Some(error) = parsed.chart.error {
                    return Err(anyhow!(
                        "market data error for {symbol}: {} - {}",
                        error.code,
                        error.description
                    ));
                }
            }
            return Err(anyhow!("market data request for {symbol} failed with {status}"));
        }

        let bars = parse_chart_response(symbol, &body)?;
        debug!(symbol, bars = bars.len(), "parsed price history");

        Ok(bars)
    }
}

fn midnight_utc(date: NaiveDate) -> i64 {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
        .timestamp()
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Parses a chart API document into daily bars sorted from oldest to newest.
///
/// Rows without a complete open/high/low/close are skipped. A missing adjusted
/// close falls back to the close. Timestamps are shifted by the exchange's
/// `gmtoffset` before the calendar date is taken.
///
/// # Errors
/// Returns an error if the document is malformed, carries a provider error,
/// or has no result
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<Vec<MarketData>> {
    let response: ChartResponse = serde_json::from_str(body)
        .with_context(|| format!("invalid market data response for {symbol}"))?;

    if let Some(error) = response.chart.error {
        return Err(anyhow!(
            "market data error for {symbol}: {} - {}",
            error.code,
            error.description
        ));
    }

    let result = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| anyhow!("no market data returned for {symbol}"))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adj_closes = result
        .indicators
        .adjclose
        .and_then(|series| series.into_iter().next())
        .map(|series| series.adjclose)
        .unwrap_or_default();

    let cell = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close)) = (
            cell(&quote.open, i),
            cell(&quote.high, i),
            cell(&quote.low, i),
            cell(&quote.close, i),
        ) else {
            continue;
        };

        let date = DateTime::from_timestamp(ts + result.meta.gmtoffset, 0)
            .ok_or_else(|| anyhow!("invalid timestamp {ts} for {symbol}"))?
            .date_naive();

        bars.push(MarketData {
            date,
            symbol: symbol.to_string(),
            open,
            high,
            low,
            close,
            adj_close: cell(&adj_closes, i).unwrap_or(close),
            volume: cell(&quote.volume, i).unwrap_or(0.0),
        });
    }

    // Rows that land on the same date keep the later one.
    bars.reverse();
    bars.sort_by(|a, b| a.date.cmp(&b.date));
    bars.dedup_by(|dropped, kept| dropped.date == kept.date);

    Ok(bars)
}

/// Price history for a set of tickers over one date range.
///
/// `prices` holds adjusted closes outer-joined on date, one column per ticker
/// sorted by symbol; `bars` keeps the full daily bars per ticker, in selection
/// order, for the candlestick charts.
#[derive(Debug, Clone)]
pub struct PriceHistory {
    pub prices: PriceTable,
    pub bars: Vec<(String, Vec<MarketData>)>,
}

impl PriceHistory {
    pub fn bars_for(&self, symbol: &str) -> &[MarketData] {
        self.bars
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, bars)| bars.as_slice())
            .unwrap_or(&[])
    }
}

/// Downloads daily history for every ticker, one request per ticker in order.
///
/// A ticker with no rows in range keeps an empty column rather than failing the
/// whole download.
///
/// # Errors
/// Propagates the first fetch error
pub async fn download_prices(
    source: &dyn PriceSource,
    tickers: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<PriceHistory> {
    let mut bars = Vec::with_capacity(tickers.len());

    for symbol in tickers {
        let history = source.fetch_daily_bars(symbol, start, end).await?;
        if history.is_empty() {
            warn!(symbol = %symbol, %start, %end, "no price data in range");
        } else {
            info!(symbol = %symbol, rows = history.len(), "downloaded price history");
        }
        bars.push((symbol.clone(), history));
    }

    let mut series: Vec<(String, Vec<(NaiveDate, f64)>)> = bars
        .iter()
        .map(|(symbol, history)| {
            let closes = history.iter().map(|bar| (bar.date, bar.adj_close)).collect();
            (symbol.clone(), closes)
        })
        .collect();
    // Price columns are ordered by symbol, whatever order they were selected in.
    series.sort_by(|a, b| a.0.cmp(&b.0));

    let prices = PriceTable::from_series(series);

    Ok(PriceHistory { prices, bars })
}
