use crate::analytics::{calculate_risk_metrics, RiskReport};
use crate::config::DashboardConfig;
use crate::data::{download_prices, rolling_mean, CorrelationMatrix, PriceHistory, PriceSource, PriceTable};
use crate::render::{line_chart, line_summary, CandlestickSeries, Page, Section, Table};
use anyhow::Result;
use tracing::{debug, info};

pub const TITLE: &str = "Enhanced Finance Dashboard";
pub const EMPTY_PRICES_MESSAGE: &str = "No data available to calculate risk metrics.";

/// Everything derived from one download, ready to render.
///
/// # Fields
/// * `history`: Adjusted closes and daily bars as downloaded
/// * `correlation`: Correlation of daily returns between assets
/// * `chart_data`: Cumulative returns plus one `"{asset} MA {window}"` column per overlay
/// * `risk`: Risk metrics, `None` when no prices were returned at all
/// * `candles`: One candlestick series per selected asset
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub history: PriceHistory,
    pub correlation: CorrelationMatrix,
    pub chart_data: PriceTable,
    pub risk: Option<RiskReport>,
    pub candles: Vec<CandlestickSeries>,
}

/// Fetches prices for the selected assets and derives every dashboard table.
///
/// Returns `Ok(None)` without touching `source` when no assets are selected.
///
/// # Errors
/// Propagates download failures
pub async fn build_view(
    source: &dyn PriceSource,
    config: &DashboardConfig,
) -> Result<Option<DashboardView>> {
    if config.tickers.is_empty() {
        info!("no assets selected, nothing to compute");
        return Ok(None);
    }

    let history = download_prices(source, &config.tickers, config.start, config.end).await?;
    let prices = &history.prices;
    debug!(rows = prices.len(), assets = prices.columns().len(), "price table ready");

    let correlation = prices.pct_change().correlation();
    let chart_data = returns_chart_data(prices, &config.tickers, &config.ma_windows)?;

    let risk = if prices.is_empty() {
        None
    } else {
        Some(calculate_risk_metrics(prices))
    };

    let candles = config
        .tickers
        .iter()
        .map(|symbol| CandlestickSeries::from_bars(symbol, history.bars_for(symbol)))
        .collect();

    Ok(Some(DashboardView {
        history,
        correlation,
        chart_data,
        risk,
        candles,
    }))
}

/// Cumulative returns of every asset followed by moving averages of raw prices,
/// grouped by window, then by asset.
fn returns_chart_data(
    prices: &PriceTable,
    tickers: &[String],
    windows: &[usize],
) -> Result<PriceTable> {
    let mut chart_data = prices.relative_returns();

    for &window in windows {
        for asset in tickers {
            let averages = match prices.column(asset) {
                Some(cells) => rolling_mean(cells, window),
                None => vec![None; prices.len()],
            };
            chart_data = chart_data.with_column(format!("{asset} MA {window}"), averages)?;
        }
    }

    Ok(chart_data)
}

/// Lays out the dashboard sections in display order.
pub fn render(config: &DashboardConfig, view: Option<&DashboardView>) -> Page {
    let mut page = Page::new();
    page.push(Section::Title(TITLE.to_string()));

    let Some(view) = view else {
        return page;
    };

    page.push(Section::Header("Raw Data".to_string()));
    page.push(Section::Table(Table::from_prices(&view.history.prices)));

    page.push(Section::Header("Correlation Matrix".to_string()));
    page.push(Section::Table(Table::from_correlation(&view.correlation)));

    page.push(Section::Header(returns_header(&config.tickers)));
    page.push(Section::Chart {
        spec: line_chart(&view.chart_data),
        summary: Some(line_summary(&view.chart_data)),
    });

    page.push(Section::Header("Risk Metrics".to_string()));
    match &view.risk {
        Some(report) => page.push(Section::Table(Table::from_risk(report))),
        None => page.push(Section::Text(EMPTY_PRICES_MESSAGE.to_string())),
    }

    page.push(Section::Header("Candlestick Charts".to_string()));
    for series in &view.candles {
        page.push(Section::Subheader(format!(
            "Candlestick Chart for {}",
            series.symbol
        )));
        page.push(Section::Chart {
            spec: series.to_spec(),
            summary: Some(series.tail_table(5)),
        });
    }

    page
}

fn returns_header(tickers: &[String]) -> String {
    let quoted: Vec<String> = tickers.iter().map(|t| format!("'{t}'")).collect();
    format!("Returns of [{}]", quoted.join(", "))
}
