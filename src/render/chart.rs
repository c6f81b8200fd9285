//! Vega-Lite chart specifications.
//!
//! Charts are plain JSON documents; the page embeds them with vega-embed.

use super::table::{format_cell, Table};
use crate::data::{rolling_mean, MarketData, PriceTable};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Moving averages drawn over every candlestick chart, with their line colours.
pub const CANDLE_MOVING_AVERAGES: [(usize, &str); 2] = [(20, "blue"), (50, "orange")];

#[derive(Debug, Serialize)]
struct LinePoint<'a> {
    date: NaiveDate,
    series: &'a str,
    value: f64,
}

/// Line chart with one line per column of `chart_data`.
///
/// Empty cells are left out, so overlays start where their window fills.
pub fn line_chart(chart_data: &PriceTable) -> Value {
    let points: Vec<LinePoint> = chart_data
        .iter_columns()
        .flat_map(|(series, cells)| {
            chart_data
                .dates()
                .iter()
                .zip(cells)
                .filter_map(move |(date, cell)| {
                    cell.filter(|v| v.is_finite()).map(|value| LinePoint {
                        date: *date,
                        series,
                        value,
                    })
                })
        })
        .collect();

    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "width": "container",
        "height": 400,
        "data": { "values": points },
        "mark": "line",
        "encoding": {
            "x": { "field": "date", "type": "temporal", "title": "Date" },
            "y": { "field": "value", "type": "quantitative", "title": null },
            "color": { "field": "series", "type": "nominal", "title": null },
            "tooltip": [
                { "field": "date", "type": "temporal" },
                { "field": "series", "type": "nominal" },
                { "field": "value", "type": "quantitative", "format": ".4f" }
            ]
        }
    })
}

/// Latest value of every series in `chart_data`, as a one-row summary.
pub fn line_summary(chart_data: &PriceTable) -> Table {
    let latest = |cells: &[Option<f64>]| cells.iter().rev().find_map(|cell| *cell);

    Table {
        index_name: String::new(),
        headers: chart_data.columns().to_vec(),
        rows: vec![(
            chart_data
                .dates()
                .last()
                .map(ToString::to_string)
                .unwrap_or_default(),
            chart_data
                .iter_columns()
                .map(|(_, cells)| format_cell(latest(cells)))
                .collect(),
        )],
    }
}

/// One candle with its moving averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CandleRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(rename = "MA20")]
    pub ma20: Option<f64>,
    #[serde(rename = "MA50")]
    pub ma50: Option<f64>,
}

/// Daily candles for one asset with 20- and 50-day moving averages of the close.
#[derive(Debug, Clone, PartialEq)]
pub struct CandlestickSeries {
    pub symbol: String,
    pub rows: Vec<CandleRow>,
}

impl CandlestickSeries {
    pub fn from_bars(symbol: &str, bars: &[MarketData]) -> Self {
        let closes: Vec<Option<f64>> = bars.iter().map(|bar| Some(bar.close)).collect();
        let [(short, _), (long, _)] = CANDLE_MOVING_AVERAGES;
        let ma20 = rolling_mean(&closes, short);
        let ma50 = rolling_mean(&closes, long);

        let rows = bars
            .iter()
            .zip(ma20.into_iter().zip(ma50))
            .map(|(bar, (ma20, ma50))| CandleRow {
                date: bar.date,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                ma20,
                ma50,
            })
            .collect();

        Self {
            symbol: symbol.to_string(),
            rows,
        }
    }

    /// Layered chart: a Low-High rule, an Open-Close bar coloured by direction,
    /// and the two moving-average lines.
    pub fn to_spec(&self) -> Value {
        let [(_, short_color), (_, long_color)] = CANDLE_MOVING_AVERAGES;

        json!({
            "$schema": VEGA_LITE_SCHEMA,
            "width": "container",
            "height": 400,
            "data": { "values": self.rows },
            "encoding": {
                "x": { "field": "Date", "type": "temporal" }
            },
            "layer": [
                {
                    "mark": "rule",
                    "encoding": {
                        "y": { "field": "Low", "type": "quantitative", "scale": { "zero": false }, "title": null },
                        "y2": { "field": "High" },
                        "tooltip": [
                            { "field": "Date", "type": "temporal" },
                            { "field": "Open", "type": "quantitative" },
                            { "field": "High", "type": "quantitative" },
                            { "field": "Low", "type": "quantitative" },
                            { "field": "Close", "type": "quantitative" }
                        ]
                    }
                },
                {
                    "mark": "bar",
                    "encoding": {
                        "y": { "field": "Open", "type": "quantitative" },
                        "y2": { "field": "Close" },
                        "color": {
                            "condition": { "test": "datum.Open < datum.Close", "value": "green" },
                            "value": "red"
                        },
                        "tooltip": [
                            { "field": "Date", "type": "temporal" },
                            { "field": "Open", "type": "quantitative" },
                            { "field": "High", "type": "quantitative" },
                            { "field": "Low", "type": "quantitative" },
                            { "field": "Close", "type": "quantitative" }
                        ]
                    }
                },
                {
                    "mark": { "type": "line", "color": short_color },
                    "encoding": { "y": { "field": "MA20", "type": "quantitative" } }
                },
                {
                    "mark": { "type": "line", "color": long_color },
                    "encoding": { "y": { "field": "MA50", "type": "quantitative" } }
                }
            ]
        })
    }

    /// The last `rows` candles as a text table.
    pub fn tail_table(&self, rows: usize) -> Table {
        let start = self.rows.len().saturating_sub(rows);

        Table {
            index_name: "Date".to_string(),
            headers: ["Open", "High", "Low", "Close", "MA20", "MA50"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            rows: self.rows[start..]
                .iter()
                .map(|row| {
                    let cells = [
                        Some(row.open),
                        Some(row.high),
                        Some(row.low),
                        Some(row.close),
                        row.ma20,
                        row.ma50,
                    ];
                    (
                        row.date.to_string(),
                        cells.into_iter().map(format_cell).collect(),
                    )
                })
                .collect(),
        }
    }
}
