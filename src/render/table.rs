use super::escape_html;
use crate::analytics::{RiskReport, NO_DATA_MESSAGE};
use crate::data::{CorrelationMatrix, PriceTable};
use std::fmt;

/// A labelled grid of pre-formatted cells, printed like a data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub index_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<(String, Vec<String>)>,
}

/// Formats an optional number the way the frames print it; empty cells show as `NaN`.
pub fn format_cell(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_nan() => "NaN".to_string(),
        Some(v) => format!("{v:.6}"),
        None => "NaN".to_string(),
    }
}

impl Table {
    /// Tabulates a price table: one row per date, one column per asset.
    ///
    /// # Arguments
    /// * `prices`: Adjusted closes, or any other date-indexed table
    ///
    /// # Returns
    /// A `Date`-indexed table with every row, empty cells shown as `NaN`
    pub fn from_prices(prices: &PriceTable) -> Self {
        Self {
            index_name: "Date".to_string(),
            headers: prices.columns().to_vec(),
            rows: prices
                .dates()
                .iter()
                .enumerate()
                .map(|(i, date)| {
                    let cells = prices.row(i).into_iter().map(format_cell).collect();
                    (date.to_string(), cells)
                })
                .collect(),
        }
    }

    /// Tabulates a correlation matrix with the asset labels on both axes.
    pub fn from_correlation(matrix: &CorrelationMatrix) -> Self {
        Self {
            index_name: String::new(),
            headers: matrix.labels.clone(),
            rows: matrix
                .labels
                .iter()
                .zip(&matrix.values)
                .map(|(label, row)| {
                    (label.clone(), row.iter().copied().map(format_cell).collect())
                })
                .collect(),
        }
    }

    /// One `Value` row of metrics, or a one-cell `Message` table for missing data.
    pub fn from_risk(report: &RiskReport) -> Self {
        match report {
            RiskReport::Metrics(metrics) => {
                let named = metrics.named();
                Self {
                    index_name: String::new(),
                    headers: named.iter().map(|(name, _)| name.to_string()).collect(),
                    rows: vec![(
                        "Value".to_string(),
                        named.iter().map(|(_, v)| format_cell(Some(*v))).collect(),
                    )],
                }
            }
            RiskReport::NoData => Self {
                index_name: String::new(),
                headers: vec!["Message".to_string()],
                rows: vec![("0".to_string(), vec![NO_DATA_MESSAGE.to_string()])],
            },
        }
    }

    /// Keeps the first `head` and last `tail` rows with a `...` row between them.
    pub fn preview(&self, head: usize, tail: usize) -> Self {
        if self.rows.len() <= head + tail {
            return self.clone();
        }

        let ellipsis = ("...".to_string(), vec!["...".to_string(); self.headers.len()]);
        let rows = self.rows[..head]
            .iter()
            .cloned()
            .chain(std::iter::once(ellipsis))
            .chain(self.rows[self.rows.len() - tail..].iter().cloned())
            .collect();

        Self {
            index_name: self.index_name.clone(),
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Renders the full table as an HTML `<table>`, escaping every label and cell.
    ///
    /// # Returns
    /// The markup, with the index column as row headers (`<th>`)
    pub fn to_html(&self) -> String {
        let mut html = String::from("<table>\n<thead><tr>");
        html.push_str(&format!("<th>{}</th>", escape_html(&self.index_name)));
        for header in &self.headers {
            html.push_str(&format!("<th>{}</th>", escape_html(header)));
        }
        html.push_str("</tr></thead>\n<tbody>\n");

        for (label, cells) in &self.rows {
            html.push_str(&format!("<tr><th>{}</th>", escape_html(label)));
            for cell in cells {
                html.push_str(&format!("<td>{}</td>", escape_html(cell)));
            }
            html.push_str("</tr>\n");
        }

        html.push_str("</tbody>\n</table>");
        html
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self
            .rows
            .iter()
            .map(|(label, _)| label.chars().count())
            .chain(std::iter::once(self.index_name.chars().count()))
            .max()
            .unwrap_or(0);

        let widths: Vec<usize> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|(_, cells)| cells.get(i))
                    .map(|cell| cell.chars().count())
                    .chain(std::iter::once(header.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write!(f, "{:<label_width$}", self.index_name)?;
        for (header, width) in self.headers.iter().zip(widths.iter().copied()) {
            write!(f, "  {header:>width$}")?;
        }
        writeln!(f)?;

        for (label, cells) in &self.rows {
            write!(f, "{label:<label_width$}")?;
            for (cell, width) in cells.iter().zip(widths.iter().copied()) {
                write!(f, "  {cell:>width$}")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::RiskMetrics;
    use chrono::NaiveDate;

    fn prices(rows: usize) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        PriceTable::new(
            (0..rows)
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
            vec!["SPY".to_string(), "BTC-USD".to_string()],
            vec![
                (0..rows).map(|i| Some(100.0 + i as f64)).collect(),
                (0..rows).map(|i| (i % 2 == 0).then_some(1.5)).collect(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_price_table_rows() {
        let table = Table::from_prices(&prices(2));

        assert_eq!(table.headers, vec!["SPY", "BTC-USD"]);
        assert_eq!(table.rows[0].0, "2021-01-01");
        assert_eq!(table.rows[0].1, vec!["100.000000", "1.500000"]);
        assert_eq!(table.rows[1].1, vec!["101.000000", "NaN"]);
    }

    #[test]
    fn test_preview_elides_middle_rows() {
        let table = Table::from_prices(&prices(12)).preview(5, 5);

        assert_eq!(table.rows.len(), 11);
        assert_eq!(table.rows[5].0, "...");
        assert_eq!(table.rows[10].0, "2021-01-12");
        assert_eq!(Table::from_prices(&prices(3)).preview(5, 5).rows.len(), 3);
    }

    #[test]
    fn test_risk_tables() {
        let metrics = Table::from_risk(&RiskReport::Metrics(RiskMetrics {
            annualized_volatility: 0.2,
            annualized_return: 0.1,
            sharpe_ratio: 0.5,
            max_drawdown: -0.25,
            sortino_ratio: 0.75,
        }));
        assert_eq!(metrics.headers[3], "Max Drawdown");
        assert_eq!(metrics.rows[0].0, "Value");
        assert_eq!(metrics.rows[0].1[3], "-0.250000");

        let placeholder = Table::from_risk(&RiskReport::NoData);
        assert_eq!(placeholder.headers, vec!["Message"]);
        assert_eq!(placeholder.rows[0].1, vec![NO_DATA_MESSAGE]);
    }

    #[test]
    fn test_display_aligns_columns() {
        let table = Table {
            index_name: String::new(),
            headers: vec!["A".to_string(), "LONGER".to_string()],
            rows: vec![("x".to_string(), vec!["1.5".to_string(), "NaN".to_string()])],
        };

        let text = table.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "     A  LONGER");
        assert_eq!(lines[1], "x  1.5     NaN");
    }

    #[test]
    fn test_html_escapes_cells() {
        let table = Table {
            index_name: "Date".to_string(),
            headers: vec!["<b>".to_string()],
            rows: vec![("r".to_string(), vec!["a&b".to_string()])],
        };

        let html = table.to_html();
        assert!(html.contains("<th>&lt;b&gt;</th>"));
        assert!(html.contains("<td>a&amp;b</td>"));
    }
}
