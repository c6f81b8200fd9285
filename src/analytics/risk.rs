use crate::data::PriceTable;

/// Trading days used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Shown in place of the metrics when no daily return can be computed.
pub const NO_DATA_MESSAGE: &str = "No data available for risk metrics";

/// Portfolio-level risk metrics for an equally weighted view of the selected assets.
///
/// Volatility and return are averaged across assets before the ratios are
/// taken; drawdown is the worst of any single asset.
///
/// # Fields
/// * `annualized_volatility`: Mean per-asset sample standard deviation of daily returns, times √252
/// * `annualized_return`: Mean per-asset mean daily return, times 252
/// * `sharpe_ratio`: Return over volatility, 0 when volatility is 0
/// * `max_drawdown`: Deepest peak-to-trough decline of cumulative growth, always ≤ 0
/// * `sortino_ratio`: Return over downside volatility, 0 when downside volatility is 0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskMetrics {
    pub annualized_volatility: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub sortino_ratio: f64,
}

impl RiskMetrics {
    /// Metric names and values in display order.
    pub fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("Annualized Volatility", self.annualized_volatility),
            ("Annualized Return", self.annualized_return),
            ("Sharpe Ratio", self.sharpe_ratio),
            ("Max Drawdown", self.max_drawdown),
            ("Sortino Ratio", self.sortino_ratio),
        ]
    }
}

/// Risk metrics, or a marker that there were too few prices to compute them.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskReport {
    Metrics(RiskMetrics),
    NoData,
}

/// Computes risk metrics from a table of prices.
///
/// Daily returns are taken with [`PriceTable::pct_change`] and every row with a
/// missing return is dropped, which always drops the first row. If nothing is
/// left, e.g. fewer than two prices, the result is [`RiskReport::NoData`].
pub fn calculate_risk_metrics(prices: &PriceTable) -> RiskReport {
    let daily_returns = prices.pct_change().drop_incomplete_rows();
    if daily_returns.is_empty() {
        return RiskReport::NoData;
    }

    let assets: Vec<Vec<f64>> = daily_returns
        .iter_columns()
        .map(|(_, cells)| cells.iter().flatten().copied().collect())
        .collect();

    let annualization = TRADING_DAYS_PER_YEAR.sqrt();

    let annualized_volatility =
        mean_across(assets.iter().map(|returns| sample_std(returns))) * annualization;
    let annualized_return =
        mean_across(assets.iter().map(|returns| mean(returns))) * TRADING_DAYS_PER_YEAR;

    let downside_volatility = mean_across(assets.iter().map(|returns| {
        let losses: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        sample_std(&losses)
    })) * annualization;

    let max_drawdown = assets
        .iter()
        .map(|returns| max_drawdown(returns))
        .fold(0.0, f64::min);

    RiskReport::Metrics(RiskMetrics {
        annualized_volatility,
        annualized_return,
        sharpe_ratio: ratio(annualized_return, annualized_volatility),
        max_drawdown,
        sortino_ratio: ratio(annualized_return, downside_volatility),
    })
}

/// Divides, yielding 0 for a zero or undefined denominator.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        0.0
    } else {
        numerator / denominator
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1); undefined below two observations.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let avg = mean(values)?;
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Mean of the defined per-asset statistics; 0 when none is defined.
fn mean_across(stats: impl Iterator<Item = Option<f64>>) -> f64 {
    let defined: Vec<f64> = stats.flatten().collect();
    mean(&defined).unwrap_or(0.0)
}

/// Drawdown of cumulative growth `cumprod(1 + r)` from its running peak, per step.
pub fn drawdown_curve(returns: &[f64]) -> Vec<f64> {
    let mut growth = 1.0;
    let mut peak = f64::NEG_INFINITY;

    returns
        .iter()
        .map(|r| {
            growth *= 1.0 + r;
            peak = peak.max(growth);
            growth / peak - 1.0
        })
        .collect()
}

/// Most negative point of [`drawdown_curve`]; 0 for an empty or never-falling series.
pub fn max_drawdown(returns: &[f64]) -> f64 {
    drawdown_curve(returns).into_iter().fold(0.0, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn prices(columns: &[(&str, &[f64])]) -> PriceTable {
        let rows = columns.first().map_or(0, |(_, p)| p.len());
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        PriceTable::new(
            (0..rows)
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect(),
            columns.iter().map(|(name, _)| name.to_string()).collect(),
            columns
                .iter()
                .map(|(_, p)| p.iter().copied().map(Some).collect())
                .collect(),
        )
        .unwrap()
    }

    fn metrics(report: RiskReport) -> RiskMetrics {
        match report {
            RiskReport::Metrics(metrics) => metrics,
            RiskReport::NoData => panic!("expected metrics"),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_fewer_than_two_rows_has_no_data() {
        assert_eq!(calculate_risk_metrics(&prices(&[("A", &[])])), RiskReport::NoData);
        assert_eq!(
            calculate_risk_metrics(&prices(&[("A", &[100.0])])),
            RiskReport::NoData
        );
        assert_eq!(calculate_risk_metrics(&prices(&[])), RiskReport::NoData);
    }

    #[test]
    fn test_constant_prices_have_zero_ratios() {
        let result = metrics(calculate_risk_metrics(&prices(&[(
            "A",
            &[50.0, 50.0, 50.0, 50.0],
        )])));

        assert_eq!(result.annualized_volatility, 0.0);
        assert_eq!(result.annualized_return, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.sortino_ratio, 0.0);
        assert_eq!(result.max_drawdown, 0.0);
    }

    #[test]
    fn test_growing_and_flat_assets() {
        let result = metrics(calculate_risk_metrics(&prices(&[
            ("GROW", &[100.0, 110.0, 121.0]),
            ("FLAT", &[100.0, 100.0, 100.0]),
        ])));

        // Both assets have constant daily returns (10% and 0%).
        assert_close(result.annualized_return, (0.1 + 0.0) / 2.0 * 252.0);
        assert_close(result.annualized_volatility, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.sortino_ratio, 0.0);
        assert_eq!(result.max_drawdown, 0.0);
    }

    #[test]
    fn test_single_asset_closed_form() {
        // Daily returns: +10%, -10%, +10%, -5%.
        let result = metrics(calculate_risk_metrics(&prices(&[(
            "A",
            &[100.0, 110.0, 99.0, 108.9, 103.455],
        )])));

        let annualized_return = 0.0125 * 252.0;
        let volatility = (0.031875_f64 / 3.0).sqrt() * 252.0_f64.sqrt();
        let downside = 0.00125_f64.sqrt() * 252.0_f64.sqrt();

        assert_close(result.annualized_return, annualized_return);
        assert_close(result.annualized_volatility, volatility);
        assert_close(result.sharpe_ratio, annualized_return / volatility);
        assert_close(result.sortino_ratio, annualized_return / downside);
        assert_close(result.max_drawdown, -0.1);
    }

    #[test]
    fn test_single_return_has_undefined_spread() {
        let result = metrics(calculate_risk_metrics(&prices(&[("A", &[100.0, 90.0])])));

        assert_close(result.annualized_return, -0.1 * 252.0);
        assert_eq!(result.annualized_volatility, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.sortino_ratio, 0.0);
        // The running peak starts at the first observed growth, not at 1.
        assert_eq!(result.max_drawdown, 0.0);
    }

    #[test]
    fn test_identical_losses_have_zero_sortino() {
        // Two identical negative returns: downside deviation is exactly zero.
        let result = metrics(calculate_risk_metrics(&prices(&[(
            "A",
            &[100.0, 50.0, 25.0, 50.0],
        )])));

        assert!(result.annualized_volatility > 0.0);
        assert_eq!(result.sortino_ratio, 0.0);
        assert_close(result.max_drawdown, -0.5);
    }

    #[test]
    fn test_rows_missing_any_asset_are_ignored() {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let table = PriceTable::new(
            (0..3).map(|i| start + chrono::Duration::days(i)).collect(),
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec![Some(100.0), Some(110.0), Some(121.0)],
                vec![None, None, Some(10.0)],
            ],
        )
        .unwrap();

        assert_eq!(calculate_risk_metrics(&table), RiskReport::NoData);
    }

    #[test]
    fn test_drawdown_curve() {
        let curve = drawdown_curve(&[0.1, -0.5, 0.5, 1.0]);
        assert_close(curve[0], 0.0);
        assert_close(curve[1], -0.5);
        assert_close(curve[2], -0.25);
        assert_close(curve[3], 0.0);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn prop_max_drawdown_is_never_positive(
            series in prop::collection::vec(0.01f64..1_000.0, 0..60)
        ) {
            match calculate_risk_metrics(&prices(&[("A", series.as_slice())])) {
                RiskReport::Metrics(m) => prop_assert!(m.max_drawdown <= 0.0),
                RiskReport::NoData => prop_assert!(series.len() < 2),
            }
        }

        #[test]
        fn prop_increasing_prices_never_draw_down(
            steps in prop::collection::vec(0.0f64..5.0, 1..60)
        ) {
            let series: Vec<f64> = steps
                .iter()
                .scan(10.0, |price, step| {
                    *price += step;
                    Some(*price)
                })
                .collect();

            let report = calculate_risk_metrics(&prices(&[("A", series.as_slice())]));
            if let RiskReport::Metrics(m) = report {
                prop_assert_eq!(m.max_drawdown, 0.0);
            }
        }

        #[test]
        fn prop_first_cumulative_return_is_zero(
            a in prop::collection::vec(0.01f64..1_000.0, 1..30),
            b in prop::collection::vec(0.01f64..1_000.0, 1..30),
        ) {
            let rows = a.len().min(b.len());
            let table = prices(&[("A", &a[..rows]), ("B", &b[..rows])]);
            let cumulative = table.relative_returns();
            for (_, cells) in cumulative.iter_columns() {
                prop_assert_eq!(cells[0], Some(0.0));
            }
        }
    }
}
