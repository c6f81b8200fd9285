use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// A date-indexed table of optional values, one column per asset.
///
/// Rows are sorted by date, oldest first. Cells are `None` where an asset has no
/// observation for that date, e.g. equities on weekends next to crypto assets.
/// Storage is column-major: `values[column][row]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    values: Vec<Vec<Option<f64>>>,
}

impl PriceTable {
    /// Creates a table from its parts.
    ///
    /// # Errors
    /// Returns an error if the dates are not strictly increasing, or if the
    /// number of columns or any column length does not match
    pub fn new(
        dates: Vec<NaiveDate>,
        columns: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(anyhow!(
                "{} column names for {} columns",
                columns.len(),
                values.len()
            ));
        }
        if let Some((name, column)) = columns
            .iter()
            .zip(&values)
            .find(|(_, column)| column.len() != dates.len())
        {
            return Err(anyhow!(
                "column {name} has {} rows, expected {}",
                column.len(),
                dates.len()
            ));
        }
        if dates.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(anyhow!("dates must be strictly increasing"));
        }

        Ok(Self {
            dates,
            columns,
            values,
        })
    }

    /// Outer-joins per-asset `(date, value)` series on date.
    ///
    /// Columns keep the order of `series`. When a series repeats a date the last
    /// value wins.
    ///
    /// # Arguments
    /// * `series`: One `(name, points)` pair per column, points in any order
    ///
    /// # Returns
    /// A table indexed by the union of all dates, with `None` where a series has
    /// no point for a date
    pub fn from_series(series: Vec<(String, Vec<(NaiveDate, f64)>)>) -> Self {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, points)| points.iter().map(|(date, _)| *date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut columns = Vec::with_capacity(series.len());
        let mut values = Vec::with_capacity(series.len());
        for (name, points) in series {
            let mut column = vec![None; dates.len()];
            for (date, value) in points {
                if let Ok(row) = dates.binary_search(&date) {
                    column[row] = Some(value);
                }
            }
            columns.push(name);
            values.push(column);
        }

        Self {
            dates,
            columns,
            values,
        }
    }

    /// Row index, oldest first.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Column names in display order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Looks up a column by name.
    ///
    /// # Arguments
    /// * `name`: Column name, matched exactly
    ///
    /// # Returns
    /// The column's cells, one per row, or `None` if there is no such column
    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| self.values[i].as_slice())
    }

    /// Iterates `(name, cells)` pairs in column order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> + '_ {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    /// Cells of row `index` across all columns, in column order.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds
    pub fn row(&self, index: usize) -> Vec<Option<f64>> {
        self.values.iter().map(|column| column[index]).collect()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// A table is empty when it has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Appends a column, replacing any existing column of the same name.
    ///
    /// # Errors
    /// Returns an error if `cells` does not have one entry per row
    pub fn with_column(mut self, name: impl Into<String>, cells: Vec<Option<f64>>) -> Result<Self> {
        let name = name.into();
        if cells.len() != self.dates.len() {
            return Err(anyhow!(
                "column {name} has {} rows, expected {}",
                cells.len(),
                self.dates.len()
            ));
        }
        match self.columns.iter().position(|c| *c == name) {
            Some(i) => self.values[i] = cells,
            None => {
                self.columns.push(name);
                self.values.push(cells);
            }
        }
        Ok(self)
    }

    // Applies `f` to every column, keeping the dates and names.
    fn map_columns(&self, f: impl Fn(&[Option<f64>]) -> Vec<Option<f64>>) -> Self {
        Self {
            dates: self.dates.clone(),
            columns: self.columns.clone(),
            values: self.values.iter().map(|column| f(column)).collect(),
        }
    }

    /// Daily simple returns per column, see [`pct_change`].
    pub fn pct_change(&self) -> Self {
        self.map_columns(pct_change)
    }

    /// Cumulative returns per column, see [`relative_returns`].
    pub fn relative_returns(&self) -> Self {
        self.pct_change().map_columns(relative_returns)
    }

    /// Removes every row that has an empty cell in any column.
    pub fn drop_incomplete_rows(&self) -> Self {
        let keep: Vec<usize> = (0..self.dates.len())
            .filter(|&row| self.values.iter().all(|column| column[row].is_some()))
            .collect();

        Self {
            dates: keep.iter().map(|&row| self.dates[row]).collect(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|column| keep.iter().map(|&row| column[row]).collect())
                .collect(),
        }
    }

    /// Pairwise Pearson correlation between columns.
    ///
    /// Each pair uses the rows where both cells are present. The diagonal is
    /// exactly 1 for any column with variance.
    ///
    /// # Returns
    /// A matrix labelled by this table's columns, with `None` for pairs that have
    /// fewer than two shared rows or a constant column
    pub fn correlation(&self) -> CorrelationMatrix {
        let n = self.columns.len();
        let mut values = vec![vec![None; n]; n];

        for i in 0..n {
            for j in i..n {
                let r = pearson(&self.values[i], &self.values[j])
                    .map(|r| if i == j { 1.0 } else { r });
                values[i][j] = r;
                values[j][i] = r;
            }
        }

        CorrelationMatrix {
            labels: self.columns.clone(),
            values,
        }
    }
}

/// Square correlation matrix labelled by asset on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Correlation between the assets labelled `a` and `b`.
    #[cfg(test)]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.labels.iter().position(|l| l == a)?;
        let j = self.labels.iter().position(|l| l == b)?;
        self.values[i][j]
    }
}

/// Simple returns `price[t] / price[t-1] - 1`.
///
/// Gaps are forward-filled from the last observed price before differencing, so
/// a missing day followed by a quote yields the move since the last quote. The
/// first row, and every row before the first observation, is `None`.
pub fn pct_change(prices: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut previous: Option<f64> = None;

    prices
        .iter()
        .map(|&cell| {
            let current = cell.or(previous);
            let change = match (previous, current) {
                (Some(p), Some(c)) => Some(c / p - 1.0),
                _ => None,
            };
            previous = current;
            change
        })
        .collect()
}

/// Cumulative return `cumprod(1 + r) - 1`.
///
/// Empty cells are skipped by the running product and reported as `0.0`, so the
/// first row of a return series from [`pct_change`] is always zero.
pub fn relative_returns(returns: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut growth = 1.0;

    returns
        .iter()
        .map(|&cell| match cell {
            Some(r) => {
                growth *= 1.0 + r;
                Some(growth - 1.0)
            }
            None => Some(0.0),
        })
        .collect()
}

/// Trailing simple moving average over `window` cells.
///
/// A value is produced only when every cell in the window is present.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|end| {
            if end + 1 < window {
                return None;
            }
            let cells = &values[end + 1 - window..=end];
            let sum = cells.iter().copied().sum::<Option<f64>>()?;
            Some(sum / window as f64)
        })
        .collect()
}

/// Pearson correlation over rows where both cells are present.
fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }

    Some((cov / (var_a * var_b).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, d).unwrap()
    }

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a value");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn table(columns: &[(&str, Vec<Option<f64>>)]) -> PriceTable {
        let rows = columns.first().map_or(0, |(_, cells)| cells.len());
        PriceTable::new(
            (1..=rows as u32).map(day).collect(),
            columns.iter().map(|(name, _)| name.to_string()).collect(),
            columns.iter().map(|(_, cells)| cells.clone()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = PriceTable::new(
            vec![day(1), day(2)],
            vec!["A".to_string()],
            vec![vec![Some(1.0)]],
        );
        assert!(result.is_err());

        let unsorted = PriceTable::new(
            vec![day(2), day(1)],
            vec!["A".to_string()],
            vec![vec![Some(1.0), Some(2.0)]],
        );
        assert!(unsorted.is_err());
    }

    #[test]
    fn test_pct_change_forward_fills_gaps() {
        let returns = pct_change(&[None, Some(100.0), None, Some(110.0), Some(99.0)]);

        assert_eq!(returns[0], None);
        assert_eq!(returns[1], None);
        assert_close(returns[2], 0.0);
        assert_close(returns[3], 0.1);
        assert_close(returns[4], -0.1);
    }

    #[test]
    fn test_relative_returns_start_at_zero() {
        let prices = table(&[
            ("A", vec![Some(100.0), Some(110.0), Some(121.0)]),
            ("B", vec![None, Some(50.0), Some(25.0)]),
        ]);

        let cumulative = prices.relative_returns();
        let a = cumulative.column("A").unwrap();
        let b = cumulative.column("B").unwrap();

        assert_eq!(a[0], Some(0.0));
        assert_close(a[1], 0.1);
        assert_close(a[2], 0.21);
        assert_eq!(b[0], Some(0.0));
        assert_eq!(b[1], Some(0.0));
        assert_close(b[2], -0.5);
    }

    #[test]
    fn test_rolling_mean_requires_full_window() {
        let values = [Some(10.0), Some(11.0), Some(12.0), None, Some(14.0), Some(15.0)];

        let means = rolling_mean(&values, 2);
        assert_eq!(means[0], None);
        assert_close(means[1], 10.5);
        assert_close(means[2], 11.5);
        assert_eq!(means[3], None);
        assert_eq!(means[4], None);
        assert_close(means[5], 14.5);

        assert!(rolling_mean(&values, 10).iter().all(Option::is_none));
        assert!(rolling_mean(&values, 0).iter().all(Option::is_none));
    }

    #[test]
    fn test_drop_incomplete_rows() {
        let prices = table(&[
            ("A", vec![Some(1.0), Some(2.0), Some(3.0)]),
            ("B", vec![Some(1.0), None, Some(3.0)]),
        ]);

        let complete = prices.drop_incomplete_rows();
        assert_eq!(complete.dates(), &[day(1), day(3)]);
        assert_eq!(complete.column("B").unwrap(), &[Some(1.0), Some(3.0)]);
    }

    #[test]
    fn test_correlation_matrix() {
        let prices = table(&[
            ("UP", vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0)]),
            ("DOWN", vec![Some(8.0), Some(6.0), Some(4.0), Some(2.0)]),
            ("FLAT", vec![Some(5.0), Some(5.0), Some(5.0), Some(5.0)]),
        ]);

        let corr = prices.correlation();
        assert_eq!(corr.get("UP", "UP"), Some(1.0));
        assert_close(corr.get("UP", "DOWN"), -1.0);
        assert_eq!(corr.get("DOWN", "UP"), corr.get("UP", "DOWN"));
        assert_eq!(corr.get("FLAT", "UP"), None);
        assert_eq!(corr.get("FLAT", "FLAT"), None);
        assert_eq!(corr.get("UP", "MISSING"), None);
    }

    #[test]
    fn test_with_column_appends_and_replaces() {
        let prices = table(&[("A", vec![Some(1.0), Some(2.0)])]);

        let extended = prices
            .with_column("A MA 2", vec![None, Some(1.5)])
            .unwrap()
            .with_column("A", vec![Some(0.0), Some(0.0)])
            .unwrap();

        assert_eq!(extended.columns(), &["A", "A MA 2"]);
        assert_eq!(extended.column("A").unwrap(), &[Some(0.0), Some(0.0)]);
        assert!(extended.with_column("short", vec![None]).is_err());
    }

    #[test]
    fn test_from_series_last_duplicate_wins() {
        let prices = PriceTable::from_series(vec![(
            "A".to_string(),
            vec![(day(2), 1.0), (day(1), 2.0), (day(2), 3.0)],
        )]);

        assert_eq!(prices.dates(), &[day(1), day(2)]);
        assert_eq!(prices.column("A").unwrap(), &[Some(2.0), Some(3.0)]);
    }
}
