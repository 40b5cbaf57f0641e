use crate::analysis::AnalysisError;
use hoops_api::{Cell, Table};
use serde::Serialize;
use std::fmt::Write as _;

/// Summary statistics for one numeric column. Nulls are not counted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN below two values.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub fn of(column: impl Into<String>, values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let count = sorted.len();
        let mean = sorted.iter().sum::<f64>() / count as f64;
        let std = if count < 2 {
            f64::NAN
        } else {
            (sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        };
        Self {
            column: column.into(),
            count,
            mean,
            std,
            min: sorted.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q75: quantile(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let below = pos.floor() as usize;
            let above = pos.ceil() as usize;
            sorted[below] + (sorted[above] - sorted[below]) * (pos - below as f64)
        }
    }
}

/// Summaries of the named columns, or of every numeric column when `columns`
/// is `None`. A column is numeric when all its non-null cells are integers or
/// floats.
pub fn describe(table: &Table, columns: Option<&[&str]>) -> Result<Vec<ColumnSummary>, AnalysisError> {
    match columns {
        Some(names) => names
            .iter()
            .map(|name| {
                let cells = table
                    .column(name)
                    .ok_or_else(|| AnalysisError::MissingColumn((*name).to_owned()))?;
                let values = numeric_values(cells).map_err(|row| AnalysisError::NotNumeric {
                    column: (*name).to_owned(),
                    row,
                })?;
                Ok(ColumnSummary::of(*name, &values))
            })
            .collect(),
        None => Ok(table
            .columns()
            .iter()
            .filter_map(|name| {
                let values = numeric_values(table.column(name)?).ok()?;
                (!values.is_empty()).then(|| ColumnSummary::of(name.as_str(), &values))
            })
            .collect()),
    }
}

/// Non-null values as floats, or the index of the first non-numeric cell.
fn numeric_values<'a>(cells: impl Iterator<Item = &'a Cell>) -> Result<Vec<f64>, usize> {
    let mut values = Vec::new();
    for (row, cell) in cells.enumerate() {
        match cell {
            Cell::Null => {}
            Cell::Int(_) | Cell::Float(_) => values.push(cell.as_f64().ok_or(row)?),
            _ => return Err(row),
        }
    }
    Ok(values)
}

/// Renders summaries as a fixed-width table, one column per summary.
pub fn render(summaries: &[ColumnSummary]) -> String {
    let width = summaries.iter().map(|s| s.column.len()).max().unwrap_or(0).max(12);
    let mut out = format!("{:<6}", "");
    for s in summaries {
        let _ = write!(out, " {:>width$}", s.column);
    }
    out.push('\n');

    let rows: [(&str, fn(&ColumnSummary) -> f64); 8] = [
        ("count", |s| s.count as f64),
        ("mean", |s| s.mean),
        ("std", |s| s.std),
        ("min", |s| s.min),
        ("25%", |s| s.q25),
        ("50%", |s| s.median),
        ("75%", |s| s.q75),
        ("max", |s| s.max),
    ];
    for (label, value) in rows {
        let _ = write!(out, "{label:<6}");
        for s in summaries {
            let _ = write!(out, " {:>width$.3}", value(s));
        }
        out.push('\n');
    }
    out
}
