//! Hypothesis tests over score columns. All tests are two-sided and judged
//! against [`SIGNIFICANCE_LEVEL`].

pub mod groups;
pub mod paired;

use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::fmt;

pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    LengthMismatch { left: usize, right: usize },
    TooFewObservations { needed: usize, got: usize },
    TooFewGroups(usize),
    EmptyGroup(String),
    Distribution(String),
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::LengthMismatch { left, right } => {
                write!(f, "paired samples differ in length ({left} vs {right})")
            }
            StatsError::TooFewObservations { needed, got } => {
                write!(f, "need at least {needed} observations, got {got}")
            }
            StatsError::TooFewGroups(n) => write!(f, "need at least 2 groups, got {n}"),
            StatsError::EmptyGroup(name) => write!(f, "group `{name}` has no observations"),
            StatsError::Distribution(msg) => write!(f, "distribution error: {msg}"),
        }
    }
}

impl std::error::Error for StatsError {}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sum of squared deviations from the mean.
pub(crate) fn sum_of_squares(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum()
}

/// Sample (n − 1) variance.
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    sum_of_squares(values) / (values.len() as f64 - 1.0)
}

/// Turn a difference and its standard error into `(t, p)`. A zero standard
/// error gives `t = 0, p = 1` for a zero difference and `t = ±∞, p = 0`
/// otherwise.
pub(crate) fn t_statistic(difference: f64, std_error: f64, df: f64) -> Result<(f64, f64), StatsError> {
    if std_error == 0.0 {
        return Ok(if difference == 0.0 {
            (0.0, 1.0)
        } else {
            (difference.signum() * f64::INFINITY, 0.0)
        });
    }
    let t = difference / std_error;
    Ok((t, two_sided_t_p(t, df)?))
}

pub(crate) fn two_sided_t_p(t: f64, df: f64) -> Result<f64, StatsError> {
    if t.is_nan() {
        return Ok(f64::NAN);
    }
    if t.is_infinite() {
        return Ok(0.0);
    }
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}

pub(crate) fn f_upper_tail(f: f64, df_between: f64, df_within: f64) -> Result<f64, StatsError> {
    if f.is_nan() {
        return Ok(f64::NAN);
    }
    if f.is_infinite() {
        return Ok(0.0);
    }
    let dist = FisherSnedecor::new(df_between, df_within)
        .map_err(|e| StatsError::Distribution(e.to_string()))?;
    Ok(dist.sf(f))
}
