use super::{SIGNIFICANCE_LEVEL, StatsError, mean, sample_variance, t_statistic};
use serde::Serialize;
use std::fmt;

/// Result of a paired-samples t test on `first − second`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedTTest {
    pub pairs: usize,
    pub mean_difference: f64,
    pub statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

impl PairedTTest {
    pub fn rejects_null(&self) -> bool {
        self.p_value < SIGNIFICANCE_LEVEL
    }
}

pub fn paired_t_test(first: &[f64], second: &[f64]) -> Result<PairedTTest, StatsError> {
    if first.len() != second.len() {
        return Err(StatsError::LengthMismatch { left: first.len(), right: second.len() });
    }
    if first.len() < 2 {
        return Err(StatsError::TooFewObservations { needed: 2, got: first.len() });
    }

    let diffs: Vec<f64> = first.iter().zip(second).map(|(a, b)| a - b).collect();
    let n = diffs.len() as f64;
    let mean_difference = mean(&diffs);
    let std_error = (sample_variance(&diffs) / n).sqrt();
    let degrees_of_freedom = n - 1.0;
    let (statistic, p_value) = t_statistic(mean_difference, std_error, degrees_of_freedom)?;

    Ok(PairedTTest {
        pairs: diffs.len(),
        mean_difference,
        statistic,
        degrees_of_freedom,
        p_value,
    })
}

impl fmt::Display for PairedTTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Paired t-test over {} games (null hypothesis: mean difference is 0)", self.pairs)?;
        writeln!(
            f,
            "  mean difference {:.2}, t = {:.2}, p = {:.4}",
            self.mean_difference, self.statistic, self.p_value
        )?;
        if self.rejects_null() {
            write!(f, "  p < {SIGNIFICANCE_LEVEL}: reject the null hypothesis")
        } else {
            write!(f, "  p >= {SIGNIFICANCE_LEVEL}: can NOT reject the null hypothesis")
        }
    }
}
