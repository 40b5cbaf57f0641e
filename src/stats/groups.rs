use super::{SIGNIFICANCE_LEVEL, StatsError, f_upper_tail, mean, sum_of_squares, t_statistic};
use log::debug;
use serde::Serialize;
use std::fmt;

/// Named sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub name: String,
    pub values: Vec<f64>,
}

impl Group {
    /// Group `(name, value)` pairs by name, in order of first appearance.
    pub fn collect<I, S>(pairs: I) -> Vec<Group>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut groups: Vec<Group> = Vec::new();
        for (name, value) in pairs {
            let name = name.as_ref();
            match groups.iter_mut().find(|g| g.name == name) {
                Some(group) => group.values.push(value),
                None => groups.push(Group { name: name.to_owned(), values: vec![value] }),
            }
        }
        groups
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }
}

/// Pooled-variance two-sample t test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwoSampleTTest {
    pub statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
}

pub fn independent_t_test(first: &[f64], second: &[f64]) -> Result<TwoSampleTTest, StatsError> {
    let (n1, n2) = (first.len(), second.len());
    if n1 == 0 || n2 == 0 || n1 + n2 < 3 {
        return Err(StatsError::TooFewObservations { needed: 3, got: n1 + n2 });
    }
    let degrees_of_freedom = (n1 + n2 - 2) as f64;
    let pooled = (sum_of_squares(first) + sum_of_squares(second)) / degrees_of_freedom;
    let std_error = (pooled * (1.0 / n1 as f64 + 1.0 / n2 as f64)).sqrt();
    let (statistic, p_value) = t_statistic(mean(first) - mean(second), std_error, degrees_of_freedom)?;
    Ok(TwoSampleTTest { statistic, degrees_of_freedom, p_value })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anova {
    pub statistic: f64,
    pub df_between: f64,
    pub df_within: f64,
    pub p_value: f64,
}

impl Anova {
    pub fn is_significant(&self) -> bool {
        self.p_value < SIGNIFICANCE_LEVEL
    }
}

/// One-way analysis of variance across `groups`.
pub fn one_way_anova(groups: &[Group]) -> Result<Anova, StatsError> {
    if groups.len() < 2 {
        return Err(StatsError::TooFewGroups(groups.len()));
    }
    if let Some(empty) = groups.iter().find(|g| g.values.is_empty()) {
        return Err(StatsError::EmptyGroup(empty.name.clone()));
    }
    let total: usize = groups.iter().map(|g| g.values.len()).sum();
    let k = groups.len();
    if total <= k {
        return Err(StatsError::TooFewObservations { needed: k + 1, got: total });
    }

    let grand_mean = groups.iter().flat_map(|g| g.values.iter()).sum::<f64>() / total as f64;
    let between: f64 = groups
        .iter()
        .map(|g| g.values.len() as f64 * (g.mean() - grand_mean).powi(2))
        .sum();
    let within: f64 = groups.iter().map(|g| sum_of_squares(&g.values)).sum();

    let df_between = (k - 1) as f64;
    let df_within = (total - k) as f64;
    let statistic = (between / df_between) / (within / df_within);
    let p_value = f_upper_tail(statistic, df_between, df_within)?;
    Ok(Anova { statistic, df_between, df_within, p_value })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Better,
    Worse,
}

impl Direction {
    fn of(statistic: f64) -> Self {
        if statistic > 0.0 { Direction::Better } else { Direction::Worse }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairComparison {
    pub first: String,
    pub second: String,
    pub test: TwoSampleTTest,
    /// How `first` compares with `second`.
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupComparison {
    pub anova: Anova,
    /// Only filled when the ANOVA itself is significant.
    pub significant_pairs: Vec<PairComparison>,
}

/// ANOVA across all groups, followed by pairwise t tests when it is
/// significant. Only pairs that are themselves significant are kept.
pub fn compare_groups(groups: &[Group]) -> Result<GroupComparison, StatsError> {
    let anova = one_way_anova(groups)?;
    let mut significant_pairs = Vec::new();

    if anova.is_significant() {
        for (i, first) in groups.iter().enumerate() {
            for second in &groups[i + 1..] {
                let test = match independent_t_test(&first.values, &second.values) {
                    Ok(test) => test,
                    Err(e) => {
                        debug!("skipping {} vs {}: {e}", first.name, second.name);
                        continue;
                    }
                };
                if test.p_value < SIGNIFICANCE_LEVEL {
                    significant_pairs.push(PairComparison {
                        first: first.name.clone(),
                        second: second.name.clone(),
                        direction: Direction::of(test.statistic),
                        test,
                    });
                }
            }
        }
    }

    Ok(GroupComparison { anova, significant_pairs })
}

impl fmt::Display for GroupComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "F = {:.2}, p = {:.6}", self.anova.statistic, self.anova.p_value)?;
        if !self.anova.is_significant() {
            return write!(f, "No team's home-court advantage is statistically significant");
        }
        write!(f, "At least one team's home-court advantage is statistically significant")?;
        for pair in &self.significant_pairs {
            let word = match pair.direction {
                Direction::Better => "better",
                Direction::Worse => "worse",
            };
            write!(
                f,
                "\n  {}'s home-court advantage is significantly {word} than {}'s (t = {:.2}, p = {:.4})",
                pair.first, pair.second, pair.test.statistic, pair.test.p_value
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(name: &str, values: &[f64]) -> Group {
        Group { name: name.into(), values: values.to_vec() }
    }

    #[test]
    fn collect_keeps_first_appearance_order() {
        let groups = Group::collect([("Heat", 3.0), ("Bucks", 1.0), ("Heat", -2.0)]);
        assert_eq!(groups, [group("Heat", &[3.0, -2.0]), group("Bucks", &[1.0])]);
    }

    #[test]
    fn independent_t_matches_reference_values() {
        let test = independent_t_test(&[10.0, 12.0, 11.0, 13.0], &[5.0, 6.0, 7.0, 6.0, 5.0]).unwrap();
        assert!((test.statistic - 8.049_526).abs() < 1e-5);
        assert_eq!(test.degrees_of_freedom, 7.0);
        assert!((test.p_value - 8.7625e-5).abs() < 1e-7);
    }

    #[test]
    fn independent_t_equal_means_has_p_of_one() {
        let test = independent_t_test(&[3.0, 4.0, 5.0], &[3.0, 5.0, 4.0, 4.0]).unwrap();
        assert_eq!(test.statistic, 0.0);
        assert!((test.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn independent_t_needs_three_observations() {
        assert!(independent_t_test(&[1.0], &[2.0]).is_err());
        assert!(independent_t_test(&[], &[2.0, 3.0, 4.0]).is_err());
    }

    #[test]
    fn anova_matches_reference_values() {
        let groups = [
            group("A", &[10.0, 12.0, 11.0, 13.0]),
            group("B", &[5.0, 6.0, 7.0, 6.0, 5.0]),
            group("C", &[8.0, 9.0, 8.0, 10.0]),
        ];
        let anova = one_way_anova(&groups).unwrap();
        assert!((anova.statistic - 34.445_862).abs() < 1e-5);
        assert_eq!((anova.df_between, anova.df_within), (2.0, 10.0));
        assert!((anova.p_value - 3.2722e-5).abs() < 1e-7);
    }

    #[test]
    fn anova_rejects_degenerate_input() {
        assert_eq!(one_way_anova(&[group("A", &[1.0, 2.0])]), Err(StatsError::TooFewGroups(1)));
        assert_eq!(
            one_way_anova(&[group("A", &[1.0]), group("B", &[])]),
            Err(StatsError::EmptyGroup("B".into()))
        );
        assert!(matches!(
            one_way_anova(&[group("A", &[1.0]), group("B", &[2.0])]),
            Err(StatsError::TooFewObservations { .. })
        ));
    }

    #[test]
    fn pairwise_tests_only_follow_significant_anova() {
        let groups = [
            group("A", &[3.0, 4.0, 5.0]),
            group("B", &[3.0, 5.0, 4.0, 4.0]),
            group("C", &[4.0, 4.0, 4.0, 5.0, 3.0]),
        ];
        let comparison = compare_groups(&groups).unwrap();
        assert!(!comparison.anova.is_significant());
        assert!(comparison.significant_pairs.is_empty());
        assert!(comparison.to_string().contains("No team's"));
    }

    #[test]
    fn significant_pairs_carry_direction() {
        let groups = [
            group("Bucks", &[10.0, 12.0, 11.0, 13.0]),
            group("Nets", &[5.0, 6.0, 7.0, 6.0, 5.0]),
            group("Heat", &[10.5, 11.5, 12.0, 11.0]),
        ];
        let comparison = compare_groups(&groups).unwrap();
        assert!(comparison.anova.is_significant());

        let pairs: Vec<(&str, &str, Direction)> = comparison
            .significant_pairs
            .iter()
            .map(|p| (p.first.as_str(), p.second.as_str(), p.direction))
            .collect();
        assert_eq!(pairs, [("Bucks", "Nets", Direction::Better), ("Nets", "Heat", Direction::Worse)]);
        assert!(comparison.significant_pairs.iter().all(|p| p.test.p_value < SIGNIFICANCE_LEVEL));
        let text = comparison.to_string();
        assert!(text.contains("Nets's home-court advantage is significantly worse than Heat's"));
    }
}
