//! Significance of search results by randomization.
//!
//! Each procedure produces a sample of qualities that a subgroup would reach by chance. Fit a
//! [`NormalDistribution`] to the sample to get quality thresholds, or compare the mined top
//! subgroups against it with [`Validation::regression_test`].

use crate::condition::{Condition, ConditionList, ConditionValue, Operator};
use crate::discovery::SubgroupDiscovery;
use crate::error::{Error, Result};
use crate::params::{SearchParameters, TargetConcept};
use crate::subgroup_set::SubgroupSet;
use crate::table::{ColumnType, Table};
use crate::target::TargetContext;
use fixedbitset::FixedBitSet;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::statistics::{Data, OrderStatistics, Statistics};
use std::time::Instant;
use tracing::debug;

/// Rejected draws tolerated per accepted sample.
const MAX_ATTEMPTS: usize = 10_000;

/// Swap randomization trials that found nothing, tolerated per accepted trial.
const MAX_EMPTY_TRIALS: usize = 100;

/// Randomization procedures for one table, target and set of search settings.
#[derive(Debug)]
pub struct Validation<'a> {
    params: SearchParameters,
    table: &'a Table,
    concept: TargetConcept,
    target: TargetContext,
    rng: Pcg64,
}

impl<'a> Validation<'a> {
    /// Resolves `concept` against `table`. The random generator is seeded from the thread-local
    /// generator; use [`with_seed`](Self::with_seed) for reproducible samples.
    pub fn new(params: SearchParameters, table: &'a Table, concept: TargetConcept) -> Result<Self> {
        params.validate()?;
        let target = TargetContext::from_concept(table, &concept)?;
        target.quality_measure(&params, table.nr_rows())?;
        Ok(Validation {
            params,
            table,
            concept,
            target,
            rng: Pcg64::from_rng(&mut rand::rng()),
        })
    }

    /// Reseeds the random generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Pcg64::seed_from_u64(seed);
        self
    }

    /// Qualities of `n` random row sets.
    ///
    /// Sizes are drawn uniformly from `0..nr_rows`; sizes below the minimum coverage are drawn
    /// again.
    pub fn random_subgroups(&mut self, n: usize) -> Result<Vec<f64>> {
        let nr_rows = self.table.nr_rows();
        let quality = self.target.quality_measure(&self.params, nr_rows)?;
        let mut qualities = Vec::with_capacity(n);
        for _ in 0..n {
            let size = self.draw("subgroup size", |v| {
                let size = v.rng.random_range(0..nr_rows.max(1));
                (size >= v.params.minimum_coverage).then_some(size)
            })?;
            let mut members = FixedBitSet::with_capacity(nr_rows);
            for row in index::sample(&mut self.rng, nr_rows, size) {
                members.insert(row);
            }
            qualities.push(self.target.evaluate(&quality, &members).quality);
        }
        Ok(qualities)
    }

    /// Qualities of `n` random descriptions.
    ///
    /// A description has between one and the search depth conditions on non-target columns:
    /// `=` a random value for nominal and binary columns, and `<=` or `>=` a value from the
    /// middle half of the range for numeric columns. Descriptions covering fewer rows than the
    /// minimum coverage, or more than the maximum coverage, are drawn again.
    pub fn random_conditions(&mut self, n: usize) -> Result<Vec<f64>> {
        let nr_rows = self.table.nr_rows();
        let quality = self.target.quality_measure(&self.params, nr_rows)?;
        let targets = self.target.target_columns();
        let candidates: Vec<usize> = (0..self.table.nr_columns())
            .filter(|i| !targets.contains(i))
            .collect();
        if candidates.is_empty() {
            return Err(Error::invalid("no columns besides the target to describe subgroups with"));
        }

        let maximum = self.params.maximum_coverage(nr_rows);
        let mut qualities = Vec::with_capacity(n);
        for _ in 0..n {
            let (conditions, members) = self.draw("description", |v| {
                let conditions = v.random_condition_list(&candidates);
                let members = v.table.evaluate_list(&conditions);
                let coverage = members.count_ones(..);
                (coverage >= v.params.minimum_coverage && coverage <= maximum).then_some((conditions, members))
            })?;
            let q = self.target.evaluate(&quality, &members).quality;
            debug!(quality = q, coverage = members.count_ones(..), "{}", conditions);
            qualities.push(q);
        }
        Ok(qualities)
    }

    fn random_condition_list(&mut self, columns: &[usize]) -> ConditionList {
        let depth = self.rng.random_range(1..=self.params.search_depth);
        let mut conditions = ConditionList::new();
        for _ in 0..depth {
            let index = columns[self.rng.random_range(0..columns.len())];
            let column = match self.table.column(index) {
                Some(column) => column.clone(),
                None => continue,
            };
            let condition = match column.column_type() {
                ColumnType::Binary => {
                    let value = self.rng.random_bool(0.5);
                    Condition::new(column, Operator::Equals, ConditionValue::Binary(value))
                }
                ColumnType::Nominal => {
                    let domain = column.nominal_domain();
                    if domain.is_empty() {
                        continue;
                    }
                    let value = domain[self.rng.random_range(0..domain.len())];
                    Condition::new(column, Operator::Equals, ConditionValue::Nominal(value))
                }
                ColumnType::Numeric => {
                    let operator = if self.rng.random_bool(0.5) {
                        Operator::LessThanOrEqual
                    } else {
                        Operator::GreaterThanOrEqual
                    };
                    let (min, max) = (column.min(), column.max());
                    let range = max - min;
                    let value = min + range / 4.0 + range * self.rng.random::<f32>() / 2.0;
                    Condition::new(column, operator, ConditionValue::Numeric(value))
                }
            };
            conditions.add(condition);
        }
        conditions
    }

    /// Best qualities of `n` complete searches on tables whose target columns were shuffled.
    ///
    /// All target columns get the same permutation, so paired targets stay paired. The table
    /// passed to [`new`](Self::new) is not modified. A trial that finds no subgroup at all is
    /// repeated.
    pub fn swap_randomization(&mut self, n: usize) -> Result<Vec<f64>> {
        let targets = self.target.target_columns();
        let mut order: Vec<usize> = (0..self.table.nr_rows()).collect();
        let mut qualities = Vec::with_capacity(n);
        for trial in 0..n {
            let mut empty = 0;
            loop {
                order.shuffle(&mut self.rng);
                let permuted = self.table.with_permuted_columns(&targets, &order);
                let target = TargetContext::from_concept(&permuted, &self.concept)?;
                let mut search = SubgroupDiscovery::new(self.params.clone(), &permuted, target)?;
                search.mine(Instant::now());
                if let Some(best) = search.result().best() {
                    debug!(trial, quality = best.quality(), "swap randomization");
                    qualities.push(best.quality());
                    break;
                }
                empty += 1;
                if empty >= MAX_EMPTY_TRIALS {
                    return Err(Error::ValidationExhausted {
                        what: "swap randomization result",
                        attempts: empty,
                    });
                }
            }
        }
        Ok(qualities)
    }

    /// Repeats `attempt` until it accepts, or gives up.
    fn draw<T>(&mut self, what: &'static str, mut attempt: impl FnMut(&mut Self) -> Option<T>) -> Result<T> {
        for _ in 0..MAX_ATTEMPTS {
            if let Some(value) = attempt(self) {
                return Ok(value);
            }
        }
        Err(Error::ValidationExhausted {
            what,
            attempts: MAX_ATTEMPTS,
        })
    }

    /// Scores how far the mean quality of the best `k` mined subgroups lies above a random
    /// sample.
    ///
    /// The sample and the top-`k` mean are rescaled to `[0, 1]` together, the sorted sample is
    /// placed at `x = i / len` and the top-`k` mean at `x = 1`, and a least-squares line is
    /// fitted through all of them. The score is the top-`k` mean minus the line's value at
    /// `x = 1`.
    pub fn regression_test(qualities: &[f64], k: usize, result: &SubgroupSet) -> Result<f64> {
        if qualities.is_empty() {
            return Err(Error::invalid("regression test needs random qualities"));
        }
        if k == 0 || k > result.len() {
            return Err(Error::invalid(format!(
                "regression test needs between 1 and {} subgroups, got {}",
                result.len(),
                k
            )));
        }
        let top_k = result.iter().take(k).map(|s| s.quality()).sum::<f64>() / k as f64;

        let mut sorted = qualities.to_vec();
        sorted.sort_unstable_by(f64::total_cmp);
        let len = sorted.len();
        let min = sorted[0].min(top_k);
        let max = sorted[len - 1].max(top_k);
        if max == min {
            return Ok(0.0);
        }
        let scale = |q: f64| (q - min) / (max - min);
        let top_k = scale(top_k);
        let ys: Vec<f64> = sorted.into_iter().map(scale).collect();
        let y_bar = (ys.iter().sum::<f64>() + top_k) / (len + 1) as f64;

        // The top-k point sits at x = 1, half a unit above the mean x.
        let x_bar = 0.5;
        let mut xx = 0.25;
        let mut xy = 0.5 * (top_k - y_bar);
        for (i, y) in ys.iter().enumerate() {
            let x = i as f64 / len as f64 - x_bar;
            xx += x * x;
            xy += x * (y - y_bar);
        }
        let beta1 = xy / xx;
        let beta0 = y_bar - beta1 * x_bar;
        debug!(beta1, beta0, "fitted regression line");
        Ok(top_k - beta1 - beta0)
    }
}

/// A normal distribution fitted to a sample of qualities.
///
/// ```
/// use subgroup_discovery::NormalDistribution;
///
/// let fit = NormalDistribution::from_qualities(&[0.1, 0.2, 0.3, 0.2, 0.2])?;
/// assert!((fit.mean() - 0.2).abs() < 1e-12);
/// assert!(fit.one_percent() > fit.five_percent());
/// assert!(fit.five_percent() > fit.ten_percent());
/// # Ok::<(), subgroup_discovery::Error>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalDistribution {
    mean: f64,
    std_dev: f64,
}

impl NormalDistribution {
    /// Fits the finite values of `qualities`, using the sample standard deviation.
    pub fn from_qualities(qualities: &[f64]) -> Result<Self> {
        let finite: Vec<f64> = qualities.iter().copied().filter(|q| q.is_finite()).collect();
        if finite.is_empty() {
            return Err(Error::invalid("no finite qualities to fit"));
        }
        let mean = finite.iter().mean();
        let std_dev = if finite.len() > 1 {
            finite.iter().std_dev()
        } else {
            0.0
        };
        Ok(NormalDistribution { mean, std_dev })
    }

    /// Mean of the sample.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Standard deviation of the sample.
    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    /// The quality a random subgroup exceeds with probability `alpha`.
    pub fn significance_threshold(&self, alpha: f64) -> f64 {
        if self.std_dev == 0.0 {
            return self.mean;
        }
        match Normal::new(self.mean, self.std_dev) {
            Ok(normal) => normal.inverse_cdf(1.0 - alpha),
            Err(_) => f64::NAN,
        }
    }

    /// Threshold at the 1% level.
    pub fn one_percent(&self) -> f64 {
        self.significance_threshold(0.01)
    }

    /// Threshold at the 5% level.
    pub fn five_percent(&self) -> f64 {
        self.significance_threshold(0.05)
    }

    /// Threshold at the 10% level.
    pub fn ten_percent(&self) -> f64 {
        self.significance_threshold(0.10)
    }

    /// The empirical `p`th percentile of `qualities`, `p` in `0..=100`.
    pub fn percentile(qualities: &[f64], p: usize) -> f64 {
        let mut data = Data::new(qualities.to_vec());
        data.percentile(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgroup::{Population, Subgroup};
    use crate::table::TableBuilder;
    use approx::assert_abs_diff_eq;
    use std::sync::Arc;

    fn table() -> Table {
        let n = 40;
        TableBuilder::new("t")
            .numeric("x", (0..n).map(|i| i as f32).collect())
            .unwrap()
            .nominal("parity", (0..n).map(|i| if i % 2 == 0 { "even" } else { "odd" }).collect::<Vec<_>>())
            .unwrap()
            .binary("y", (0..n).map(|i| i >= 25))
            .unwrap()
            .build()
    }

    fn concept() -> TargetConcept {
        TargetConcept::SingleNominal {
            column: "y".into(),
            value: "1".into(),
        }
    }

    #[test]
    fn random_samples_are_reproducible() {
        let t = table();
        let params = SearchParameters::default().with_search_depth(2);
        let mut a = Validation::new(params.clone(), &t, concept()).unwrap().with_seed(7);
        let mut b = Validation::new(params, &t, concept()).unwrap().with_seed(7);
        let qa = a.random_subgroups(20).unwrap();
        assert_eq!(qa, b.random_subgroups(20).unwrap());
        assert_eq!(qa.len(), 20);
        assert!(qa.iter().all(|q| q.is_finite() && q.abs() <= 0.25));

        let ca = a.random_conditions(20).unwrap();
        assert_eq!(ca, b.random_conditions(20).unwrap());
    }

    #[test]
    fn impossible_coverage_gives_up() {
        let t = table();
        let params = SearchParameters::default().with_minimum_coverage(1000);
        let mut v = Validation::new(params, &t, concept()).unwrap().with_seed(1);
        assert!(matches!(
            v.random_subgroups(1),
            Err(Error::ValidationExhausted { .. })
        ));
    }

    #[test]
    fn swap_randomization_leaves_table_alone() {
        let t = table();
        let before = t.column(2).unwrap().binary_members().unwrap().clone();
        let params = SearchParameters::default().with_numeric_strategy(crate::params::NumericStrategy::All);
        let mut v = Validation::new(params, &t, concept()).unwrap().with_seed(3);
        let q = v.swap_randomization(3).unwrap();
        assert_eq!(q.len(), 3);
        assert_eq!(t.column(2).unwrap().binary_members().unwrap(), &before);
        // The real structure x >= 25 reaches 15/40 * (1 - 15/40).
        assert!(q.iter().all(|&q| q < 15.0 / 40.0 * 25.0 / 40.0));
    }

    #[test]
    fn regression_test_rewards_outliers() {
        let population = Arc::new(Population::new(10));
        let mut set = SubgroupSet::new(5, population.clone());
        let mut sg = Subgroup::root(population);
        sg.set_quality(1.0);
        set.add(sg);
        let random: Vec<f64> = (0..20).map(|i| i as f64 / 100.0).collect();
        let score = Validation::regression_test(&random, 1, &set).unwrap();
        assert!(score > 0.0);
        assert!(Validation::regression_test(&random, 2, &set).is_err());
    }

    #[test]
    fn percentiles_and_thresholds() {
        let q: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_abs_diff_eq!(NormalDistribution::percentile(&q, 50), 50.5, epsilon = 1.0);
        let fit = NormalDistribution::from_qualities(&[1.0, 1.0, f64::NEG_INFINITY]).unwrap();
        assert_eq!(fit.std_dev(), 0.0);
        assert_eq!(fit.five_percent(), 1.0);
    }
}
