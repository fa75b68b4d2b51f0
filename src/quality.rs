//! Quality measures: how interesting a subgroup is, given the population it came from.

use crate::dependency::DependencyGraph;
use crate::error::{Error, Result};
use crate::table::NumericStatistics;
use std::fmt;
use std::str::FromStr;

/// The shape of the target a search explains.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum TargetKind {
    /// One column, with one value marked as positive.
    SingleNominal,
    /// One numeric column.
    SingleNumeric,
    /// A linear regression of one numeric column on another.
    DoubleRegression,
    /// The correlation between two numeric columns.
    DoubleCorrelation,
    /// Several binary columns whose dependencies are compared.
    MultiLabel,
}

impl TargetKind {
    /// A human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            TargetKind::SingleNominal => "single nominal",
            TargetKind::SingleNumeric => "single numeric",
            TargetKind::DoubleRegression => "double regression",
            TargetKind::DoubleCorrelation => "double correlation",
            TargetKind::MultiLabel => "multi-label",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        [
            TargetKind::SingleNominal,
            TargetKind::SingleNumeric,
            TargetKind::DoubleRegression,
            TargetKind::DoubleCorrelation,
            TargetKind::MultiLabel,
        ]
        .into_iter()
        .find(|k| normalize(k.name()) == wanted)
        .ok_or_else(|| Error::unknown_name("target type", s))
    }
}

macro_rules! measures {
    ($($variant:ident => $name:literal, $kind:ident;)*) => {
        /// Every supported quality measure.
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub enum Measure {
            $(
                #[doc = $name]
                $variant,
            )*
        }

        impl Measure {
            /// All measures, grouped by target kind.
            pub const ALL: &'static [Measure] = &[$(Measure::$variant),*];

            /// The measure's conventional name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Measure::$variant => $name,)*
                }
            }

            /// The target kind this measure scores.
            pub fn target_kind(self) -> TargetKind {
                match self {
                    $(Measure::$variant => TargetKind::$kind,)*
                }
            }
        }
    };
}

measures! {
    WRAcc => "WRAcc", SingleNominal;
    AbsWRAcc => "Abs WRAcc", SingleNominal;
    ChiSquared => "Chi-squared test", SingleNominal;
    InformationGain => "Information gain", SingleNominal;
    Binomial => "Binomial test", SingleNominal;
    Jaccard => "Jaccard", SingleNominal;
    Coverage => "Coverage", SingleNominal;
    Accuracy => "Accuracy", SingleNominal;
    Specificity => "Specificity", SingleNominal;
    Sensitivity => "Sensitivity", SingleNominal;
    Laplace => "Laplace", SingleNominal;
    FMeasure => "F-measure", SingleNominal;
    GMeasure => "G-measure", SingleNominal;
    Correlation => "Correlation", SingleNominal;
    Purity => "Purity", SingleNominal;
    Lift => "Lift", SingleNominal;
    ZScore => "Z-Score", SingleNumeric;
    InverseZScore => "Inverse Z-Score", SingleNumeric;
    AbsZScore => "Abs Z-Score", SingleNumeric;
    TTest => "t-Test", SingleNumeric;
    InverseTTest => "Inverse t-Test", SingleNumeric;
    AbsTTest => "Abs t-Test", SingleNumeric;
    Average => "Average", SingleNumeric;
    InverseAverage => "Inverse Average", SingleNumeric;
    ExplainedVariance => "Explained Variance", SingleNumeric;
    Mmad => "MMAD", SingleNumeric;
    LinearRegression => "Linear Regression", DoubleRegression;
    CorrelationR => "r", DoubleCorrelation;
    CorrelationRNegative => "Negative r", DoubleCorrelation;
    CorrelationRSquared => "r^2", DoubleCorrelation;
    CorrelationRSquaredNegative => "Negative r^2", DoubleCorrelation;
    CorrelationDistance => "Correlation distance", DoubleCorrelation;
    Weed => "Wtd Ent Edit Distance", MultiLabel;
    EditDistance => "Edit Distance", MultiLabel;
}

impl Measure {
    /// Measures that score a subgroup and its complement identically. The nominal set search
    /// may then report whichever of the two is smaller.
    pub fn is_symmetric(self) -> bool {
        matches!(self, Measure::ChiSquared | Measure::InformationGain)
    }

    /// Measures whose low values also mean "unusual", so the nominal set search need not look
    /// at the low-ratio end separately.
    pub fn low_is_negative(self) -> bool {
        matches!(self, Measure::Binomial)
    }

    /// Whether the median is needed to score with this measure.
    pub fn needs_median(self) -> bool {
        self == Measure::Mmad
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Measure {
    type Err = Error;

    /// Parses a measure name, ignoring case and punctuation: `"chi-squared test"`,
    /// `"ChiSquaredTest"` and `"CHI SQUARED TEST"` all work.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = normalize(s);
        Measure::ALL
            .iter()
            .copied()
            .find(|m| normalize(m.name()) == wanted || normalize(&format!("{:?}", m)) == wanted)
            .ok_or_else(|| Error::unknown_name("quality measure", s))
    }
}

pub(crate) fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Entropy in bits of a two-way split with probability `p` on one side.
pub fn binary_entropy(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        0.0
    } else {
        -p * p.log2() - (1.0 - p) * (1.0 - p).log2()
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[derive(Clone, Debug)]
enum Baseline {
    Binary { positives: usize },
    Numeric { sum: f64, sum_squared_deviations: f64 },
    Bivariate,
    Graph { base: DependencyGraph, alpha: f64, beta: f64 },
}

/// A multi-label score together with its components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphScore {
    /// The measure's value.
    pub quality: f64,
    /// Edit distance between the subgroup's graph and the population's.
    pub edit_distance: f64,
    /// Entropy of the split between the subgroup and its complement.
    pub entropy: f64,
}

/// A [`Measure`] bound to the population statistics it compares subgroups against.
///
/// ```
/// use subgroup_discovery::{Measure, QualityMeasure};
///
/// // 1000 rows, 300 of them positive.
/// let wracc = QualityMeasure::binary(Measure::WRAcc, 1000, 300)?;
/// // A subgroup of 100 rows with 60 positives.
/// let q = wracc.calculate(60, 100);
/// assert!((q - (0.06 - 0.3 * 0.1)).abs() < 1e-12);
/// # Ok::<(), subgroup_discovery::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct QualityMeasure {
    measure: Measure,
    nr_rows: usize,
    baseline: Baseline,
}

impl QualityMeasure {
    fn check(measure: Measure, kind: TargetKind) -> Result<()> {
        if measure.target_kind() == kind {
            Ok(())
        } else {
            Err(Error::IncompatibleMeasure {
                measure: measure.name(),
                target: kind.name(),
            })
        }
    }

    /// A count-based measure for a binary target with `positives` of `nr_rows` rows positive.
    pub fn binary(measure: Measure, nr_rows: usize, positives: usize) -> Result<Self> {
        Self::check(measure, TargetKind::SingleNominal)?;
        Ok(QualityMeasure {
            measure,
            nr_rows,
            baseline: Baseline::Binary { positives },
        })
    }

    /// A moment-based measure for a numeric target summarized by `population`.
    pub fn numeric(measure: Measure, population: &NumericStatistics) -> Result<Self> {
        Self::check(measure, TargetKind::SingleNumeric)?;
        Ok(QualityMeasure {
            measure,
            nr_rows: population.coverage,
            baseline: Baseline::Numeric {
                sum: population.sum,
                sum_squared_deviations: population.sum_squared_deviations,
            },
        })
    }

    /// A regression or correlation measure. The statistics themselves live in
    /// [`bivariate`](crate::bivariate).
    pub fn bivariate(measure: Measure, nr_rows: usize) -> Result<Self> {
        if measure.target_kind() != TargetKind::DoubleCorrelation {
            Self::check(measure, TargetKind::DoubleRegression)?;
        }
        Ok(QualityMeasure {
            measure,
            nr_rows,
            baseline: Baseline::Bivariate,
        })
    }

    /// A multi-label measure comparing subgroup graphs to `base`, the population's graph.
    pub fn graph(
        measure: Measure,
        nr_rows: usize,
        base: DependencyGraph,
        alpha: f64,
        beta: f64,
    ) -> Result<Self> {
        Self::check(measure, TargetKind::MultiLabel)?;
        Ok(QualityMeasure {
            measure,
            nr_rows,
            baseline: Baseline::Graph { base, alpha, beta },
        })
    }

    /// The measure being computed.
    pub fn measure(&self) -> Measure {
        self.measure
    }

    /// Rows in the population.
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    /// Positive rows in the population, for binary targets.
    pub fn total_positives(&self) -> usize {
        match self.baseline {
            Baseline::Binary { positives } => positives,
            _ => 0,
        }
    }

    /// Scores a subgroup of `coverage` rows of which `positives` are positive.
    ///
    /// Returns NaN if this is not a binary-target measure. Zero denominators score 0.
    pub fn calculate(&self, positives: usize, coverage: usize) -> f64 {
        let total_positives = match self.baseline {
            Baseline::Binary { positives } => positives as f64,
            _ => return f64::NAN,
        };
        let n = self.nr_rows as f64;
        let cov = coverage as f64;
        let hb = positives as f64;
        let p = total_positives;

        // Cells of the 2x2 table: inside/outside the subgroup by positive/negative.
        let a = hb;
        let b = cov - hb;
        let c = p - hb;
        let d = n - p - cov + hb;

        match self.measure {
            Measure::WRAcc => ratio(hb, n) - ratio(p, n) * ratio(cov, n),
            Measure::AbsWRAcc => (ratio(hb, n) - ratio(p, n) * ratio(cov, n)).abs(),
            Measure::ChiSquared => {
                let denominator = (a + b) * (c + d) * (a + c) * (b + d);
                ratio(n * (a * d - b * c).powi(2), denominator)
            }
            Measure::InformationGain => {
                let inside = ratio(cov, n) * binary_entropy(ratio(hb, cov));
                let outside = ratio(n - cov, n) * binary_entropy(ratio(p - hb, n - cov));
                binary_entropy(ratio(p, n)) - inside - outside
            }
            Measure::Binomial => ratio(cov, n).sqrt() * (ratio(hb, cov) - ratio(p, n)),
            Measure::Jaccard => ratio(hb, cov + p - hb),
            Measure::Coverage => cov,
            Measure::Accuracy => ratio(hb, cov),
            Measure::Specificity => {
                if n - p == 0.0 {
                    0.0
                } else {
                    1.0 - ratio(cov - hb, n - p)
                }
            }
            Measure::Sensitivity => ratio(hb, p),
            Measure::Laplace => (hb + 1.0) / (cov + 2.0),
            Measure::FMeasure => ratio(2.0 * hb, p + cov),
            Measure::GMeasure => ratio(hb, cov - hb + p),
            Measure::Correlation => {
                let denominator = ((a + b) * (c + d) * (a + c) * (b + d)).sqrt();
                ratio(a * d - b * c, denominator)
            }
            Measure::Purity => {
                if cov == 0.0 {
                    0.0
                } else {
                    let accuracy = hb / cov;
                    accuracy.max(1.0 - accuracy)
                }
            }
            Measure::Lift => ratio(ratio(hb, cov), ratio(p, n)),
            Measure::ZScore
            | Measure::InverseZScore
            | Measure::AbsZScore
            | Measure::TTest
            | Measure::InverseTTest
            | Measure::AbsTTest
            | Measure::Average
            | Measure::InverseAverage
            | Measure::ExplainedVariance
            | Measure::Mmad
            | Measure::LinearRegression
            | Measure::CorrelationR
            | Measure::CorrelationRNegative
            | Measure::CorrelationRSquared
            | Measure::CorrelationRSquaredNegative
            | Measure::CorrelationDistance
            | Measure::Weed
            | Measure::EditDistance => f64::NAN,
        }
    }

    /// Scores a numeric-target subgroup from its statistics.
    ///
    /// Returns NaN if this is not a numeric-target measure.
    pub fn calculate_numeric(&self, subgroup: &NumericStatistics) -> f64 {
        let (total_sum, total_ssd) = match self.baseline {
            Baseline::Numeric {
                sum,
                sum_squared_deviations,
            } => (sum, sum_squared_deviations),
            _ => return f64::NAN,
        };
        let n = self.nr_rows as f64;
        let cov = subgroup.coverage as f64;
        let mean = ratio(total_sum, n);
        let subgroup_mean = subgroup.mean();

        let z_score = || {
            let sd = ratio(total_ssd, n).sqrt();
            ratio(cov.sqrt() * (subgroup_mean - mean), sd)
        };
        let t_test = || {
            if subgroup.coverage <= 2 {
                return 0.0;
            }
            let sd = (subgroup.sum_squared_deviations / (cov - 1.0)).sqrt();
            ratio(cov.sqrt() * (subgroup_mean - mean), sd)
        };

        match self.measure {
            Measure::ZScore => z_score(),
            Measure::InverseZScore => -z_score(),
            Measure::AbsZScore => z_score().abs(),
            Measure::TTest => t_test(),
            Measure::InverseTTest => -t_test(),
            Measure::AbsTTest => t_test().abs(),
            Measure::Average => subgroup_mean,
            Measure::InverseAverage => -subgroup_mean,
            Measure::ExplainedVariance => {
                let rest = n - cov;
                let rest_mean = ratio(total_sum - subgroup.sum, rest);
                let between = cov * (subgroup_mean - mean).powi(2) + rest * (rest_mean - mean).powi(2);
                ratio(between, total_ssd)
            }
            Measure::Mmad => ratio(cov, 2.0 * subgroup.median + subgroup.median_absolute_deviation),
            Measure::WRAcc
            | Measure::AbsWRAcc
            | Measure::ChiSquared
            | Measure::InformationGain
            | Measure::Binomial
            | Measure::Jaccard
            | Measure::Coverage
            | Measure::Accuracy
            | Measure::Specificity
            | Measure::Sensitivity
            | Measure::Laplace
            | Measure::FMeasure
            | Measure::GMeasure
            | Measure::Correlation
            | Measure::Purity
            | Measure::Lift
            | Measure::LinearRegression
            | Measure::CorrelationR
            | Measure::CorrelationRNegative
            | Measure::CorrelationRSquared
            | Measure::CorrelationRSquaredNegative
            | Measure::CorrelationDistance
            | Measure::Weed
            | Measure::EditDistance => f64::NAN,
        }
    }

    /// Scores a multi-label subgroup of `coverage` rows whose induced dependency graph is
    /// `graph`.
    ///
    /// Returns `None` if this is not a multi-label measure.
    pub fn calculate_graph(&self, coverage: usize, graph: &DependencyGraph) -> Option<GraphScore> {
        let (base, alpha, beta) = match &self.baseline {
            Baseline::Graph { base, alpha, beta } => (base, *alpha, *beta),
            _ => return None,
        };
        let edit_distance = base.edit_distance(graph) as f64;
        let entropy = binary_entropy(ratio(coverage as f64, self.nr_rows as f64));
        let quality = match self.measure {
            Measure::Weed => entropy.powf(alpha) * edit_distance.powf(beta),
            Measure::EditDistance => edit_distance,
            _ => return None,
        };
        Some(GraphScore {
            quality,
            edit_distance,
            entropy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn measure_names_round_trip() {
        for &m in Measure::ALL {
            assert_eq!(m.name().parse::<Measure>().unwrap(), m);
        }
        assert_eq!("chi squared test".parse::<Measure>().unwrap(), Measure::ChiSquared);
        assert_eq!("wracc".parse::<Measure>().unwrap(), Measure::WRAcc);
        assert!("nonsense".parse::<Measure>().is_err());
    }

    #[test]
    fn binary_measures() {
        let q = |m| QualityMeasure::binary(m, 100, 40).unwrap();
        // 20 rows, 15 positive.
        assert_relative_eq!(q(Measure::WRAcc).calculate(15, 20), 0.15 - 0.4 * 0.2, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Accuracy).calculate(15, 20), 0.75, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Sensitivity).calculate(15, 20), 15.0 / 40.0, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Specificity).calculate(15, 20), 1.0 - 5.0 / 60.0, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Laplace).calculate(15, 20), 16.0 / 22.0, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Jaccard).calculate(15, 20), 15.0 / 45.0, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Lift).calculate(15, 20), 0.75 / 0.4, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Binomial).calculate(15, 20), 0.2f64.sqrt() * 0.35, epsilon = 1e-12);

        // chi-squared on a = 15, b = 5, c = 25, d = 55.
        let expected = 100.0 * (15.0 * 55.0 - 5.0 * 25.0f64).powi(2) / (20.0 * 80.0 * 40.0 * 60.0);
        assert_relative_eq!(q(Measure::ChiSquared).calculate(15, 20), expected, epsilon = 1e-12);
        assert_relative_eq!(
            q(Measure::ChiSquared).calculate(15, 20),
            q(Measure::ChiSquared).calculate(25, 80),
            epsilon = 1e-9
        );
    }

    #[test]
    fn degenerate_counts_score_zero() {
        for &m in Measure::ALL.iter().filter(|m| m.target_kind() == TargetKind::SingleNominal) {
            let q = QualityMeasure::binary(m, 10, 0).unwrap().calculate(0, 0);
            assert!(q.is_finite(), "{} gave {}", m, q);
        }
    }

    #[test]
    fn numeric_measures() {
        let population = NumericStatistics {
            coverage: 4,
            sum: 10.0,
            sum_squared_deviations: 5.0,
            ..NumericStatistics::default()
        };
        let subgroup = NumericStatistics {
            coverage: 2,
            sum: 7.0,
            sum_squared_deviations: 0.5,
            median: 3.5,
            median_absolute_deviation: 0.5,
        };
        let q = |m| QualityMeasure::numeric(m, &population).unwrap().calculate_numeric(&subgroup);
        assert_relative_eq!(q(Measure::Average), 3.5, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::ZScore), 2.0f64.sqrt() * 1.0 / 1.25f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(q(Measure::InverseZScore), -q(Measure::ZScore), epsilon = 1e-12);
        assert_eq!(q(Measure::TTest), 0.0);
        assert_relative_eq!(q(Measure::ExplainedVariance), 4.0 / 5.0, epsilon = 1e-12);
        assert_relative_eq!(q(Measure::Mmad), 2.0 / 7.5, epsilon = 1e-12);
    }

    #[test]
    fn scoring_the_wrong_target_is_nan() {
        let population = NumericStatistics {
            coverage: 4,
            sum: 10.0,
            sum_squared_deviations: 5.0,
            ..NumericStatistics::default()
        };
        let numeric = QualityMeasure::numeric(Measure::ZScore, &population).unwrap();
        assert!(numeric.calculate(1, 2).is_nan());
        let binary = QualityMeasure::binary(Measure::WRAcc, 4, 2).unwrap();
        assert!(binary.calculate_numeric(&population).is_nan());
        let graph = DependencyGraph::new(2, &[]);
        assert!(binary.calculate_graph(2, &graph).is_none());
        for &m in Measure::ALL.iter().filter(|m| m.target_kind() == TargetKind::SingleNumeric) {
            assert!(!QualityMeasure::numeric(m, &population).unwrap().calculate_numeric(&population).is_nan());
        }
    }

    #[test]
    fn incompatible_measures_are_rejected() {
        assert!(QualityMeasure::binary(Measure::ZScore, 10, 3).is_err());
        assert!(QualityMeasure::bivariate(Measure::WRAcc, 10).is_err());
        assert!(QualityMeasure::bivariate(Measure::CorrelationR, 10).is_ok());
    }
}
