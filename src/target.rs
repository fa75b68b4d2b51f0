//! Resolved targets and how a subgroup is scored against each kind.

use crate::bivariate::{BivariateSums, CorrelationMeasure, RegressionMeasure};
use crate::condition::{Condition, Operator};
use crate::dependency::{BinaryTargets, ChiSquaredDependence, DependencyGraph, GraphInducer};
use crate::error::{Error, Result};
use crate::params::{SearchParameters, TargetConcept};
use crate::quality::{QualityMeasure, TargetKind};
use crate::subgroup::{Population, Subgroup};
use crate::table::{Column, ColumnType, NumericStatistics, Table};
use fixedbitset::FixedBitSet;
use std::sync::Arc;

/// A target concept bound to the columns of a particular table, with the population-wide
/// statistics each kind of target needs.
#[derive(Clone, Debug)]
pub enum TargetContext {
    /// Rows in `positives` are the class of interest.
    SingleNominal {
        /// Target column.
        column: Arc<Column>,
        /// Rows with the positive value.
        positives: FixedBitSet,
    },
    /// A numeric target.
    SingleNumeric {
        /// Target column.
        column: Arc<Column>,
        /// Statistics over all rows.
        population: NumericStatistics,
    },
    /// Regression of `secondary` on `primary`.
    DoubleRegression {
        /// Explanatory column.
        primary: Arc<Column>,
        /// Response column.
        secondary: Arc<Column>,
        /// Sums over all rows.
        population: BivariateSums,
    },
    /// Correlation between two numeric columns.
    DoubleCorrelation {
        /// First column.
        primary: Arc<Column>,
        /// Second column.
        secondary: Arc<Column>,
        /// Sums over all rows.
        population: BivariateSums,
    },
    /// Several binary labels.
    MultiLabel {
        /// Label columns, for excluding them from descriptions.
        columns: Vec<Arc<Column>>,
        /// The labels as bitsets.
        targets: BinaryTargets,
        /// Builds a dependency graph for a set of rows.
        inducer: Arc<dyn GraphInducer>,
        /// The graph over all rows.
        base: DependencyGraph,
    },
}

/// The outcome of scoring one subgroup.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Quality, or negative infinity if the subgroup cannot be scored.
    pub quality: f64,
    /// First auxiliary statistic.
    pub secondary: f64,
    /// Second auxiliary statistic.
    pub tertiary: f64,
    /// Induced graph, for multi-label targets.
    pub graph: Option<DependencyGraph>,
    /// Set when a regression or correlation was undefined on these rows.
    pub rank_deficient: bool,
}

impl Evaluation {
    fn scored(quality: f64, secondary: f64, tertiary: f64) -> Self {
        Evaluation {
            quality,
            secondary,
            tertiary,
            graph: None,
            rank_deficient: false,
        }
    }

    fn rank_deficient() -> Self {
        Evaluation {
            quality: f64::NEG_INFINITY,
            secondary: f64::NAN,
            tertiary: f64::NAN,
            graph: None,
            rank_deficient: true,
        }
    }

    /// Stores the scores on `subgroup`.
    pub(crate) fn apply(self, subgroup: &mut Subgroup) {
        subgroup.set_quality(self.quality);
        subgroup.set_statistics(self.secondary, self.tertiary);
        subgroup.set_graph(self.graph);
    }
}

fn require(column: &Arc<Column>, column_type: ColumnType) -> Result<()> {
    if column.column_type() == column_type {
        Ok(())
    } else {
        Err(Error::ColumnType {
            name: column.name().to_owned(),
            expected: column_type.name(),
            found: column.column_type().name(),
        })
    }
}

impl TargetContext {
    /// Marks rows where `column` equals `value` as positive.
    pub fn single_nominal(table: &Table, column: &str, value: &str) -> Result<Self> {
        let column = table.column_by_name(column)?.clone();
        let condition = Condition::parse(column.clone(), Operator::Equals, value)?;
        let positives = table.evaluate(&condition);
        let count = positives.count_ones(..);
        if count == 0 || count == table.nr_rows() {
            return Err(Error::EmptyTarget(condition.to_string()));
        }
        Ok(TargetContext::SingleNominal { column, positives })
    }

    /// A numeric target column.
    pub fn single_numeric(table: &Table, column: &str) -> Result<Self> {
        let column = table.column_by_name(column)?.clone();
        require(&column, ColumnType::Numeric)?;
        let population = column.numeric_statistics(&table.all_rows(), false);
        Ok(TargetContext::SingleNumeric { column, population })
    }

    fn pair(table: &Table, primary: &str, secondary: &str) -> Result<(Arc<Column>, Arc<Column>, BivariateSums)> {
        let primary = table.column_by_name(primary)?.clone();
        let secondary = table.column_by_name(secondary)?.clone();
        require(&primary, ColumnType::Numeric)?;
        require(&secondary, ColumnType::Numeric)?;
        let sums = BivariateSums::over(&primary, &secondary, &table.all_rows());
        Ok((primary, secondary, sums))
    }

    /// Regression of `secondary` on `primary`.
    pub fn double_regression(table: &Table, primary: &str, secondary: &str) -> Result<Self> {
        let (primary, secondary, population) = Self::pair(table, primary, secondary)?;
        Ok(TargetContext::DoubleRegression {
            primary,
            secondary,
            population,
        })
    }

    /// Correlation between `primary` and `secondary`.
    pub fn double_correlation(table: &Table, primary: &str, secondary: &str) -> Result<Self> {
        let (primary, secondary, population) = Self::pair(table, primary, secondary)?;
        Ok(TargetContext::DoubleCorrelation {
            primary,
            secondary,
            population,
        })
    }

    /// Binary label columns whose dependency structure is compared, using `inducer` to build
    /// graphs.
    pub fn multi_label(table: &Table, columns: &[String], inducer: Arc<dyn GraphInducer>) -> Result<Self> {
        if columns.len() < 2 {
            return Err(Error::invalid("a multi-label target needs at least two labels"));
        }
        let targets = BinaryTargets::from_table(table, columns)?;
        let base = inducer.induce(&targets, &table.all_rows());
        let columns = columns
            .iter()
            .map(|name| table.column_by_name(name).map(Arc::clone))
            .collect::<Result<Vec<_>>>()?;
        Ok(TargetContext::MultiLabel {
            columns,
            targets,
            inducer,
            base,
        })
    }

    /// Resolves a target concept, using [`ChiSquaredDependence`] for multi-label targets.
    pub fn from_concept(table: &Table, concept: &TargetConcept) -> Result<Self> {
        match concept {
            TargetConcept::SingleNominal { column, value } => Self::single_nominal(table, column, value),
            TargetConcept::SingleNumeric { column } => Self::single_numeric(table, column),
            TargetConcept::DoubleRegression { primary, secondary } => {
                Self::double_regression(table, primary, secondary)
            }
            TargetConcept::DoubleCorrelation { primary, secondary } => {
                Self::double_correlation(table, primary, secondary)
            }
            TargetConcept::MultiLabel { columns } => {
                Self::multi_label(table, columns, Arc::new(ChiSquaredDependence::default()))
            }
        }
    }

    /// The kind of target.
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetContext::SingleNominal { .. } => TargetKind::SingleNominal,
            TargetContext::SingleNumeric { .. } => TargetKind::SingleNumeric,
            TargetContext::DoubleRegression { .. } => TargetKind::DoubleRegression,
            TargetContext::DoubleCorrelation { .. } => TargetKind::DoubleCorrelation,
            TargetContext::MultiLabel { .. } => TargetKind::MultiLabel,
        }
    }

    /// Indices of the target's columns, sorted. These never appear in descriptions.
    pub fn target_columns(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            TargetContext::SingleNominal { column, .. } | TargetContext::SingleNumeric { column, .. } => {
                vec![column.index()]
            }
            TargetContext::DoubleRegression { primary, secondary, .. }
            | TargetContext::DoubleCorrelation { primary, secondary, .. } => {
                vec![primary.index(), secondary.index()]
            }
            TargetContext::MultiLabel { columns, .. } => columns.iter().map(|c| c.index()).collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }

    /// Positive rows, for a single nominal target.
    pub fn binary_target(&self) -> Option<&FixedBitSet> {
        match self {
            TargetContext::SingleNominal { positives, .. } => Some(positives),
            _ => None,
        }
    }

    /// The labels and graph builder, for a multi-label target.
    pub fn graph_targets(&self) -> Option<(&BinaryTargets, &dyn GraphInducer)> {
        match self {
            TargetContext::MultiLabel { targets, inducer, .. } => Some((targets, inducer.as_ref())),
            _ => None,
        }
    }

    /// The facts every subgroup of a search against this target shares.
    pub fn population(&self, nr_rows: usize) -> Population {
        match self.binary_target() {
            Some(positives) => Population::with_binary_target(positives.clone()),
            None => Population::new(nr_rows),
        }
    }

    /// Binds the configured measure to this target's population statistics.
    pub fn quality_measure(&self, params: &SearchParameters, nr_rows: usize) -> Result<QualityMeasure> {
        let measure = params.quality_measure;
        match self {
            TargetContext::SingleNominal { positives, .. } => {
                QualityMeasure::binary(measure, nr_rows, positives.count_ones(..))
            }
            TargetContext::SingleNumeric { population, .. } => QualityMeasure::numeric(measure, population),
            TargetContext::DoubleRegression { .. } | TargetContext::DoubleCorrelation { .. } => {
                if measure.target_kind() != self.kind() {
                    return Err(Error::IncompatibleMeasure {
                        measure: measure.name(),
                        target: self.kind().name(),
                    });
                }
                QualityMeasure::bivariate(measure, nr_rows)
            }
            TargetContext::MultiLabel { base, .. } => {
                QualityMeasure::graph(measure, nr_rows, base.clone(), params.alpha, params.beta)
            }
        }
    }

    /// Scores the rows in `members` against this target.
    pub fn evaluate(&self, quality: &QualityMeasure, members: &FixedBitSet) -> Evaluation {
        let coverage = members.count_ones(..);
        match self {
            TargetContext::SingleNominal { positives, .. } => {
                let hits = members.intersection(positives).count();
                let ratio = if coverage == 0 {
                    0.0
                } else {
                    hits as f64 / coverage as f64
                };
                Evaluation::scored(quality.calculate(hits, coverage), ratio, hits as f64)
            }
            TargetContext::SingleNumeric { column, .. } => {
                let stats = column.numeric_statistics(members, quality.measure().needs_median());
                let sd = if coverage == 0 {
                    0.0
                } else {
                    (stats.sum_squared_deviations / coverage as f64).sqrt()
                };
                Evaluation::scored(quality.calculate_numeric(&stats), stats.mean(), sd)
            }
            TargetContext::DoubleRegression {
                primary,
                secondary,
                population,
            } => {
                let sums = BivariateSums::over(primary, secondary, members);
                match RegressionMeasure::new(*population).evaluate(&sums) {
                    Some(score) => Evaluation::scored(score.quality, score.secondary, score.tertiary),
                    None => Evaluation::rank_deficient(),
                }
            }
            TargetContext::DoubleCorrelation {
                primary,
                secondary,
                population,
            } => {
                let sums = BivariateSums::over(primary, secondary, members);
                match CorrelationMeasure::new(quality.measure(), *population).evaluate(&sums) {
                    Some(score) => Evaluation::scored(score.quality, score.secondary, score.tertiary),
                    None => Evaluation::rank_deficient(),
                }
            }
            TargetContext::MultiLabel { targets, inducer, .. } => {
                let graph = inducer.induce(targets, members);
                match quality.calculate_graph(coverage, &graph) {
                    Some(score) => Evaluation {
                        quality: score.quality,
                        secondary: score.edit_distance,
                        tertiary: score.entropy,
                        graph: Some(graph),
                        rank_deficient: false,
                    },
                    None => Evaluation {
                        graph: Some(graph),
                        ..Evaluation::rank_deficient()
                    },
                }
            }
        }
    }
}
