//! Search configuration.

use crate::condition::Operator;
use crate::error::{Error, Result};
use crate::quality::{normalize, Measure, TargetKind};
use crate::table::ColumnType;
use std::fmt;
use std::str::FromStr;

macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($(#[$vmeta:meta])* $variant:ident => $text:literal,)* }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)*
        }

        impl $name {
            /// The option's name as written in settings.
            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = normalize(s);
                [$($name::$variant),*]
                    .into_iter()
                    .find(|v| normalize(v.name()) == wanted)
                    .ok_or_else(|| Error::unknown_name($kind, s))
            }
        }
    };
}

named_enum! {
    /// Order in which candidates are refined.
    SearchStrategy, "search strategy" {
        /// Level by level, first in first out.
        BreadthFirst => "breadth first",
        /// Most recently added first.
        DepthFirst => "depth first",
        /// Highest quality first, over the whole frontier.
        BestFirst => "best first",
        /// Level by level, keeping only the best candidates of each level.
        Beam => "beam",
    }
}

named_enum! {
    /// How thresholds on numeric columns are chosen.
    NumericStrategy, "numeric strategy" {
        /// Every distinct value becomes a candidate threshold.
        All => "all",
        /// Thresholds at the boundaries of equal-frequency bins.
        Bins => "bins",
        /// Like `All`, but only the best threshold is kept.
        Best => "best",
        /// The best two-sided interval, for binary targets.
        Intervals => "intervals",
    }
}

named_enum! {
    /// Operators tried on nominal columns.
    NominalOperators, "nominal operators" {
        /// `=` only.
        Equals => "equals",
        /// `=` and `!=`.
        EqualsAndDoesNotEqual => "equals and does not equal",
        /// The best value set, for binary targets.
        ElementOf => "element of",
    }
}

named_enum! {
    /// Operators tried on numeric columns.
    NumericOperators, "numeric operators" {
        /// `<=` and `>=`.
        Normal => "normal",
        /// `<=` only.
        LessThanOrEqual => "less than or equal",
        /// `>=` only.
        GreaterThanOrEqual => "greater than or equal",
        /// `=` only, treating the column as nominal.
        Equals => "equals",
        /// `<=`, `>=` and `=`.
        All => "all",
        /// Two-sided intervals; requires the interval strategy.
        Intervals => "intervals",
    }
}

impl NominalOperators {
    /// The operators, in enumeration order.
    pub fn operators(self) -> &'static [Operator] {
        match self {
            NominalOperators::Equals => &[Operator::Equals],
            NominalOperators::EqualsAndDoesNotEqual => &[Operator::DoesNotEqual, Operator::Equals],
            NominalOperators::ElementOf => &[Operator::ElementOf],
        }
    }
}

impl NumericOperators {
    /// The operators, in enumeration order.
    pub fn operators(self) -> &'static [Operator] {
        match self {
            NumericOperators::Normal => &[Operator::LessThanOrEqual, Operator::GreaterThanOrEqual],
            NumericOperators::LessThanOrEqual => &[Operator::LessThanOrEqual],
            NumericOperators::GreaterThanOrEqual => &[Operator::GreaterThanOrEqual],
            NumericOperators::Equals => &[Operator::Equals],
            NumericOperators::All => &[
                Operator::Equals,
                Operator::LessThanOrEqual,
                Operator::GreaterThanOrEqual,
            ],
            NumericOperators::Intervals => &[Operator::Between],
        }
    }
}

/// The target of a search, by column name. Resolve it against a table with
/// [`TargetContext::from_concept`](crate::TargetContext::from_concept).
#[derive(Clone, Debug, PartialEq)]
pub enum TargetConcept {
    /// Rows where `column` equals `value` are positive. For binary columns use `"1"` or `"0"`.
    SingleNominal {
        /// Target column.
        column: String,
        /// The positive value.
        value: String,
    },
    /// A numeric column.
    SingleNumeric {
        /// Target column.
        column: String,
    },
    /// Regression of `secondary` on `primary`.
    DoubleRegression {
        /// Explanatory column.
        primary: String,
        /// Response column.
        secondary: String,
    },
    /// Correlation of two numeric columns.
    DoubleCorrelation {
        /// First column.
        primary: String,
        /// Second column.
        secondary: String,
    },
    /// Several binary label columns.
    MultiLabel {
        /// Label columns.
        columns: Vec<String>,
    },
}

impl TargetConcept {
    /// The shape of this target.
    pub fn kind(&self) -> TargetKind {
        match self {
            TargetConcept::SingleNominal { .. } => TargetKind::SingleNominal,
            TargetConcept::SingleNumeric { .. } => TargetKind::SingleNumeric,
            TargetConcept::DoubleRegression { .. } => TargetKind::DoubleRegression,
            TargetConcept::DoubleCorrelation { .. } => TargetKind::DoubleCorrelation,
            TargetConcept::MultiLabel { .. } => TargetKind::MultiLabel,
        }
    }

    /// Names of every column that belongs to the target.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            TargetConcept::SingleNominal { column, .. } | TargetConcept::SingleNumeric { column } => {
                vec![column.as_str()]
            }
            TargetConcept::DoubleRegression { primary, secondary }
            | TargetConcept::DoubleCorrelation { primary, secondary } => vec![primary.as_str(), secondary.as_str()],
            TargetConcept::MultiLabel { columns } => columns.iter().map(String::as_str).collect(),
        }
    }

    /// Returns `true` if the named column is part of the target and so may not appear in a
    /// subgroup description.
    pub fn is_target_column(&self, name: &str) -> bool {
        self.columns().contains(&name)
    }
}

/// Settings for one search.
///
/// ```
/// use subgroup_discovery::{Measure, SearchParameters, SearchStrategy};
///
/// let params = SearchParameters::default()
///     .with_quality_measure(Measure::ChiSquared)
///     .with_search_depth(2)
///     .with_search_strategy(SearchStrategy::BestFirst, 1);
/// assert!(params.validate().is_ok());
/// assert!(params.with_minimum_coverage(0).validate().is_err());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct SearchParameters {
    /// Measure used to score and rank subgroups.
    pub quality_measure: Measure,
    /// Subgroups must score strictly above this to be collected.
    pub quality_minimum: f64,
    /// Maximum number of conditions in a description.
    pub search_depth: usize,
    /// Subgroups smaller than this are neither scored nor refined.
    pub minimum_coverage: usize,
    /// Largest collectable subgroup, as a fraction of all rows.
    pub maximum_coverage_fraction: f64,
    /// Size of the result set.
    pub maximum_subgroups: usize,
    /// Time limit in minutes; zero or less means no limit.
    pub maximum_time: f64,
    /// Order of exploration.
    pub search_strategy: SearchStrategy,
    /// Beam width, for [`SearchStrategy::Beam`].
    pub search_strategy_width: usize,
    /// Operators on nominal columns.
    pub nominal_operators: NominalOperators,
    /// Operators on numeric columns.
    pub numeric_operators: NumericOperators,
    /// How numeric thresholds are chosen.
    pub numeric_strategy: NumericStrategy,
    /// Number of bins, for [`NumericStrategy::Bins`].
    pub nr_bins: usize,
    /// Entropy exponent of the weighted edit distance measure.
    pub alpha: f64,
    /// Edit distance exponent of the weighted edit distance measure.
    pub beta: f64,
    /// Whether a multi-label result is re-scored over resampled graphs after the search.
    pub post_processing_do_auto_run: bool,
    /// Graphs induced per subgroup, and per population, when post-processing.
    pub post_processing_count: usize,
    /// Size of the result after post-processing.
    pub maximum_post_processing_subgroups: usize,
}

impl Default for SearchParameters {
    fn default() -> Self {
        SearchParameters {
            quality_measure: Measure::WRAcc,
            quality_minimum: 0.0,
            search_depth: 1,
            minimum_coverage: 2,
            maximum_coverage_fraction: 1.0,
            maximum_subgroups: 50,
            maximum_time: 0.0,
            search_strategy: SearchStrategy::Beam,
            search_strategy_width: 100,
            nominal_operators: NominalOperators::EqualsAndDoesNotEqual,
            numeric_operators: NumericOperators::Normal,
            numeric_strategy: NumericStrategy::Best,
            nr_bins: 8,
            alpha: 0.5,
            beta: 1.0,
            post_processing_do_auto_run: false,
            post_processing_count: 20,
            maximum_post_processing_subgroups: 100,
        }
    }
}

impl SearchParameters {
    /// Sets the quality measure.
    pub fn with_quality_measure(mut self, measure: Measure) -> Self {
        self.quality_measure = measure;
        self
    }

    /// Sets the minimum quality.
    pub fn with_quality_minimum(mut self, minimum: f64) -> Self {
        self.quality_minimum = minimum;
        self
    }

    /// Sets the maximum description length.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.search_depth = depth;
        self
    }

    /// Sets the minimum coverage.
    pub fn with_minimum_coverage(mut self, coverage: usize) -> Self {
        self.minimum_coverage = coverage;
        self
    }

    /// Sets the maximum coverage as a fraction of the table.
    pub fn with_maximum_coverage_fraction(mut self, fraction: f64) -> Self {
        self.maximum_coverage_fraction = fraction;
        self
    }

    /// Sets the result size.
    pub fn with_maximum_subgroups(mut self, n: usize) -> Self {
        self.maximum_subgroups = n;
        self
    }

    /// Sets the time limit in minutes.
    pub fn with_maximum_time(mut self, minutes: f64) -> Self {
        self.maximum_time = minutes;
        self
    }

    /// Sets the search strategy and its width.
    pub fn with_search_strategy(mut self, strategy: SearchStrategy, width: usize) -> Self {
        self.search_strategy = strategy;
        self.search_strategy_width = width;
        self
    }

    /// Sets the nominal operators.
    pub fn with_nominal_operators(mut self, operators: NominalOperators) -> Self {
        self.nominal_operators = operators;
        self
    }

    /// Sets the numeric operators.
    pub fn with_numeric_operators(mut self, operators: NumericOperators) -> Self {
        self.numeric_operators = operators;
        self
    }

    /// Sets the numeric strategy. Choosing [`NumericStrategy::Intervals`] also switches the
    /// numeric operators to intervals, and leaving it switches them back to `<=`/`>=`.
    pub fn with_numeric_strategy(mut self, strategy: NumericStrategy) -> Self {
        self.numeric_strategy = strategy;
        if strategy == NumericStrategy::Intervals {
            self.numeric_operators = NumericOperators::Intervals;
        } else if self.numeric_operators == NumericOperators::Intervals {
            self.numeric_operators = NumericOperators::Normal;
        }
        self
    }

    /// Sets the number of bins.
    pub fn with_nr_bins(mut self, bins: usize) -> Self {
        self.nr_bins = bins;
        self
    }

    /// Sets the exponents of the weighted edit distance measure.
    pub fn with_alpha_beta(mut self, alpha: f64, beta: f64) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    /// Turns multi-label post-processing on with `count` graphs per side, keeping `maximum`
    /// subgroups.
    pub fn with_post_processing(mut self, count: usize, maximum: usize) -> Self {
        self.post_processing_do_auto_run = true;
        self.post_processing_count = count;
        self.maximum_post_processing_subgroups = maximum;
        self
    }

    /// The operators enumerated for a column of the given type.
    pub fn operators_for(&self, column_type: ColumnType) -> &'static [Operator] {
        match column_type {
            ColumnType::Nominal => self.nominal_operators.operators(),
            ColumnType::Numeric => self.numeric_operators.operators(),
            ColumnType::Binary => &[Operator::Equals],
        }
    }

    /// The largest collectable coverage for a table of `nr_rows` rows.
    pub fn maximum_coverage(&self, nr_rows: usize) -> usize {
        (nr_rows as f64 * self.maximum_coverage_fraction) as usize
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.search_depth == 0 {
            return Err(Error::invalid("search depth must be at least 1"));
        }
        if self.minimum_coverage == 0 {
            return Err(Error::invalid("minimum coverage must be at least 1"));
        }
        if !(self.maximum_coverage_fraction > 0.0 && self.maximum_coverage_fraction <= 1.0) {
            return Err(Error::invalid("maximum coverage must be a fraction in (0, 1]"));
        }
        if self.maximum_subgroups == 0 {
            return Err(Error::invalid("maximum subgroups must be at least 1"));
        }
        if self.search_strategy == SearchStrategy::Beam && self.search_strategy_width == 0 {
            return Err(Error::invalid("beam width must be at least 1"));
        }
        if self.numeric_strategy == NumericStrategy::Bins && self.nr_bins < 2 {
            return Err(Error::invalid("number of bins must be at least 2"));
        }
        if (self.numeric_strategy == NumericStrategy::Intervals)
            != (self.numeric_operators == NumericOperators::Intervals)
        {
            return Err(Error::invalid(
                "interval operators and the interval strategy must be used together",
            ));
        }
        if self.post_processing_do_auto_run {
            if self.post_processing_count == 0 {
                return Err(Error::invalid("post-processing count must be at least 1"));
            }
            if self.maximum_post_processing_subgroups == 0 {
                return Err(Error::invalid("maximum post-processing subgroups must be at least 1"));
            }
        }
        Ok(())
    }
}
