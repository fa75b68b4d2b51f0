//! Predicates over a single column, and conjunctions of them.

use crate::error::{Error, Result};
use crate::table::{Column, ColumnType};
use lasso::Spur;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Comparison operators, in the order conditions on the same column sort by.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Operator {
    /// Value belongs to a set of nominal values.
    ElementOf,
    /// Value differs from a nominal value.
    DoesNotEqual,
    /// Value equals the condition's value.
    Equals,
    /// Numeric value is at most the threshold.
    LessThanOrEqual,
    /// Numeric value is at least the threshold.
    GreaterThanOrEqual,
    /// Numeric value lies in an [`Interval`].
    Between,
}

impl Operator {
    /// The operator's textual form.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::ElementOf => "in",
            Operator::DoesNotEqual => "!=",
            Operator::Equals => "=",
            Operator::LessThanOrEqual => "<=",
            Operator::GreaterThanOrEqual => ">=",
            Operator::Between => "in",
        }
    }

    /// The operator after this one in `operators`, for stepping through the operators a column's
    /// refinements should try.
    ///
    /// ```
    /// use subgroup_discovery::Operator;
    ///
    /// let ops = [Operator::LessThanOrEqual, Operator::GreaterThanOrEqual];
    /// assert_eq!(Operator::LessThanOrEqual.next_in(&ops), Some(Operator::GreaterThanOrEqual));
    /// assert_eq!(Operator::GreaterThanOrEqual.next_in(&ops), None);
    /// assert!(!Operator::GreaterThanOrEqual.has_next_in(&ops));
    /// ```
    pub fn next_in(self, operators: &[Operator]) -> Option<Operator> {
        let at = operators.iter().position(|&o| o == self)?;
        operators.get(at + 1).copied()
    }

    /// Returns `true` if [`next_in`](Self::next_in) would find another operator.
    pub fn has_next_in(self, operators: &[Operator]) -> bool {
        self.next_in(operators).is_some()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A half-open range of reals: `lower < x <= upper`.
///
/// Either bound may be infinite, which is how one-sided thresholds are written.
///
/// ```
/// use subgroup_discovery::Interval;
///
/// let i = Interval::new(1.0, 3.0);
/// assert!(!i.contains(1.0));
/// assert!(i.contains(3.0));
/// assert!(Interval::new(f32::NEG_INFINITY, 1.0).contains(-1e30));
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    /// Exclusive lower bound.
    pub lower: f32,
    /// Inclusive upper bound.
    pub upper: f32,
}

impl Interval {
    /// Creates an interval.
    pub fn new(lower: f32, upper: f32) -> Self {
        Interval { lower, upper }
    }

    /// Tests membership.
    pub fn contains(&self, value: f32) -> bool {
        self.lower < value && value <= self.upper
    }

    fn total_cmp(&self, other: &Self) -> Ordering {
        self.lower
            .total_cmp(&other.lower)
            .then_with(|| self.upper.total_cmp(&other.upper))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}]", self.lower, self.upper)
    }
}

/// A set of nominal values, kept sorted by key so membership is a binary search.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ValueSet(SmallVec<[Spur; 4]>);

impl ValueSet {
    /// Builds a set from values in any order; duplicates are dropped.
    pub fn new(values: &[Spur]) -> Self {
        let mut v = SmallVec::from_slice(values);
        v.sort_unstable();
        v.dedup();
        ValueSet(v)
    }

    /// Number of values in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the set has no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Tests membership.
    pub fn contains(&self, value: Spur) -> bool {
        self.0.binary_search(&value).is_ok()
    }

    /// The values, sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = Spur> + '_ {
        self.0.iter().copied()
    }

    /// The values as strings of `column`, sorted alphabetically.
    pub fn names<'c>(&self, column: &'c Column) -> Vec<&'c str> {
        let mut names: Vec<&str> = self.iter().map(|v| column.resolve(v)).collect();
        names.sort_unstable();
        names
    }
}

impl std::iter::FromIterator<Spur> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Spur>>(iter: I) -> Self {
        let mut v: SmallVec<[Spur; 4]> = iter.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        ValueSet(v)
    }
}

/// The right-hand side of a [`Condition`]. Which variant is legal depends on the column type and
/// the operator.
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionValue {
    /// A single nominal value.
    Nominal(Spur),
    /// A set of nominal values, for [`Operator::ElementOf`].
    ValueSet(ValueSet),
    /// A numeric threshold or equality value. May be NaN, which nothing satisfies.
    Numeric(f32),
    /// A numeric range, for [`Operator::Between`].
    Interval(Interval),
    /// A boolean, for binary columns.
    Binary(bool),
}

impl ConditionValue {
    fn rank(&self) -> u8 {
        match self {
            ConditionValue::Nominal(_) => 0,
            ConditionValue::ValueSet(_) => 1,
            ConditionValue::Numeric(_) => 2,
            ConditionValue::Interval(_) => 3,
            ConditionValue::Binary(_) => 4,
        }
    }
}

/// A single predicate: `column operator value`.
///
/// The column is shared, so copying a condition to give it a different value is cheap.
#[derive(Clone, Debug)]
pub struct Condition {
    column: Arc<Column>,
    operator: Operator,
    value: ConditionValue,
}

impl Condition {
    /// Creates a condition.
    ///
    /// Combinations that make no sense, such as `<=` on a nominal column, are accepted here and
    /// reported when the condition is evaluated.
    pub fn new(column: Arc<Column>, operator: Operator, value: ConditionValue) -> Self {
        Condition {
            column,
            operator,
            value,
        }
    }

    /// Creates a condition from the textual form of its value.
    ///
    /// Numeric text that fails to parse becomes NaN, which no row satisfies. Binary columns treat
    /// `"1"` as true and anything else as false. A nominal value that no row has is an error.
    ///
    /// ```
    /// use subgroup_discovery::{Condition, Operator, TableBuilder};
    ///
    /// let table = TableBuilder::new("t").numeric("x", vec![1.0, 2.0])?.build();
    /// let x = table.column_by_name("x")?.clone();
    ///
    /// let bad = Condition::parse(x.clone(), Operator::LessThanOrEqual, "twelve")?;
    /// assert_eq!(table.evaluate(&bad).count_ones(..), 0);
    ///
    /// let ok = Condition::parse(x, Operator::LessThanOrEqual, "1.5")?;
    /// assert_eq!(ok.to_string(), "x <= 1.5");
    /// # Ok::<(), subgroup_discovery::Error>(())
    /// ```
    pub fn parse(column: Arc<Column>, operator: Operator, text: &str) -> Result<Self> {
        let value = match column.column_type() {
            ColumnType::Nominal => {
                let key = column
                    .lookup(text)
                    .ok_or_else(|| Error::unknown_name("value", text))?;
                if operator == Operator::ElementOf {
                    ConditionValue::ValueSet(ValueSet::new(&[key]))
                } else {
                    ConditionValue::Nominal(key)
                }
            }
            ColumnType::Numeric => ConditionValue::Numeric(text.trim().parse().unwrap_or(f32::NAN)),
            ColumnType::Binary => {
                ConditionValue::Binary(matches!(text.trim(), "1" | "true" | "TRUE" | "True"))
            }
        };
        Ok(Condition::new(column, operator, value))
    }

    /// A copy of this condition with a different value.
    pub fn with_value(&self, value: ConditionValue) -> Self {
        Condition {
            column: self.column.clone(),
            operator: self.operator,
            value,
        }
    }

    /// The column tested.
    pub fn column(&self) -> &Arc<Column> {
        &self.column
    }

    /// The comparison applied.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The value compared against.
    pub fn value(&self) -> &ConditionValue {
        &self.value
    }

    /// Checks that the operator and value fit the column, logging a warning if not.
    pub fn is_consistent(&self) -> bool {
        let value_fits = matches!(
            (self.column.column_type(), self.operator, &self.value),
            (ColumnType::Nominal, Operator::ElementOf, ConditionValue::ValueSet(_))
                | (
                    ColumnType::Nominal,
                    Operator::Equals | Operator::DoesNotEqual,
                    ConditionValue::Nominal(_)
                )
                | (ColumnType::Numeric, Operator::Between, ConditionValue::Interval(_))
                | (
                    ColumnType::Numeric,
                    Operator::Equals | Operator::LessThanOrEqual | Operator::GreaterThanOrEqual,
                    ConditionValue::Numeric(_)
                )
                | (ColumnType::Binary, Operator::Equals, ConditionValue::Binary(_))
        );
        if !value_fits {
            warn!(
                column = self.column.name(),
                column_type = %self.column.column_type(),
                operator = %self.operator,
                "condition does not fit its column"
            );
        }
        value_fits
    }

    // Silent on a mismatch: callers check `is_consistent` once per condition, which logs.
    pub(crate) fn evaluate_nominal(&self, value: Spur) -> bool {
        match (self.operator, &self.value) {
            (Operator::Equals, ConditionValue::Nominal(v)) => value == *v,
            (Operator::DoesNotEqual, ConditionValue::Nominal(v)) => value != *v,
            (Operator::ElementOf, ConditionValue::ValueSet(set)) => set.contains(value),
            _ => false,
        }
    }

    pub(crate) fn evaluate_numeric(&self, value: f32) -> bool {
        match (self.operator, &self.value) {
            (Operator::Equals, ConditionValue::Numeric(v)) => value == *v,
            (Operator::LessThanOrEqual, ConditionValue::Numeric(v)) => value <= *v,
            (Operator::GreaterThanOrEqual, ConditionValue::Numeric(v)) => value >= *v,
            (Operator::Between, ConditionValue::Interval(i)) => i.contains(value),
            _ => false,
        }
    }

    pub(crate) fn evaluate_binary(&self, value: bool) -> bool {
        match (self.operator, &self.value) {
            (Operator::Equals, ConditionValue::Binary(v)) => value == *v,
            _ => false,
        }
    }

    fn compare_values(&self, other: &Self) -> Ordering {
        match (&self.value, &other.value) {
            (ConditionValue::Nominal(a), ConditionValue::Nominal(b)) => {
                self.column.resolve(*a).cmp(other.column.resolve(*b))
            }
            // Same-size sets fall back to comparing their members so the order stays strict.
            (ConditionValue::ValueSet(a), ConditionValue::ValueSet(b)) => a
                .len()
                .cmp(&b.len())
                .then_with(|| a.names(&self.column).cmp(&b.names(&other.column))),
            (ConditionValue::Numeric(a), ConditionValue::Numeric(b)) => a.total_cmp(b),
            (ConditionValue::Interval(a), ConditionValue::Interval(b)) => a.total_cmp(b),
            (ConditionValue::Binary(a), ConditionValue::Binary(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Condition {}

impl PartialOrd for Condition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Condition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.column
            .index()
            .cmp(&other.column.index())
            .then_with(|| self.operator.cmp(&other.operator))
            .then_with(|| self.compare_values(other))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.column.name(), self.operator)?;
        match &self.value {
            ConditionValue::Nominal(v) => write!(f, "'{}'", self.column.resolve(*v)),
            ConditionValue::ValueSet(set) => {
                write!(f, "{{")?;
                for (i, name) in set.names(&self.column).into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}'", name)?;
                }
                write!(f, "}}")
            }
            ConditionValue::Numeric(v) => write!(f, "{}", v),
            ConditionValue::Interval(i) => write!(f, "{}", i),
            ConditionValue::Binary(v) => write!(f, "'{}'", if *v { 1 } else { 0 }),
        }
    }
}

/// A conjunction of conditions, kept sorted so that equal conjunctions compare equal no matter
/// what order their conditions were added in.
#[derive(Clone, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
pub struct ConditionList(SmallVec<[Condition; 4]>);

impl ConditionList {
    /// The empty conjunction, which every row satisfies.
    pub fn new() -> Self {
        ConditionList(SmallVec::new())
    }

    /// Adds a condition at its sorted position.
    pub fn add(&mut self, condition: Condition) {
        let at = self.0.partition_point(|c| *c <= condition);
        self.0.insert(at, condition);
    }

    /// Number of conditions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for the empty conjunction.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The conditions in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    /// Column indices fixed by an equality test, sorted.
    pub fn fixed_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .filter(|c| c.operator == Operator::Equals)
            .map(|c| c.column.index())
    }
}

impl std::iter::FromIterator<Condition> for ConditionList {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        let mut list = ConditionList::new();
        for condition in iter {
            list.add(condition);
        }
        list
    }
}

impl fmt::Display for ConditionList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("(empty)");
        }
        for (i, condition) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{}", condition)?;
        }
        Ok(())
    }
}
