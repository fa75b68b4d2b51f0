//! Column-oriented storage for the data being mined.
//!
//! Columns never change after a [`Table`] is built. Subgroups refer to rows by index, so every
//! column of a table has the same number of rows.

use crate::condition::{Condition, ConditionList};
use crate::error::{Error, Result};
use fixedbitset::FixedBitSet;
use lasso::{Rodeo, RodeoReader, Spur};
use statrs::statistics::{Data, Median};
use std::fmt;
use std::sync::Arc;

/// The semantic type of a column, which decides the operators that apply to it.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ColumnType {
    /// Unordered string values.
    Nominal,
    /// Real values.
    Numeric,
    /// Boolean values.
    Binary,
}

impl ColumnType {
    /// A lower-case name for messages.
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Nominal => "nominal",
            ColumnType::Numeric => "numeric",
            ColumnType::Binary => "binary",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interned values of a nominal column.
#[derive(Clone)]
pub struct NominalValues {
    values: Vec<Spur>,
    interner: Arc<RodeoReader>,
    // Sorted by string, not by key.
    domain: Vec<Spur>,
}

impl fmt::Debug for NominalValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NominalValues")
            .field("rows", &self.values.len())
            .field("domain", &self.domain.len())
            .finish()
    }
}

/// Storage for one column.
#[derive(Clone, Debug)]
pub enum ColumnData {
    /// See [`ColumnType::Nominal`].
    Nominal(NominalValues),
    /// See [`ColumnType::Numeric`].
    Numeric(Vec<f32>),
    /// See [`ColumnType::Binary`].
    Binary(FixedBitSet),
}

/// Moments and order statistics of a numeric column restricted to some rows.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NumericStatistics {
    /// Number of rows summarized.
    pub coverage: usize,
    /// Sum of the values.
    pub sum: f64,
    /// Sum of squared deviations from the mean.
    pub sum_squared_deviations: f64,
    /// Median, or NaN if it was not requested or there are no rows.
    pub median: f64,
    /// Median absolute deviation from the median, or NaN like `median`.
    pub median_absolute_deviation: f64,
}

impl NumericStatistics {
    /// The mean, or 0 for an empty selection.
    pub fn mean(&self) -> f64 {
        if self.coverage == 0 {
            0.0
        } else {
            self.sum / self.coverage as f64
        }
    }
}

/// A named, immutable column of a [`Table`].
#[derive(Clone, Debug)]
pub struct Column {
    name: String,
    index: usize,
    data: ColumnData,
}

impl Column {
    /// The column's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of this column in its table. Conditions are ordered by this index first.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The column's type.
    pub fn column_type(&self) -> ColumnType {
        match self.data {
            ColumnData::Nominal(_) => ColumnType::Nominal,
            ColumnData::Numeric(_) => ColumnType::Numeric,
            ColumnData::Binary(_) => ColumnType::Binary,
        }
    }

    /// Raw access to the stored values.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    /// Number of rows.
    pub fn nr_rows(&self) -> usize {
        match &self.data {
            ColumnData::Nominal(n) => n.values.len(),
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Binary(b) => b.len(),
        }
    }

    /// Nominal value of `row`, or `None` for other column types.
    pub fn nominal_value(&self, row: usize) -> Option<Spur> {
        match &self.data {
            ColumnData::Nominal(n) => Some(n.values[row]),
            _ => None,
        }
    }

    /// Numeric value of `row`, or `None` for other column types.
    pub fn numeric_value(&self, row: usize) -> Option<f32> {
        match &self.data {
            ColumnData::Numeric(v) => Some(v[row]),
            _ => None,
        }
    }

    /// Binary value of `row`, or `None` for other column types.
    pub fn binary_value(&self, row: usize) -> Option<bool> {
        match &self.data {
            ColumnData::Binary(b) => Some(b.contains(row)),
            _ => None,
        }
    }

    /// The bitset of rows whose value is `true`, for binary columns.
    pub fn binary_members(&self) -> Option<&FixedBitSet> {
        match &self.data {
            ColumnData::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Turns an interned nominal value back into its string.
    ///
    /// Returns an empty string for columns that are not nominal.
    pub fn resolve(&self, value: Spur) -> &str {
        match &self.data {
            ColumnData::Nominal(n) => n.interner.resolve(&value),
            _ => "",
        }
    }

    /// Finds the interned key of a nominal value, if any row has that value.
    pub fn lookup(&self, value: &str) -> Option<Spur> {
        match &self.data {
            ColumnData::Nominal(n) => n.interner.get(value),
            _ => None,
        }
    }

    /// All distinct values of a nominal column in string order. Empty for other column types.
    pub fn nominal_domain(&self) -> &[Spur] {
        match &self.data {
            ColumnData::Nominal(n) => &n.domain,
            _ => &[],
        }
    }

    /// The values of a numeric column at the given rows, in row order.
    fn numeric_values_of(&self, members: &FixedBitSet) -> Vec<f32> {
        match &self.data {
            ColumnData::Numeric(v) => members.ones().map(|row| v[row]).collect(),
            _ => Vec::new(),
        }
    }

    /// The distinct numeric values taken by `members`, sorted ascending.
    pub fn unique_numeric_domain(&self, members: &FixedBitSet) -> Vec<f32> {
        let mut values = self.numeric_values_of(members);
        values.sort_unstable_by(f32::total_cmp);
        values.dedup();
        values
    }

    /// Chooses `n` thresholds that cut the values of `members` into `n + 1` groups of roughly
    /// equal size.
    ///
    /// Split points may repeat when many rows share a value; callers skip repeats.
    pub fn split_points(&self, members: &FixedBitSet, n: usize) -> Vec<f32> {
        let mut values = self.numeric_values_of(members);
        if values.is_empty() {
            return Vec::new();
        }
        values.sort_unstable_by(f32::total_cmp);
        (0..n)
            .map(|j| values[(j + 1) * values.len() / (n + 1)])
            .collect()
    }

    /// Summarizes a numeric column over `members`.
    ///
    /// The median and median absolute deviation are only computed when `with_median` is set,
    /// since they need a sorted copy of the values.
    pub fn numeric_statistics(&self, members: &FixedBitSet, with_median: bool) -> NumericStatistics {
        let values = self.numeric_values_of(members);
        let coverage = values.len();
        if coverage == 0 {
            return NumericStatistics {
                median: f64::NAN,
                median_absolute_deviation: f64::NAN,
                ..NumericStatistics::default()
            };
        }

        let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
        let mean = sum / coverage as f64;
        let sum_squared_deviations = values
            .iter()
            .map(|&v| (f64::from(v) - mean).powi(2))
            .sum();

        let (median, median_absolute_deviation) = if with_median {
            let median = Data::new(values.iter().map(|&v| f64::from(v)).collect::<Vec<_>>()).median();
            let deviations = values
                .iter()
                .map(|&v| (f64::from(v) - median).abs())
                .collect::<Vec<_>>();
            (median, Data::new(deviations).median())
        } else {
            (f64::NAN, f64::NAN)
        };

        NumericStatistics {
            coverage,
            sum,
            sum_squared_deviations,
            median,
            median_absolute_deviation,
        }
    }

    /// Smallest value of a numeric column, or NaN.
    pub fn min(&self) -> f32 {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().copied().fold(f32::NAN, f32::min),
            _ => f32::NAN,
        }
    }

    /// Largest value of a numeric column, or NaN.
    pub fn max(&self) -> f32 {
        match &self.data {
            ColumnData::Numeric(v) => v.iter().copied().fold(f32::NAN, f32::max),
            _ => f32::NAN,
        }
    }

    /// The rows of this column satisfying `condition`.
    ///
    /// A condition that does not fit this column's type selects no rows.
    pub fn evaluate(&self, condition: &Condition) -> FixedBitSet {
        let mut all = FixedBitSet::with_capacity(self.nr_rows());
        all.insert_range(..);
        self.evaluate_within(condition, &all)
    }

    /// The subset of `members` satisfying `condition`.
    pub fn evaluate_within(&self, condition: &Condition, members: &FixedBitSet) -> FixedBitSet {
        let mut result = FixedBitSet::with_capacity(self.nr_rows());
        if !condition.is_consistent() {
            return result;
        }
        match &self.data {
            ColumnData::Nominal(n) => {
                for row in members.ones() {
                    result.set(row, condition.evaluate_nominal(n.values[row]));
                }
            }
            ColumnData::Numeric(v) => {
                for row in members.ones() {
                    result.set(row, condition.evaluate_numeric(v[row]));
                }
            }
            ColumnData::Binary(b) => {
                for row in members.ones() {
                    result.set(row, condition.evaluate_binary(b.contains(row)));
                }
            }
        }
        result
    }

    /// A copy of this column where row `i` holds the value that row `order[i]` holds here.
    pub fn permuted(&self, order: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Nominal(n) => ColumnData::Nominal(NominalValues {
                values: order.iter().map(|&i| n.values[i]).collect(),
                interner: n.interner.clone(),
                domain: n.domain.clone(),
            }),
            ColumnData::Numeric(v) => ColumnData::Numeric(order.iter().map(|&i| v[i]).collect()),
            ColumnData::Binary(b) => {
                let mut permuted = FixedBitSet::with_capacity(b.len());
                for (row, &i) in order.iter().enumerate() {
                    permuted.set(row, b.contains(i));
                }
                ColumnData::Binary(permuted)
            }
        };
        Column {
            name: self.name.clone(),
            index: self.index,
            data,
        }
    }
}

/// A dataset: a named list of columns of equal length.
///
/// ```
/// use subgroup_discovery::{ColumnType, TableBuilder};
///
/// let table = TableBuilder::new("weather")
///     .nominal("outlook", ["sunny", "rain", "sunny"])?
///     .numeric("temperature", vec![30.0, 12.5, 24.0])?
///     .binary("play", [false, true, true])?
///     .build();
///
/// assert_eq!(table.nr_rows(), 3);
/// assert_eq!(table.column_by_name("play")?.column_type(), ColumnType::Binary);
/// # Ok::<(), subgroup_discovery::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct Table {
    name: String,
    columns: Vec<Arc<Column>>,
    nr_rows: usize,
}

impl Table {
    /// The table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows in every column.
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    /// Number of columns.
    pub fn nr_columns(&self) -> usize {
        self.columns.len()
    }

    /// All columns in index order.
    pub fn columns(&self) -> &[Arc<Column>] {
        &self.columns
    }

    /// The column at `index`.
    pub fn column(&self, index: usize) -> Option<&Arc<Column>> {
        self.columns.get(index)
    }

    /// Finds a column by name.
    pub fn column_by_name(&self, name: &str) -> Result<&Arc<Column>> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownColumn(name.to_owned()))
    }

    /// A bitset with every row of the table set.
    pub fn all_rows(&self) -> FixedBitSet {
        let mut all = FixedBitSet::with_capacity(self.nr_rows);
        all.insert_range(..);
        all
    }

    /// The rows satisfying a single condition.
    pub fn evaluate(&self, condition: &Condition) -> FixedBitSet {
        condition.column().evaluate(condition)
    }

    /// The rows satisfying every condition of a conjunction.
    pub fn evaluate_list(&self, conditions: &ConditionList) -> FixedBitSet {
        let mut members = self.all_rows();
        for condition in conditions.iter() {
            members = condition.column().evaluate_within(condition, &members);
        }
        members
    }

    /// Returns a table identical to this one except that the listed columns have their rows
    /// reordered by `order`, all with the same permutation.
    pub fn with_permuted_columns(&self, columns: &[usize], order: &[usize]) -> Table {
        let mut permuted = self.clone();
        for &index in columns {
            if let Some(column) = permuted.columns.get_mut(index) {
                *column = Arc::new(column.permuted(order));
            }
        }
        permuted
    }
}

/// Incrementally assembles a [`Table`], checking that every column has the same length.
#[derive(Debug)]
pub struct TableBuilder {
    name: String,
    columns: Vec<Arc<Column>>,
    nr_rows: Option<usize>,
}

impl TableBuilder {
    /// Starts an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        TableBuilder {
            name: name.into(),
            columns: Vec::new(),
            nr_rows: None,
        }
    }

    fn push(mut self, name: String, data: ColumnData) -> Result<Self> {
        let column = Column {
            name,
            index: self.columns.len(),
            data,
        };
        let found = column.nr_rows();
        match self.nr_rows {
            Some(expected) if expected != found => {
                return Err(Error::ColumnLength {
                    name: column.name,
                    expected,
                    found,
                })
            }
            _ => self.nr_rows = Some(found),
        }
        self.columns.push(Arc::new(column));
        Ok(self)
    }

    /// Adds a nominal column.
    pub fn nominal<I, S>(self, name: impl Into<String>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rodeo: Rodeo = Rodeo::new();
        let values: Vec<Spur> = values
            .into_iter()
            .map(|v| rodeo.get_or_intern(v.as_ref()))
            .collect();
        let interner = rodeo.into_reader();
        let mut domain: Vec<Spur> = interner.iter().map(|(key, _)| key).collect();
        domain.sort_unstable_by(|a, b| interner.resolve(a).cmp(interner.resolve(b)));
        let data = ColumnData::Nominal(NominalValues {
            values,
            interner: Arc::new(interner),
            domain,
        });
        self.push(name.into(), data)
    }

    /// Adds a numeric column.
    pub fn numeric(self, name: impl Into<String>, values: Vec<f32>) -> Result<Self> {
        self.push(name.into(), ColumnData::Numeric(values))
    }

    /// Adds a binary column.
    pub fn binary<I: IntoIterator<Item = bool>>(self, name: impl Into<String>, values: I) -> Result<Self> {
        let values: Vec<bool> = values.into_iter().collect();
        let mut bits = FixedBitSet::with_capacity(values.len());
        for (row, value) in values.into_iter().enumerate() {
            bits.set(row, value);
        }
        self.push(name.into(), ColumnData::Binary(bits))
    }

    /// Adds a column of text, choosing the narrowest type that can hold every value.
    ///
    /// Values that are all `0`/`1` or `true`/`false` make a binary column; values that all parse
    /// as numbers make a numeric column; anything else is nominal.
    pub fn inferred<S: AsRef<str>>(self, name: impl Into<String>, values: &[S]) -> Result<Self> {
        let name = name.into();
        let binary: Option<Vec<bool>> = values
            .iter()
            .map(|v| match v.as_ref().trim() {
                "0" | "false" | "FALSE" | "False" => Some(false),
                "1" | "true" | "TRUE" | "True" => Some(true),
                _ => None,
            })
            .collect();
        if let Some(bits) = binary {
            if !values.is_empty() {
                return self.binary(name, bits);
            }
        }

        let numeric: Option<Vec<f32>> = values
            .iter()
            .map(|v| v.as_ref().trim().parse::<f32>().ok())
            .collect();
        match numeric {
            Some(numbers) => self.numeric(name, numbers),
            None => self.nominal(name, values.iter().map(|v| v.as_ref().trim())),
        }
    }

    /// Finishes the table.
    pub fn build(self) -> Table {
        Table {
            name: self.name,
            columns: self.columns,
            nr_rows: self.nr_rows.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        TableBuilder::new("t")
            .numeric("x", vec![3.0, 1.0, 2.0, 2.0, 5.0, 4.0])
            .unwrap()
            .inferred("flag", &["1", "0", "1", "1", "0", "0"])
            .unwrap()
            .inferred("colour", &["red", "blue", "red", "green", "blue", "red"])
            .unwrap()
            .build()
    }

    #[test]
    fn infers_types() {
        let t = table();
        assert_eq!(t.column(0).unwrap().column_type(), ColumnType::Numeric);
        assert_eq!(t.column(1).unwrap().column_type(), ColumnType::Binary);
        assert_eq!(t.column(2).unwrap().column_type(), ColumnType::Nominal);
        let colour = t.column(2).unwrap();
        let names: Vec<&str> = colour.nominal_domain().iter().map(|&v| colour.resolve(v)).collect();
        assert_eq!(names, ["blue", "green", "red"]);
    }

    #[test]
    fn rejects_ragged_columns() {
        let err = TableBuilder::new("t")
            .numeric("a", vec![1.0, 2.0])
            .unwrap()
            .numeric("b", vec![1.0])
            .err()
            .unwrap();
        assert!(matches!(err, Error::ColumnLength { expected: 2, found: 1, .. }));
    }

    #[test]
    fn numeric_queries_respect_members() {
        let t = table();
        let x = t.column(0).unwrap();
        let mut members = FixedBitSet::with_capacity(6);
        members.insert_range(1..4);
        assert_eq!(x.unique_numeric_domain(&members), vec![1.0, 2.0]);
        let stats = x.numeric_statistics(&members, true);
        assert_eq!(stats.coverage, 3);
        assert!((stats.mean() - 5.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.median, 2.0);
        assert_eq!(x.split_points(&t.all_rows(), 2), vec![2.0, 4.0]);
        assert_eq!(x.min(), 1.0);
        assert_eq!(x.max(), 5.0);
    }

    #[test]
    fn permutation_moves_values() {
        let t = table();
        let p = t.with_permuted_columns(&[1], &[5, 4, 3, 2, 1, 0]);
        let flag = p.column(1).unwrap();
        let values: Vec<bool> = (0..6).map(|r| flag.binary_value(r).unwrap()).collect();
        assert_eq!(values, [false, false, true, true, false, true]);
        assert!(Arc::ptr_eq(p.column(0).unwrap(), t.column(0).unwrap()));
    }
}
