//! Positive/negative counts per value of a refining column, restricted to a subgroup.

use crate::table::Column;
use fixedbitset::FixedBitSet;
use lasso::Spur;
use std::cmp::Ordering;

/// Orders two count pairs by positive ratio, highest first, without dividing.
fn by_ratio_descending(p1: usize, n1: usize, p2: usize, n2: usize) -> Ordering {
    (p2 * n1).cmp(&(p1 * n2))
}

/// Counts for each value of a nominal column that occurs in a subgroup.
#[derive(Clone, Debug, Default)]
pub struct NominalCrossTable {
    values: Vec<Spur>,
    positives: Vec<usize>,
    negatives: Vec<usize>,
}

impl NominalCrossTable {
    /// Counts, for each value of `column` among `members`, how many of those rows are in
    /// `target`. Values absent from `members` are left out.
    pub fn new(column: &Column, members: &FixedBitSet, target: &FixedBitSet) -> Self {
        let domain = column.nominal_domain();
        let mut positives = vec![0; domain.len()];
        let mut negatives = vec![0; domain.len()];
        let mut position: Vec<(Spur, usize)> = domain.iter().copied().zip(0..).collect();
        position.sort_unstable();

        for row in members.ones() {
            let value = match column.nominal_value(row) {
                Some(v) => v,
                None => continue,
            };
            if let Ok(at) = position.binary_search_by_key(&value, |&(v, _)| v) {
                let i = position[at].1;
                if target.contains(row) {
                    positives[i] += 1;
                } else {
                    negatives[i] += 1;
                }
            }
        }

        let mut table = NominalCrossTable::default();
        for (i, &value) in domain.iter().enumerate() {
            if positives[i] + negatives[i] > 0 {
                table.values.push(value);
                table.positives.push(positives[i]);
                table.negatives.push(negatives[i]);
            }
        }
        table
    }

    /// Builds a table directly from counts.
    pub fn from_counts(values: Vec<Spur>, positives: Vec<usize>, negatives: Vec<usize>) -> Self {
        NominalCrossTable {
            values,
            positives,
            negatives,
        }
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the subgroup had no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value in slot `i`.
    pub fn value(&self, i: usize) -> Spur {
        self.values[i]
    }

    /// Positive rows with the value in slot `i`.
    pub fn positives(&self, i: usize) -> usize {
        self.positives[i]
    }

    /// Negative rows with the value in slot `i`.
    pub fn negatives(&self, i: usize) -> usize {
        self.negatives[i]
    }

    /// Total positive rows.
    pub fn total_positives(&self) -> usize {
        self.positives.iter().sum()
    }

    /// Total negative rows.
    pub fn total_negatives(&self) -> usize {
        self.negatives.iter().sum()
    }

    /// Slots ordered by positive ratio, highest first. Ties keep slot order.
    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            by_ratio_descending(self.positives[a], self.negatives[a], self.positives[b], self.negatives[b])
        });
        order
    }

    /// Returns `true` if slots `a` and `b` have the same positive ratio.
    pub fn same_ratio(&self, a: usize, b: usize) -> bool {
        self.positives[a] * self.negatives[b] == self.positives[b] * self.negatives[a]
    }
}

/// Counts per run of distinct values of a numeric column, in ascending value order.
///
/// Run `i` covers the values in `(upper[i - 1], upper[i]]`; the first run is unbounded below and
/// the last is treated as unbounded above.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BaseIntervalCrossTable {
    upper: Vec<f32>,
    positives: Vec<usize>,
    negatives: Vec<usize>,
}

impl BaseIntervalCrossTable {
    /// Counts, for each distinct value of `column` among `members`, how many of those rows are
    /// in `target`.
    pub fn new(column: &Column, members: &FixedBitSet, target: &FixedBitSet) -> Self {
        let upper = column.unique_numeric_domain(members);
        let mut positives = vec![0; upper.len()];
        let mut negatives = vec![0; upper.len()];
        for row in members.ones() {
            let value = match column.numeric_value(row) {
                Some(v) => v,
                None => continue,
            };
            if let Ok(i) = upper.binary_search_by(|u| u.total_cmp(&value)) {
                if target.contains(row) {
                    positives[i] += 1;
                } else {
                    negatives[i] += 1;
                }
            }
        }
        BaseIntervalCrossTable {
            upper,
            positives,
            negatives,
        }
    }

    /// Builds a table directly from per-value counts. `upper` must be ascending.
    pub fn from_counts(upper: Vec<f32>, positives: Vec<usize>, negatives: Vec<usize>) -> Self {
        BaseIntervalCrossTable {
            upper,
            positives,
            negatives,
        }
    }

    /// Merges neighbouring runs with the same positive ratio. No optimal interval ends between
    /// two such runs.
    pub fn aggregate_intervals(&mut self) {
        let mut write = 0;
        for read in 0..self.upper.len() {
            if write > 0 {
                let prev = write - 1;
                let same = self.positives[prev] * self.negatives[read]
                    == self.positives[read] * self.negatives[prev];
                if same {
                    self.positives[prev] += self.positives[read];
                    self.negatives[prev] += self.negatives[read];
                    self.upper[prev] = self.upper[read];
                    continue;
                }
            }
            self.upper[write] = self.upper[read];
            self.positives[write] = self.positives[read];
            self.negatives[write] = self.negatives[read];
            write += 1;
        }
        self.upper.truncate(write);
        self.positives.truncate(write);
        self.negatives.truncate(write);
    }

    /// Number of runs.
    pub fn nr_base_intervals(&self) -> usize {
        self.upper.len()
    }

    /// Number of places an interval can be cut: one fewer than the runs.
    pub fn nr_split_points(&self) -> usize {
        self.upper.len().saturating_sub(1)
    }

    /// Largest value of run `i`.
    pub fn split_point(&self, i: usize) -> f32 {
        self.upper[i]
    }

    /// Positive rows in run `i`.
    pub fn positives(&self, i: usize) -> usize {
        self.positives[i]
    }

    /// Negative rows in run `i`.
    pub fn negatives(&self, i: usize) -> usize {
        self.negatives[i]
    }

    /// Total positive rows.
    pub fn total_positives(&self) -> usize {
        self.positives.iter().sum()
    }

    /// Total negative rows.
    pub fn total_negatives(&self) -> usize {
        self.negatives.iter().sum()
    }
}
