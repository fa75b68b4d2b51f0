//! Dependency graphs between binary target columns, for multi-label targets.
//!
//! Learning the structure of a graphical model is outside this crate's concern; the search only
//! needs something that turns a set of rows into a graph, which is what [`GraphInducer`]
//! describes. [`ChiSquaredDependence`] is a simple default that links two labels when a
//! chi-squared test rejects their independence.

use crate::error::{Error, Result};
use crate::table::{ColumnType, Table};
use fixedbitset::FixedBitSet;
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::SortedIterator;
use statrs::distribution::{ChiSquared, ContinuousCDF};
use std::fmt;

/// An undirected graph over target labels `0..nr_nodes`.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct DependencyGraph {
    nr_nodes: usize,
    // Each edge is stored once as (low, high), and the list is kept sorted.
    edges: Vec<(usize, usize)>,
}

impl DependencyGraph {
    /// Creates a graph from a list of edges in any order and orientation.
    ///
    /// ```
    /// use subgroup_discovery::DependencyGraph;
    ///
    /// let a = DependencyGraph::new(3, &[(1, 0), (1, 2)]);
    /// let b = DependencyGraph::new(3, &[(0, 1), (0, 2)]);
    /// assert_eq!(a.edit_distance(&b), 2);
    /// assert_eq!(a.edit_distance(&a), 0);
    /// ```
    pub fn new(nr_nodes: usize, edges: &[(usize, usize)]) -> Self {
        let mut edges: Vec<(usize, usize)> = edges
            .iter()
            .filter(|(a, b)| a != b)
            .map(|&(a, b)| (a.min(b), a.max(b)))
            .collect();
        edges.sort_unstable();
        edges.dedup();
        DependencyGraph { nr_nodes, edges }
    }

    /// Number of labels.
    pub fn nr_nodes(&self) -> usize {
        self.nr_nodes
    }

    /// Edges as `(low, high)` pairs in sorted order.
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    /// Number of edge insertions and deletions that turn `self` into `other`.
    pub fn edit_distance(&self, other: &DependencyGraph) -> usize {
        let shared = self
            .edges
            .iter()
            .assume_sorted_by_item()
            .intersection(other.edges.iter().assume_sorted_by_item())
            .count();
        self.edges.len() + other.edges.len() - 2 * shared
    }
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (a, b)) in self.edges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}-{}", a, b)?;
        }
        write!(f, "}}")
    }
}

/// The binary label columns of a multi-label target.
#[derive(Clone, Debug)]
pub struct BinaryTargets {
    labels: Vec<FixedBitSet>,
    nr_rows: usize,
}

impl BinaryTargets {
    /// Collects the named binary columns of `table`.
    pub fn from_table(table: &Table, columns: &[String]) -> Result<Self> {
        let labels = columns
            .iter()
            .map(|name| {
                let column = table.column_by_name(name)?;
                column.binary_members().cloned().ok_or_else(|| Error::ColumnType {
                    name: name.clone(),
                    expected: ColumnType::Binary.name(),
                    found: column.column_type().name(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(BinaryTargets {
            labels,
            nr_rows: table.nr_rows(),
        })
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns `true` if there are no labels.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// The positive rows of label `i`.
    pub fn label(&self, i: usize) -> &FixedBitSet {
        &self.labels[i]
    }

    /// Number of rows.
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }
}

/// Derives a dependency graph between labels from the rows of a subgroup.
///
/// Implementations must be deterministic: the same rows always yield the same graph.
pub trait GraphInducer: Send + Sync + fmt::Debug {
    /// Builds the graph for the rows in `members`.
    fn induce(&self, targets: &BinaryTargets, members: &FixedBitSet) -> DependencyGraph;
}

/// Links two labels when a 2x2 chi-squared test on the selected rows rejects independence at
/// the configured significance level.
#[derive(Clone, Debug)]
pub struct ChiSquaredDependence {
    critical_value: f64,
}

impl ChiSquaredDependence {
    /// A test at the given significance level, such as 0.05.
    pub fn new(significance: f64) -> Self {
        let critical_value = ChiSquared::new(1.0)
            .map(|d| d.inverse_cdf(1.0 - significance))
            .unwrap_or(f64::INFINITY);
        ChiSquaredDependence { critical_value }
    }

    fn statistic(a: &FixedBitSet, b: &FixedBitSet, members: &FixedBitSet) -> f64 {
        let n = members.count_ones(..) as f64;
        let mut in_a = a.clone();
        in_a.intersect_with(members);
        let both = in_a.intersection(b).count() as f64;
        let only_a = in_a.count_ones(..) as f64 - both;
        let in_b = members.intersection(b).count() as f64;
        let only_b = in_b - both;
        let neither = n - both - only_a - only_b;

        let denominator = (both + only_a) * (only_b + neither) * (both + only_b) * (only_a + neither);
        if denominator == 0.0 {
            0.0
        } else {
            n * (both * neither - only_a * only_b).powi(2) / denominator
        }
    }
}

impl Default for ChiSquaredDependence {
    fn default() -> Self {
        ChiSquaredDependence::new(0.05)
    }
}

impl GraphInducer for ChiSquaredDependence {
    fn induce(&self, targets: &BinaryTargets, members: &FixedBitSet) -> DependencyGraph {
        let mut edges = Vec::new();
        for i in 0..targets.len() {
            for j in i + 1..targets.len() {
                let statistic = Self::statistic(targets.label(i), targets.label(j), members);
                if statistic > self.critical_value {
                    edges.push((i, j));
                }
            }
        }
        DependencyGraph::new(targets.len(), &edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableBuilder;

    #[test]
    fn links_dependent_labels_only() {
        let a: Vec<bool> = (0..200).map(|i| i % 2 == 0).collect();
        let b = a.clone();
        let c: Vec<bool> = (0..200).map(|i| (i / 2) % 2 == 0).collect();
        let table = TableBuilder::new("t")
            .binary("a", a)
            .unwrap()
            .binary("b", b)
            .unwrap()
            .binary("c", c)
            .unwrap()
            .build();
        let names = ["a", "b", "c"].map(String::from);
        let targets = BinaryTargets::from_table(&table, &names).unwrap();
        let graph = ChiSquaredDependence::default().induce(&targets, &table.all_rows());
        assert_eq!(graph.edges(), &[(0, 1)]);
    }

    #[test]
    fn non_binary_labels_are_rejected() {
        let table = TableBuilder::new("t").numeric("x", vec![1.0]).unwrap().build();
        assert!(BinaryTargets::from_table(&table, &["x".to_owned()]).is_err());
    }
}
