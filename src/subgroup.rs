//! Nodes of the search lattice.

use crate::condition::{Condition, ConditionList};
use crate::dependency::DependencyGraph;
use fixedbitset::FixedBitSet;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Facts about the whole dataset that subgroups are measured against.
///
/// Every subgroup of one search shares the same `Population`.
#[derive(Clone, Debug)]
pub struct Population {
    nr_rows: usize,
    binary_target: Option<FixedBitSet>,
    positives: usize,
}

impl Population {
    /// A population of `nr_rows` rows without a binary target.
    pub fn new(nr_rows: usize) -> Self {
        Population {
            nr_rows,
            binary_target: None,
            positives: 0,
        }
    }

    /// A population whose target marks the rows in `target` as positive.
    pub fn with_binary_target(target: FixedBitSet) -> Self {
        Population {
            nr_rows: target.len(),
            positives: target.count_ones(..),
            binary_target: Some(target),
        }
    }

    /// Total number of rows.
    pub fn nr_rows(&self) -> usize {
        self.nr_rows
    }

    /// Positive rows of a binary target.
    pub fn binary_target(&self) -> Option<&FixedBitSet> {
        self.binary_target.as_ref()
    }

    /// Number of positive rows; 0 without a binary target.
    pub fn positives(&self) -> usize {
        self.positives
    }
}

/// A set of rows described by a conjunction of conditions, with the statistics the search
/// computed for it.
///
/// Subgroups own their membership bitset; refinement clones a subgroup before narrowing it.
#[derive(Clone, Debug)]
pub struct Subgroup {
    conditions: ConditionList,
    members: FixedBitSet,
    coverage: usize,
    depth: usize,
    quality: f64,
    secondary: f64,
    tertiary: f64,
    graph: Option<DependencyGraph>,
    id: usize,
    population: Arc<Population>,
}

impl Subgroup {
    /// The subgroup with no conditions, covering every row.
    pub fn root(population: Arc<Population>) -> Self {
        let mut members = FixedBitSet::with_capacity(population.nr_rows());
        members.insert_range(..);
        Subgroup::from_members(ConditionList::new(), members, population)
    }

    /// A subgroup with the given description and rows. The caller is responsible for the two
    /// agreeing; randomization uses this to score arbitrary row sets.
    pub fn from_members(
        conditions: ConditionList,
        members: FixedBitSet,
        population: Arc<Population>,
    ) -> Self {
        Subgroup {
            depth: conditions.len(),
            coverage: members.count_ones(..),
            conditions,
            members,
            quality: 0.0,
            secondary: 0.0,
            tertiary: 0.0,
            graph: None,
            id: 0,
            population,
        }
    }

    /// Narrows this subgroup by one more condition.
    pub fn add_condition(&mut self, condition: Condition) {
        let kept = condition.column().evaluate_within(&condition, &self.members);
        self.members.intersect_with(&kept);
        self.coverage = self.members.count_ones(..);
        self.conditions.add(condition);
        self.depth += 1;
    }

    /// The conjunction describing this subgroup.
    pub fn conditions(&self) -> &ConditionList {
        &self.conditions
    }

    /// The rows in this subgroup.
    pub fn members(&self) -> &FixedBitSet {
        &self.members
    }

    /// Number of rows in this subgroup.
    pub fn coverage(&self) -> usize {
        self.coverage
    }

    /// Number of conditions.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The quality measure's score.
    pub fn quality(&self) -> f64 {
        self.quality
    }

    /// First auxiliary statistic: positive ratio, mean, slope, correlation or edit distance
    /// depending on the target.
    pub fn secondary_statistic(&self) -> f64 {
        self.secondary
    }

    /// Second auxiliary statistic: positive count, standard deviation, intercept, correlation
    /// distance or entropy depending on the target.
    pub fn tertiary_statistic(&self) -> f64 {
        self.tertiary
    }

    /// Dependency graph induced on this subgroup's rows, for multi-label targets.
    pub fn graph(&self) -> Option<&DependencyGraph> {
        self.graph.as_ref()
    }

    /// Position in the final result, starting at 1. Zero until ids are assigned.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The population this subgroup belongs to.
    pub fn population(&self) -> &Arc<Population> {
        &self.population
    }

    pub(crate) fn set_quality(&mut self, quality: f64) {
        self.quality = quality;
    }

    pub(crate) fn set_statistics(&mut self, secondary: f64, tertiary: f64) {
        self.secondary = secondary;
        self.tertiary = tertiary;
    }

    pub(crate) fn set_graph(&mut self, graph: Option<DependencyGraph>) {
        self.graph = graph;
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    /// Number of positive rows of the binary target inside the subgroup.
    pub fn true_positives(&self) -> usize {
        match self.population.binary_target() {
            Some(target) => self.members.intersection(target).count(),
            None => 0,
        }
    }

    /// Fraction of all positive rows that fall inside the subgroup, or 0 when there are none.
    pub fn true_positive_rate(&self) -> f64 {
        let positives = self.population.positives();
        if positives == 0 {
            return 0.0;
        }
        self.true_positives() as f64 / positives as f64
    }

    /// Fraction of all negative rows that fall inside the subgroup, or 0 when there are none.
    pub fn false_positive_rate(&self) -> f64 {
        let negatives = self.population.nr_rows() - self.population.positives();
        if negatives == 0 || self.population.binary_target().is_none() {
            return 0.0;
        }
        (self.coverage - self.true_positives()) as f64 / negatives as f64
    }

    /// The order of the result set: higher quality first, then larger coverage, then by
    /// description.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .quality
            .total_cmp(&self.quality)
            .then_with(|| other.coverage.cmp(&self.coverage))
            .then_with(|| self.conditions.cmp(&other.conditions))
    }
}

impl fmt::Display for Subgroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{:.6}\t{:.6}\t{:.6}\t{}",
            self.id, self.coverage, self.quality, self.secondary, self.tertiary, self.conditions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Operator;
    use crate::table::TableBuilder;

    #[test]
    fn refinement_only_removes_rows() {
        let table = TableBuilder::new("t")
            .numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0])
            .unwrap()
            .binary("y", [true, true, false, true, false])
            .unwrap()
            .build();
        let target = table.column(1).unwrap().binary_members().unwrap().clone();
        let population = Arc::new(Population::with_binary_target(target));

        let mut sg = Subgroup::root(population);
        assert_eq!(sg.coverage(), 5);
        let parent = sg.members().clone();

        let x = table.column(0).unwrap().clone();
        sg.add_condition(Condition::parse(x, Operator::LessThanOrEqual, "3").unwrap());
        assert_eq!(sg.coverage(), 3);
        assert_eq!(sg.depth(), 1);
        assert!(sg.members().is_subset(&parent));
        assert_eq!(sg.coverage(), sg.members().count_ones(..));
        assert_eq!(sg.true_positives(), 2);
        assert!((sg.true_positive_rate() - 2.0 / 3.0).abs() < 1e-12);
        assert!((sg.false_positive_rate() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn rates_without_target_are_zero() {
        let sg = Subgroup::root(Arc::new(Population::new(4)));
        assert_eq!(sg.true_positive_rate(), 0.0);
        assert_eq!(sg.false_positive_rate(), 0.0);
    }
}
