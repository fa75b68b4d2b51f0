//! The bounded collection of best subgroups found so far.

use crate::subgroup::{Population, Subgroup};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::mem::take;
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Ranked(Subgroup);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.rank_cmp(&other.0)
    }
}

/// At most `max_size` subgroups, ordered best first.
///
/// Adding to a full set evicts the worst member, which may be the one just added. A subgroup
/// equal to a member in quality, coverage and description is not added twice.
///
/// ```
/// use std::sync::Arc;
/// use subgroup_discovery::{Population, Subgroup, SubgroupSet};
///
/// let population = Arc::new(Population::new(10));
/// let mut set = SubgroupSet::new(1, population.clone());
/// assert!(set.add(Subgroup::root(population.clone())));
/// assert!(!set.add(Subgroup::root(population)));
/// assert_eq!(set.len(), 1);
/// ```
#[derive(Clone, Debug)]
pub struct SubgroupSet {
    members: BTreeSet<Ranked>,
    max_size: usize,
    population: Arc<Population>,
}

impl SubgroupSet {
    /// An empty set holding at most `max_size` subgroups.
    pub fn new(max_size: usize, population: Arc<Population>) -> Self {
        SubgroupSet {
            members: BTreeSet::new(),
            max_size,
            population,
        }
    }

    /// Inserts a subgroup, returning whether it is a member afterwards.
    pub fn add(&mut self, subgroup: Subgroup) -> bool {
        let ranked = Ranked(subgroup);
        if self.members.len() >= self.max_size {
            match self.members.last() {
                Some(worst) if ranked < *worst => {}
                _ => return false,
            }
        }
        if !self.members.insert(ranked) {
            return false;
        }
        while self.members.len() > self.max_size {
            self.members.pop_last();
        }
        true
    }

    /// Number of subgroups held.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Returns `true` if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// The bound on [`len`](Self::len).
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// The population these subgroups were drawn from.
    pub fn population(&self) -> &Arc<Population> {
        &self.population
    }

    /// Subgroups from best to worst.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Subgroup> + ExactSizeIterator {
        self.members.iter().map(|r| &r.0)
    }

    /// The highest-ranked subgroup.
    pub fn best(&self) -> Option<&Subgroup> {
        self.members.first().map(|r| &r.0)
    }

    /// The lowest-ranked subgroup.
    pub fn worst(&self) -> Option<&Subgroup> {
        self.members.last().map(|r| &r.0)
    }

    /// Numbers the subgroups 1..=n in rank order.
    pub fn set_ids(&mut self) {
        self.members = take(&mut self.members)
            .into_iter()
            .enumerate()
            .map(|(i, Ranked(mut sg))| {
                sg.set_id(i + 1);
                Ranked(sg)
            })
            .collect();
    }

    /// Qualities from best to worst.
    pub fn qualities(&self) -> Vec<f64> {
        self.iter().map(Subgroup::quality).collect()
    }

    /// Consumes the set, returning subgroups best first.
    pub fn into_vec(self) -> Vec<Subgroup> {
        self.members.into_iter().map(|r| r.0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Operator};
    use crate::table::TableBuilder;

    #[test]
    fn bound_keeps_the_best() {
        let table = TableBuilder::new("t")
            .numeric("x", (0..20).map(|v| v as f32).collect())
            .unwrap()
            .build();
        let x = table.column(0).unwrap().clone();
        let population = Arc::new(Population::new(20));
        let mut set = SubgroupSet::new(5, population.clone());

        let mut discarded = Vec::new();
        for (i, q) in [0.3, 0.9, 0.1, 0.5, 0.7, 0.2, 0.8, 0.4, 0.6, 0.0].iter().enumerate() {
            let mut sg = Subgroup::root(population.clone());
            sg.add_condition(Condition::parse(x.clone(), Operator::LessThanOrEqual, &i.to_string()).unwrap());
            sg.set_quality(*q);
            let before = set.qualities();
            set.add(sg);
            assert!(set.len() <= 5);
            for q in before {
                if !set.qualities().contains(&q) {
                    discarded.push(q);
                }
            }
        }

        assert_eq!(set.qualities(), vec![0.9, 0.8, 0.7, 0.6, 0.5]);
        for q in discarded {
            assert!(set.qualities().iter().all(|&kept| kept >= q));
        }
    }

    #[test]
    fn ties_break_on_coverage_and_ids_follow_rank() {
        let table = TableBuilder::new("t")
            .numeric("x", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .build();
        let x = table.column(0).unwrap().clone();
        let population = Arc::new(Population::new(4));
        let mut set = SubgroupSet::new(10, population.clone());
        for threshold in ["1", "3", "2"] {
            let mut sg = Subgroup::root(population.clone());
            sg.add_condition(Condition::parse(x.clone(), Operator::LessThanOrEqual, threshold).unwrap());
            sg.set_quality(1.0);
            set.add(sg);
        }
        set.set_ids();
        let coverages: Vec<(usize, usize)> = set.iter().map(|s| (s.id(), s.coverage())).collect();
        assert_eq!(coverages, [(1, 3), (2, 2), (3, 1)]);
    }
}
