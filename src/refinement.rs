//! One-step specializations of a subgroup.

use crate::condition::{Condition, ConditionValue, Operator};
use crate::params::SearchParameters;
use crate::subgroup::Subgroup;
use crate::table::{Column, Table};
use sorted_iter::assume::AssumeSortedByItemExt;
use sorted_iter::SortedIterator;
use std::sync::Arc;

/// A column and operator to add to a subgroup; the value is chosen later.
#[derive(Clone, Debug)]
pub struct Refinement<'s> {
    subgroup: &'s Subgroup,
    column: Arc<Column>,
    operator: Operator,
}

impl<'s> Refinement<'s> {
    /// The subgroup being refined.
    pub fn subgroup(&self) -> &'s Subgroup {
        self.subgroup
    }

    /// The column the new condition tests.
    pub fn column(&self) -> &Arc<Column> {
        &self.column
    }

    /// The new condition's operator.
    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// The new condition with the given value.
    pub fn condition(&self, value: ConditionValue) -> Condition {
        Condition::new(self.column.clone(), self.operator, value)
    }

    /// A copy of the subgroup narrowed by the new condition with the given value.
    pub fn refined_subgroup(&self, value: ConditionValue) -> Subgroup {
        let mut child = self.subgroup.clone();
        child.add_condition(self.condition(value));
        child
    }
}

/// Every refinement of a subgroup allowed by the search settings.
///
/// Target columns never appear, and neither do columns the subgroup already pins to a single
/// value with `=`.
#[derive(Clone, Debug)]
pub struct RefinementList<'s> {
    refinements: Vec<Refinement<'s>>,
}

impl<'s> RefinementList<'s> {
    /// Enumerates refinements of `subgroup`. `target_columns` must be sorted.
    pub fn new(
        subgroup: &'s Subgroup,
        table: &Table,
        params: &SearchParameters,
        target_columns: &[usize],
    ) -> Self {
        let excluded: Vec<usize> = target_columns
            .iter()
            .copied()
            .assume_sorted_by_item()
            .union(subgroup.conditions().fixed_columns().assume_sorted_by_item())
            .collect();

        let mut refinements = Vec::new();
        for index in (0..table.nr_columns())
            .assume_sorted_by_item()
            .difference(excluded.into_iter().assume_sorted_by_item())
        {
            let column = match table.column(index) {
                Some(column) => column,
                None => continue,
            };
            let operators = params.operators_for(column.column_type());
            let mut operator = operators.first().copied();
            while let Some(op) = operator {
                refinements.push(Refinement {
                    subgroup,
                    column: column.clone(),
                    operator: op,
                });
                operator = op.next_in(operators);
            }
        }
        RefinementList { refinements }
    }

    /// Number of refinements.
    pub fn len(&self) -> usize {
        self.refinements.len()
    }

    /// Returns `true` if nothing can be added.
    pub fn is_empty(&self) -> bool {
        self.refinements.is_empty()
    }

    /// The refinements, by column and then operator.
    pub fn iter(&self) -> impl Iterator<Item = &Refinement<'s>> {
        self.refinements.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::NominalOperators;
    use crate::subgroup::Population;
    use crate::table::TableBuilder;

    #[test]
    fn skips_targets_and_fixed_columns() {
        let table = TableBuilder::new("t")
            .nominal("a", ["x", "y", "x"])
            .unwrap()
            .numeric("b", vec![1.0, 2.0, 3.0])
            .unwrap()
            .binary("target", [true, false, true])
            .unwrap()
            .binary("c", [false, false, true])
            .unwrap()
            .build();
        let params = SearchParameters::default().with_nominal_operators(NominalOperators::EqualsAndDoesNotEqual);
        let mut root = Subgroup::root(Arc::new(Population::new(3)));

        let list = RefinementList::new(&root, &table, &params, &[2]);
        let found: Vec<(&str, Operator)> = list.iter().map(|r| (r.column().name(), r.operator())).collect();
        assert_eq!(
            found,
            [
                ("a", Operator::DoesNotEqual),
                ("a", Operator::Equals),
                ("b", Operator::LessThanOrEqual),
                ("b", Operator::GreaterThanOrEqual),
                ("c", Operator::Equals),
            ]
        );

        let a = table.column(0).unwrap().clone();
        root.add_condition(Condition::parse(a, Operator::Equals, "x").unwrap());
        let list = RefinementList::new(&root, &table, &params, &[2]);
        assert!(list.iter().all(|r| r.column().name() != "a"));
        assert_eq!(list.len(), 3);

        let b = list.iter().find(|r| r.column().name() == "b").unwrap();
        let child = b.refined_subgroup(ConditionValue::Numeric(1.0));
        assert_eq!(child.coverage(), 1);
        assert_eq!(child.depth(), 2);
        assert_eq!(root.coverage(), 2);
    }
}
