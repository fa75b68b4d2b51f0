//! Optimal single-condition splits for binary targets.
//!
//! [`best_interval`] finds the best two-sided interval on a numeric column without enumerating
//! all pairs of end points. Interval `(a, b]` has counts `C(b) - C(a)`, where `C(k)` are cumulative
//! `(negatives, positives)` counts, so the candidates for a left half `L` and a right half `R` of
//! the split points are the points of `R - L`. For a convex quality measure the best of those
//! points is a vertex of the Minkowski difference of the two halves' convex hulls, which has only
//! `|hull(L)| + |hull(R)|` vertices. Pairing neighbouring halves level by level covers every
//! pair of end points exactly once.

use crate::condition::{Interval, ValueSet};
use crate::crosstable::{BaseIntervalCrossTable, NominalCrossTable};
use crate::hull::ConvexHull;
use crate::quality::{Measure, QualityMeasure};
use tracing::trace;

/// The best interval of an aggregated base-interval table and its quality, or `None` if the
/// table offers no place to cut.
pub fn best_interval(table: &BaseIntervalCrossTable, quality: &QualityMeasure) -> Option<(Interval, f64)> {
    let runs = table.nr_base_intervals();
    if table.nr_split_points() == 0 {
        return None;
    }

    let mut best: Option<(Interval, f64)> = None;
    let mut consider = |interval: Interval, q: f64| {
        trace!(%interval, quality = q, "interval candidate");
        if best.map_or(true, |(_, b)| q > b) {
            best = Some((interval, q));
        }
    };

    // Intervals open to the left, in one pass.
    let (mut p, mut n) = (0, 0);
    for l in 0..table.nr_split_points() {
        p += table.positives(l);
        n += table.negatives(l);
        consider(
            Interval::new(f32::NEG_INFINITY, table.split_point(l)),
            quality.calculate(p, p + n),
        );
    }

    let (mut p, mut n) = (0i64, 0i64);
    let mut hulls: Vec<ConvexHull> = (0..runs)
        .map(|k| {
            p += table.positives(k) as i64;
            n += table.negatives(k) as i64;
            let label = if k + 1 < runs {
                table.split_point(k)
            } else {
                f32::INFINITY
            };
            ConvexHull::point(n, p, label)
        })
        .collect();

    while hulls.len() > 1 {
        let mut next = Vec::with_capacity((hulls.len() + 1) / 2);
        let mut level = hulls.into_iter();
        while let Some(left) = level.next() {
            match level.next() {
                Some(right) => {
                    for vertex in left.minkowski_difference(&right) {
                        let (negatives, positives) = (vertex.x as usize, vertex.y as usize);
                        consider(
                            Interval::new(vertex.lower, vertex.upper),
                            quality.calculate(positives, positives + negatives),
                        );
                    }
                    next.push(left.concatenate(&right));
                }
                None => next.push(left),
            }
        }
        hulls = next;
    }

    best
}

/// The best set of nominal values to refine with, or `None` if no proper subset was evaluated.
///
/// For WRAcc the optimum is closed-form: every value whose positive ratio is at least the
/// subgroup's. Other measures walk the values in ratio order and keep the best prefix, or suffix
/// for measures that also reward low ratios.
pub fn best_value_set(table: &NominalCrossTable, quality: &QualityMeasure) -> Option<ValueSet> {
    if table.is_empty() {
        return None;
    }
    let measure = quality.measure();

    if measure == Measure::WRAcc {
        let total_p = table.total_positives();
        let total = total_p + table.total_negatives();
        let set: ValueSet = (0..table.len())
            .filter(|&i| {
                let (p, n) = (table.positives(i), table.negatives(i));
                p * total >= total_p * (p + n)
            })
            .map(|i| table.value(i))
            .collect();
        return if set.is_empty() { None } else { Some(set) };
    }

    let order = table.sorted_indices();
    let size = order.len();
    let mut best = f64::NEG_INFINITY;

    // Best prefix of `order`, as its length.
    let mut prefix = 0;
    let (mut p, mut n) = (0, 0);
    for i in 0..size.saturating_sub(1) {
        p += table.positives(order[i]);
        n += table.negatives(order[i]);
        if i + 2 < size && table.same_ratio(order[i], order[i + 1]) {
            continue;
        }
        let q = quality.calculate(p, p + n);
        if q > best {
            best = q;
            prefix = i + 1;
        }
    }
    let mut chosen = &order[..prefix];

    if measure.is_symmetric() {
        if chosen.len() > size / 2 {
            chosen = &order[prefix..];
        }
    } else if !measure.low_is_negative() {
        let (mut p, mut n) = (0, 0);
        for i in (1..size).rev() {
            p += table.positives(order[i]);
            n += table.negatives(order[i]);
            if i > 1 && table.same_ratio(order[i], order[i - 1]) {
                continue;
            }
            let q = quality.calculate(p, p + n);
            if q > best {
                best = q;
                chosen = &order[i..];
            }
        }
    }

    if chosen.is_empty() {
        None
    } else {
        Some(chosen.iter().map(|&i| table.value(i)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_run_has_no_interval() {
        let table = BaseIntervalCrossTable::from_counts(vec![1.0], vec![3], vec![2]);
        let q = QualityMeasure::binary(Measure::WRAcc, 5, 3).unwrap();
        assert_eq!(best_interval(&table, &q), None);
    }

    #[test]
    fn finds_a_middle_interval() {
        // Positives concentrated in the runs ending at 3 and 4.
        let table = BaseIntervalCrossTable::from_counts(
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            vec![0, 1, 9, 8, 1, 0],
            vec![9, 8, 0, 1, 8, 9],
        );
        let q = QualityMeasure::binary(Measure::WRAcc, 54, 19).unwrap();
        let (interval, _) = best_interval(&table, &q).unwrap();
        assert_eq!(interval, Interval::new(2.0, 4.0));
    }
}
