use approx::assert_abs_diff_eq;
use fixedbitset::FixedBitSet;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use subgroup_discovery::{
    best_interval, best_value_set, BaseIntervalCrossTable, Column, Condition, ConditionValue,
    Measure, NominalCrossTable, Operator, QualityMeasure, Table, TableBuilder,
};

fn random_numeric(rng: &mut Pcg64) -> Option<(Table, FixedBitSet)> {
    let n = rng.random_range(2..=200);
    let distinct = rng.random_range(1..=40);
    let rate = rng.random_range(0.05..0.95);
    let xs: Vec<f32> = (0..n).map(|_| rng.random_range(0..distinct) as f32).collect();
    let ys: Vec<bool> = (0..n).map(|_| rng.random_bool(rate)).collect();
    let positives = ys.iter().filter(|&&y| y).count();
    if positives == 0 || positives == n {
        return None;
    }
    let table = TableBuilder::new("random")
        .numeric("x", xs)
        .ok()?
        .binary("y", ys)
        .ok()?
        .build();
    let target = table.column(1)?.binary_members()?.clone();
    Some((table, target))
}

/// Best quality over every interval `(lo, hi]` with end points at data values or infinite,
/// except the one covering everything.
fn brute_force(column: &Column, target: &FixedBitSet, quality: &QualityMeasure) -> Option<f64> {
    let n = column.nr_rows();
    let values: Vec<f32> = (0..n).filter_map(|row| column.numeric_value(row)).collect();
    let mut bounds = column.unique_numeric_domain(&{
        let mut all = FixedBitSet::with_capacity(n);
        all.insert_range(..);
        all
    });
    let lowers: Vec<f32> = std::iter::once(f32::NEG_INFINITY).chain(bounds.iter().copied()).collect();
    bounds.push(f32::INFINITY);

    let mut best: Option<f64> = None;
    for &lo in &lowers {
        for &hi in &bounds {
            if lo >= hi {
                continue;
            }
            let (mut p, mut cov) = (0, 0);
            for (row, &x) in values.iter().enumerate() {
                if lo < x && x <= hi {
                    cov += 1;
                    if target.contains(row) {
                        p += 1;
                    }
                }
            }
            if cov == 0 || cov == n {
                continue;
            }
            let q = quality.calculate(p, cov);
            if best.map_or(true, |b| q > b) {
                best = Some(q);
            }
        }
    }
    best
}

#[test]
fn interval_search_matches_brute_force() {
    for measure in [Measure::WRAcc, Measure::ChiSquared] {
        let mut rng = Pcg64::seed_from_u64(0x5eed);
        let mut checked = 0;
        while checked < 60 {
            let (table, target) = match random_numeric(&mut rng) {
                Some(data) => data,
                None => continue,
            };
            checked += 1;
            let n = table.nr_rows();
            let quality = QualityMeasure::binary(measure, n, target.count_ones(..)).unwrap();
            let column = table.column(0).unwrap();

            let mut crosstable = BaseIntervalCrossTable::new(column, &table.all_rows(), &target);
            crosstable.aggregate_intervals();
            let expected = brute_force(column, &target, &quality);

            match best_interval(&crosstable, &quality) {
                Some((interval, q)) => {
                    let expected = expected.expect("brute force found no interval");
                    assert_abs_diff_eq!(q, expected, epsilon = 1e-9);

                    // The reported quality belongs to the reported interval.
                    let condition =
                        Condition::new(column.clone(), Operator::Between, ConditionValue::Interval(interval));
                    let members = column.evaluate(&condition);
                    let cov = members.count_ones(..);
                    let p = members.intersection(&target).count();
                    assert_abs_diff_eq!(quality.calculate(p, cov), q, epsilon = 1e-9);
                }
                None => {
                    // A single run: every cut has the population's ratio.
                    if let Some(expected) = expected {
                        assert!(expected.abs() <= 1e-9, "{}: missed interval of quality {}", measure, expected);
                    }
                }
            }
        }
    }
}

fn value_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("v{:02}", i)).collect()
}

/// Rows holding value `i` of a nominal column, `counts[i].0` positive and `counts[i].1` negative.
fn nominal_table(counts: &[(usize, usize)]) -> (Table, FixedBitSet) {
    let names = value_names(counts.len());
    let mut values = Vec::new();
    let mut labels = Vec::new();
    for (name, &(p, n)) in names.iter().zip(counts) {
        for i in 0..p + n {
            values.push(name.as_str());
            labels.push(i < p);
        }
    }
    let table = TableBuilder::new("nominal")
        .nominal("c", values)
        .unwrap()
        .binary("y", labels)
        .unwrap()
        .build();
    let target = table.column(1).unwrap().binary_members().unwrap().clone();
    (table, target)
}

fn random_counts(rng: &mut Pcg64) -> Vec<(usize, usize)> {
    loop {
        let m = rng.random_range(2..=12);
        let counts: Vec<(usize, usize)> = (0..m)
            .map(|_| loop {
                let c = (rng.random_range(0..20), rng.random_range(0..20));
                if c.0 + c.1 > 0 {
                    break c;
                }
            })
            .collect();
        let distinct = (0..m).all(|a| {
            (a + 1..m).all(|b| counts[a].0 * counts[b].1 != counts[b].0 * counts[a].1)
        });
        let positives: usize = counts.iter().map(|c| c.0).sum();
        let total: usize = counts.iter().map(|c| c.0 + c.1).sum();
        if distinct && positives > 0 && positives < total {
            return counts;
        }
    }
}

#[test]
fn wracc_value_set_is_the_ratio_rule() {
    let mut rng = Pcg64::seed_from_u64(42);
    for _ in 0..50 {
        let counts = random_counts(&mut rng);
        let (table, target) = nominal_table(&counts);
        let n = table.nr_rows();
        let total_p = target.count_ones(..);
        let quality = QualityMeasure::binary(Measure::WRAcc, n, total_p).unwrap();
        let column = table.column(0).unwrap();
        let crosstable = NominalCrossTable::new(column, &table.all_rows(), &target);

        let names = value_names(counts.len());
        let expected: Vec<&str> = names
            .iter()
            .zip(&counts)
            .filter(|(_, &(p, neg))| p * n >= total_p * (p + neg))
            .map(|(name, _)| name.as_str())
            .collect();

        let set = best_value_set(&crosstable, &quality).unwrap();
        assert_eq!(set.names(column), expected);
    }
}

#[test]
fn value_set_beats_every_ratio_prefix_and_suffix() {
    let mut rng = Pcg64::seed_from_u64(7);
    for measure in [Measure::ChiSquared, Measure::Jaccard, Measure::InformationGain] {
        for _ in 0..50 {
            let counts = random_counts(&mut rng);
            let (table, target) = nominal_table(&counts);
            let n = table.nr_rows();
            let quality = QualityMeasure::binary(measure, n, target.count_ones(..)).unwrap();
            let column = table.column(0).unwrap();
            let crosstable = NominalCrossTable::new(column, &table.all_rows(), &target);

            let set = best_value_set(&crosstable, &quality).unwrap();
            let (mut p, mut cov) = (0, 0);
            for i in 0..crosstable.len() {
                if set.contains(crosstable.value(i)) {
                    p += crosstable.positives(i);
                    cov += crosstable.positives(i) + crosstable.negatives(i);
                }
            }
            let chosen = quality.calculate(p, cov);

            let order = crosstable.sorted_indices();
            let score = |slots: &[usize]| {
                let p: usize = slots.iter().map(|&i| crosstable.positives(i)).sum();
                let cov: usize = slots
                    .iter()
                    .map(|&i| crosstable.positives(i) + crosstable.negatives(i))
                    .sum();
                quality.calculate(p, cov)
            };
            for cut in 1..order.len() {
                assert!(chosen >= score(&order[..cut]) - 1e-9, "{} prefix {}", measure, cut);
                assert!(chosen >= score(&order[cut..]) - 1e-9, "{} suffix {}", measure, cut);
            }
        }
    }
}
