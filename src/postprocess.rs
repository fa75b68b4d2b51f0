//! Re-scoring of a finished multi-label result.
//!
//! A graph induced from one set of rows is a noisy estimate of the labels' dependency
//! structure. Post-processing replaces each subgroup's quality by its average over
//! `post_processing_count` graphs induced from bootstrap resamples of the subgroup, each compared
//! with `post_processing_count` graphs induced from resamples of the whole table.

use crate::dependency::{BinaryTargets, GraphInducer};
use crate::error::Result;
use crate::params::SearchParameters;
use crate::quality::QualityMeasure;
use crate::subgroup_set::SubgroupSet;
use crate::target::TargetContext;
use fixedbitset::FixedBitSet;
use rand::Rng;
use rand_pcg::Pcg64;
use tracing::{debug, info};

/// Draws `rows.len()` rows of `rows` with replacement and returns the distinct ones.
fn resample<R: Rng>(rows: &FixedBitSet, rng: &mut R) -> FixedBitSet {
    let ones: Vec<usize> = rows.ones().collect();
    if ones.is_empty() {
        return rows.clone();
    }
    let mut sample = FixedBitSet::with_capacity(rows.len());
    for _ in 0..ones.len() {
        sample.insert(ones[rng.random_range(0..ones.len())]);
    }
    sample
}

/// Averages qualities over resampled graphs.
#[derive(Debug)]
pub struct PostProcessor<'t> {
    targets: &'t BinaryTargets,
    inducer: &'t dyn GraphInducer,
    // One measure per graph induced from a resample of all rows.
    measures: Vec<QualityMeasure>,
    nr_draws: usize,
}

impl<'t> PostProcessor<'t> {
    /// Induces the population graphs. Returns `None` unless `target` is a multi-label target.
    pub fn new(
        target: &'t TargetContext,
        params: &SearchParameters,
        nr_rows: usize,
        rng: &mut Pcg64,
    ) -> Result<Option<Self>> {
        let (targets, inducer) = match target.graph_targets() {
            Some(graph_targets) => graph_targets,
            None => return Ok(None),
        };
        let mut all = FixedBitSet::with_capacity(nr_rows);
        all.insert_range(..);
        let nr_draws = params.post_processing_count;
        let measures = (0..nr_draws)
            .map(|_| {
                let base = inducer.induce(targets, &resample(&all, rng));
                QualityMeasure::graph(params.quality_measure, nr_rows, base, params.alpha, params.beta)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(PostProcessor {
            targets,
            inducer,
            measures,
            nr_draws,
        }))
    }

    /// The mean quality of the rows in `members` over every pair of a subgroup graph and a
    /// population graph.
    pub fn quality(&self, members: &FixedBitSet, rng: &mut Pcg64) -> f64 {
        let coverage = members.count_ones(..);
        let mut total = 0.0;
        for _ in 0..self.nr_draws {
            let graph = self.inducer.induce(self.targets, &resample(members, rng));
            total += self
                .measures
                .iter()
                .filter_map(|measure| measure.calculate_graph(coverage, &graph))
                .map(|score| score.quality)
                .sum::<f64>();
        }
        total / (self.nr_draws * self.nr_draws) as f64
    }

    /// Re-scores `result`, keeping the best `maximum_post_processing_subgroups` under the new
    /// qualities.
    pub fn run(&self, result: SubgroupSet, params: &SearchParameters, rng: &mut Pcg64) -> SubgroupSet {
        info!(
            subgroups = result.len(),
            draws = self.nr_draws,
            "post-processing multi-label result"
        );
        let population = result.population().clone();
        let mut rescored = SubgroupSet::new(params.maximum_post_processing_subgroups, population);
        for mut subgroup in result.into_vec() {
            let quality = self.quality(subgroup.members(), rng);
            debug!(before = subgroup.quality(), after = quality, "{}", subgroup.conditions());
            subgroup.set_quality(quality);
            rescored.add(subgroup);
        }
        rescored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn resample_stays_inside_the_rows() {
        let mut rng = Pcg64::seed_from_u64(3);
        let mut rows = FixedBitSet::with_capacity(100);
        rows.insert_range(10..40);
        for _ in 0..20 {
            let sample = resample(&rows, &mut rng);
            assert!(sample.is_subset(&rows));
            assert!(sample.count_ones(..) > 0);
        }
        let empty = FixedBitSet::with_capacity(5);
        assert_eq!(resample(&empty, &mut rng), empty);
    }
}
