//! The search driver.
//!
//! A search pops candidates from a [`CandidateQueue`], enumerates their refinements, picks
//! values for each refinement according to the column type and the numeric strategy, and passes
//! every refined subgroup through two gates. The first, on coverage alone, decides whether the
//! subgroup is scored and queued for further refinement at all; the second, on quality and
//! maximum coverage, decides whether it is collected in the result.

use crate::condition::{ConditionValue, Operator};
use crate::crosstable::{BaseIntervalCrossTable, NominalCrossTable};
use crate::error::{Error, Result};
use crate::params::{NominalOperators, NumericStrategy, SearchParameters};
use crate::postprocess::PostProcessor;
use crate::quality::{QualityMeasure, TargetKind};
use crate::queue::{Candidate, CandidateQueue};
use crate::refinement::{Refinement, RefinementList};
use crate::split::{best_interval, best_value_set};
use crate::subgroup::{Population, Subgroup};
use crate::subgroup_set::SubgroupSet;
use crate::table::{ColumnType, Table};
use crate::target::TargetContext;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_pcg::Pcg64;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Receives progress reports from a running search.
///
/// Methods may be called from several worker threads at once. Both have empty default bodies.
pub trait SearchObserver: Send + Sync + fmt::Debug {
    /// A refined subgroup passed the coverage gate and was scored. `accepted` says whether it
    /// entered the result set.
    fn candidate_evaluated(&self, _subgroup: &Subgroup, _accepted: bool) {}

    /// The search stopped.
    fn search_finished(&self, _summary: &MiningSummary) {}
}

/// Reports through `tracing`: every scored candidate at debug level and the summary at info
/// level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl SearchObserver for LogObserver {
    fn candidate_evaluated(&self, subgroup: &Subgroup, accepted: bool) {
        debug!(
            coverage = subgroup.coverage(),
            quality = subgroup.quality(),
            accepted,
            "{}",
            subgroup.conditions()
        );
    }

    fn search_finished(&self, summary: &MiningSummary) {
        info!(
            candidates = summary.candidates,
            subgroups = summary.subgroups,
            rank_deficient = summary.rank_deficient,
            timed_out = summary.timed_out,
            elapsed = ?summary.elapsed,
            "search finished"
        );
    }
}

/// Counters describing a finished search.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MiningSummary {
    /// Refined subgroups generated, scored or not.
    pub candidates: usize,
    /// Size of the result set.
    pub subgroups: usize,
    /// Candidates whose regression or correlation was undefined.
    pub rank_deficient: usize,
    /// Whether the time limit cut the search short.
    pub timed_out: bool,
    /// Wall-clock time since the search began.
    pub elapsed: Duration,
}

/// A configured search over one table and target.
///
/// ```
/// use std::time::Instant;
/// use subgroup_discovery::{SearchParameters, SubgroupDiscovery, TableBuilder, TargetContext};
///
/// let table = TableBuilder::new("t")
///     .numeric("age", vec![20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0])?
///     .binary("sick", [false, false, false, false, true, true, true, true])?
///     .build();
/// let target = TargetContext::single_nominal(&table, "sick", "1")?;
/// let mut search = SubgroupDiscovery::new(SearchParameters::default(), &table, target)?;
/// search.mine(Instant::now());
///
/// let best = search.result().best().unwrap();
/// assert_eq!(best.conditions().to_string(), "age >= 40");
/// assert_eq!(best.coverage(), 4);
/// # Ok::<(), subgroup_discovery::Error>(())
/// ```
#[derive(Debug)]
pub struct SubgroupDiscovery<'a> {
    params: SearchParameters,
    table: &'a Table,
    target: TargetContext,
    quality: QualityMeasure,
    population: Arc<Population>,
    target_columns: Vec<usize>,
    observer: Arc<dyn SearchObserver>,
    seed: u64,
    result: SubgroupSet,
    summary: MiningSummary,
}

impl<'a> SubgroupDiscovery<'a> {
    /// Checks the settings against the target and binds the quality measure.
    pub fn new(params: SearchParameters, table: &'a Table, target: TargetContext) -> Result<Self> {
        params.validate()?;
        let quality = target.quality_measure(&params, table.nr_rows())?;
        if target.kind() != TargetKind::SingleNominal {
            if params.nominal_operators == NominalOperators::ElementOf {
                return Err(Error::invalid("value sets need a single nominal target"));
            }
            if params.numeric_strategy == NumericStrategy::Intervals {
                return Err(Error::invalid("intervals need a single nominal target"));
            }
        }
        let population = Arc::new(target.population(table.nr_rows()));
        Ok(SubgroupDiscovery {
            result: SubgroupSet::new(params.maximum_subgroups, population.clone()),
            target_columns: target.target_columns(),
            params,
            table,
            target,
            quality,
            population,
            observer: Arc::new(LogObserver),
            seed: 0,
            summary: MiningSummary::default(),
        })
    }

    /// Replaces the default [`LogObserver`].
    pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Seeds the resampling done by multi-label post-processing. The seed is 0 unless set.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Runs the search on the calling thread. The time limit counts from `begin`.
    pub fn mine(&mut self, begin: Instant) -> MiningSummary {
        let search = Search::new(self, begin);
        while let Some(candidate) = search.queue.remove_first() {
            if search.past_deadline() {
                break;
            }
            search.refine(candidate.subgroup());
        }
        let outcome = search.into_outcome(begin);
        self.finish(outcome)
    }

    /// Runs the search on `nr_threads` worker threads, or one per available core if
    /// `nr_threads` is 0.
    ///
    /// The result does not depend on the number of threads, unless the time limit cuts the
    /// search short.
    pub fn mine_threaded(&mut self, begin: Instant, nr_threads: usize) -> MiningSummary {
        let nr_threads = match nr_threads {
            0 => thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        let search = Search::new(self, begin);
        thread::scope(|scope| {
            for _ in 0..nr_threads {
                scope.spawn(|| search.work());
            }
        });
        let outcome = search.into_outcome(begin);
        self.finish(outcome)
    }

    fn finish(&mut self, (mut result, mut summary): (SubgroupSet, MiningSummary)) -> MiningSummary {
        if self.params.post_processing_do_auto_run && !result.is_empty() {
            result = self.post_process(result);
        }
        result.set_ids();
        summary.subgroups = result.len();
        self.observer.search_finished(&summary);
        self.result = result;
        self.summary = summary;
        summary
    }

    fn post_process(&self, result: SubgroupSet) -> SubgroupSet {
        let mut rng = Pcg64::seed_from_u64(self.seed);
        match PostProcessor::new(&self.target, &self.params, self.table.nr_rows(), &mut rng) {
            Ok(Some(processor)) => processor.run(result, &self.params, &mut rng),
            Ok(None) => result,
            Err(error) => {
                warn!(%error, "post-processing skipped");
                result
            }
        }
    }

    /// The settings.
    pub fn params(&self) -> &SearchParameters {
        &self.params
    }

    /// The target.
    pub fn target(&self) -> &TargetContext {
        &self.target
    }

    /// The bound quality measure.
    pub fn quality_measure(&self) -> &QualityMeasure {
        &self.quality
    }

    /// Subgroups found by the last search, post-processed if configured, numbered in rank
    /// order.
    pub fn result(&self) -> &SubgroupSet {
        &self.result
    }

    /// Consumes the search, returning its result.
    pub fn into_result(self) -> SubgroupSet {
        self.result
    }

    /// Counters of the last search.
    pub fn summary(&self) -> &MiningSummary {
        &self.summary
    }

    /// Refined subgroups generated by the last search.
    pub fn candidate_count(&self) -> usize {
        self.summary.candidates
    }

    /// Whether the last search hit the time limit.
    pub fn timed_out(&self) -> bool {
        self.summary.timed_out
    }

    /// Candidates of the last search that could not be scored.
    pub fn rank_deficient_count(&self) -> usize {
        self.summary.rank_deficient
    }
}

/// State shared by the workers of one run.
struct Search<'d, 'a> {
    discovery: &'d SubgroupDiscovery<'a>,
    maximum_coverage: usize,
    deadline: Option<Instant>,
    queue: CandidateQueue,
    result: Mutex<SubgroupSet>,
    candidates: AtomicUsize,
    rank_deficient: AtomicUsize,
    timed_out: AtomicBool,
}

impl<'d, 'a> Search<'d, 'a> {
    fn new(discovery: &'d SubgroupDiscovery<'a>, begin: Instant) -> Self {
        let params = &discovery.params;
        let deadline = if params.maximum_time > 0.0 {
            Duration::try_from_secs_f64(params.maximum_time * 60.0)
                .ok()
                .and_then(|limit| begin.checked_add(limit))
        } else {
            None
        };
        let root = Subgroup::root(discovery.population.clone());
        Search {
            discovery,
            maximum_coverage: params.maximum_coverage(discovery.table.nr_rows()),
            deadline,
            queue: CandidateQueue::new(
                params.search_strategy,
                params.search_strategy_width,
                Candidate::new(root),
            ),
            result: Mutex::new(SubgroupSet::new(
                params.maximum_subgroups,
                discovery.population.clone(),
            )),
            candidates: AtomicUsize::new(0),
            rank_deficient: AtomicUsize::new(0),
            timed_out: AtomicBool::new(false),
        }
    }

    fn params(&self) -> &SearchParameters {
        &self.discovery.params
    }

    /// Checks the time limit, warning the first time it is found exceeded.
    fn past_deadline(&self) -> bool {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                if !self.timed_out.swap(true, Ordering::Relaxed) {
                    warn!(
                        minutes = self.params().maximum_time,
                        "time limit reached; returning the subgroups found so far"
                    );
                }
                true
            }
            _ => false,
        }
    }

    /// One worker of a threaded run.
    fn work(&self) {
        while let Some(lease) = self.queue.take(self.deadline) {
            if self.past_deadline() {
                return;
            }
            self.refine(lease.subgroup());
        }
    }

    fn refine(&self, subgroup: &Subgroup) {
        if subgroup.depth() >= self.params().search_depth {
            return;
        }
        let discovery = self.discovery;
        let refinements = RefinementList::new(
            subgroup,
            discovery.table,
            &discovery.params,
            &discovery.target_columns,
        );
        for refinement in refinements.iter() {
            if self.past_deadline() {
                return;
            }
            self.evaluate_refinement(refinement);
        }
    }

    fn evaluate_refinement(&self, refinement: &Refinement<'_>) {
        let column = refinement.column();
        let parent = refinement.subgroup();
        match (column.column_type(), refinement.operator()) {
            (ColumnType::Numeric, Operator::Equals) => {
                for value in column.unique_numeric_domain(parent.members()) {
                    let child = refinement.refined_subgroup(ConditionValue::Numeric(value));
                    self.check_and_log(child, parent.coverage());
                }
            }
            (ColumnType::Numeric, _) => self.numeric_refinement(refinement),
            (ColumnType::Nominal, Operator::ElementOf) => {
                let positives = match self.discovery.target.binary_target() {
                    Some(positives) => positives,
                    None => return,
                };
                let table = NominalCrossTable::new(column, parent.members(), positives);
                if let Some(set) = best_value_set(&table, &self.discovery.quality) {
                    let child = refinement.refined_subgroup(ConditionValue::ValueSet(set));
                    self.check_and_log(child, parent.coverage());
                }
            }
            (ColumnType::Nominal, _) => {
                for &value in column.nominal_domain() {
                    let child = refinement.refined_subgroup(ConditionValue::Nominal(value));
                    self.check_and_log(child, parent.coverage());
                }
            }
            (ColumnType::Binary, _) => {
                for value in [false, true] {
                    let child = refinement.refined_subgroup(ConditionValue::Binary(value));
                    self.check_and_log(child, parent.coverage());
                }
            }
        }
    }

    fn numeric_refinement(&self, refinement: &Refinement<'_>) {
        let column = refinement.column();
        let parent = refinement.subgroup();
        let parent_coverage = parent.coverage();
        match self.params().numeric_strategy {
            NumericStrategy::All => {
                for value in column.unique_numeric_domain(parent.members()) {
                    let child = refinement.refined_subgroup(ConditionValue::Numeric(value));
                    self.check_and_log(child, parent_coverage);
                }
            }
            NumericStrategy::Bins => {
                let mut previous = None;
                for value in column.split_points(parent.members(), self.params().nr_bins - 1) {
                    if previous == Some(value) {
                        continue;
                    }
                    previous = Some(value);
                    let child = refinement.refined_subgroup(ConditionValue::Numeric(value));
                    self.check_and_log(child, parent_coverage);
                }
            }
            NumericStrategy::Best => {
                let minimum = self.params().minimum_coverage;
                let mut best: Option<Subgroup> = None;
                for value in column.unique_numeric_domain(parent.members()) {
                    let mut child = refinement.refined_subgroup(ConditionValue::Numeric(value));
                    let coverage = child.coverage();
                    if coverage < minimum || coverage > self.maximum_coverage || coverage >= parent_coverage {
                        continue;
                    }
                    self.score(&mut child);
                    if child.quality() > best.as_ref().map_or(f64::NEG_INFINITY, Subgroup::quality) {
                        best = Some(child);
                    }
                }
                if let Some(best) = best {
                    self.log(best);
                }
                self.candidates.fetch_add(1, Ordering::Relaxed);
            }
            NumericStrategy::Intervals => {
                let positives = match self.discovery.target.binary_target() {
                    Some(positives) => positives,
                    None => return,
                };
                let mut table = BaseIntervalCrossTable::new(column, parent.members(), positives);
                table.aggregate_intervals();
                if let Some((interval, _)) = best_interval(&table, &self.discovery.quality) {
                    let child = refinement.refined_subgroup(ConditionValue::Interval(interval));
                    self.check_and_log(child, parent_coverage);
                }
            }
        }
    }

    /// Scores `child` if its coverage shrank but not below the minimum, then collects and
    /// queues it.
    fn check_and_log(&self, mut child: Subgroup, parent_coverage: usize) {
        let coverage = child.coverage();
        if coverage < parent_coverage && coverage >= self.params().minimum_coverage {
            self.score(&mut child);
            self.log(child);
        }
        self.candidates.fetch_add(1, Ordering::Relaxed);
    }

    fn score(&self, child: &mut Subgroup) {
        let evaluation = self
            .discovery
            .target
            .evaluate(&self.discovery.quality, child.members());
        if evaluation.rank_deficient {
            self.rank_deficient.fetch_add(1, Ordering::Relaxed);
        }
        evaluation.apply(child);
    }

    /// Collects a scored subgroup if it is good enough and small enough, and queues it either way.
    fn log(&self, child: Subgroup) {
        let accepted = child.quality() > self.params().quality_minimum
            && child.coverage() <= self.maximum_coverage
            && self.result.lock().add(child.clone());
        self.discovery.observer.candidate_evaluated(&child, accepted);
        self.queue.add(Candidate::new(child));
    }

    fn into_outcome(self, begin: Instant) -> (SubgroupSet, MiningSummary) {
        let result = self.result.into_inner();
        let summary = MiningSummary {
            candidates: self.candidates.into_inner(),
            subgroups: result.len(),
            rank_deficient: self.rank_deficient.into_inner(),
            timed_out: self.timed_out.into_inner(),
            elapsed: begin.elapsed(),
        };
        (result, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{NumericOperators, SearchStrategy};
    use crate::quality::Measure;
    use crate::table::TableBuilder;

    fn table() -> Table {
        TableBuilder::new("t")
            .numeric("x", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0])
            .unwrap()
            .nominal("colour", ["red", "red", "blue", "green", "blue", "green", "red", "blue"])
            .unwrap()
            .binary("y", [false, false, true, true, true, true, false, false])
            .unwrap()
            .build()
    }

    #[derive(Debug, Default)]
    struct Counting {
        evaluated: AtomicUsize,
        finished: AtomicUsize,
    }

    impl SearchObserver for Counting {
        fn candidate_evaluated(&self, _subgroup: &Subgroup, _accepted: bool) {
            self.evaluated.fetch_add(1, Ordering::Relaxed);
        }

        fn search_finished(&self, _summary: &MiningSummary) {
            self.finished.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn finds_interval_with_intervals_strategy() {
        let t = table();
        let target = TargetContext::single_nominal(&t, "y", "1").unwrap();
        let params = SearchParameters::default().with_numeric_strategy(NumericStrategy::Intervals);
        let mut search = SubgroupDiscovery::new(params, &t, target).unwrap();
        search.mine(Instant::now());
        let best = search.result().best().unwrap();
        assert_eq!(best.conditions().to_string(), "x in (2, 6]");
        assert_eq!(best.coverage(), 4);
        assert_eq!(best.id(), 1);
    }

    #[test]
    fn observer_sees_every_scored_candidate() {
        let t = table();
        let target = TargetContext::single_nominal(&t, "y", "1").unwrap();
        let observer = Arc::new(Counting::default());
        let params = SearchParameters::default()
            .with_numeric_strategy(NumericStrategy::All)
            .with_numeric_operators(NumericOperators::LessThanOrEqual)
            .with_search_strategy(SearchStrategy::BreadthFirst, 0);
        let mut search = SubgroupDiscovery::new(params, &t, target)
            .unwrap()
            .with_observer(observer.clone());
        let summary = search.mine(Instant::now());
        // x <= 2..=7 pass the coverage gate, as do all six colour conditions.
        assert_eq!(observer.evaluated.load(Ordering::Relaxed), 6 + 6);
        assert_eq!(observer.finished.load(Ordering::Relaxed), 1);
        assert_eq!(summary.candidates, 8 + 6);
        assert!(!summary.timed_out);
    }

    #[test]
    fn best_threshold_ignores_unscorable_children() {
        // `u` never varies, so every regression is rank deficient.
        let t = TableBuilder::new("flat")
            .numeric("d", vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
            .unwrap()
            .numeric("u", vec![1.0; 6])
            .unwrap()
            .numeric("v", vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0])
            .unwrap()
            .build();
        let target = TargetContext::double_regression(&t, "u", "v").unwrap();
        let observer = Arc::new(Counting::default());
        let params = SearchParameters::default()
            .with_quality_measure(Measure::LinearRegression)
            .with_minimum_coverage(1);
        let mut search = SubgroupDiscovery::new(params, &t, target)
            .unwrap()
            .with_observer(observer.clone());
        let summary = search.mine(Instant::now());
        assert!(summary.rank_deficient > 0);
        assert_eq!(observer.evaluated.load(Ordering::Relaxed), 0);
        assert!(search.result().is_empty());
    }

    #[test]
    fn value_sets_need_a_binary_target() {
        let t = table();
        let target = TargetContext::single_numeric(&t, "x").unwrap();
        let params = SearchParameters::default()
            .with_quality_measure(Measure::ZScore)
            .with_nominal_operators(NominalOperators::ElementOf);
        assert!(SubgroupDiscovery::new(params, &t, target).is_err());
    }

    #[test]
    fn measure_must_fit_target() {
        let t = table();
        let target = TargetContext::single_numeric(&t, "x").unwrap();
        assert!(SubgroupDiscovery::new(SearchParameters::default(), &t, target).is_err());
    }
}
