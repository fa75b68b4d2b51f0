//! The search frontier: subgroups waiting to be refined.
//!
//! Candidates live in two levels. The current level is popped in the order the strategy asks
//! for; breadth-first and beam search add children to the next level, which becomes current when
//! the current one runs dry. Depth-first and best-first search only ever use the current level.
//!
//! When several workers share a queue, "the current level is empty" does not mean the search is
//! over: a worker still refining a candidate may be about to add children. [`CandidateQueue::take`]
//! counts the candidates handed out and only switches levels, or reports exhaustion, when none
//! are outstanding. The check and the switch happen under the same lock.

use crate::params::SearchStrategy;
use crate::subgroup::Subgroup;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering;
use std::collections::{BTreeSet, VecDeque};
use std::mem::swap;
use std::time::Instant;

/// A subgroup waiting in the queue, with the key the queue orders it by.
#[derive(Clone, Debug)]
pub struct Candidate {
    subgroup: Subgroup,
    priority: f64,
}

impl Candidate {
    /// A candidate prioritized by the subgroup's quality.
    pub fn new(subgroup: Subgroup) -> Self {
        let priority = subgroup.quality();
        Candidate { subgroup, priority }
    }

    /// A candidate with an explicit priority.
    pub fn with_priority(subgroup: Subgroup, priority: f64) -> Self {
        Candidate { subgroup, priority }
    }

    /// The subgroup to refine.
    pub fn subgroup(&self) -> &Subgroup {
        &self.subgroup
    }

    /// The ordering key.
    pub fn priority(&self) -> f64 {
        self.priority
    }

    /// Unwraps the subgroup.
    pub fn into_subgroup(self) -> Subgroup {
        self.subgroup
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    /// Highest priority first, then the subgroup ranking.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .total_cmp(&self.priority)
            .then_with(|| self.subgroup.rank_cmp(&other.subgroup))
    }
}

#[derive(Debug)]
enum Level {
    Fifo(VecDeque<Candidate>),
    Lifo(Vec<Candidate>),
    Ranked(BTreeSet<Candidate>),
}

impl Level {
    fn new(strategy: SearchStrategy) -> Self {
        match strategy {
            SearchStrategy::BreadthFirst => Level::Fifo(VecDeque::new()),
            SearchStrategy::DepthFirst => Level::Lifo(Vec::new()),
            SearchStrategy::BestFirst | SearchStrategy::Beam => Level::Ranked(BTreeSet::new()),
        }
    }

    fn push(&mut self, candidate: Candidate) {
        match self {
            Level::Fifo(q) => q.push_back(candidate),
            Level::Lifo(s) => s.push(candidate),
            Level::Ranked(set) => {
                set.insert(candidate);
            }
        }
    }

    fn pop(&mut self) -> Option<Candidate> {
        match self {
            Level::Fifo(q) => q.pop_front(),
            Level::Lifo(s) => s.pop(),
            Level::Ranked(set) => set.pop_first(),
        }
    }

    /// Drops the lowest-ranked candidates beyond `width`.
    fn truncate(&mut self, width: usize) {
        if let Level::Ranked(set) = self {
            while set.len() > width {
                set.pop_last();
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Level::Fifo(q) => q.len(),
            Level::Lifo(s) => s.len(),
            Level::Ranked(set) => set.len(),
        }
    }
}

#[derive(Debug)]
struct State {
    current: Level,
    next: Level,
    // Candidates handed out by `take` and not yet finished.
    active: usize,
    exhausted: bool,
}

impl State {
    /// Makes the next level current, if the current one is empty and the next is not.
    fn advance(&mut self) -> bool {
        if self.current.len() == 0 && self.next.len() > 0 {
            swap(&mut self.current, &mut self.next);
            true
        } else {
            false
        }
    }
}

/// The frontier of a search, safe to share between worker threads.
///
/// ```
/// use std::sync::Arc;
/// use subgroup_discovery::{Candidate, CandidateQueue, Population, SearchStrategy, Subgroup};
///
/// let population = Arc::new(Population::new(4));
/// let queue = CandidateQueue::new(SearchStrategy::BreadthFirst, 0, Candidate::new(Subgroup::root(population.clone())));
/// let root = queue.remove_first().unwrap();
/// queue.add(Candidate::new(root.into_subgroup()));
/// assert_eq!(queue.current_level_size(), 0);
/// assert_eq!(queue.size(), 1);
/// assert!(queue.remove_first().is_some());
/// assert!(queue.remove_first().is_none());
/// ```
#[derive(Debug)]
pub struct CandidateQueue {
    strategy: SearchStrategy,
    width: usize,
    state: Mutex<State>,
    changed: Condvar,
}

impl CandidateQueue {
    /// A queue holding only `root`. `width` bounds each level of a beam search and is ignored
    /// by the other strategies.
    pub fn new(strategy: SearchStrategy, width: usize, root: Candidate) -> Self {
        let mut current = Level::new(strategy);
        current.push(root);
        CandidateQueue {
            strategy,
            width,
            state: Mutex::new(State {
                current,
                next: Level::new(strategy),
                active: 0,
                exhausted: false,
            }),
            changed: Condvar::new(),
        }
    }

    /// The strategy this queue follows.
    pub fn strategy(&self) -> SearchStrategy {
        self.strategy
    }

    /// Adds a candidate to the level the strategy puts new candidates in.
    pub fn add(&self, candidate: Candidate) {
        let mut state = self.state.lock();
        match self.strategy {
            SearchStrategy::BreadthFirst => state.next.push(candidate),
            SearchStrategy::DepthFirst | SearchStrategy::BestFirst => state.current.push(candidate),
            SearchStrategy::Beam => {
                state.next.push(candidate);
                state.next.truncate(self.width);
            }
        }
        drop(state);
        self.changed.notify_all();
    }

    /// Pops the next candidate, moving to the next level first if the current one is empty.
    ///
    /// This is the single-threaded interface: it assumes nobody else is about to add to the
    /// queue.
    pub fn remove_first(&self) -> Option<Candidate> {
        let mut state = self.state.lock();
        state.advance();
        state.current.pop()
    }

    /// Candidates in both levels.
    pub fn size(&self) -> usize {
        let state = self.state.lock();
        state.current.len() + state.next.len()
    }

    /// Candidates in the current level.
    pub fn current_level_size(&self) -> usize {
        self.state.lock().current.len()
    }

    /// Waits for a candidate to refine.
    ///
    /// Returns `None` once every candidate has been refined and nobody holds a [`Lease`], or
    /// when `deadline` passes first. The candidate counts as outstanding until the lease is
    /// dropped, so drop it only after all of its children were added.
    pub fn take(&self, deadline: Option<Instant>) -> Option<Lease<'_>> {
        let mut state = self.state.lock();
        loop {
            if state.exhausted {
                return None;
            }
            if let Some(candidate) = state.current.pop() {
                state.active += 1;
                return Some(Lease {
                    queue: self,
                    candidate,
                });
            }
            if state.active == 0 {
                if state.advance() {
                    continue;
                }
                state.exhausted = true;
                self.changed.notify_all();
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return None;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        state.active -= 1;
        drop(state);
        self.changed.notify_all();
    }
}

/// A candidate handed out by [`CandidateQueue::take`]. Dropping it tells the queue the
/// candidate is done, whether refinement finished, stopped early or panicked.
#[derive(Debug)]
pub struct Lease<'q> {
    queue: &'q CandidateQueue,
    candidate: Candidate,
}

impl Lease<'_> {
    /// The leased candidate.
    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    /// The leased candidate's subgroup.
    pub fn subgroup(&self) -> &Subgroup {
        self.candidate.subgroup()
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.queue.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subgroup::Population;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn candidate(population: &Arc<Population>, priority: f64) -> Candidate {
        Candidate::with_priority(Subgroup::root(population.clone()), priority)
    }

    fn drain(queue: &CandidateQueue) -> Vec<f64> {
        std::iter::from_fn(|| queue.remove_first()).map(|c| c.priority()).collect()
    }

    #[test]
    fn disciplines() {
        let population = Arc::new(Population::new(1));
        let orders = [
            (SearchStrategy::BreadthFirst, vec![0.0, 1.0, 3.0, 2.0]),
            (SearchStrategy::DepthFirst, vec![0.0, 2.0, 3.0, 1.0]),
            (SearchStrategy::BestFirst, vec![0.0, 3.0, 2.0, 1.0]),
            (SearchStrategy::Beam, vec![0.0, 3.0, 2.0]),
        ];
        for (strategy, expected) in orders {
            let queue = CandidateQueue::new(strategy, 2, candidate(&population, 0.0));
            let root = queue.remove_first().unwrap();
            assert_eq!(root.priority(), 0.0);
            for p in [1.0, 3.0, 2.0] {
                queue.add(candidate(&population, p));
            }
            let mut order = vec![root.priority()];
            order.extend(drain(&queue));
            assert_eq!(order, expected, "{}", strategy);
        }
    }

    #[test]
    fn levels_switch_only_when_idle() {
        let population = Arc::new(Population::new(1));
        let queue = CandidateQueue::new(SearchStrategy::BreadthFirst, 0, candidate(&population, 0.0));
        let lease = queue.take(None).unwrap();
        queue.add(candidate(&population, 1.0));
        assert_eq!(queue.current_level_size(), 0);
        // The root is still leased, so the next level must not be handed out yet.
        let early = queue.take(Some(Instant::now() + Duration::from_millis(20)));
        assert!(early.is_none());
        drop(lease);
        let child = queue.take(None).unwrap();
        assert_eq!(child.candidate().priority(), 1.0);
        drop(child);
        assert!(queue.take(None).is_none());
    }

    #[test]
    fn workers_see_every_candidate() {
        let population = Arc::new(Population::new(1));
        let queue = CandidateQueue::new(SearchStrategy::BreadthFirst, 0, candidate(&population, 0.0));
        let seen = Mutex::new(Vec::new());
        thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    while let Some(lease) = queue.take(None) {
                        let p = lease.candidate().priority();
                        if p < 3.0 {
                            queue.add(candidate(&population, p + 1.0));
                            queue.add(candidate(&population, p + 1.0));
                        }
                        seen.lock().push(p);
                    }
                });
            }
        });
        let mut seen = seen.into_inner();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen.len(), 15);
        assert_eq!(seen.iter().filter(|&&p| p == 3.0).count(), 8);
    }
}
