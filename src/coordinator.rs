//! Best-first branch-and-bound driver.
//!
//! Every popped candidate ends in exactly one of three states: pruned
//! (dominated by an earlier candidate with the same fingerprint), expanded
//! and processed, or terminal and processed.

use crate::candidate::Candidate;
use crate::config::SearchConfig;
use crate::frontier::Frontier;
use crate::order::Comparator;
use crate::processed::ProcessedIndex;
use crate::progress::ProgressReporter;
use crate::SearchError;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The frontier was empty; the search is over.
    Exhausted,
    Pruned,
    Terminal { improved: bool },
    Expanded { children: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BestUpdate {
    Improved,
    Tied,
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub pops: u64,
    pub pruned: u64,
    pub expanded: u64,
    pub terminals: u64,
    pub children_appended: u64,
    pub children_screened: u64,
}

/// Terminal candidates sharing the highest score seen so far.
#[derive(Debug, Clone)]
pub struct BestSet<C: Candidate> {
    score: Option<C::Score>,
    members: Vec<C>,
}

impl<C: Candidate> Default for BestSet<C> {
    fn default() -> Self {
        Self {
            score: None,
            members: Vec::new(),
        }
    }
}

impl<C: Candidate> BestSet<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A strictly better score replaces the set, a tie joins it.
    pub fn offer(&mut self, candidate: C) -> BestUpdate {
        let score = candidate.score();
        match self.score {
            Some(best) if score < best => BestUpdate::Ignored,
            Some(best) if score == best => {
                self.members.push(candidate);
                BestUpdate::Tied
            }
            _ => {
                self.score = Some(score);
                self.members.clear();
                self.members.push(candidate);
                BestUpdate::Improved
            }
        }
    }

    pub fn score(&self) -> Option<C::Score> {
        self.score
    }

    pub fn members(&self) -> &[C] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn into_members(self) -> Vec<C> {
        self.members
    }
}

pub struct SearchCoordinator<C: Candidate> {
    frontier: Frontier<C>,
    processed: ProcessedIndex<C::Fingerprint, C::Score>,
    best: BestSet<C>,
    screen_terminal_children: bool,
    stats: SearchStats,
    progress: ProgressReporter,
}

impl<C: Candidate> SearchCoordinator<C> {
    pub fn new(config: &SearchConfig, frontier: Frontier<C>) -> Self {
        Self {
            frontier,
            processed: ProcessedIndex::new(),
            best: BestSet::new(),
            screen_terminal_children: config.screen_terminal_children,
            stats: SearchStats::default(),
            progress: ProgressReporter::new(config.report_interval),
        }
    }

    pub fn in_memory(config: &SearchConfig, cmp: Comparator<C>) -> Result<Self, SearchError> {
        Ok(Self::new(config, Frontier::in_memory(config, cmp)?))
    }

    pub fn on_disk(config: &SearchConfig, cmp: Comparator<C>) -> Result<Self, SearchError> {
        Ok(Self::new(config, Frontier::on_disk(config, cmp)?))
    }

    /// Add starting candidates. Returns how many reached the frontier.
    pub fn seed<I>(&mut self, candidates: I) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = C>,
    {
        self.submit(candidates)
    }

    /// Pop one candidate and carry it through to its final state.
    pub fn step(&mut self) -> Result<StepOutcome, SearchError> {
        let Some(candidate) = self.frontier.pop()? else {
            return Ok(StepOutcome::Exhausted);
        };
        self.note_pop();

        if self.processed.dominates(&candidate.fingerprint(), candidate.score()) {
            self.stats.pruned += 1;
            return Ok(StepOutcome::Pruned);
        }

        if candidate.is_terminal() {
            let update = self.mark_processed(candidate);
            return Ok(StepOutcome::Terminal {
                improved: update == BestUpdate::Improved,
            });
        }

        let children = self.submit(candidate.expand())?;
        self.mark_processed(candidate);
        Ok(StepOutcome::Expanded { children })
    }

    /// Step until the frontier is empty and return the best set.
    pub fn run(&mut self) -> Result<&[C], SearchError> {
        while self.step()? != StepOutcome::Exhausted {}
        self.log_final();
        Ok(self.best.members())
    }

    /// Pop until a candidate survives the dominance check.
    pub fn pop_unprocessed(&mut self) -> Result<Option<C>, SearchError> {
        while let Some(candidate) = self.frontier.pop()? {
            self.note_pop();
            if self.processed.dominates(&candidate.fingerprint(), candidate.score()) {
                self.stats.pruned += 1;
                continue;
            }
            return Ok(Some(candidate));
        }
        Ok(None)
    }

    /// Append candidates to the frontier, dropping terminal ones that are
    /// already dominated when screening is enabled.
    pub fn submit<I>(&mut self, candidates: I) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = C>,
    {
        let mut appended = 0;
        for candidate in candidates {
            if self.screen_terminal_children
                && candidate.is_terminal()
                && self.processed.dominates(&candidate.fingerprint(), candidate.score())
            {
                self.stats.children_screened += 1;
                continue;
            }
            self.frontier.append(candidate)?;
            appended += 1;
        }
        self.stats.children_appended += appended as u64;
        Ok(appended)
    }

    /// Record a popped candidate as processed. Terminal candidates are
    /// offered to the best set as well.
    pub fn mark_processed(&mut self, candidate: C) -> BestUpdate {
        let fingerprint = candidate.fingerprint();
        let score = candidate.score();
        let update = if candidate.is_terminal() {
            self.stats.terminals += 1;
            let update = self.best.offer(candidate);
            if update == BestUpdate::Improved {
                info!(score = ?score, "current best");
            }
            update
        } else {
            self.stats.expanded += 1;
            BestUpdate::Ignored
        };
        self.processed.record(fingerprint, score);
        update
    }

    /// Like [`mark_processed`](Self::mark_processed), but skips candidates
    /// that another worker has dominated since they were popped.
    pub fn finish(&mut self, candidate: C) -> Option<BestUpdate> {
        if self.processed.dominates(&candidate.fingerprint(), candidate.score()) {
            self.stats.pruned += 1;
            return None;
        }
        Some(self.mark_processed(candidate))
    }

    pub fn best(&self) -> &BestSet<C> {
        &self.best
    }

    pub fn best_score(&self) -> Option<C::Score> {
        self.best.score()
    }

    pub fn into_best(self) -> BestSet<C> {
        self.best
    }

    pub fn processed(&self) -> &ProcessedIndex<C::Fingerprint, C::Score> {
        &self.processed
    }

    pub fn frontier(&self) -> &Frontier<C> {
        &self.frontier
    }

    pub fn frontier_len(&self) -> usize {
        self.frontier.len()
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    pub fn log_final(&self) {
        info!(
            best_score = ?self.best.score(),
            best_count = self.best.len(),
            pops = self.stats.pops,
            pruned = self.stats.pruned,
            processed = self.processed.len(),
            elapsed_ms = self.progress.elapsed().as_millis() as u64,
            "search finished"
        );
        for member in self.best.members() {
            debug!(candidate = ?member, "final best");
        }
    }

    fn note_pop(&mut self) {
        self.stats.pops += 1;
        self.progress.tick(self.frontier.len(), self.processed.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincode::{Decode, Encode};

    /// Minimal candidate: explicit children, fingerprint and priority.
    #[derive(Debug, Clone, PartialEq, Encode, Decode)]
    struct Toy {
        key: u32,
        priority: u32,
        score: i32,
        children: Vec<Toy>,
        terminal: bool,
    }

    impl Toy {
        fn leaf(key: u32, priority: u32, score: i32) -> Self {
            Toy { key, priority, score, children: Vec::new(), terminal: true }
        }

        fn node(key: u32, priority: u32, children: Vec<Toy>) -> Self {
            Toy { key, priority, score: 0, children, terminal: false }
        }
    }

    impl Candidate for Toy {
        type Fingerprint = u32;
        type Score = i32;

        fn fingerprint(&self) -> u32 {
            self.key
        }

        fn score(&self) -> i32 {
            self.score
        }

        fn is_terminal(&self) -> bool {
            self.terminal
        }

        fn expand(&self) -> Vec<Toy> {
            self.children.clone()
        }
    }

    fn coordinator() -> SearchCoordinator<Toy> {
        let config = SearchConfig::default_config().with_thresholds(4, 2);
        SearchCoordinator::in_memory(&config, Comparator::by_key(|t: &Toy| t.priority)).unwrap()
    }

    #[test]
    fn test_step_on_empty_frontier() {
        let mut search = coordinator();
        assert_eq!(search.step().unwrap(), StepOutcome::Exhausted);
        assert!(search.run().unwrap().is_empty());
        assert_eq!(search.best_score(), None);
    }

    #[test]
    fn test_higher_score_dominates_same_fingerprint() {
        let mut search = coordinator();
        search.seed([Toy::leaf(1, 10, 5), Toy::leaf(1, 5, 3)]).unwrap();

        assert_eq!(search.step().unwrap(), StepOutcome::Terminal { improved: true });
        assert_eq!(search.step().unwrap(), StepOutcome::Pruned);
        assert_eq!(search.processed().best_for(&1), Some(5));
        assert_eq!(search.best_score(), Some(5));
        assert_eq!(search.best().len(), 1);
    }

    #[test]
    fn test_lower_score_first_is_superseded() {
        let mut search = coordinator();
        search.seed([Toy::leaf(1, 10, 3), Toy::leaf(1, 5, 5)]).unwrap();
        search.run().unwrap();

        assert_eq!(search.processed().best_for(&1), Some(5));
        assert_eq!(search.best_score(), Some(5));
        assert_eq!(search.best().members()[0].score, 5);
        assert_eq!(search.stats().pruned, 0);
    }

    #[test]
    fn test_resubmitting_processed_candidate_is_noop() {
        let mut search = coordinator();
        search.seed([Toy::leaf(1, 1, 5)]).unwrap();
        search.run().unwrap();

        search.seed([Toy::leaf(1, 1, 5), Toy::leaf(1, 1, 4)]).unwrap();
        assert_eq!(search.stats().children_screened, 2);
        search.run().unwrap();
        assert_eq!(search.best().len(), 1);
        assert_eq!(search.processed().best_for(&1), Some(5));
    }

    #[test]
    fn test_ties_accumulate_and_improvement_replaces() {
        let mut search = coordinator();
        search
            .seed([Toy::leaf(1, 9, 2), Toy::leaf(2, 8, 2), Toy::leaf(3, 7, 1), Toy::leaf(4, 6, 4)])
            .unwrap();

        search.step().unwrap();
        search.step().unwrap();
        assert_eq!(search.best().len(), 2);
        assert_eq!(search.step().unwrap(), StepOutcome::Terminal { improved: false });
        assert_eq!(search.best().len(), 2);
        assert_eq!(search.step().unwrap(), StepOutcome::Terminal { improved: true });
        assert_eq!(search.best().len(), 1);
        assert_eq!(search.best_score(), Some(4));
        assert_eq!(search.processed().best_for(&3), Some(1));
    }

    #[test]
    fn test_expansion_reaches_every_leaf() {
        let tree = Toy::node(
            0,
            100,
            vec![
                Toy::node(1, 50, vec![Toy::leaf(10, 1, 3), Toy::leaf(11, 2, 7)]),
                Toy::node(2, 60, vec![Toy::leaf(12, 3, 7), Toy::leaf(13, 4, 1)]),
            ],
        );
        let mut search = coordinator();
        search.seed([tree]).unwrap();
        let best: Vec<u32> = search.run().unwrap().iter().map(|t| t.key).collect();

        assert_eq!(best.len(), 2);
        assert!(best.contains(&11) && best.contains(&12));
        let stats = search.stats();
        assert_eq!(stats.expanded, 3);
        assert_eq!(stats.terminals, 4);
        assert_eq!(search.frontier_len(), 0);
    }

    #[test]
    fn test_dominated_terminal_children_screened() {
        let mut search = coordinator();
        search.seed([Toy::leaf(5, 1, 9)]).unwrap();
        search.run().unwrap();

        search.seed([Toy::node(1, 1, vec![Toy::leaf(5, 1, 9), Toy::leaf(6, 1, 9)])]).unwrap();
        assert_eq!(search.step().unwrap(), StepOutcome::Expanded { children: 1 });
        assert_eq!(search.stats().children_screened, 1);
        search.run().unwrap();
        assert_eq!(search.best().len(), 2);
    }

    #[test]
    fn test_screening_disabled_prunes_on_pop() {
        let mut config = SearchConfig::default_config().with_thresholds(4, 2);
        config.screen_terminal_children = false;
        let mut search =
            SearchCoordinator::in_memory(&config, Comparator::by_key(|t: &Toy| t.priority)).unwrap();
        search.seed([Toy::leaf(5, 1, 9)]).unwrap();
        search.run().unwrap();

        search.seed([Toy::leaf(5, 1, 9)]).unwrap();
        assert_eq!(search.step().unwrap(), StepOutcome::Pruned);
        assert_eq!(search.stats().children_screened, 0);
    }

    #[test]
    fn test_pop_unprocessed_skips_dominated() {
        let mut config = SearchConfig::default_config().with_thresholds(4, 2);
        config.screen_terminal_children = false;
        let mut search =
            SearchCoordinator::in_memory(&config, Comparator::by_key(|t: &Toy| t.priority)).unwrap();
        search.seed([Toy::leaf(1, 1, 5)]).unwrap();
        search.run().unwrap();

        search.seed([Toy::leaf(1, 9, 5), Toy::leaf(2, 1, 1)]).unwrap();
        let next = search.pop_unprocessed().unwrap().unwrap();
        assert_eq!(next.key, 2);
        assert_eq!(search.stats().pruned, 1);
        assert!(search.pop_unprocessed().unwrap().is_none());
    }

    #[test]
    fn test_finish_skips_late_duplicates() {
        let mut search = coordinator();
        assert_eq!(search.finish(Toy::leaf(3, 1, 2)), Some(BestUpdate::Improved));
        assert_eq!(search.finish(Toy::leaf(3, 1, 2)), None);
        assert_eq!(search.finish(Toy::leaf(3, 1, 4)), Some(BestUpdate::Improved));
        assert_eq!(search.best().len(), 1);
        assert_eq!(search.stats().pruned, 1);
    }
}
