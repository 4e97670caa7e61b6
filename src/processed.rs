use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Best score recorded for every fingerprint the search has processed.
///
/// Entries are only ever raised, never removed.
#[derive(Debug, Clone)]
pub struct ProcessedIndex<F, S> {
    scores: FxHashMap<F, S>,
    lookups: usize,
    dominated: usize,
}

impl<F, S> Default for ProcessedIndex<F, S> {
    fn default() -> Self {
        Self {
            scores: FxHashMap::default(),
            lookups: 0,
            dominated: 0,
        }
    }
}

impl<F, S> ProcessedIndex<F, S>
where
    F: Eq + Hash,
    S: Ord + Copy,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// True when an equal or better score was already recorded for `fingerprint`.
    pub fn dominates(&mut self, fingerprint: &F, score: S) -> bool {
        self.lookups += 1;
        let dominated = self.scores.get(fingerprint).is_some_and(|&best| best >= score);
        if dominated {
            self.dominated += 1;
        }
        dominated
    }

    /// Raise the recorded score to `score` if it is higher. Returns whether
    /// the index changed.
    pub fn record(&mut self, fingerprint: F, score: S) -> bool {
        match self.scores.get_mut(&fingerprint) {
            Some(best) if *best >= score => false,
            Some(best) => {
                *best = score;
                true
            }
            None => {
                self.scores.insert(fingerprint, score);
                true
            }
        }
    }

    pub fn best_for(&self, fingerprint: &F) -> Option<S> {
        self.scores.get(fingerprint).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// (lookups, dominated lookups)
    pub fn get_stats(&self) -> (usize, usize) {
        (self.lookups, self.dominated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unseen_is_not_dominated() {
        let mut index: ProcessedIndex<&str, i32> = ProcessedIndex::new();
        assert!(!index.dominates(&"a", 0));
        assert!(index.is_empty());
    }

    #[test]
    fn test_equal_score_is_dominated() {
        let mut index = ProcessedIndex::new();
        index.record("a", 5);
        assert!(index.dominates(&"a", 5));
        assert!(index.dominates(&"a", 3));
        assert!(!index.dominates(&"a", 6));
        assert_eq!(index.get_stats(), (3, 2));
    }

    #[test]
    fn test_record_keeps_maximum() {
        let mut index = ProcessedIndex::new();
        assert!(index.record("a", 5));
        assert!(!index.record("a", 3));
        assert!(!index.record("a", 5));
        assert_eq!(index.best_for(&"a"), Some(5));
        assert!(index.record("a", 8));
        assert_eq!(index.best_for(&"a"), Some(8));
        assert_eq!(index.len(), 1);
    }
}
