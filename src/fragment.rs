use crate::backend::FragmentBackend;
use crate::order::{Comparator, Entry};
use crate::SearchError;
use bincode::{Decode, Encode};
use std::cmp::Ordering;
use tracing::{debug, error};

pub type FragmentId = u64;

/// A persisted ascending run. Only the maximum and the size stay in memory.
#[derive(Debug, Clone)]
pub struct Fragment<T> {
    id: FragmentId,
    maximum: Entry<T>,
    len: usize,
}

impl<T> Fragment<T> {
    pub fn id(&self) -> FragmentId {
        self.id
    }

    pub fn maximum(&self) -> &Entry<T> {
        &self.maximum
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Fragments sorted ascending by maximum. Fragment `i` owns every entry
/// greater than the maximum of fragment `i - 1` and no greater than its own.
///
/// The first storage error marks the store failed: that call returns the
/// error and every later `store` or `drain_max` refuses to run.
pub struct FragmentStore<T> {
    fragments: Vec<Fragment<T>>,
    backend: Box<dyn FragmentBackend>,
    cmp: Comparator<T>,
    max_threshold: usize,
    min_threshold: usize,
    next_id: FragmentId,
    item_count: usize,
    failure: Option<String>,
}

impl<T> FragmentStore<T>
where
    T: Encode + Decode<()> + Clone,
{
    pub fn new(
        backend: Box<dyn FragmentBackend>,
        cmp: Comparator<T>,
        max_threshold: usize,
        min_threshold: usize,
    ) -> Self {
        Self {
            fragments: Vec::new(),
            backend,
            cmp,
            max_threshold,
            min_threshold,
            next_id: 0,
            item_count: 0,
            failure: None,
        }
    }

    /// Add an ascending run of entries, merging each into the fragment that
    /// owns its range. Entries above every fragment become new fragments.
    pub fn store(&mut self, items: Vec<Entry<T>>) -> Result<(), SearchError> {
        self.check()?;
        let result = self.merge_in(items);
        self.note_failure(result)
    }

    fn merge_in(&mut self, items: Vec<Entry<T>>) -> Result<(), SearchError> {
        if items.is_empty() {
            return Ok(());
        }
        self.item_count += items.len();

        let mut distribution: Vec<Vec<Entry<T>>> = (0..self.fragments.len()).map(|_| Vec::new()).collect();
        let mut overflow = Vec::new();
        for entry in items {
            let owner = self
                .fragments
                .partition_point(|f| self.cmp.compare_entries(&f.maximum, &entry) == Ordering::Less);
            match distribution.get_mut(owner) {
                Some(bucket) => bucket.push(entry),
                None => overflow.push(entry),
            }
        }

        let existing = std::mem::take(&mut self.fragments);
        let mut rebuilt = Vec::with_capacity(existing.len() + 1);
        for (fragment, incoming) in existing.into_iter().zip(distribution) {
            if incoming.is_empty() {
                rebuilt.push(fragment);
                continue;
            }
            let loaded = self.load(fragment.id)?;
            let merged = crate::order::merge_sorted(loaded, incoming, &self.cmp);
            if merged.len() > self.max_threshold {
                debug!(
                    fragment = fragment.id,
                    size = merged.len(),
                    max_threshold = self.max_threshold,
                    "splitting over-full fragment"
                );
                self.backend.delete(fragment.id)?;
                self.save_chunks(merged, &mut rebuilt)?;
            } else {
                rebuilt.push(self.persist(fragment.id, merged)?);
            }
        }

        if !overflow.is_empty() {
            overflow.sort_by(|a, b| self.cmp.compare_entries(a, b));
            debug!(count = overflow.len(), "creating fragments above current maximum");
            self.save_chunks(overflow, &mut rebuilt)?;
        }

        self.fragments = rebuilt;
        Ok(())
    }

    /// Remove the fragment holding the greatest entries and return its
    /// whole ascending run. Empty when no fragments exist.
    pub fn drain_max(&mut self) -> Result<Vec<Entry<T>>, SearchError> {
        self.check()?;
        let Some(id) = self.fragments.last().map(|f| f.id) else {
            return Ok(Vec::new());
        };
        let loaded = self.load(id);
        let items = self.note_failure(loaded)?;
        let deleted = self.backend.delete(id);
        self.note_failure(deleted)?;
        self.fragments.pop();
        self.item_count -= items.len();
        debug!(fragment = id, size = items.len(), "drained top fragment");
        Ok(items)
    }

    /// Fails once any earlier storage operation has failed.
    pub fn check(&self) -> Result<(), SearchError> {
        match &self.failure {
            Some(cause) => Err(SearchError::Other(format!(
                "fragment store unusable after earlier failure: {}",
                cause
            ))),
            None => Ok(()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }

    fn note_failure<R>(&mut self, result: Result<R, SearchError>) -> Result<R, SearchError> {
        if let Err(e) = &result {
            if self.failure.is_none() {
                error!(error = %e, "fragment storage failed");
                self.failure = Some(e.to_string());
            }
        }
        result
    }

    pub fn peek_max(&self) -> Option<&Entry<T>> {
        self.fragments.last().map(|f| &f.maximum)
    }

    /// Read a fragment's contents without removing it.
    pub fn contents(&self, id: FragmentId) -> Result<Vec<Entry<T>>, SearchError> {
        self.load(id)
    }

    pub fn fragments(&self) -> &[Fragment<T>] {
        &self.fragments
    }

    pub fn fragment_sizes(&self) -> Vec<usize> {
        self.fragments.iter().map(|f| f.len).collect()
    }

    /// Number of fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Number of entries across all fragments.
    pub fn item_count(&self) -> usize {
        self.item_count
    }

    fn load(&self, id: FragmentId) -> Result<Vec<Entry<T>>, SearchError> {
        let bytes = self.backend.read(id)?;
        let (items, _): (Vec<Entry<T>>, usize) =
            bincode::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(items)
    }

    fn save_chunks(&mut self, mut items: Vec<Entry<T>>, into: &mut Vec<Fragment<T>>) -> Result<(), SearchError> {
        let chunk_size = self.min_threshold.max(1);
        while !items.is_empty() {
            let rest = items.split_off(items.len().min(chunk_size));
            let chunk = std::mem::replace(&mut items, rest);
            let id = self.next_id;
            self.next_id += 1;
            let fragment = self.persist(id, chunk)?;
            debug_assert!(into.last().is_none_or(|prev| {
                self.cmp.compare_entries(&prev.maximum, &fragment.maximum) == Ordering::Less
            }));
            into.push(fragment);
        }
        Ok(())
    }

    fn persist(&mut self, id: FragmentId, items: Vec<Entry<T>>) -> Result<Fragment<T>, SearchError> {
        let maximum = items
            .last()
            .cloned()
            .ok_or_else(|| SearchError::Other("refusing to persist an empty fragment".to_string()))?;
        let bytes = bincode::encode_to_vec(&items, bincode::config::standard())?;
        self.backend.write(id, &bytes)?;
        Ok(Fragment {
            id,
            maximum,
            len: items.len(),
        })
    }
}

impl<T> Drop for FragmentStore<T> {
    fn drop(&mut self) {
        for fragment in self.fragments.drain(..) {
            let _ = self.backend.delete(fragment.id);
        }
    }
}
