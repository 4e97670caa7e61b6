use crate::backend::{DiskBackend, FragmentBackend, MemoryBackend};
use crate::config::SearchConfig;
use crate::fragment::FragmentStore;
use crate::order::{insert_sorted, merge_sorted, Comparator, Entry};
use crate::SearchError;
use bincode::{Decode, Encode};
use std::cmp::Ordering;
use tracing::debug;

/// Priority multiset whose greatest items live in memory and whose surplus
/// lives in fragments.
///
/// `pop` always returns the greatest item appended and not yet popped,
/// whichever tier it currently sits in. After a fragment storage failure
/// every later `append`, `pop` or `peek` returns an error instead of
/// answering from what is left.
pub struct Frontier<T> {
    // Ascending; the last entry is the greatest item in memory.
    window: Vec<Entry<T>>,
    store: FragmentStore<T>,
    cmp: Comparator<T>,
    max_threshold: usize,
    min_threshold: usize,
    next_seq: u64,
    len: usize,
}

impl<T> Frontier<T>
where
    T: Encode + Decode<()> + Clone,
{
    pub fn new(
        config: &SearchConfig,
        cmp: Comparator<T>,
        backend: Box<dyn FragmentBackend>,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            window: Vec::with_capacity(config.max_threshold + 1),
            store: FragmentStore::new(backend, cmp.clone(), config.max_threshold, config.min_threshold),
            cmp,
            max_threshold: config.max_threshold,
            min_threshold: config.min_threshold,
            next_seq: 0,
            len: 0,
        })
    }

    pub fn in_memory(config: &SearchConfig, cmp: Comparator<T>) -> Result<Self, SearchError> {
        Self::new(config, cmp, Box::new(MemoryBackend::new()))
    }

    /// Fragments go to `config.state_dir`, or a temporary directory when unset.
    pub fn on_disk(config: &SearchConfig, cmp: Comparator<T>) -> Result<Self, SearchError> {
        let backend = match &config.state_dir {
            Some(dir) => DiskBackend::new(dir)?,
            None => DiskBackend::temporary()?,
        };
        Self::new(config, cmp, Box::new(backend))
    }

    pub fn append(&mut self, item: T) -> Result<(), SearchError> {
        self.store.check()?;
        let entry = Entry::new(self.next_seq, item);
        self.next_seq += 1;
        insert_sorted(&mut self.window, entry, &self.cmp);
        self.len += 1;

        if self.window.len() > self.max_threshold {
            self.save_surplus()?;
        }
        Ok(())
    }

    pub fn append_all<I>(&mut self, items: I) -> Result<(), SearchError>
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.append(item)?;
        }
        Ok(())
    }

    /// Remove and return the greatest item, or `None` when empty.
    pub fn pop(&mut self) -> Result<Option<T>, SearchError> {
        self.store.check()?;
        if self.needs_refill() {
            self.load_surplus()?;
        }
        let Some(entry) = self.window.pop() else {
            return Ok(None);
        };
        self.len -= 1;
        Ok(Some(entry.into_item()))
    }

    /// The greatest item, loading a fragment first if one holds it.
    pub fn peek(&mut self) -> Result<Option<&T>, SearchError> {
        self.store.check()?;
        if self.needs_refill() {
            self.load_surplus()?;
        }
        Ok(self.window.last().map(|e| &e.item))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// In-memory items, ascending.
    pub fn window_items(&self) -> impl Iterator<Item = &T> {
        self.window.iter().map(|e| &e.item)
    }

    pub fn fragment_count(&self) -> usize {
        self.store.len()
    }

    pub fn store(&self) -> &FragmentStore<T> {
        &self.store
    }

    pub fn comparator(&self) -> &Comparator<T> {
        &self.cmp
    }

    fn needs_refill(&self) -> bool {
        let Some(stored) = self.store.peek_max() else {
            return false;
        };
        if self.window.len() <= self.min_threshold {
            return true;
        }
        match self.window.last() {
            Some(top) => self.cmp.compare_entries(stored, top) == Ordering::Greater,
            None => true,
        }
    }

    fn save_surplus(&mut self) -> Result<(), SearchError> {
        let cut = self.window.len() - self.min_threshold;
        let kept = self.window.split_off(cut);
        let surplus = std::mem::replace(&mut self.window, kept);
        debug!(
            spilled = surplus.len(),
            kept = self.window.len(),
            fragments = self.store.len(),
            "spilling frontier surplus"
        );
        self.store.store(surplus)
    }

    fn load_surplus(&mut self) -> Result<(), SearchError> {
        let loaded = self.store.drain_max()?;
        if loaded.is_empty() {
            return Ok(());
        }
        let window = std::mem::take(&mut self.window);
        self.window = merge_sorted(window, loaded, &self.cmp);
        Ok(())
    }
}
