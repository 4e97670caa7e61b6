//! Ordering primitives shared by the frontier and the fragment store.
//!
//! Items never need to implement `Ord` themselves. A [`Comparator`] is
//! passed in at construction and every stored item is wrapped in an
//! [`Entry`] carrying its insertion sequence number, which breaks ties so
//! that the entry order is strict and total.

use bincode::{Decode, Encode};
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Pluggable total order over items. Greater values are popped first.
pub struct Comparator<T> {
    cmp: Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>,
}

impl<T> Clone for Comparator<T> {
    fn clone(&self) -> Self {
        Self { cmp: Arc::clone(&self.cmp) }
    }
}

impl<T> fmt::Debug for Comparator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Comparator")
    }
}

impl<T: 'static> Comparator<T> {
    pub fn new<F>(cmp: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self { cmp: Arc::new(cmp) }
    }

    /// Order items by an extracted key. Wrap the key in `std::cmp::Reverse`
    /// to prefer small keys.
    pub fn by_key<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::new(move |a, b| key(a).cmp(&key(b)))
    }

    pub fn reversed(self) -> Self {
        let inner = self.cmp;
        Self::new(move |a, b| inner(b, a))
    }

    pub fn natural() -> Self
    where
        T: Ord,
    {
        Self::new(|a: &T, b: &T| a.cmp(b))
    }
}

impl<T> Comparator<T> {
    pub fn compare(&self, a: &T, b: &T) -> Ordering {
        (self.cmp)(a, b)
    }

    /// Comparator order first, then insertion order, so among items the
    /// comparator considers equal the most recently appended is greatest.
    pub fn compare_entries(&self, a: &Entry<T>, b: &Entry<T>) -> Ordering {
        self.compare(&a.item, &b.item).then(a.seq.cmp(&b.seq))
    }
}

/// An item together with the sequence number it was appended under.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Entry<T> {
    pub seq: u64,
    pub item: T,
}

impl<T> Entry<T> {
    pub fn new(seq: u64, item: T) -> Self {
        Self { seq, item }
    }

    pub fn into_item(self) -> T {
        self.item
    }
}

/// Insert into an ascending run, keeping it ascending.
pub fn insert_sorted<T>(run: &mut Vec<Entry<T>>, entry: Entry<T>, cmp: &Comparator<T>) {
    let at = run.partition_point(|e| cmp.compare_entries(e, &entry) != Ordering::Greater);
    run.insert(at, entry);
}

/// Merge two ascending runs into one ascending run.
pub fn merge_sorted<T>(left: Vec<Entry<T>>, right: Vec<Entry<T>>, cmp: &Comparator<T>) -> Vec<Entry<T>> {
    if left.is_empty() {
        return right;
    }
    if right.is_empty() {
        return left;
    }
    left.into_iter()
        .merge_by(right, |a, b| cmp.compare_entries(a, b) != Ordering::Greater)
        .collect()
}

pub fn is_sorted<T>(run: &[Entry<T>], cmp: &Comparator<T>) -> bool {
    run.windows(2)
        .all(|w| cmp.compare_entries(&w[0], &w[1]) == Ordering::Less)
}
