use bincode::{Decode, Encode};
use std::fmt::Debug;
use std::hash::Hash;

/// A state the search can reach.
///
/// Candidates travel through fragment storage and across worker threads,
/// so they must encode with bincode and be sendable.
pub trait Candidate: Encode + Decode<()> + Clone + Debug + Send + 'static {
    /// Identifies states that are equivalent regardless of the path taken.
    type Fingerprint: Eq + Hash + Clone + Debug + Send + 'static;
    type Score: Ord + Copy + Debug + Send + 'static;

    fn fingerprint(&self) -> Self::Fingerprint;

    fn score(&self) -> Self::Score;

    /// A terminal candidate completes a path and is never expanded.
    fn is_terminal(&self) -> bool;

    /// Successor states. Must be finite and must not contain this state.
    fn expand(&self) -> Vec<Self>;
}
