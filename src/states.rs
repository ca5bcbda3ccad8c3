//! Vocabularies and higher-order (composite) hidden states.
//!
//! Single states and observations live in a [`Vocabulary`], which fixes a
//! dense index for every symbol. A [`CompositeState`] of order `k` is the
//! tuple of the `k` most recent single-state indices, oldest first. All the
//! algorithms work on those indices once the vocabularies are frozen.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Index;

use super::error::{HmmError, HmmResult};

/// Anything usable as an observation or hidden-state token.
pub trait Symbol: Clone + Eq + Hash + Debug {}

impl<T: Clone + Eq + Hash + Debug> Symbol for T {}

/// Ordered set of symbols; the position of a symbol is its canonical index.
#[derive(Debug, Clone)]
pub struct Vocabulary<T> {
    items: Vec<T>,
    index: HashMap<T, usize>,
}

impl<T: Symbol> Vocabulary<T> {

    pub fn new() -> Self {
        Self { items: Vec::new(), index: HashMap::new() }
    }

    /// Adds `item` if it is new and returns its index either way.
    pub fn insert(&mut self, item: T) -> usize {
        if let Some(&i) = self.index.get(&item) {
            return i;
        }
        let i = self.items.len();
        self.index.insert(item.clone(), i);
        self.items.push(item);
        i
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.index.get(item).copied()
    }

    pub fn contains(&self, item: &T) -> bool {
        self.index.contains_key(item)
    }

    pub fn get(&self, i: usize) -> Option<&T> {
        self.items.get(i)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Symbol> Default for Vocabulary<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PartialEq> PartialEq for Vocabulary<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Symbol> Index<usize> for Vocabulary<T> {
    type Output = T;

    fn index(&self, idx: usize) -> &Self::Output {
        &self.items[idx]
    }
}

/// Keeps the first occurrence of every symbol, in order.
impl<T: Symbol> std::iter::FromIterator<T> for Vocabulary<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vocabulary = Vocabulary::new();
        for item in iter {
            vocabulary.insert(item);
        }
        vocabulary
    }
}

impl<T: Serialize> Serialize for Vocabulary<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Symbol + Deserialize<'de>> Deserialize<'de> for Vocabulary<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

/// A window of `order` consecutive single-state indices, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeState(Vec<usize>);

impl CompositeState {

    /// # Panics
    /// If `history` is empty: a composite state has order 1 or more.
    pub fn new(history: Vec<usize>) -> Self {
        assert!(!history.is_empty(), "a composite state needs at least one single state");
        Self(history)
    }

    pub fn order(&self) -> usize {
        self.0.len()
    }

    pub fn history(&self) -> &[usize] {
        &self.0
    }

    /// Index of the newest single state, the one that emits.
    pub fn single(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    /// Returns the trailing `suffix_len` single states as a composite state of that order.
    pub fn decompose(&self, suffix_len: usize) -> HmmResult<CompositeState> {
        if suffix_len == 0 || suffix_len > self.order() {
            return Err(HmmError::SuffixTooLong { requested: suffix_len, order: self.order() });
        }
        Ok(CompositeState(self.suffix(suffix_len).to_vec()))
    }

    pub(crate) fn suffix(&self, suffix_len: usize) -> &[usize] {
        debug_assert!(suffix_len >= 1 && suffix_len <= self.order());
        &self.0[self.0.len() - suffix_len..]
    }
}

/// Every composite state of order `order` over `n_single` single states.
///
/// States come out in lexicographic order (oldest slot varies slowest), so the
/// position of a window equals [`composite_index`] of it. Fails when
/// `n_single ^ order` does not fit in a `usize`.
pub fn synthesize(n_single: usize, order: usize) -> HmmResult<Vocabulary<CompositeState>> {
    let total = u32::try_from(order)
        .ok()
        .and_then(|exponent| n_single.checked_pow(exponent))
        .ok_or(HmmError::StateSpaceTooLarge { single_states: n_single, order })?;
    let mut states = Vocabulary::new();
    for idx in 0..total {
        let mut history = vec![0; order];
        let mut rem = idx;
        for pos in (0..order).rev() {
            history[pos] = rem % n_single;
            rem /= n_single;
        }
        states.insert(CompositeState(history));
    }
    Ok(states)
}

/// Position of a window in the vocabulary produced by [`synthesize`].
pub fn composite_index(window: &[usize], n_single: usize) -> usize {
    window.iter().fold(0, |acc, &s| acc * n_single + s)
}

/// Sliding windows of width `order`, stride 1.
///
/// ```text
/// [a, b, c, d], order 2 => [a-b, b-c, c-d]
/// ```
pub fn encode_ngrams(sequence: &[usize], order: usize) -> Vec<CompositeState> {
    sequence.windows(order).map(|w| CompositeState(w.to_vec())).collect()
}

/// The composite states of order `order` that occur in `sequences`, first-seen first.
///
/// A sequence shorter than `order` contributes nothing.
pub fn observed_ngrams(sequences: &[Vec<usize>], order: usize) -> Vocabulary<CompositeState> {
    let mut states = Vocabulary::new();
    for sequence in sequences {
        for window in sequence.windows(order) {
            states.insert(CompositeState(window.to_vec()));
        }
    }
    states
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary_keeps_first_seen_order() {
        let v: Vocabulary<&str> = vec!["b", "a", "b", "c", "a"].into_iter().collect();
        assert_eq!(v.as_slice(), &["b", "a", "c"]);
        assert_eq!(v.index_of(&"c"), Some(2));
        assert_eq!(v.index_of(&"z"), None);
        assert_eq!(v[1], "a");
    }

    #[test]
    fn test_synthesize() {
        let states = synthesize(2, 2).unwrap();
        let histories: Vec<Vec<usize>> = states.iter().map(|s| s.history().to_vec()).collect();
        assert_eq!(histories, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
        assert_eq!(synthesize(3, 3).unwrap().len(), 27);
        assert_eq!(synthesize(0, 2).unwrap().len(), 0);
        for (i, state) in synthesize(3, 3).unwrap().iter().enumerate() {
            assert_eq!(composite_index(state.history(), 3), i);
        }
    }

    #[test]
    fn test_synthesize_rejects_huge_state_spaces() {
        assert!(matches!(
            synthesize(2, 64),
            Err(HmmError::StateSpaceTooLarge { single_states: 2, order: 64 })
        ));
        assert!(synthesize(1, 64).is_ok());
    }

    #[test]
    fn test_observed_ngrams() {
        let sequences = vec![vec![0, 1, 1, 0], vec![1], vec![1, 1, 1]];
        let states = observed_ngrams(&sequences, 2);
        let histories: Vec<Vec<usize>> = states.iter().map(|s| s.history().to_vec()).collect();
        assert_eq!(histories, vec![vec![0, 1], vec![1, 1], vec![1, 0]]);
        assert!(observed_ngrams(&sequences, 5).is_empty());
    }

    #[test]
    fn test_encode_ngrams() {
        let encoded = encode_ngrams(&[0, 1, 2, 3], 3);
        assert_eq!(encoded, vec![CompositeState::new(vec![0, 1, 2]), CompositeState::new(vec![1, 2, 3])]);
        assert_eq!(encode_ngrams(&[0, 1, 2], 1).len(), 3);
        assert!(encode_ngrams(&[0], 2).is_empty());
    }

    #[test]
    fn test_decompose() {
        let state = CompositeState::new(vec![2, 0, 1]);
        assert_eq!(state.single(), 1);
        assert_eq!(state.decompose(1).unwrap(), CompositeState::new(vec![1]));
        assert_eq!(state.decompose(2).unwrap(), CompositeState::new(vec![0, 1]));
        assert_eq!(state.decompose(3).unwrap(), state);
        assert!(matches!(
            state.decompose(4),
            Err(HmmError::SuffixTooLong { requested: 4, order: 3 })
        ));
        assert!(state.decompose(0).is_err());
    }
}
