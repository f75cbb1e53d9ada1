//! A prefix trie over per-entity symbol sequences.
//!
//! Every stored entry is addressed by the ordered sequence of symbols its key produces
//! (see [`TrieKey`]). Unlike an exact-match map, symbols form a small lattice: two symbols
//! may *intersect* (describe a common value) or one may be a *subset* of another. The trie
//! uses this to answer overlap and subset queries by descending level by level, pruning
//! every branch whose symbol fails the predicate against the probe's symbol at that level.
//! The cost of a query is bounded by the branching factor times the probe length rather
//! than by the number of stored entries.
use std::{collections::hash_map::Entry, hash::Hash};

use rustc_hash::FxHashMap;

/// A symbol stored at one level of the trie.
pub trait Symbol: Clone + Eq + Hash {
    /// Returns `true` if `self` and `other` describe at least one common value.
    fn intersects(&self, other: &Self) -> bool;

    /// Returns `true` if every value described by `self` is also described by `other`.
    fn is_subset_of(&self, other: &Self) -> bool;
}

/// A key that can be stored in (or used to probe) a [`Trie`].
///
/// The symbol sequence is produced on demand from the key itself; the trie keeps all
/// traversal state locally.
pub trait TrieKey {
    type Symbol: Symbol;

    /// Returns the ordered symbol sequence of this key.
    fn symbols(&self) -> Vec<Self::Symbol>;
}

/// A node in the trie.
#[derive(Debug)]
struct Node<S, V> {
    children: FxHashMap<S, Node<S, V>>,
    value: Option<V>,
}

impl<S, V> Node<S, V> {
    fn new() -> Self {
        Self { children: FxHashMap::default(), value: None }
    }
}

/// A prefix trie keyed by symbol sequences.
#[derive(Debug)]
pub struct Trie<S, V> {
    root: Node<S, V>,
    len: usize,
}

impl<S: Symbol, V> Default for Trie<S, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Symbol, V> Trie<S, V> {
    /// Creates a new, empty trie.
    pub fn new() -> Self {
        Self { root: Node::new(), len: 0 }
    }

    /// Returns the number of stored entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the trie holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts `value` under `key`. Returns `false` and leaves the trie untouched if an
    /// entry with a structurally equal key is already present.
    pub fn insert<K: TrieKey<Symbol = S>>(&mut self, key: &K, value: V) -> bool {
        let mut node = &mut self.root;
        for symbol in key.symbols() {
            node = node.children.entry(symbol).or_insert_with(Node::new);
        }

        if node.value.is_some() {
            return false;
        }

        node.value = Some(value);
        self.len += 1;
        true
    }

    /// Returns the entry stored under a key structurally equal to `key`.
    pub fn get<K: TrieKey<Symbol = S>>(&self, key: &K) -> Option<&V> {
        let mut node = &self.root;
        for symbol in key.symbols() {
            node = node.children.get(&symbol)?;
        }
        node.value.as_ref()
    }

    /// Returns a mutable reference to the entry stored under `key`.
    pub fn get_mut<K: TrieKey<Symbol = S>>(&mut self, key: &K) -> Option<&mut V> {
        let mut node = &mut self.root;
        for symbol in key.symbols() {
            node = node.children.get_mut(&symbol)?;
        }
        node.value.as_mut()
    }

    /// Removes the entry stored under a key structurally equal to `key`, pruning every
    /// ancestor left without children or value. Returns `None` if no such entry exists.
    pub fn remove<K: TrieKey<Symbol = S>>(&mut self, key: &K) -> Option<V> {
        let symbols = key.symbols();
        let mut removed = None;
        Self::inner_remove(&mut self.root, &symbols, &mut removed);
        if removed.is_some() {
            self.len -= 1;
        }
        removed
    }

    /// Returns `true` if the caller should unlink `current` from its parent.
    fn inner_remove(current: &mut Node<S, V>, symbols: &[S], removed: &mut Option<V>) -> bool {
        let Some((symbol, rest)) = symbols.split_first() else {
            *removed = current.value.take();
            return removed.is_some() && current.children.is_empty();
        };

        if let Entry::Occupied(mut entry) = current.children.entry(symbol.clone()) {
            if Self::inner_remove(entry.get_mut(), rest, removed) {
                entry.remove_entry();
                return current.children.is_empty() && current.value.is_none();
            }
        }

        false
    }

    /// Returns every entry whose key intersects `probe` at every level.
    pub fn overlapping<K: TrieKey<Symbol = S>>(&self, probe: &K) -> Vec<&V> {
        self.descend(probe, |stored, probe| stored.intersects(probe))
    }

    /// Returns every entry whose key is a subset of `probe` at every level.
    pub fn subset_of<K: TrieKey<Symbol = S>>(&self, probe: &K) -> Vec<&V> {
        self.descend(probe, |stored, probe| stored.is_subset_of(probe))
    }

    /// Returns the single stored entry structurally equal to `probe`. This resolves "the same
    /// entry, possibly described by a different object" and is only valid if the probe
    /// overlaps exactly one stored key, which must be the probe itself.
    pub fn reference<K: TrieKey<Symbol = S>>(&self, probe: &K) -> Option<&V> {
        if self.overlapping(probe).len() != 1 {
            return None;
        }
        self.get(probe)
    }

    /// Returns all stored entries.
    pub fn values(&self) -> Vec<&V> {
        let mut values = Vec::with_capacity(self.len);
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if let Some(value) = node.value.as_ref() {
                values.push(value);
            }
            stack.extend(node.children.values());
        }
        values
    }

    /// Breadth-first descent keeping, at each level, only the branches whose symbol satisfies
    /// `keep` against the probe's symbol at that level.
    fn descend<K, F>(&self, probe: &K, keep: F) -> Vec<&V>
    where
        K: TrieKey<Symbol = S>,
        F: Fn(&S, &S) -> bool,
    {
        let mut frontier = vec![&self.root];
        let mut next = Vec::new();

        for symbol in probe.symbols() {
            next.clear();
            for node in frontier.iter() {
                next.extend(
                    node.children
                        .iter()
                        .filter(|(stored, _)| keep(stored, &symbol))
                        .map(|(_, child)| child),
                );
            }
            std::mem::swap(&mut frontier, &mut next);
            if frontier.is_empty() {
                return Vec::new();
            }
        }

        frontier.into_iter().filter_map(|node| node.value.as_ref()).collect()
    }
}
