use rustc_hash::{FxHashMap, FxHashSet};

use crate::RuleId;

/// Forwarding edges between rules, stored in both directions.
#[derive(Debug, Default)]
pub(crate) struct Adjacency {
    next: FxHashMap<RuleId, FxHashSet<RuleId>>,
    prev: FxHashMap<RuleId, FxHashSet<RuleId>>,
    edges: usize,
}

impl Adjacency {
    /// Adds the edge `from -> to`. Returns `false` if it already exists.
    pub(crate) fn add(&mut self, from: RuleId, to: RuleId) -> bool {
        if !self.next.entry(from).or_default().insert(to) {
            return false;
        }
        self.prev.entry(to).or_default().insert(from);
        self.edges += 1;
        true
    }

    /// Removes the edge `from -> to`. Returns `false` if it did not exist.
    pub(crate) fn remove(&mut self, from: RuleId, to: RuleId) -> bool {
        if !Self::unlink(&mut self.next, from, to) {
            return false;
        }
        Self::unlink(&mut self.prev, to, from);
        self.edges -= 1;
        true
    }

    /// Removes every edge touching `id`. Returns the former successors and predecessors.
    pub(crate) fn remove_node(&mut self, id: RuleId) -> (Vec<RuleId>, Vec<RuleId>) {
        let next = self.next(id);
        let prev = self.prev(id);
        for to in &next {
            self.remove(id, *to);
        }
        for from in &prev {
            self.remove(*from, id);
        }
        (next, prev)
    }

    fn unlink(map: &mut FxHashMap<RuleId, FxHashSet<RuleId>>, key: RuleId, value: RuleId) -> bool {
        let Some(set) = map.get_mut(&key) else { return false };
        let removed = set.remove(&value);
        if set.is_empty() {
            map.remove(&key);
        }
        removed
    }

    pub(crate) fn next(&self, id: RuleId) -> Vec<RuleId> {
        Self::sorted(self.next.get(&id))
    }

    pub(crate) fn prev(&self, id: RuleId) -> Vec<RuleId> {
        Self::sorted(self.prev.get(&id))
    }

    fn sorted(set: Option<&FxHashSet<RuleId>>) -> Vec<RuleId> {
        let mut ids: Vec<_> = set.into_iter().flatten().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn contains(&self, from: RuleId, to: RuleId) -> bool {
        self.next.get(&from).is_some_and(|next| next.contains(&to))
    }

    #[inline]
    pub(crate) fn has_next(&self, id: RuleId) -> bool {
        self.next.contains_key(&id)
    }

    #[inline]
    pub(crate) fn has_prev(&self, id: RuleId) -> bool {
        self.prev.contains_key(&id)
    }

    #[inline]
    pub(crate) fn edge_count(&self) -> usize {
        self.edges
    }

    /// Returns every edge as `(from, to)`, sorted.
    pub(crate) fn edges(&self) -> Vec<(RuleId, RuleId)> {
        let mut edges: Vec<_> = self
            .next
            .iter()
            .flat_map(|(from, next)| next.iter().map(move |to| (*from, *to)))
            .collect();
        edges.sort_unstable();
        edges
    }
}
