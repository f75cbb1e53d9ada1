use flowgraph_common::{SwitchId, Trie};
use flowgraph_hsa::{HsaError, TernaryArray};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::{RuleGraphError, RuleId, RuleKey, RuleNode, RuleSymbol};

/// Rule nodes, their per-switch tries and the priority relations between overlapping rules.
///
/// `depends_on[r]` holds the higher priority rules overlapping `r`, `affects[r]` the lower
/// priority ones. A rule's really matched space is always its match minus the matches of the
/// rules it depends on.
#[derive(Debug, Default)]
pub(crate) struct RuleStore {
    nodes: FxHashMap<RuleId, RuleNode>,
    tries: FxHashMap<SwitchId, Trie<RuleSymbol, RuleId>>,
    depends_on: FxHashMap<RuleId, FxHashSet<RuleId>>,
    affects: FxHashMap<RuleId, FxHashSet<RuleId>>,
    width: Option<usize>,
    next_id: u64,
}

impl RuleStore {
    pub(crate) fn new(width: Option<usize>) -> Self {
        Self { width, ..Default::default() }
    }

    /// Inserts `node`, robbing overlapping rules in priority order. Returns the new id and the
    /// lower priority rules whose really matched space shrank.
    ///
    /// Nothing is changed if the rule is already installed or overlaps a rule of equal
    /// priority.
    pub(crate) fn insert(
        &mut self,
        mut node: RuleNode,
    ) -> Result<(RuleId, Vec<RuleId>), RuleGraphError> {
        if let Some(expected) = self.width {
            if node.width() != expected {
                return Err(HsaError::WidthMismatch { expected, found: node.width() }.into());
            }
        }

        let trie = self.tries.entry(node.switch()).or_default();
        if let Some(existing) = trie.get(node.key()) {
            return Err(RuleGraphError::Duplicate(*existing));
        }
        let overlapping: Vec<RuleId> = trie.overlapping(node.key()).into_iter().copied().collect();

        let (mut higher, mut lower) = (Vec::new(), Vec::new());
        for other in overlapping {
            let Some(existing) = self.nodes.get(&other) else { continue };
            match existing.priority().cmp(&node.priority()) {
                std::cmp::Ordering::Greater => higher.push(other),
                std::cmp::Ordering::Less => lower.push(other),
                std::cmp::Ordering::Equal => {
                    return Err(RuleGraphError::StructuralConflict {
                        existing: other,
                        priority: node.priority(),
                    })
                }
            }
        }

        node.reset_really_match(
            higher.iter().filter_map(|other| self.nodes.get(other)).map(RuleNode::match_array),
        )?;

        let id = RuleId::new(self.next_id);
        self.next_id += 1;

        for other in &lower {
            if let Some(existing) = self.nodes.get_mut(other) {
                existing.rob(node.match_array())?;
            }
            self.depends_on.entry(*other).or_default().insert(id);
            self.affects.entry(id).or_default().insert(*other);
        }
        for other in &higher {
            self.depends_on.entry(id).or_default().insert(*other);
            self.affects.entry(*other).or_default().insert(id);
        }

        if self.width.is_none() {
            self.width = Some(node.width());
        }
        self.tries.entry(node.switch()).or_default().insert(node.key(), id);
        self.nodes.insert(id, node);

        lower.sort_unstable();
        Ok((id, lower))
    }

    /// Removes rule `id`. Returns the node and the lower priority rules it used to rob, whose
    /// really matched space has been restored.
    pub(crate) fn remove(&mut self, id: RuleId) -> Result<(RuleNode, Vec<RuleId>), RuleGraphError> {
        let node = self.nodes.remove(&id).ok_or(RuleGraphError::NotFound)?;
        if let Some(trie) = self.tries.get_mut(&node.switch()) {
            trie.remove(node.key());
        }

        for higher in self.depends_on.remove(&id).unwrap_or_default() {
            Self::unrelate(&mut self.affects, higher, id);
        }

        let mut affected: Vec<_> = self.affects.remove(&id).unwrap_or_default().into_iter().collect();
        affected.sort_unstable();
        for lower in &affected {
            Self::unrelate(&mut self.depends_on, *lower, id);
            self.restore(*lower)?;
        }

        Ok((node, affected))
    }

    fn unrelate(relation: &mut FxHashMap<RuleId, FxHashSet<RuleId>>, key: RuleId, value: RuleId) {
        if let Some(set) = relation.get_mut(&key) {
            set.remove(&value);
            if set.is_empty() {
                relation.remove(&key);
            }
        }
    }

    /// Recomputes the really matched space of `id` from the rules it still depends on.
    fn restore(&mut self, id: RuleId) -> Result<(), HsaError> {
        let higher: Vec<TernaryArray> = self
            .depends_on
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|other| self.nodes.get(other))
            .map(|other| other.match_array().clone())
            .collect();

        match self.nodes.get_mut(&id) {
            Some(node) => node.reset_really_match(&higher),
            None => Ok(()),
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: RuleId) -> Option<&RuleNode> {
        self.nodes.get(&id)
    }

    /// Returns the rule installed on `switch` under exactly `key`.
    pub(crate) fn lookup(&self, switch: SwitchId, key: &RuleKey) -> Option<RuleId> {
        self.tries.get(&switch)?.get(key).copied()
    }

    /// Returns the rule installed on `switch` under exactly `key`, or why there is none.
    pub(crate) fn reference(&self, switch: SwitchId, key: &RuleKey) -> Result<RuleId, RuleGraphError> {
        let trie = self.tries.get(&switch).ok_or(RuleGraphError::UnknownSwitch(switch))?;
        trie.get(key).copied().ok_or(RuleGraphError::NotFound)
    }

    /// Returns the rules of `switch` whose key overlaps `key`.
    pub(crate) fn overlapping(
        &self,
        switch: SwitchId,
        key: &RuleKey,
    ) -> Result<Vec<RuleId>, RuleGraphError> {
        let trie = self.tries.get(&switch).ok_or(RuleGraphError::UnknownSwitch(switch))?;
        Ok(Self::sorted(trie.overlapping(key)))
    }

    /// Returns the rules of `switch` whose key is a subset of `key`.
    pub(crate) fn subset_of(
        &self,
        switch: SwitchId,
        key: &RuleKey,
    ) -> Result<Vec<RuleId>, RuleGraphError> {
        let trie = self.tries.get(&switch).ok_or(RuleGraphError::UnknownSwitch(switch))?;
        Ok(Self::sorted(trie.subset_of(key)))
    }

    /// Returns every rule of `switch`.
    pub(crate) fn switch_rules(&self, switch: SwitchId) -> Vec<RuleId> {
        self.tries.get(&switch).map(|trie| Self::sorted(trie.values())).unwrap_or_default()
    }

    fn sorted(ids: Vec<&RuleId>) -> Vec<RuleId> {
        let mut ids: Vec<_> = ids.into_iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Creates the trie of `switch`. Returns `false` if it already exists.
    pub(crate) fn add_switch(&mut self, switch: SwitchId) -> bool {
        if self.tries.contains_key(&switch) {
            return false;
        }
        self.tries.insert(switch, Trie::new());
        true
    }

    /// Drops the trie of `switch`. Its rules must have been removed first.
    pub(crate) fn remove_switch(&mut self, switch: SwitchId) -> bool {
        self.tries.remove(&switch).is_some()
    }

    #[inline]
    pub(crate) fn contains_switch(&self, switch: SwitchId) -> bool {
        self.tries.contains_key(&switch)
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the higher priority rules overlapping `id`.
    pub(crate) fn depends_on(&self, id: RuleId) -> Vec<RuleId> {
        Self::sorted(self.depends_on.get(&id).into_iter().flatten().collect())
    }

    /// Returns the lower priority rules overlapping `id`.
    pub(crate) fn affects(&self, id: RuleId) -> Vec<RuleId> {
        Self::sorted(self.affects.get(&id).into_iter().flatten().collect())
    }

    /// Returns every rule, ordered by id.
    pub(crate) fn nodes(&self) -> Vec<(RuleId, &RuleNode)> {
        let mut nodes: Vec<_> = self.nodes.iter().map(|(id, node)| (*id, node)).collect();
        nodes.sort_unstable_by_key(|(id, _)| *id);
        nodes
    }
}
