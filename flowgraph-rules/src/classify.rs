use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::RuleId;

/// Membership of one rule class, ordered by selection priority (lowest first), then by id.
///
/// Each member carries its own priority; changing it re-keys the member instead of
/// re-sorting.
#[derive(Debug, Default)]
pub(crate) struct ClassSet {
    order: BTreeSet<(i64, RuleId)>,
    members: FxHashMap<RuleId, i64>,
}

impl ClassSet {
    /// Adds or removes `id` depending on `member`. Returns `true` if membership changed.
    pub(crate) fn set(&mut self, id: RuleId, priority: i64, member: bool) -> bool {
        if member {
            self.insert(id, priority)
        } else {
            self.remove(id)
        }
    }

    pub(crate) fn insert(&mut self, id: RuleId, priority: i64) -> bool {
        match self.members.insert(id, priority) {
            Some(previous) if previous == priority => false,
            Some(previous) => {
                self.order.remove(&(previous, id));
                self.order.insert((priority, id));
                false
            }
            None => {
                self.order.insert((priority, id));
                true
            }
        }
    }

    pub(crate) fn remove(&mut self, id: RuleId) -> bool {
        let Some(priority) = self.members.remove(&id) else { return false };
        self.order.remove(&(priority, id));
        true
    }

    /// Moves `id` to `priority` if it is a member.
    pub(crate) fn rekey(&mut self, id: RuleId, priority: i64) {
        if self.members.contains_key(&id) {
            self.insert(id, priority);
        }
    }

    #[inline]
    pub(crate) fn contains(&self, id: RuleId) -> bool {
        self.members.contains_key(&id)
    }

    /// Returns up to `limit` members in selection order.
    pub(crate) fn take(&self, limit: usize) -> Vec<RuleId> {
        self.order.iter().take(limit).map(|(_, id)| *id).collect()
    }
}
