use flowgraph_common::{PortNo, Symbol, TrieKey};
use flowgraph_hsa::TernaryArray;

/// One level of a [`RuleKey`]: the in-port first, then the packed match positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSymbol {
    /// `None` matches packets from any port.
    InPort(Option<PortNo>),
    /// Four packed ternary positions.
    Digit(u8),
}

impl Symbol for RuleSymbol {
    fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InPort(None), Self::InPort(_)) | (Self::InPort(_), Self::InPort(None)) => true,
            (Self::InPort(a), Self::InPort(b)) => a == b,
            (Self::Digit(a), Self::Digit(b)) => {
                let both = a & b;
                (both | (both >> 1)) & 0x55 == 0x55
            }
            _ => false,
        }
    }

    fn is_subset_of(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InPort(_), Self::InPort(None)) => true,
            (Self::InPort(a), Self::InPort(b)) => a == b,
            (Self::Digit(a), Self::Digit(b)) => a & !b == 0,
            _ => false,
        }
    }
}

/// The structural identity of a rule on its switch: in-port and match. Two rules with the
/// same key describe the same flow table entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleKey {
    in_port: Option<PortNo>,
    match_array: TernaryArray,
}

impl RuleKey {
    pub const fn new(in_port: Option<PortNo>, match_array: TernaryArray) -> Self {
        Self { in_port, match_array }
    }

    #[inline]
    pub const fn in_port(&self) -> Option<PortNo> {
        self.in_port
    }

    #[inline]
    pub const fn match_array(&self) -> &TernaryArray {
        &self.match_array
    }
}

impl TrieKey for RuleKey {
    type Symbol = RuleSymbol;

    fn symbols(&self) -> Vec<RuleSymbol> {
        std::iter::once(RuleSymbol::InPort(self.in_port))
            .chain(self.match_array.digits().iter().map(|digit| RuleSymbol::Digit(*digit)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use flowgraph_common::Trie;

    use super::*;

    fn key(port: Option<u32>, s: &str) -> RuleKey {
        RuleKey::new(port.map(PortNo::new), s.parse().unwrap())
    }

    #[test]
    fn rule_key_overlapping() {
        let mut trie = Trie::new();
        trie.insert(&key(None, "0xxx1"), 1);
        trie.insert(&key(Some(1), "01xxx"), 2);
        trie.insert(&key(Some(2), "xxxxx"), 3);

        let mut found: Vec<_> = trie.overlapping(&key(Some(1), "0x0x1")).into_iter().copied().collect();
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);

        let found: Vec<_> = trie.overlapping(&key(Some(3), "1xxxx")).into_iter().copied().collect();
        assert!(found.is_empty());
    }

    #[test]
    fn rule_key_subset_of() {
        let mut trie = Trie::new();
        trie.insert(&key(None, "0xxx1"), 1);
        trie.insert(&key(Some(1), "01xx1"), 2);

        let mut found: Vec<_> = trie.subset_of(&key(None, "0xxxx")).into_iter().copied().collect();
        found.sort_unstable();
        assert_eq!(found, vec![1, 2]);

        let found: Vec<_> = trie.subset_of(&key(Some(1), "0xxxx")).into_iter().copied().collect();
        assert_eq!(found, vec![2]);
    }
}
