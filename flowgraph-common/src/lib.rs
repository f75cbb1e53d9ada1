use std::time::SystemTime;

mod id;
pub use id::{PortNo, SwitchId, SwitchPort};

pub mod trie;
pub use trie::{Symbol, Trie, TrieKey};

/// Returns the current UNIX timestamp in milliseconds.
#[inline]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
