//! Cumulative ban counters.

use std::sync::Arc;

use dashmap::DashMap;

/// Bans per chat since the process started.
#[derive(Clone, Default)]
pub struct BanStats {
    counts: Arc<DashMap<i64, u64>>,
}

impl BanStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one successful ban. Returns the new total for the chat.
    pub fn record_ban(&self, chat_id: i64) -> u64 {
        let mut count = self.counts.entry(chat_id).or_insert(0);
        *count += 1;
        *count
    }

    pub fn get(&self, chat_id: i64) -> u64 {
        self.counts.get(&chat_id).map(|c| *c).unwrap_or(0)
    }

    /// Bans across every chat.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| *c.value()).sum()
    }
}
