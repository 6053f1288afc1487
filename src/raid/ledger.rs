//! Per-chat sliding-window join ledger.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::MemberRef;
use super::engine::RaidMode;

/// One recorded join.
#[derive(Debug, Clone)]
struct JoinRecord {
    at: Instant,
    member: Option<MemberRef>,
    /// Already banned, or swept up by a raid decision.
    settled: bool,
}

/// Window state right after a batch of candidates was admitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub recent_count: usize,
    pub mode: RaidMode,
    /// Earlier joiners still inside the window that no decision has banned
    /// yet. Only filled in raid mode.
    pub backlog: Vec<MemberRef>,
}

/// Join records per chat, oldest first.
///
/// Records are appended at the back and only ever trimmed from the front, so
/// each deque stays time-ascending. The DashMap entry guard acts as the
/// per-chat lock: everything that must be atomic for one chat happens while a
/// single guard is held, and no guard is held across an `.await`.
#[derive(Clone, Default)]
pub struct EntryLedger {
    entries: Arc<DashMap<i64, VecDeque<JoinRecord>>>,
}

impl EntryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one anonymous join at `at`.
    #[cfg(test)]
    pub fn record_join(&self, chat_id: i64, at: Instant) {
        self.entries.entry(chat_id).or_default().push_back(JoinRecord {
            at,
            member: None,
            settled: false,
        });
    }

    /// Drop entries at or before `now - window` and return what is left.
    pub fn count_within_window(&self, chat_id: i64, now: Instant, window: Duration) -> usize {
        match self.entries.get_mut(&chat_id) {
            Some(mut joins) => {
                trim_front(&mut joins, now, window);
                joins.len()
            }
            None => 0,
        }
    }

    /// Record every candidate of one event at `now`, count the window and
    /// pick the mode, atomically for this chat.
    ///
    /// The count includes the event's own candidates, so a single burst can
    /// trigger raid mode without any history. In raid mode every record in
    /// the window is settled and the unsettled earlier joiners are returned.
    pub fn admit(
        &self,
        chat_id: i64,
        now: Instant,
        candidates: &[MemberRef],
        window: Duration,
        threshold: u32,
    ) -> WindowSnapshot {
        let mut joins = self.entries.entry(chat_id).or_default();
        let earlier = joins.len();
        joins.extend(candidates.iter().map(|m| JoinRecord {
            at: now,
            member: Some(m.clone()),
            settled: false,
        }));
        let trimmed = trim_front(&mut joins, now, window);

        let recent_count = joins.len();
        let mode = RaidMode::from_count(recent_count, threshold);
        let mut backlog = Vec::new();

        if mode == RaidMode::Raid {
            let earlier = earlier.saturating_sub(trimmed);
            let current: HashSet<u64> = candidates.iter().map(|m| m.id).collect();
            let mut seen = HashSet::new();
            for (i, record) in joins.iter_mut().enumerate() {
                if i < earlier
                    && !record.settled
                    && let Some(member) = &record.member
                    && !current.contains(&member.id)
                    && seen.insert(member.id)
                {
                    backlog.push(member.clone());
                }
                record.settled = true;
            }
        }

        WindowSnapshot {
            recent_count,
            mode,
            backlog,
        }
    }

    /// Mark members as handled so a later raid does not ban them again.
    pub fn settle(&self, chat_id: i64, user_ids: &[u64]) {
        if user_ids.is_empty() {
            return;
        }
        if let Some(mut joins) = self.entries.get_mut(&chat_id) {
            for record in joins.iter_mut() {
                if record.member.as_ref().is_some_and(|m| user_ids.contains(&m.id)) {
                    record.settled = true;
                }
            }
        }
    }

    /// Forget every join recorded for a chat. Returns how many were dropped.
    pub fn clear(&self, chat_id: i64) -> usize {
        self.entries
            .remove(&chat_id)
            .map(|(_, joins)| joins.len())
            .unwrap_or(0)
    }

    /// Coarse retention pass for one chat.
    pub fn prune_older_than(&self, chat_id: i64, now: Instant, max_age: Duration) -> usize {
        match self.entries.get_mut(&chat_id) {
            Some(mut joins) => trim_front(&mut joins, now, max_age),
            None => 0,
        }
    }

    /// Retention pass over every chat. Chats left empty are dropped.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant, max_age: Duration) -> usize {
        // Collect keys first, a shard guard from iter() must not be held while pruning
        let chats: Vec<i64> = self.entries.iter().map(|e| *e.key()).collect();
        let removed: usize = chats
            .into_iter()
            .map(|chat_id| self.prune_older_than(chat_id, now, max_age))
            .sum();
        self.entries.retain(|_, joins| !joins.is_empty());
        debug!("Ledger sweep removed {} entries, {} chats tracked", removed, self.entries.len());
        removed
    }

    /// Number of chats currently tracked.
    pub fn tracked_chats(&self) -> usize {
        self.entries.len()
    }
}

/// Pop entries with `t <= now - window`. Returns how many were removed.
fn trim_front(joins: &mut VecDeque<JoinRecord>, now: Instant, window: Duration) -> usize {
    // Before the process clock can represent `now - window`, nothing can be stale.
    let Some(cutoff) = now.checked_sub(window) else {
        return 0;
    };
    let before = joins.len();
    while joins.front().is_some_and(|r| r.at <= cutoff) {
        joins.pop_front();
    }
    before - joins.len()
}
