//! Raid detection and moderation core.
//!
//! A join event flows through two pure stages and one side-effecting stage:
//!
//! - `filter` - drop the bot itself, admins and whitelisted members
//! - `ledger` + `engine` - record candidates, count the window, pick a mode and
//!   build a [`DecisionPlan`]
//! - `actuator` - ban, alert and delete through a [`ModerationApi`]
//!
//! Everything is wired together by [`AntiRaid`].

pub mod actuator;
pub mod engine;
pub mod filter;
pub mod gateway;
pub mod heuristics;
pub mod ledger;
pub mod service;
pub mod stats;

use std::time::Instant;

pub use actuator::{ActionOutcome, ActuationReport, ModerationActuator};
pub use engine::{BanReason, Decision, DecisionPlan, RaidMode};
pub use filter::Classification;
pub use gateway::{ModerationApi, ProfileLookup};
pub use heuristics::{CheckName, Evaluation, HeuristicEvaluator};
pub use ledger::EntryLedger;
pub use service::AntiRaid;
pub use stats::BanStats;

/// A member taking part in a join event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub id: u64,
    pub display_name: String,
    pub username: Option<String>,
    pub is_bot: bool,
}

impl MemberRef {
    /// `@username` when available, `ID:<id>` otherwise.
    pub fn handle(&self) -> String {
        match &self.username {
            Some(u) => format!("@{}", u),
            None => format!("ID:{}", self.id),
        }
    }
}

/// One platform notification about members joining a chat.
#[derive(Debug, Clone)]
pub struct JoinEvent {
    pub chat_id: i64,
    pub chat_title: Option<String>,
    /// The "joined the group" service message, if there is one to delete.
    pub message_id: Option<i32>,
    pub members: Vec<MemberRef>,
    pub observed_at: Instant,
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the raid tests.

    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicI32, Ordering};

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;

    use super::*;
    use crate::error::{AntiRaidError, Result};

    pub fn member(id: u64, username: Option<&str>) -> MemberRef {
        MemberRef {
            id,
            display_name: format!("User {}", id),
            username: username.map(str::to_string),
            is_bot: false,
        }
    }

    pub fn event(chat_id: i64, members: Vec<MemberRef>, observed_at: Instant) -> JoinEvent {
        JoinEvent {
            chat_id,
            chat_title: Some("Test chat".to_string()),
            message_id: Some(1000),
            members,
            observed_at,
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct BanCall {
        pub chat_id: i64,
        pub user_id: u64,
        pub revoke_messages: bool,
        pub until: Option<DateTime<Utc>>,
    }

    /// In-memory platform that records every call.
    #[derive(Default)]
    pub struct FakePlatform {
        pub bans: Mutex<Vec<BanCall>>,
        pub sent: Mutex<Vec<(i64, String)>>,
        pub deleted: Mutex<Vec<(i64, i32)>>,
        pub edited: Mutex<Vec<(i64, i32, String)>>,
        pub failing_bans: HashSet<u64>,
        pub fail_send: bool,
        pub fail_delete: bool,
        pub photos: HashMap<u64, u32>,
        pub failing_lookups: HashSet<u64>,
        pub lookups: Mutex<Vec<u64>>,
        pub next_message_id: AtomicI32,
    }

    impl FakePlatform {
        pub fn banned_ids(&self) -> Vec<u64> {
            self.bans.lock().iter().map(|b| b.user_id).collect()
        }
    }

    #[async_trait]
    impl ModerationApi for FakePlatform {
        async fn ban_member(
            &self,
            chat_id: i64,
            user_id: u64,
            revoke_messages: bool,
            until: Option<DateTime<Utc>>,
        ) -> Result<()> {
            if self.failing_bans.contains(&user_id) {
                return Err(AntiRaidError::Platform("not enough rights".to_string()));
            }
            self.bans.lock().push(BanCall {
                chat_id,
                user_id,
                revoke_messages,
                until,
            });
            Ok(())
        }

        async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
            if self.fail_delete {
                return Err(AntiRaidError::Platform("message to delete not found".to_string()));
            }
            self.deleted.lock().push((chat_id, message_id));
            Ok(())
        }

        async fn send_message(&self, chat_id: i64, text: &str) -> Result<i32> {
            if self.fail_send {
                return Err(AntiRaidError::Platform("chat not found".to_string()));
            }
            self.sent.lock().push((chat_id, text.to_string()));
            Ok(5000 + self.next_message_id.fetch_add(1, Ordering::SeqCst))
        }

        async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()> {
            self.edited.lock().push((chat_id, message_id, text.to_string()));
            Ok(())
        }
    }

    #[async_trait]
    impl ProfileLookup for FakePlatform {
        async fn profile_photo_count(&self, user_id: u64) -> Result<u32> {
            self.lookups.lock().push(user_id);
            if self.failing_lookups.contains(&user_id) {
                return Err(AntiRaidError::Platform("timed out".to_string()));
            }
            Ok(self.photos.get(&user_id).copied().unwrap_or(0))
        }
    }
}
