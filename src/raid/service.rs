//! The anti-raid service context.
//!
//! Owns the ledger and statistics and wires the pipeline together:
//! classify, admit into the ledger, decide, then actuate.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::actuator::{ActuationReport, ModerationActuator};
use super::engine::{self, DecisionPlan, RaidMode};
use super::filter::{self, Classification};
use super::gateway::{ModerationApi, ProfileLookup};
use super::heuristics::HeuristicEvaluator;
use super::ledger::EntryLedger;
use super::stats::BanStats;
use super::{JoinEvent, MemberRef};
use crate::config::{RaidSettings, SharedSettings};

/// Everything that happened for one join event.
#[derive(Debug)]
pub struct JoinOutcome {
    pub classification: Classification,
    pub plan: DecisionPlan,
    pub report: ActuationReport,
}

/// Shared anti-raid state, cheap to clone.
#[derive(Clone)]
pub struct AntiRaid {
    self_id: u64,
    admin_ids: Arc<HashSet<u64>>,
    settings: SharedSettings,
    ledger: EntryLedger,
    lookup: Arc<dyn ProfileLookup>,
    actuator: ModerationActuator,
}

impl AntiRaid {
    pub fn new(
        self_id: u64,
        admin_ids: HashSet<u64>,
        settings: SharedSettings,
        api: Arc<dyn ModerationApi>,
        lookup: Arc<dyn ProfileLookup>,
    ) -> Self {
        Self {
            self_id,
            admin_ids: Arc::new(admin_ids),
            settings,
            ledger: EntryLedger::new(),
            lookup,
            actuator: ModerationActuator::new(api, BanStats::new()),
        }
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    pub fn ledger(&self) -> &EntryLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &BanStats {
        self.actuator.stats()
    }

    /// Whether a user is one of the configured bot admins.
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Classify, record and decide. No platform side effects besides
    /// profile lookups.
    pub async fn plan(&self, event: &JoinEvent, settings: &RaidSettings) -> (Classification, DecisionPlan) {
        let classification = filter::classify(
            event,
            self.self_id,
            &self.admin_ids,
            &settings.whitelist,
            settings.whitelist_enabled,
        );

        if classification.candidates.is_empty() {
            return (
                classification,
                DecisionPlan::empty(event.chat_id, settings.time_window_secs),
            );
        }

        // The ledger guard is released before any lookup runs.
        let snapshot = self.ledger.admit(
            event.chat_id,
            event.observed_at,
            &classification.candidates,
            Duration::from_secs(settings.time_window_secs),
            settings.raid_threshold,
        );

        let targets = match snapshot.mode {
            RaidMode::Raid => {
                // Earlier joiners may have been whitelisted since they were recorded
                let backlog: Vec<MemberRef> = snapshot
                    .backlog
                    .iter()
                    .filter(|m| {
                        !filter::is_exempt(
                            m.id,
                            self.self_id,
                            &self.admin_ids,
                            &settings.whitelist,
                            settings.whitelist_enabled,
                        )
                    })
                    .cloned()
                    .collect();
                warn!(
                    "Raid detected in chat {}: {} joins in {}s, banning {} earlier and {} new members",
                    event.chat_id,
                    snapshot.recent_count,
                    settings.time_window_secs,
                    backlog.len(),
                    classification.candidates.len()
                );
                backlog
                    .into_iter()
                    .chain(classification.candidates.iter().cloned())
                    .collect()
            }
            RaidMode::Normal => classification.candidates.clone(),
        };

        let evaluator = HeuristicEvaluator::now();
        let decisions = engine::decide(snapshot.mode, targets, settings, &evaluator, self.lookup.as_ref()).await;

        if snapshot.mode == RaidMode::Normal {
            let banned: Vec<u64> = decisions.iter().filter(|d| d.should_ban).map(|d| d.member.id).collect();
            self.ledger.settle(event.chat_id, &banned);
        }

        let plan = DecisionPlan {
            chat_id: event.chat_id,
            mode: snapshot.mode,
            recent_count: snapshot.recent_count,
            window_secs: settings.time_window_secs,
            decisions,
        };
        (classification, plan)
    }

    /// Run the whole pipeline for one join event.
    pub async fn handle_join(&self, event: &JoinEvent) -> JoinOutcome {
        let settings = self.settings.snapshot();

        for member in &event.members {
            info!(
                "New member in {}: {} ({}){}",
                event.chat_title.as_deref().unwrap_or("chat"),
                member.handle(),
                member.display_name,
                if member.is_bot { " [bot]" } else { "" }
            );
        }

        let (classification, plan) = self.plan(event, &settings).await;
        if !classification.ignored.is_empty() {
            debug!(
                "Ignoring {} exempt members in chat {}",
                classification.ignored.len(),
                event.chat_id
            );
        }

        let report = self.actuator.apply(&plan, &settings, event.message_id).await;

        JoinOutcome {
            classification,
            plan,
            report,
        }
    }

    /// Admin reset of one chat's join history.
    pub fn clear_history(&self, chat_id: i64) -> usize {
        self.ledger.clear(chat_id)
    }

    /// Joins currently inside the window for a chat.
    pub fn recent_joins(&self, chat_id: i64) -> usize {
        let window = Duration::from_secs(self.settings.snapshot().time_window_secs);
        self.ledger.count_within_window(chat_id, Instant::now(), window)
    }
}
