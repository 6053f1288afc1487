//! Raid decision engine.
//!
//! Stateless: given the window count, the candidates and a settings snapshot
//! it produces a [`DecisionPlan`]. No side effects happen here.

use std::collections::BTreeSet;
use std::fmt;

use futures::future::join_all;

use super::MemberRef;
use super::gateway::ProfileLookup;
use super::heuristics::{CheckName, HeuristicEvaluator};
use crate::config::RaidSettings;

/// How a join event is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaidMode {
    /// Window count reached the threshold: ban every candidate.
    Raid,
    /// Only candidates failing an enabled check are banned.
    Normal,
}

impl RaidMode {
    /// The threshold is an inclusive lower bound.
    pub fn from_count(recent_count: usize, threshold: u32) -> Self {
        if recent_count >= threshold as usize {
            Self::Raid
        } else {
            Self::Normal
        }
    }
}

/// Why a member is banned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BanReason {
    RaidBurst,
    FailedCheck(CheckName),
}

impl fmt::Display for BanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaidBurst => f.write_str("raid"),
            Self::FailedCheck(check) => write!(f, "{}", check),
        }
    }
}

/// Decision for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub member: MemberRef,
    pub should_ban: bool,
    pub reasons: BTreeSet<BanReason>,
}

/// Everything the actuator needs to moderate one join event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionPlan {
    pub chat_id: i64,
    pub mode: RaidMode,
    pub recent_count: usize,
    pub window_secs: u64,
    pub decisions: Vec<Decision>,
}

impl DecisionPlan {
    /// A plan that bans nobody (no candidates in the event).
    pub fn empty(chat_id: i64, window_secs: u64) -> Self {
        Self {
            chat_id,
            mode: RaidMode::Normal,
            recent_count: 0,
            window_secs,
            decisions: Vec::new(),
        }
    }

    pub fn bans(&self) -> impl Iterator<Item = &Decision> {
        self.decisions.iter().filter(|d| d.should_ban)
    }
}

/// Decide what happens to each candidate.
///
/// In normal mode the candidates are evaluated concurrently; the result keeps
/// arrival order either way.
pub async fn decide(
    mode: RaidMode,
    candidates: Vec<MemberRef>,
    settings: &RaidSettings,
    evaluator: &HeuristicEvaluator,
    lookup: &dyn ProfileLookup,
) -> Vec<Decision> {
    match mode {
        RaidMode::Raid => candidates
            .into_iter()
            .map(|member| Decision {
                member,
                should_ban: true,
                reasons: BTreeSet::from([BanReason::RaidBurst]),
            })
            .collect(),
        RaidMode::Normal => {
            if !settings.any_check_enabled() {
                return candidates
                    .into_iter()
                    .map(|member| Decision {
                        member,
                        should_ban: false,
                        reasons: BTreeSet::new(),
                    })
                    .collect();
            }

            let evaluations =
                join_all(candidates.iter().map(|m| evaluator.evaluate(m, settings, lookup))).await;

            candidates
                .into_iter()
                .zip(evaluations)
                .map(|(member, eval)| Decision {
                    member,
                    should_ban: !eval.passed(),
                    reasons: eval
                        .failed_checks
                        .into_iter()
                        .map(BanReason::FailedCheck)
                        .collect(),
                })
                .collect()
        }
    }
}
