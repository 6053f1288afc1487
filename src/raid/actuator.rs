//! Executes a [`DecisionPlan`] against the platform.
//!
//! Every side effect is isolated: a failed ban only affects that member, and
//! the alert and join-message delete are best effort. Their results are
//! reported back instead of being dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use super::engine::{DecisionPlan, RaidMode};
use super::gateway::ModerationApi;
use super::stats::BanStats;
use crate::config::RaidSettings;

/// Result of a best-effort side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Done,
    Skipped,
    IgnoredFailure(String),
}

/// What actually happened while applying a plan.
#[derive(Debug, Default)]
pub struct ActuationReport {
    pub banned: Vec<u64>,
    pub failed: Vec<(u64, String)>,
    pub alert: Option<ActionOutcome>,
    pub join_message: Option<ActionOutcome>,
    /// Pending self-delete of the raid alert. Abort it to keep the alert.
    pub alert_cleanup: Option<AbortHandle>,
}

/// A raid alert that is still on screen, waiting for its self-delete.
#[derive(Debug)]
struct LiveAlert {
    message_id: i32,
    banned: usize,
    cleanup: AbortHandle,
}

/// Applies moderation decisions and keeps ban statistics.
#[derive(Clone)]
pub struct ModerationActuator {
    api: Arc<dyn ModerationApi>,
    stats: BanStats,
    alerts: Arc<DashMap<i64, LiveAlert>>,
}

impl ModerationActuator {
    pub fn new(api: Arc<dyn ModerationApi>, stats: BanStats) -> Self {
        Self {
            api,
            stats,
            alerts: Arc::new(DashMap::new()),
        }
    }

    pub fn stats(&self) -> &BanStats {
        &self.stats
    }

    /// Ban, alert and clean up for one join event.
    pub async fn apply(
        &self,
        plan: &DecisionPlan,
        settings: &RaidSettings,
        join_message: Option<i32>,
    ) -> ActuationReport {
        let mut report = ActuationReport::default();
        let chat_id = plan.chat_id;

        let until = ban_expiry(Utc::now(), settings.ban_duration_secs);

        for decision in plan.bans() {
            let member = &decision.member;
            match self.api.ban_member(chat_id, member.id, true, until).await {
                Ok(()) => {
                    self.stats.record_ban(chat_id);
                    report.banned.push(member.id);
                    let reasons: Vec<String> = decision.reasons.iter().map(ToString::to_string).collect();
                    info!("Banned {} in chat {} ({})", member.handle(), chat_id, reasons.join(", "));
                }
                Err(e) => {
                    warn!("Failed to ban {} in chat {}: {}", member.handle(), chat_id, e);
                    report.failed.push((member.id, e.to_string()));
                }
            }
        }

        if plan.mode == RaidMode::Raid {
            let (outcome, cleanup) = self.alert(plan, settings, report.banned.len()).await;
            report.alert = Some(outcome);
            report.alert_cleanup = cleanup;
        }

        report.join_message = Some(match join_message {
            Some(message_id) if settings.auto_delete_join_messages => {
                match self.api.delete_message(chat_id, message_id).await {
                    Ok(()) => ActionOutcome::Done,
                    Err(e) => {
                        debug!("Failed to delete join message {} in chat {}: {}", message_id, chat_id, e);
                        ActionOutcome::IgnoredFailure(e.to_string())
                    }
                }
            }
            _ => ActionOutcome::Skipped,
        });

        report
    }

    /// Post the raid alert, or update the one still on screen for this chat.
    async fn alert(
        &self,
        plan: &DecisionPlan,
        settings: &RaidSettings,
        banned: usize,
    ) -> (ActionOutcome, Option<AbortHandle>) {
        let chat_id = plan.chat_id;
        let ttl = Duration::from_secs(settings.alert_ttl_secs);

        let live = self.alerts.get(&chat_id).map(|a| (a.message_id, a.banned));
        if let Some((message_id, already_banned)) = live
            && !ttl.is_zero()
        {
            let total = already_banned + banned;
            let text = format_alert(total, plan.recent_count, plan.window_secs);
            match self.api.edit_message(chat_id, message_id, &text).await {
                Ok(()) => {
                    let cleanup = self.schedule_delete(chat_id, message_id, ttl);
                    self.track(chat_id, message_id, total, cleanup.abort_handle());
                    return (ActionOutcome::Done, Some(cleanup.abort_handle()));
                }
                Err(e) => {
                    debug!("Could not update raid alert in chat {}, sending a new one: {}", chat_id, e);
                    if let Some((_, stale)) = self.alerts.remove(&chat_id) {
                        stale.cleanup.abort();
                    }
                }
            }
        }

        let text = format_alert(banned, plan.recent_count, plan.window_secs);
        match self.api.send_message(chat_id, &text).await {
            Ok(message_id) => {
                if ttl.is_zero() {
                    return (ActionOutcome::Done, None);
                }
                let cleanup = self.schedule_delete(chat_id, message_id, ttl);
                self.track(chat_id, message_id, banned, cleanup.abort_handle());
                (ActionOutcome::Done, Some(cleanup.abort_handle()))
            }
            Err(e) => {
                warn!("Failed to send raid alert in chat {}: {}", chat_id, e);
                (ActionOutcome::IgnoredFailure(e.to_string()), None)
            }
        }
    }

    /// Remember the alert on screen, cancelling the previous self-delete.
    fn track(&self, chat_id: i64, message_id: i32, banned: usize, cleanup: AbortHandle) {
        let previous = self.alerts.insert(
            chat_id,
            LiveAlert {
                message_id,
                banned,
                cleanup,
            },
        );
        if let Some(previous) = previous {
            previous.cleanup.abort();
        }
    }

    /// Delete an alert after `delay` without blocking the caller.
    fn schedule_delete(&self, chat_id: i64, message_id: i32, delay: Duration) -> JoinHandle<()> {
        let api = Arc::clone(&self.api);
        let alerts = Arc::clone(&self.alerts);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            alerts.remove_if(&chat_id, |_, a| a.message_id == message_id);
            if let Err(e) = api.delete_message(chat_id, message_id).await {
                debug!("Failed to delete raid alert {} in chat {}: {}", message_id, chat_id, e);
            }
        })
    }
}

/// When a ban of `secs` seconds ends. `None` is permanent, which is also what
/// an out-of-range duration degrades to.
fn ban_expiry(now: DateTime<Utc>, secs: u64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    let delta = chrono::Duration::try_seconds(i64::try_from(secs).ok()?)?;
    now.checked_add_signed(delta)
}

/// Raid alert text (HTML).
pub fn format_alert(banned: usize, recent_count: usize, window_secs: u64) -> String {
    format!(
        "🛡 <b>Raid detected!</b>\n\n{} joins in {} sec.\nBanned: <b>{}</b>",
        recent_count,
        window_secs,
        banned
    )
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeSet, HashSet};

    use super::*;
    use crate::raid::engine::{BanReason, Decision};
    use crate::raid::testing::{FakePlatform, member};

    fn plan(mode: RaidMode, bans: &[(u64, bool)]) -> DecisionPlan {
        DecisionPlan {
            chat_id: -100,
            mode,
            recent_count: bans.len(),
            window_secs: 1,
            decisions: bans
                .iter()
                .map(|&(id, should_ban)| Decision {
                    member: member(id, None),
                    should_ban,
                    reasons: BTreeSet::from([BanReason::RaidBurst]),
                })
                .collect(),
        }
    }

    fn actuator(platform: Arc<FakePlatform>) -> ModerationActuator {
        ModerationActuator::new(platform, BanStats::new())
    }

    #[tokio::test]
    async fn test_bans_only_marked_members() {
        let platform = Arc::new(FakePlatform::default());
        let act = actuator(platform.clone());

        let report = act
            .apply(&plan(RaidMode::Normal, &[(1, true), (2, false)]), &RaidSettings::default(), None)
            .await;

        assert_eq!(report.banned, vec![1]);
        assert_eq!(platform.banned_ids(), vec![1]);
        assert!(platform.bans.lock()[0].revoke_messages);
        assert_eq!(platform.bans.lock()[0].until, None);
        assert_eq!(report.alert, None);
        assert_eq!(act.stats().get(-100), 1);
    }

    #[tokio::test]
    async fn test_ban_failure_does_not_stop_batch() {
        let platform = Arc::new(FakePlatform {
            failing_bans: HashSet::from([2]),
            ..Default::default()
        });
        let act = actuator(platform.clone());

        let report = act
            .apply(&plan(RaidMode::Raid, &[(1, true), (2, true), (3, true)]), &RaidSettings::default(), None)
            .await;

        assert_eq!(report.banned, vec![1, 3]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert_eq!(act.stats().get(-100), 2);
        assert_eq!(report.alert, Some(ActionOutcome::Done));
        let sent = platform.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Banned: <b>2</b>"));
    }

    #[tokio::test]
    async fn test_temporary_ban_sets_expiry() {
        let platform = Arc::new(FakePlatform::default());
        let settings = RaidSettings {
            ban_duration_secs: 3600,
            ..Default::default()
        };

        actuator(platform.clone())
            .apply(&plan(RaidMode::Normal, &[(1, true)]), &settings, None)
            .await;

        let until = platform.bans.lock()[0].until.expect("temporary ban");
        let remaining = until - Utc::now();
        assert!(remaining.num_seconds() > 3500 && remaining.num_seconds() <= 3600);
    }

    #[tokio::test]
    async fn test_out_of_range_ban_duration_bans_permanently() {
        let platform = Arc::new(FakePlatform::default());
        let settings = RaidSettings {
            ban_duration_secs: u64::MAX,
            ..Default::default()
        };

        let report = actuator(platform.clone())
            .apply(&plan(RaidMode::Normal, &[(1, true)]), &settings, None)
            .await;

        assert_eq!(report.banned, vec![1]);
        assert_eq!(platform.bans.lock()[0].until, None);
    }

    #[test]
    fn test_ban_expiry() {
        let now = Utc::now();
        assert_eq!(ban_expiry(now, 0), None);
        assert_eq!(ban_expiry(now, 60), Some(now + chrono::Duration::seconds(60)));
        assert_eq!(ban_expiry(now, 60_480_000_000_000_000), None);
        assert_eq!(ban_expiry(now, u64::MAX), None);
    }

    #[tokio::test]
    async fn test_best_effort_failures_are_reported() {
        let platform = Arc::new(FakePlatform {
            fail_send: true,
            fail_delete: true,
            ..Default::default()
        });

        let report = actuator(platform.clone())
            .apply(&plan(RaidMode::Raid, &[(1, true)]), &RaidSettings::default(), Some(77))
            .await;

        assert_eq!(report.banned, vec![1]);
        assert!(matches!(report.alert, Some(ActionOutcome::IgnoredFailure(_))));
        assert!(matches!(report.join_message, Some(ActionOutcome::IgnoredFailure(_))));
        assert!(report.alert_cleanup.is_none());
    }

    #[tokio::test]
    async fn test_join_message_delete_follows_setting() {
        let platform = Arc::new(FakePlatform::default());
        let act = actuator(platform.clone());

        let report = act.apply(&plan(RaidMode::Normal, &[]), &RaidSettings::default(), Some(77)).await;
        assert_eq!(report.join_message, Some(ActionOutcome::Done));
        assert_eq!(*platform.deleted.lock(), vec![(-100, 77)]);

        let settings = RaidSettings {
            auto_delete_join_messages: false,
            ..Default::default()
        };
        let report = act.apply(&plan(RaidMode::Normal, &[]), &settings, Some(78)).await;
        assert_eq!(report.join_message, Some(ActionOutcome::Skipped));
        assert_eq!(platform.deleted.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_deletes_itself_after_ttl() {
        let platform = Arc::new(FakePlatform::default());
        let settings = RaidSettings {
            auto_delete_join_messages: false,
            alert_ttl_secs: 30,
            ..Default::default()
        };

        let report = actuator(platform.clone())
            .apply(&plan(RaidMode::Raid, &[(1, true)]), &settings, None)
            .await;
        assert!(report.alert_cleanup.is_some());
        assert!(platform.deleted.lock().is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert_eq!(*platform.deleted.lock(), vec![(-100, 5000)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ongoing_raid_updates_the_live_alert() {
        let platform = Arc::new(FakePlatform::default());
        let act = actuator(platform.clone());
        let settings = RaidSettings {
            auto_delete_join_messages: false,
            ..Default::default()
        };

        act.apply(&plan(RaidMode::Raid, &[(1, true), (2, true)]), &settings, None).await;
        let report = act.apply(&plan(RaidMode::Raid, &[(3, true)]), &settings, None).await;

        assert_eq!(report.alert, Some(ActionOutcome::Done));
        assert_eq!(platform.sent.lock().len(), 1);
        let edited = platform.edited.lock();
        assert_eq!(edited.len(), 1);
        assert_eq!(edited[0].1, 5000);
        assert!(edited[0].2.contains("Banned: <b>3</b>"));
        drop(edited);

        // Once the alert is gone, the next raid posts a fresh one.
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        act.apply(&plan(RaidMode::Raid, &[(4, true)]), &settings, None).await;
        assert_eq!(platform.sent.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_alert_without_ttl_is_kept() {
        let platform = Arc::new(FakePlatform::default());
        let act = actuator(platform.clone());
        let settings = RaidSettings {
            alert_ttl_secs: 0,
            ..Default::default()
        };

        let report = act.apply(&plan(RaidMode::Raid, &[(1, true)]), &settings, None).await;
        assert_eq!(report.alert, Some(ActionOutcome::Done));
        assert!(report.alert_cleanup.is_none());

        act.apply(&plan(RaidMode::Raid, &[(2, true)]), &settings, None).await;
        assert_eq!(platform.sent.lock().len(), 2);
        assert!(platform.edited.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_alert_cleanup_can_be_cancelled() {
        let platform = Arc::new(FakePlatform::default());
        let settings = RaidSettings {
            auto_delete_join_messages: false,
            ..Default::default()
        };

        let report = actuator(platform.clone())
            .apply(&plan(RaidMode::Raid, &[(1, true)]), &settings, None)
            .await;
        report.alert_cleanup.expect("cleanup scheduled").abort();

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(platform.deleted.lock().is_empty());
    }
}
