//! Join guard.
//!
//! Turns `new_chat_members` service messages into [`JoinEvent`]s and runs
//! them through the raid pipeline.

use std::time::Instant;

use teloxide::prelude::*;
use teloxide::types::User;
use tracing::{debug, error, info, warn};

use crate::bot::dispatcher::AppState;
use crate::raid::service::JoinOutcome;
use crate::raid::{ActionOutcome, JoinEvent, MemberRef};

/// Handle a join service message.
///
/// Never fails: anything that goes wrong is logged with the chat so the
/// dispatcher keeps serving other updates.
pub async fn join_guard(msg: Message, state: AppState) -> anyhow::Result<()> {
    let Some(users) = msg.new_chat_members() else {
        return Ok(());
    };

    let event = join_event(
        msg.chat.id.0,
        msg.chat.title(),
        Some(msg.id.0),
        users,
        Instant::now(),
    );
    let chat_id = event.chat_id;

    let raid = state.raid.clone();
    // A panic inside the pipeline stays inside this task
    match tokio::spawn(async move { raid.handle_join(&event).await }).await {
        Ok(outcome) => log_outcome(chat_id, &outcome),
        Err(e) => error!("Join handling failed in chat {}: {}", chat_id, e),
    }

    Ok(())
}

/// Build a [`JoinEvent`] from the users of one service message.
pub fn join_event(
    chat_id: i64,
    chat_title: Option<&str>,
    message_id: Option<i32>,
    users: &[User],
    observed_at: Instant,
) -> JoinEvent {
    JoinEvent {
        chat_id,
        chat_title: chat_title.map(str::to_string),
        message_id,
        members: users.iter().map(member_ref).collect(),
        observed_at,
    }
}

fn member_ref(user: &User) -> MemberRef {
    MemberRef {
        id: user.id.0,
        display_name: user.full_name(),
        username: user.username.clone(),
        is_bot: user.is_bot,
    }
}

fn log_outcome(chat_id: i64, outcome: &JoinOutcome) {
    let report = &outcome.report;

    if !report.banned.is_empty() || !report.failed.is_empty() {
        info!(
            "Chat {} ({:?} mode, {} recent joins): banned {}, failed {}",
            chat_id,
            outcome.plan.mode,
            outcome.plan.recent_count,
            report.banned.len(),
            report.failed.len()
        );
    }

    for (user_id, reason) in &report.failed {
        debug!("Ban of {} in chat {} failed: {}", user_id, chat_id, reason);
    }

    match &report.alert {
        Some(ActionOutcome::IgnoredFailure(reason)) => {
            warn!("Raid alert in chat {} not sent: {}", chat_id, reason)
        }
        Some(ActionOutcome::Done) if report.alert_cleanup.is_some() => {
            debug!("Raid alert in chat {} will delete itself", chat_id)
        }
        _ => {}
    }

    if let Some(ActionOutcome::IgnoredFailure(reason)) = &report.join_message {
        debug!("Join message in chat {} not deleted: {}", chat_id, reason);
    }

    if outcome.plan.decisions.is_empty() && !outcome.classification.ignored.is_empty() {
        debug!(
            "Chat {}: all {} new members exempt",
            chat_id,
            outcome.classification.ignored.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use teloxide::types::UserId;

    use super::*;

    fn user(id: u64, first: &str, last: Option<&str>, username: Option<&str>) -> User {
        User {
            id: UserId(id),
            is_bot: false,
            first_name: first.to_string(),
            last_name: last.map(str::to_string),
            username: username.map(str::to_string),
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn test_join_event_keeps_order_and_names() {
        let users = vec![
            user(1, "Ann", Some("Lee"), Some("ann")),
            user(2, "Bob", None, None),
        ];
        let now = Instant::now();

        let event = join_event(-100, Some("Group"), Some(77), &users, now);

        assert_eq!(event.chat_id, -100);
        assert_eq!(event.chat_title.as_deref(), Some("Group"));
        assert_eq!(event.message_id, Some(77));
        assert_eq!(event.observed_at, now);
        assert_eq!(event.members.len(), 2);
        assert_eq!(event.members[0].display_name, "Ann Lee");
        assert_eq!(event.members[0].handle(), "@ann");
        assert_eq!(event.members[1].handle(), "ID:2");
        assert!(!event.members[1].is_bot);
    }
}
