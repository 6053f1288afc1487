//! /stats command plugin.

use teloxide::prelude::*;

use super::reply_html;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::raid::AntiRaid;

/// Handle the /stats command.
pub async fn stats_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    reply_html(&bot, &msg, render_stats(&state.raid, msg.chat.id.0)).await
}

/// Ban counters for one chat plus the process-wide totals.
pub fn render_stats(raid: &AntiRaid, chat_id: i64) -> String {
    let settings = raid.settings().snapshot();
    format!(
        "📊 <b>Anti-raid statistics</b>\n\n\
         Banned in this chat: <b>{}</b>\n\
         Banned in all chats: <b>{}</b>\n\
         Joins in the last {} sec: <b>{}</b>\n\
         Chats tracked: <b>{}</b>",
        raid.stats().get(chat_id),
        raid.stats().total(),
        settings.time_window_secs,
        raid.recent_joins(chat_id),
        raid.ledger().tracked_chats()
    )
}
