//! /clearhistory command plugin.

use teloxide::prelude::*;
use tracing::info;

use super::reply_html;
use crate::bot::dispatcher::{AppState, ThrottledBot};

/// Handle the /clearhistory command - forget this chat's recent joins.
pub async fn clearhistory_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let removed = state.raid.clear_history(msg.chat.id.0);
    info!("Join history of chat {} cleared ({} records)", msg.chat.id, removed);

    reply_html(
        &bot,
        &msg,
        format!("🧹 Join history cleared (<b>{}</b> records).", removed),
    )
    .await
}
