//! /start command plugin.
//!
//! Describes what the bot does with the current settings.

use teloxide::prelude::*;

use super::reply_html;
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::config::RaidSettings;
use crate::utils::format_duration_full;

/// Handle the /start command.
pub async fn start_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let text = render_start(
        &state.raid.settings().snapshot(),
        env!("CARGO_PKG_VERSION"),
        &state.bot_username,
    );
    reply_html(&bot, &msg, text).await
}

/// Status text shown by /start.
pub fn render_start(settings: &RaidSettings, version: &str, bot_username: &str) -> String {
    let mut text = format!(
        "🛡 <b>Anti-raid bot</b> v{}\n\n\
         Raid mode: when <b>{}</b> or more members join within <b>{}</b> sec, \
         every one of them is banned.\n",
        version, settings.raid_threshold, settings.time_window_secs
    );

    if settings.any_check_enabled() {
        text.push_str("Outside a raid, new members without ");
        let mut checks = Vec::new();
        if settings.check_username {
            checks.push("a username".to_string());
        }
        if settings.check_profile_photo {
            checks.push("a profile photo".to_string());
        }
        if settings.min_account_age_days > 0 {
            checks.push(format!("{} days of account age", settings.min_account_age_days));
        }
        text.push_str(&checks.join(" or "));
        text.push_str(" are banned too.\n");
    } else {
        text.push_str("Outside a raid, new members are let in.\n");
    }

    text.push_str(&format!(
        "Ban duration: <b>{}</b>\n\nAdd @{} to a group as an admin with the ban and delete permissions. See /help.",
        format_duration_full(settings.ban_duration_secs),
        bot_username
    ));
    text
}
