//! Plugin system for command handlers.
//!
//! Add new plugins by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_plugin;` below
//! 3. Adding the handler to `command_handler()`

pub mod help;
pub mod history;
pub mod settings;
pub mod start;
pub mod stats;
pub mod whitelist;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};
use teloxide::utils::command::BotCommands;
use tracing::debug;

use crate::bot::dispatcher::{AppState, ThrottledBot};

/// All bot commands.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
pub enum Command {
    #[command(description = "Show the bot status")]
    Start,

    #[command(description = "Show this help")]
    Help,

    #[command(description = "Ban statistics for this chat")]
    Stats,

    #[command(description = "Show settings with toggle buttons")]
    Settings,

    #[command(description = "Flip a setting: autodelete, username, photo, whitelist")]
    Toggle,

    #[command(description = "Joins needed to trigger raid mode")]
    Setthreshold,

    #[command(description = "Raid window in seconds")]
    Setwindow,

    #[command(description = "Ban duration (30m, 1d, 0 = forever)")]
    Setbantime,

    #[command(description = "Minimum account age in days (0 = off)")]
    Setminage,

    #[command(description = "Forget recent joins in this chat")]
    Clearhistory,

    #[command(description = "Manage the whitelist: add|remove <id>, on|off|list")]
    Whitelist,
}

/// Build the combined command handler.
///
/// `/start` and `/help` are public, everything else needs a bot admin.
pub fn command_handler() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    let admin_commands = dptree::entry()
        .branch(case![Command::Stats].endpoint(stats::stats_command))
        .branch(case![Command::Settings].endpoint(settings::settings_command))
        .branch(case![Command::Toggle].endpoint(settings::toggle_command))
        .branch(case![Command::Setthreshold].endpoint(settings::setthreshold_command))
        .branch(case![Command::Setwindow].endpoint(settings::setwindow_command))
        .branch(case![Command::Setbantime].endpoint(settings::setbantime_command))
        .branch(case![Command::Setminage].endpoint(settings::setminage_command))
        .branch(case![Command::Clearhistory].endpoint(history::clearhistory_command))
        .branch(case![Command::Whitelist].endpoint(whitelist::whitelist_command));

    teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(start::start_command))
        .branch(case![Command::Help].endpoint(help::help_command))
        .branch(
            dptree::filter(|msg: Message, state: AppState| !sender_is_admin(&msg, &state))
                .endpoint(deny_command),
        )
        .branch(admin_commands)
}

/// Build the callback query handler.
pub fn callback_handler() -> UpdateHandler<anyhow::Error> {
    Update::filter_callback_query().branch(
        dptree::filter(|q: CallbackQuery| {
            q.data
                .as_deref()
                .is_some_and(|d| d.starts_with(settings::CALLBACK_PREFIX))
        })
        .endpoint(settings::settings_callback),
    )
}

fn sender_is_admin(msg: &Message, state: &AppState) -> bool {
    msg.from.as_ref().is_some_and(|u| state.is_admin(u.id.0))
}

async fn deny_command(bot: ThrottledBot, msg: Message) -> anyhow::Result<()> {
    debug!(
        "Refusing admin command from {:?} in chat {}",
        msg.from.as_ref().map(|u| u.id.0),
        msg.chat.id
    );
    reply_html(&bot, &msg, "⛔ Only bot admins can use this command.").await
}

/// Arguments after the command word.
pub(crate) fn command_args(msg: &Message) -> Vec<&str> {
    split_args(msg.text().unwrap_or(""))
}

fn split_args(text: &str) -> Vec<&str> {
    text.split_whitespace().skip(1).collect()
}

/// Reply to a message in HTML mode.
pub(crate) async fn reply_html(
    bot: &ThrottledBot,
    msg: &Message,
    text: impl Into<String>,
) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, text.into())
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

/// Reply with the command's result, or with the error message when it failed.
pub(crate) async fn reply_result(
    bot: &ThrottledBot,
    msg: &Message,
    result: crate::error::Result<String>,
) -> anyhow::Result<()> {
    let text = match result {
        Ok(text) => text,
        Err(e) => format!("⚠️ {}", crate::utils::html_escape(&e.to_string())),
    };
    reply_html(bot, msg, text).await
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::config::{RaidSettings, SharedSettings};
    use crate::raid::AntiRaid;
    use crate::raid::testing::FakePlatform;

    /// Service backed by an in-memory platform, with user 1 as admin.
    pub fn raid_with(settings: RaidSettings) -> (AntiRaid, Arc<FakePlatform>) {
        let platform = Arc::new(FakePlatform::default());
        let raid = AntiRaid::new(
            999,
            [1].into_iter().collect(),
            SharedSettings::new(settings),
            platform.clone(),
            platform.clone(),
        );
        (raid, platform)
    }
}
