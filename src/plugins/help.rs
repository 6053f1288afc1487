//! /help command plugin.

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use super::{Command, reply_html};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::utils::html_escape;

/// Handle the /help command.
pub async fn help_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let is_admin = msg.from.as_ref().is_some_and(|u| state.is_admin(u.id.0));
    reply_html(&bot, &msg, render_help(is_admin)).await
}

/// Command list, with a note for users who cannot run the admin commands.
pub fn render_help(is_admin: bool) -> String {
    let mut text = html_escape(&Command::descriptions().to_string());
    if !is_admin {
        text.push_str("\n\n<i>Only bot admins can change settings.</i>");
    }
    text
}
