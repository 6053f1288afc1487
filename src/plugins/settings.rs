//! Settings plugin.
//!
//! `/settings` shows the current configuration with one toggle button per
//! boolean setting. Pressing a button flips the flag and edits the message in
//! place. The `/set*` commands change the numeric settings.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode, ReplyParameters};
use tracing::info;

use super::{command_args, reply_result};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::config::{RaidSettings, SharedSettings, Toggle};
use crate::error::{AntiRaidError, Result};
use crate::utils::{format_duration_full, parse_duration};

/// Callback data prefix of the toggle buttons.
pub const CALLBACK_PREFIX: &str = "settings:toggle:";

/// Handle /settings - show the settings with toggle buttons.
pub async fn settings_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let settings = state.raid.settings().snapshot();

    bot.send_message(msg.chat.id, render_settings(&settings))
        .parse_mode(ParseMode::Html)
        .reply_markup(settings_keyboard(&settings))
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;

    Ok(())
}

/// Handle a press on one of the toggle buttons.
pub async fn settings_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    if !state.is_admin(q.from.id.0) {
        bot.answer_callback_query(q.id)
            .text("Only bot admins can change settings.")
            .show_alert(true)
            .await?;
        return Ok(());
    }

    let toggle = match q.data.as_deref().map(parse_callback) {
        Some(Ok(toggle)) => toggle,
        _ => {
            bot.answer_callback_query(q.id).await?;
            return Ok(());
        }
    };

    let enabled = state.raid.settings().update(|s| s.toggle(toggle));
    info!("{} set {} to {}", q.from.id, toggle, enabled);
    let settings = state.raid.settings().snapshot();

    if let Some(message) = &q.message {
        bot.edit_message_text(message.chat().id, message.id(), render_settings(&settings))
            .parse_mode(ParseMode::Html)
            .reply_markup(settings_keyboard(&settings))
            .await?;
    }

    bot.answer_callback_query(q.id)
        .text(format!("{}: {}", toggle.label(), on_off(enabled)))
        .await?;
    Ok(())
}

/// Handle /toggle <flag>.
pub async fn toggle_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let result = apply_toggle(state.raid.settings(), &command_args(&msg));
    reply_result(&bot, &msg, result).await
}

/// Handle /setthreshold <n>.
pub async fn setthreshold_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let result = apply_threshold(state.raid.settings(), &command_args(&msg));
    reply_result(&bot, &msg, result).await
}

/// Handle /setwindow <secs>.
pub async fn setwindow_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let result = apply_window(state.raid.settings(), &command_args(&msg));
    reply_result(&bot, &msg, result).await
}

/// Handle /setbantime <duration>.
pub async fn setbantime_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let result = apply_ban_time(state.raid.settings(), &command_args(&msg));
    reply_result(&bot, &msg, result).await
}

/// Handle /setminage <days>.
pub async fn setminage_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let result = apply_min_age(state.raid.settings(), &command_args(&msg));
    reply_result(&bot, &msg, result).await
}

pub fn apply_toggle(settings: &SharedSettings, args: &[&str]) -> Result<String> {
    let toggle: Toggle = first_arg(args, "Usage: /toggle autodelete|username|photo|whitelist")?.parse()?;
    let enabled = settings.update(|s| s.toggle(toggle));
    info!("Setting {} toggled to {}", toggle, enabled);
    Ok(format!("✅ {}: <b>{}</b>", toggle.label(), on_off(enabled)))
}

pub fn apply_threshold(settings: &SharedSettings, args: &[&str]) -> Result<String> {
    let threshold: u32 = parse_number(first_arg(args, "Usage: /setthreshold <joins>")?)?;
    settings.try_update(|s| s.set_threshold(threshold))?;
    info!("Raid threshold set to {}", threshold);
    Ok(format!("✅ Raid threshold set to <b>{}</b> joins.", threshold))
}

pub fn apply_window(settings: &SharedSettings, args: &[&str]) -> Result<String> {
    let secs: u64 = parse_number(first_arg(args, "Usage: /setwindow <seconds>")?)?;
    settings.try_update(|s| s.set_window(secs))?;
    info!("Raid window set to {}s", secs);
    Ok(format!("✅ Raid window set to <b>{}</b> sec.", secs))
}

pub fn apply_ban_time(settings: &SharedSettings, args: &[&str]) -> Result<String> {
    let raw = first_arg(args, "Usage: /setbantime <duration> (e.g. 30m, 1d, 0 = forever)")?;
    let duration = parse_duration(raw)
        .ok_or_else(|| AntiRaidError::invalid(format!("Invalid duration '{}'. Try 30s, 10m, 1h, 1d or 0", raw)))?;

    let secs = duration.as_secs();
    settings.try_update(|s| s.set_ban_duration(secs))?;
    info!("Ban duration set to {}s", secs);
    Ok(format!("✅ Ban duration set to <b>{}</b>.", format_duration_full(secs)))
}

pub fn apply_min_age(settings: &SharedSettings, args: &[&str]) -> Result<String> {
    let days: u32 = parse_number(first_arg(args, "Usage: /setminage <days> (0 = off)")?)?;
    settings.update(|s| s.min_account_age_days = days);
    info!("Minimum account age set to {} days", days);
    if days == 0 {
        Ok("✅ Account age check disabled.".to_string())
    } else {
        Ok(format!("✅ Minimum account age set to <b>{}</b> days.", days))
    }
}

/// Settings overview.
pub fn render_settings(settings: &RaidSettings) -> String {
    let min_age = match settings.min_account_age_days {
        0 => "off".to_string(),
        days => format!("{} days", days),
    };
    let alert_ttl = match settings.alert_ttl_secs {
        0 => "never".to_string(),
        secs => format!("after {}", format_duration_full(secs)),
    };

    let mut text = format!(
        "⚙️ <b>Anti-raid settings</b>\n\n\
         Raid: <b>{}</b> joins in <b>{}</b> sec\n\
         Ban duration: <b>{}</b>\n\
         Minimum account age: <b>{}</b>\n\
         Alert deleted: <b>{}</b>\n",
        settings.raid_threshold,
        settings.time_window_secs,
        format_duration_full(settings.ban_duration_secs),
        min_age,
        alert_ttl
    );

    for toggle in Toggle::ALL {
        text.push_str(&format!("\n{} {}", mark(settings.flag(toggle)), toggle.label()));
        if toggle == Toggle::Whitelist {
            text.push_str(&format!(" ({} members)", settings.whitelist.len()));
        }
    }
    text
}

/// One toggle button per boolean setting.
pub fn settings_keyboard(settings: &RaidSettings) -> InlineKeyboardMarkup {
    let rows = Toggle::ALL
        .iter()
        .map(|&toggle| {
            vec![InlineKeyboardButton::callback(
                format!("{} {}", mark(settings.flag(toggle)), toggle.label()),
                format!("{}{}", CALLBACK_PREFIX, toggle.key()),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// Read the toggle out of a button's callback data.
pub fn parse_callback(data: &str) -> Result<Toggle> {
    data.strip_prefix(CALLBACK_PREFIX)
        .ok_or_else(|| AntiRaidError::invalid(format!("Unknown callback '{}'", data)))?
        .parse()
}

fn first_arg<'a>(args: &[&'a str], usage: &str) -> Result<&'a str> {
    args.first().copied().ok_or_else(|| AntiRaidError::invalid(usage))
}

fn parse_number<T: std::str::FromStr>(raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| AntiRaidError::invalid(format!("'{}' is not a valid number", raw)))
}

fn mark(enabled: bool) -> &'static str {
    if enabled { "✅" } else { "❌" }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
