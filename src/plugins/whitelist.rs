//! /whitelist command plugin.
//!
//! `/whitelist add <id>`, `/whitelist remove <id>`, `/whitelist on|off` and
//! `/whitelist list` (also the default with no arguments).

use teloxide::prelude::*;
use tracing::info;

use super::{command_args, reply_result};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::config::SharedSettings;
use crate::error::{AntiRaidError, Result};
use crate::utils::parse_user_id;

const USAGE: &str = "Usage: /whitelist add|remove <user id>, /whitelist on|off, /whitelist list";

/// Handle the /whitelist command.
pub async fn whitelist_command(bot: ThrottledBot, msg: Message, state: AppState) -> anyhow::Result<()> {
    let result = apply_whitelist(state.raid.settings(), &command_args(&msg));
    reply_result(&bot, &msg, result).await
}

pub fn apply_whitelist(settings: &SharedSettings, args: &[&str]) -> Result<String> {
    let action = args.first().map(|a| a.to_lowercase());

    match action.as_deref() {
        None | Some("list") => Ok(render_list(settings)),
        Some("add") => {
            let user_id = parse_user_id(args.get(1).copied())?;
            let added = settings.update(|s| s.whitelist.insert(user_id));
            info!("Whitelist add {} (new: {})", user_id, added);
            if added {
                Ok(format!("✅ <code>{}</code> added to the whitelist.", user_id))
            } else {
                Ok(format!("<code>{}</code> is already whitelisted.", user_id))
            }
        }
        Some("remove") | Some("rm") | Some("del") => {
            let user_id = parse_user_id(args.get(1).copied())?;
            let removed = settings.update(|s| s.whitelist.remove(&user_id));
            info!("Whitelist remove {} (found: {})", user_id, removed);
            if removed {
                Ok(format!("✅ <code>{}</code> removed from the whitelist.", user_id))
            } else {
                Ok(format!("<code>{}</code> is not whitelisted.", user_id))
            }
        }
        Some("on") | Some("enable") => {
            settings.update(|s| s.whitelist_enabled = true);
            Ok("✅ Whitelist enabled.".to_string())
        }
        Some("off") | Some("disable") => {
            settings.update(|s| s.whitelist_enabled = false);
            Ok("✅ Whitelist disabled.".to_string())
        }
        Some(_) => Err(AntiRaidError::invalid(USAGE)),
    }
}

fn render_list(settings: &SharedSettings) -> String {
    let snapshot = settings.snapshot();
    let status = if snapshot.whitelist_enabled { "enabled" } else { "disabled" };

    if snapshot.whitelist.is_empty() {
        return format!("📋 Whitelist ({}) is empty.", status);
    }

    let entries = snapshot
        .whitelist
        .iter()
        .map(|id| format!("• <code>{}</code>", id))
        .collect::<Vec<_>>()
        .join("\n");
    format!("📋 <b>Whitelist</b> ({}):\n{}", status, entries)
}
