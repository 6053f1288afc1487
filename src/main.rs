//! Antiraid - Telegram anti-raid bot
//!
//! Watches join events in group chats and bans mass-join raids before the
//! accounts can post anything.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration and runtime raid settings
//! - `raid` - Join ledger, member filter, heuristics, decision engine, actuator
//! - `cache` - Moka-backed caches (profile photo lookups)
//! - `bot` - Dispatcher, Telegram gateway, polling/webhook runners
//! - `plugins` - Admin command handlers
//! - `events` - Join event handler
//! - `utils` - Utility functions

mod bot;
mod cache;
mod config;
mod error;
mod events;
mod plugins;
mod raid;
mod utils;

use std::sync::Arc;

use teloxide::adaptors::throttle::Limits;
use teloxide::prelude::*;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use bot::{AppState, TelegramGateway};
use config::{Config, SharedSettings};
use raid::AntiRaid;
use raid::gateway::CachedProfileLookup;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file first (before anything else)
    dotenvy::dotenv().ok();

    // If RUST_LOG is not set, default to "info" level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("antiraid=info,teloxide=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting antiraid v{}...", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    log_banner(&config);

    // Throttle keeps alerts and bans inside Telegram's rate limits
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    let me = bot.get_me().await?;
    info!("Bot username: @{} (id {})", me.username(), me.id);

    let gateway = Arc::new(TelegramGateway::new(bot.clone()));
    let lookup = Arc::new(CachedProfileLookup::new(gateway.clone()));
    let raid = AntiRaid::new(
        me.id.0,
        config.admin_ids.clone(),
        SharedSettings::new(config.settings.clone()),
        gateway,
        lookup,
    );

    let housekeeping = bot::housekeeping::spawn(
        raid.ledger().clone(),
        config.housekeeping_interval,
        config.ledger_retention,
    );

    let state = AppState::new(raid, me.username().to_string());
    let dispatcher = bot::build_dispatcher(bot.clone(), state);

    let result = bot::run(&config, bot, dispatcher).await;
    housekeeping.abort();
    info!("Bot stopped");
    result
}

fn log_banner(config: &Config) {
    let s = &config.settings;
    info!("Bot mode: {:?}", config.bot_mode);
    info!(
        "Raid threshold: {} joins in {}s",
        s.raid_threshold, s.time_window_secs
    );
    info!(
        "Checks: username={}, photo={}, min_age={}d, ban_duration={}s",
        s.check_username, s.check_profile_photo, s.min_account_age_days, s.ban_duration_secs
    );
    info!(
        "Auto-delete join messages: {}, whitelist: {} ({} ids)",
        s.auto_delete_join_messages,
        s.whitelist_enabled,
        s.whitelist.len()
    );

    if config.admin_ids.is_empty() {
        warn!("No admin IDs configured (ADMIN_IDS is empty), admin commands are disabled");
    } else {
        info!("Bot admins: {:?}", config.admin_ids);
    }
}
