//! Configuration module for the anti-raid bot.
//!
//! Loads configuration from environment variables.

pub mod settings;

use std::collections::{BTreeSet, HashSet};
use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{AntiRaidError, Result};

pub use settings::{MAX_WINDOW_SECS, RaidSettings, SharedSettings, Toggle};

/// Bot running mode
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Polling,
    Webhook,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub bot_token: String,
    pub bot_mode: BotMode,
    pub webhook_url: Option<String>,
    pub webhook_port: u16,
    pub webhook_secret: Option<String>,

    /// Admin user IDs (comma-separated).
    /// Never moderated, and the only users allowed to run commands.
    pub admin_ids: HashSet<u64>,

    /// Initial raid settings.
    pub settings: RaidSettings,

    /// How long join timestamps are kept by the housekeeping sweep.
    pub ledger_retention: Duration,

    /// How often the housekeeping sweep runs.
    pub housekeeping_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails if `BOT_TOKEN` is missing or webhook mode lacks a URL.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AntiRaidError::Config("BOT_TOKEN must be set".to_string()))?;

        let bot_mode = match lookup("BOT_MODE")
            .unwrap_or_else(|| "polling".to_string())
            .to_lowercase()
            .as_str()
        {
            "webhook" => BotMode::Webhook,
            _ => BotMode::Polling,
        };

        let webhook_url = lookup("WEBHOOK_URL").filter(|s| !s.trim().is_empty());
        if bot_mode == BotMode::Webhook && webhook_url.is_none() {
            return Err(AntiRaidError::Config(
                "WEBHOOK_URL must be set when BOT_MODE is webhook".to_string(),
            ));
        }

        let defaults = RaidSettings::default();
        let mut settings = RaidSettings {
            raid_threshold: parse_or(&lookup, "RAID_THRESHOLD", defaults.raid_threshold),
            time_window_secs: parse_or(&lookup, "TIME_WINDOW", defaults.time_window_secs),
            auto_delete_join_messages: flag_or(
                &lookup,
                "AUTO_DELETE_JOIN_MESSAGES",
                defaults.auto_delete_join_messages,
            ),
            check_username: flag_or(&lookup, "CHECK_USERNAME", defaults.check_username),
            check_profile_photo: flag_or(&lookup, "CHECK_PROFILE_PHOTO", defaults.check_profile_photo),
            min_account_age_days: parse_or(&lookup, "MIN_ACCOUNT_AGE_DAYS", defaults.min_account_age_days),
            ban_duration_secs: parse_or(&lookup, "BAN_DURATION_SECS", defaults.ban_duration_secs),
            whitelist_enabled: flag_or(&lookup, "WHITELIST_ENABLED", defaults.whitelist_enabled),
            whitelist: lookup("WHITELIST_IDS")
                .map(|raw| parse_ids(&raw).into_iter().collect::<BTreeSet<_>>())
                .unwrap_or_default(),
            alert_ttl_secs: parse_or(&lookup, "ALERT_TTL_SECS", defaults.alert_ttl_secs),
        };

        if settings.set_threshold(settings.raid_threshold).is_err() {
            warn!("RAID_THRESHOLD must be at least 1, using {}", defaults.raid_threshold);
            settings.raid_threshold = defaults.raid_threshold;
        }
        if settings.set_window(settings.time_window_secs).is_err() {
            warn!("TIME_WINDOW out of range, using {}", defaults.time_window_secs);
            settings.time_window_secs = defaults.time_window_secs;
        }
        if settings.set_ban_duration(settings.ban_duration_secs).is_err() {
            warn!("BAN_DURATION_SECS above 366 days, using permanent bans");
            settings.ban_duration_secs = 0;
        }

        // The sweep must never drop joins that can still be inside a window
        let mut ledger_retention =
            Duration::from_secs(parse_or(&lookup, "LEDGER_RETENTION_SECS", MAX_WINDOW_SECS));
        if ledger_retention < Duration::from_secs(MAX_WINDOW_SECS) {
            warn!(
                "LEDGER_RETENTION_SECS below the longest raid window, using {}",
                MAX_WINDOW_SECS
            );
            ledger_retention = Duration::from_secs(MAX_WINDOW_SECS);
        }

        Ok(Self {
            bot_token,
            bot_mode,
            webhook_url,
            webhook_port: parse_or(&lookup, "WEBHOOK_PORT", 8443),
            webhook_secret: lookup("WEBHOOK_SECRET").filter(|s| !s.is_empty()),
            admin_ids: lookup("ADMIN_IDS").map(|raw| parse_ids(&raw)).unwrap_or_default(),
            settings,
            ledger_retention,
            housekeeping_interval: Duration::from_secs(
                parse_or::<u64, _>(&lookup, "HOUSEKEEPING_INTERVAL_SECS", 3600).max(1),
            ),
        })
    }
}

/// Parse a comma-separated list of IDs, skipping malformed entries.
pub fn parse_ids(raw: &str) -> HashSet<u64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Ignoring malformed user ID '{}'", s);
                None
            }
        })
        .collect()
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid value '{}' for {}, using {:?}", raw, key, default);
            default
        }),
        None => default,
    }
}

fn flag_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!("Invalid flag '{}' for {}, using {}", raw, key, default);
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[("RAID_THRESHOLD", "5")])).unwrap_err();
        assert!(matches!(err, AntiRaidError::Config(_)));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "123:abc")])).unwrap();
        assert_eq!(config.settings.raid_threshold, 4);
        assert_eq!(config.settings.time_window_secs, 1);
        assert!(config.settings.auto_delete_join_messages);
        assert_eq!(config.bot_mode, BotMode::Polling);
        assert!(config.admin_ids.is_empty());
    }

    #[test]
    fn test_parses_settings_and_ids() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "123:abc"),
            ("ADMIN_IDS", "1, 2,oops,3"),
            ("RAID_THRESHOLD", "10"),
            ("TIME_WINDOW", "5"),
            ("CHECK_USERNAME", "on"),
            ("WHITELIST_IDS", "77"),
            ("BAN_DURATION_SECS", "3600"),
        ]))
        .unwrap();

        assert_eq!(config.admin_ids, HashSet::from([1, 2, 3]));
        assert_eq!(config.settings.raid_threshold, 10);
        assert_eq!(config.settings.time_window_secs, 5);
        assert!(config.settings.check_username);
        assert!(config.settings.whitelist.contains(&77));
        assert_eq!(config.settings.ban_duration_secs, 3600);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "123:abc"),
            ("RAID_THRESHOLD", "0"),
            ("TIME_WINDOW", "soon"),
            ("CHECK_PROFILE_PHOTO", "maybe"),
        ]))
        .unwrap();

        assert_eq!(config.settings.raid_threshold, 4);
        assert_eq!(config.settings.time_window_secs, 1);
        assert!(!config.settings.check_profile_photo);
    }

    #[test]
    fn test_unbounded_values_are_clamped() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "123:abc"),
            ("BAN_DURATION_SECS", "60480000000000000"),
            ("LEDGER_RETENTION_SECS", "60"),
        ]))
        .unwrap();

        assert_eq!(config.settings.ban_duration_secs, 0);
        assert_eq!(config.ledger_retention, Duration::from_secs(MAX_WINDOW_SECS));

        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "123:abc"),
            ("BAN_DURATION_SECS", "86400"),
            ("LEDGER_RETENTION_SECS", "7200"),
        ]))
        .unwrap();
        assert_eq!(config.settings.ban_duration_secs, 86400);
        assert_eq!(config.ledger_retention, Duration::from_secs(7200));
    }

    #[test]
    fn test_webhook_requires_url() {
        let res = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("BOT_MODE", "webhook")]));
        assert!(res.is_err());

        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("BOT_MODE", "webhook"),
            ("WEBHOOK_URL", "https://example.org/hook"),
        ]))
        .unwrap();
        assert_eq!(config.bot_mode, BotMode::Webhook);
        assert_eq!(config.webhook_port, 8443);
    }
}
