//! Runtime raid settings.
//!
//! Initialized from the environment at startup and mutated in place by
//! admin commands. Nothing here is persisted across restarts.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{AntiRaidError, Result};

/// Upper bound accepted for the raid window.
pub const MAX_WINDOW_SECS: u64 = 3600;

/// Longest temporary ban. Telegram treats anything above 366 days as permanent.
pub const MAX_BAN_DURATION_SECS: u64 = 366 * 86400;

/// Anti-raid settings shared by every chat the bot moderates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaidSettings {
    /// Joins inside the window needed to enter raid mode (inclusive).
    pub raid_threshold: u32,

    /// Sliding window length in seconds.
    pub time_window_secs: u64,

    /// Delete the "X joined the group" service message.
    pub auto_delete_join_messages: bool,

    /// Ban members without a @username in normal mode.
    pub check_username: bool,

    /// Ban members without a profile photo in normal mode.
    pub check_profile_photo: bool,

    /// Minimum estimated account age in days (0 = disabled).
    pub min_account_age_days: u32,

    /// Ban duration in seconds (0 = permanent).
    pub ban_duration_secs: u64,

    /// Whether the whitelist exempts members from moderation.
    pub whitelist_enabled: bool,

    /// Whitelisted member IDs.
    pub whitelist: BTreeSet<u64>,

    /// Delay before a raid alert deletes itself (0 = keep it).
    pub alert_ttl_secs: u64,
}

impl Default for RaidSettings {
    fn default() -> Self {
        Self {
            raid_threshold: 4,
            time_window_secs: 1,
            auto_delete_join_messages: true,
            check_username: false,
            check_profile_photo: false,
            min_account_age_days: 0,
            ban_duration_secs: 0,
            whitelist_enabled: false,
            whitelist: BTreeSet::new(),
            alert_ttl_secs: 30,
        }
    }
}

/// Boolean settings that can be flipped with `/toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    AutoDelete,
    Username,
    ProfilePhoto,
    Whitelist,
}

impl Toggle {
    pub const ALL: [Toggle; 4] = [
        Toggle::AutoDelete,
        Toggle::Username,
        Toggle::ProfilePhoto,
        Toggle::Whitelist,
    ];

    /// Short key used in commands and callback data.
    pub fn key(self) -> &'static str {
        match self {
            Self::AutoDelete => "autodelete",
            Self::Username => "username",
            Self::ProfilePhoto => "photo",
            Self::Whitelist => "whitelist",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::AutoDelete => "Delete join messages",
            Self::Username => "Require username",
            Self::ProfilePhoto => "Require profile photo",
            Self::Whitelist => "Whitelist",
        }
    }
}

impl fmt::Display for Toggle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Toggle {
    type Err = AntiRaidError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "autodelete" | "delete" => Ok(Self::AutoDelete),
            "username" => Ok(Self::Username),
            "photo" | "avatar" => Ok(Self::ProfilePhoto),
            "whitelist" => Ok(Self::Whitelist),
            other => Err(AntiRaidError::invalid(format!(
                "Unknown setting '{}'. Use one of: autodelete, username, photo, whitelist",
                other
            ))),
        }
    }
}

impl RaidSettings {
    /// Current value of a boolean setting.
    pub fn flag(&self, toggle: Toggle) -> bool {
        match toggle {
            Toggle::AutoDelete => self.auto_delete_join_messages,
            Toggle::Username => self.check_username,
            Toggle::ProfilePhoto => self.check_profile_photo,
            Toggle::Whitelist => self.whitelist_enabled,
        }
    }

    /// Flip a boolean setting, returning the new value.
    pub fn toggle(&mut self, toggle: Toggle) -> bool {
        let slot = match toggle {
            Toggle::AutoDelete => &mut self.auto_delete_join_messages,
            Toggle::Username => &mut self.check_username,
            Toggle::ProfilePhoto => &mut self.check_profile_photo,
            Toggle::Whitelist => &mut self.whitelist_enabled,
        };
        *slot = !*slot;
        *slot
    }

    pub fn set_threshold(&mut self, threshold: u32) -> Result<()> {
        if threshold == 0 {
            return Err(AntiRaidError::invalid("Threshold must be at least 1"));
        }
        self.raid_threshold = threshold;
        Ok(())
    }

    pub fn set_window(&mut self, secs: u64) -> Result<()> {
        if !(1..=MAX_WINDOW_SECS).contains(&secs) {
            return Err(AntiRaidError::invalid(format!(
                "Window must be between 1 and {} seconds",
                MAX_WINDOW_SECS
            )));
        }
        self.time_window_secs = secs;
        Ok(())
    }

    /// Ban length in seconds, 0 for permanent.
    pub fn set_ban_duration(&mut self, secs: u64) -> Result<()> {
        if secs > MAX_BAN_DURATION_SECS {
            return Err(AntiRaidError::invalid(
                "Ban duration must be at most 366 days (use 0 for a permanent ban)",
            ));
        }
        self.ban_duration_secs = secs;
        Ok(())
    }

    /// Whether the heuristic checks can ban anyone at all.
    pub fn any_check_enabled(&self) -> bool {
        self.check_username || self.check_profile_photo || self.min_account_age_days > 0
    }
}

/// Settings handle shared between the join pipeline and admin commands.
///
/// Readers take a cloned snapshot and never hold the lock across I/O.
/// Writers mutate under the write lock, so no partial update is ever visible.
#[derive(Clone, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<RaidSettings>>,
}

impl SharedSettings {
    pub fn new(settings: RaidSettings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Clone the current settings.
    pub fn snapshot(&self) -> RaidSettings {
        self.inner.read().clone()
    }

    /// Apply an infallible change.
    pub fn update<R>(&self, f: impl FnOnce(&mut RaidSettings) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Apply a fallible change. On error the settings are left untouched.
    pub fn try_update<R>(&self, f: impl FnOnce(&mut RaidSettings) -> Result<R>) -> Result<R> {
        let mut guard = self.inner.write();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        *guard = draft;
        Ok(out)
    }
}

impl fmt::Debug for SharedSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedSettings").field(&*self.inner.read()).finish()
    }
}
