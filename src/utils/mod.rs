//! Utility functions.
//!
//! Small helpers shared by the command handlers and the raid alert.

pub mod duration;

pub use duration::{format_duration_full, parse_duration};

/// Escape text for Telegram HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Parse a user ID argument from an admin command.
pub fn parse_user_id(arg: Option<&str>) -> crate::error::Result<u64> {
    let arg = arg.ok_or_else(|| crate::error::AntiRaidError::invalid("Missing user ID"))?;
    arg.trim()
        .parse::<u64>()
        .map_err(|_| crate::error::AntiRaidError::invalid(format!("'{}' is not a numeric user ID", arg)))
}
