//! Error types for the anti-raid bot.

use thiserror::Error;

/// Central error type for anti-raid operations.
#[derive(Debug, Error)]
pub enum AntiRaidError {
    /// Startup configuration is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An admin command argument could not be parsed or is out of range.
    #[error("{0}")]
    InvalidArgument(String),

    /// A request to Telegram failed in transport.
    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// The platform refused the request.
    #[error("Platform error: {0}")]
    Platform(String),
}

impl AntiRaidError {
    /// Shorthand for an invalid admin argument.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type Result<T> = std::result::Result<T, AntiRaidError>;
