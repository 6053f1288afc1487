//! Telegram implementation of the raid core's platform traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::RequestError;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};

use super::dispatcher::ThrottledBot;
use crate::error::{AntiRaidError, Result};
use crate::raid::{ModerationApi, ProfileLookup};

/// Moderation calls backed by the throttled Telegram bot.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: ThrottledBot,
}

impl TelegramGateway {
    pub fn new(bot: ThrottledBot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ModerationApi for TelegramGateway {
    async fn ban_member(
        &self,
        chat_id: i64,
        user_id: u64,
        revoke_messages: bool,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let request = self
            .bot
            .ban_chat_member(ChatId(chat_id), UserId(user_id))
            .revoke_messages(revoke_messages);

        match until {
            Some(until) => request.until_date(until).await,
            None => request.await,
        }
        .map_err(platform_error)?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .map_err(platform_error)?;
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<i32> {
        let sent = self
            .bot
            .send_message(ChatId(chat_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(platform_error)?;
        Ok(sent.id.0)
    }

    async fn edit_message(&self, chat_id: i64, message_id: i32, text: &str) -> Result<()> {
        self.bot
            .edit_message_text(ChatId(chat_id), MessageId(message_id), text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(platform_error)?;
        Ok(())
    }
}

#[async_trait]
impl ProfileLookup for TelegramGateway {
    async fn profile_photo_count(&self, user_id: u64) -> Result<u32> {
        let photos = self
            .bot
            .get_user_profile_photos(UserId(user_id))
            .limit(1)
            .await
            .map_err(platform_error)?;
        Ok(photos.total_count)
    }
}

/// Telegram refusals (missing rights, unknown message) are kept apart from
/// transport failures.
fn platform_error(err: RequestError) -> AntiRaidError {
    match err {
        RequestError::Api(api) => AntiRaidError::Platform(api.to_string()),
        other => AntiRaidError::Telegram(other),
    }
}
