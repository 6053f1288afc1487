//! Bot runtime - Polling and Webhook runners.

use std::net::SocketAddr;

use anyhow::Context;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks::{self, Options};
use tracing::info;
use url::Url;

use super::dispatcher::{BotDispatcher, ThrottledBot};
use crate::config::{BotMode, Config};

/// Run the bot with the configured mode until shutdown.
pub async fn run(config: &Config, bot: ThrottledBot, mut dispatcher: BotDispatcher) -> anyhow::Result<()> {
    match config.bot_mode {
        BotMode::Polling => {
            info!("Starting bot in polling mode...");
            dispatcher.dispatch().await;
            Ok(())
        }
        BotMode::Webhook => {
            info!("Starting bot in webhook mode...");
            run_webhook(config, bot, dispatcher).await
        }
    }
}

/// Receive updates through teloxide's axum listener.
///
/// The listener registers the webhook with Telegram and deletes it again on
/// Ctrl+C.
async fn run_webhook(config: &Config, bot: ThrottledBot, mut dispatcher: BotDispatcher) -> anyhow::Result<()> {
    let raw_url = config
        .webhook_url
        .as_deref()
        .context("WEBHOOK_URL is required in webhook mode")?;
    let url = Url::parse(raw_url).with_context(|| format!("WEBHOOK_URL '{}' is not a valid URL", raw_url))?;
    let address = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));

    let options = match &config.webhook_secret {
        Some(secret) => Options::new(address, url.clone()).secret_token(secret.clone()),
        None => Options::new(address, url.clone()),
    };

    info!("Registering webhook {} (listening on {})", url, address);

    // setWebhook does not need the throttling layer
    let listener = webhooks::axum(bot.inner().clone(), options)
        .await
        .context("Failed to register the webhook")?;

    dispatcher
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("Webhook listener error"),
        )
        .await;
    Ok(())
}
