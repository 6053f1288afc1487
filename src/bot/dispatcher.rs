//! Message dispatcher setup.
//!
//! Builds the dispatcher with the admin commands, the join guard and the
//! settings keyboard callbacks.

use teloxide::adaptors::Throttle;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::events;
use crate::plugins;
use crate::raid::AntiRaid;

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

/// Dispatcher type shared by the polling and webhook runners.
pub type BotDispatcher = Dispatcher<ThrottledBot, anyhow::Error, teloxide::dispatching::DefaultKey>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Raid detection service (settings, ledger, stats).
    pub raid: AntiRaid,

    /// Bot username (without @).
    pub bot_username: String,
}

impl AppState {
    pub fn new(raid: AntiRaid, bot_username: String) -> Self {
        Self { raid, bot_username }
    }

    /// Check if a user may run admin commands.
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.raid.is_admin(user_id)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(bot: ThrottledBot, state: AppState) -> BotDispatcher {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Joins are checked before commands, a service message never carries one
    let message_handler = Update::filter_message()
        .branch(events::join_handler())
        .branch(plugins::command_handler());

    dptree::entry()
        .branch(message_handler)
        .branch(plugins::callback_handler())
}
