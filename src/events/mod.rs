//! Event handler system.
//!
//! Service-message events the bot reacts to. Currently only member joins.

pub mod raid_guard;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

/// Build the handler for "new members joined" service messages.
pub fn join_handler() -> UpdateHandler<anyhow::Error> {
    dptree::filter(|msg: Message| {
        msg.new_chat_members().is_some_and(|members| !members.is_empty())
    })
    .endpoint(raid_guard::join_guard)
}
