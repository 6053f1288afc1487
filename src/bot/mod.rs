//! Bot module - Telegram wiring around the raid core.

pub mod dispatcher;
pub mod gateway;
pub mod housekeeping;
mod runtime;

pub use dispatcher::{AppState, build_dispatcher};
pub use gateway::TelegramGateway;
pub use runtime::run;
