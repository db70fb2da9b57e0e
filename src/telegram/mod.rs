//! Telegram bot integration: client setup, dispatcher schema and the
//! chat transport used by the conversation flows.

pub mod bot;
pub mod schema;
pub mod transport;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use schema::{schema, HandlerError};
pub use transport::TelegramTransport;
