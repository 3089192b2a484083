//! Telegram bot front end

pub mod handler;
pub mod state;
#[cfg(feature = "bot")]
pub mod telegram;
pub mod transport;

pub use handler::{BotHandler, InboundMessage};
pub use state::{ConversationState, ConversationStateStore};
pub use transport::{BotTransport, ReplyKeyboard};
