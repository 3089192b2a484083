//! Telegram 通道（teloxide 长轮询）

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::{KeyboardButton, KeyboardMarkup, Update},
};
use tracing::{debug, error, info, warn};

use super::handler::{BotHandler, InboundMessage};
use super::transport::{BotTransport, ReplyKeyboard};
use crate::errors::{Result, ShortlinkError};

pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }
}

fn to_markup(keyboard: &ReplyKeyboard) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = keyboard
        .rows
        .iter()
        .map(|row| row.iter().map(KeyboardButton::new).collect())
        .collect();

    let mut markup = KeyboardMarkup::new(rows);
    if keyboard.one_time {
        markup = markup.one_time_keyboard();
    }
    if keyboard.resize {
        markup = markup.resize_keyboard();
    }
    markup
}

#[async_trait]
impl BotTransport for TelegramTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()> {
        let request = self.bot.send_message(ChatId(chat_id), text);
        let sent = match keyboard {
            Some(keyboard) => request.reply_markup(to_markup(keyboard)).await,
            None => request.await,
        };

        sent.map(|_| ()).map_err(|e| {
            warn!("Failed to send message to chat {}: {}", chat_id, e);
            ShortlinkError::transport(e.to_string())
        })
    }
}

/// 启动长轮询，直到任务被取消
pub async fn run_bot(bot: Bot, handler: Arc<BotHandler>) {
    let tree = dptree::entry().branch(Update::filter_message().endpoint(message_handler));

    info!("Starting Telegram dispatcher with long polling");

    Dispatcher::builder(bot, tree)
        .dependencies(dptree::deps![handler])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .build()
        .dispatch()
        .await;

    warn!("Telegram dispatcher stopped");
}

async fn message_handler(msg: Message, handler: Arc<BotHandler>) -> ResponseResult<()> {
    let inbound = InboundMessage {
        chat_id: msg.chat.id.0,
        from_id: msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0),
        text: msg.text().unwrap_or_default().to_string(),
    };

    if let Err(e) = handler.process_message(inbound).await {
        error!("Error handling message in chat {}: {}", msg.chat.id.0, e);
    }

    Ok(())
}
