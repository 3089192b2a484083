//! 会话流程：/start → "Shorten URL" → 发送链接 → 返回短链接
//!
//! 不依赖具体的消息通道，Telegram 之外的测试用 `BotTransport` 替身驱动。

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::state::ConversationStateStore;
use super::transport::{BotTransport, ReplyKeyboard};
use crate::errors::{Result, ShortlinkError};
use crate::services::{AuditLog, LinkService, RateLimiter};

pub const START_COMMAND: &str = "/start";
pub const SHORTEN_BUTTON: &str = "Shorten URL";

pub const WELCOME_TEXT: &str = "👋 Welcome! Click the button below to shorten a URL.";
pub const ASK_URL_TEXT: &str = "Please send the URL you want to shorten.";
pub const SHORTENED_PREFIX: &str = "✅ Shortened URL: ";
pub const FAILED_TEXT: &str = "❌ Failed to shorten URL.";
pub const TOO_MANY_TEXT: &str = "Too Many Request";
pub const UNKNOWN_TEXT: &str = "❓ I don't understand. Use the button or type /start.";

/// 收到的一条聊天消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    /// 发送者 id，作为短链接的 owner
    pub from_id: i64,
    /// 非文本消息为空字符串
    pub text: String,
}

pub struct BotHandler {
    service: Arc<LinkService>,
    states: Arc<ConversationStateStore>,
    transport: Arc<dyn BotTransport>,
    audit: Arc<dyn AuditLog>,
    limiter: Option<RateLimiter>,
}

impl BotHandler {
    pub fn new(
        service: Arc<LinkService>,
        states: Arc<ConversationStateStore>,
        transport: Arc<dyn BotTransport>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            service,
            states,
            transport,
            audit,
            limiter: None,
        }
    }

    /// 按会话限流，键为 `chat:<id>`
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn states(&self) -> &ConversationStateStore {
        &self.states
    }

    pub async fn process_message(&self, msg: InboundMessage) -> Result<()> {
        let chat_id = msg.chat_id;
        let text = msg.text.as_str();
        debug!("Chat {} sent {:?}", chat_id, text);

        if text == START_COMMAND {
            self.audit.log_action(msg.from_id, "start");
            let keyboard = ReplyKeyboard::single_button(SHORTEN_BUTTON);
            return self
                .transport
                .send_message(chat_id, WELCOME_TEXT, Some(&keyboard))
                .await;
        }

        if text == SHORTEN_BUTTON {
            self.states.begin_shortening(chat_id);
            self.audit.log_action(msg.from_id, "shorten_request");
            return self.transport.send_message(chat_id, ASK_URL_TEXT, None).await;
        }

        if self.states.take_awaiting(chat_id) {
            let reply = self.shorten(&msg).await;
            return self.transport.send_message(chat_id, &reply, None).await;
        }

        self.transport.send_message(chat_id, UNKNOWN_TEXT, None).await
    }

    async fn shorten(&self, msg: &InboundMessage) -> String {
        if let Some(limiter) = &self.limiter
            && !limiter.allow(&format!("chat:{}", msg.chat_id))
        {
            warn!("Chat {} is rate limited", msg.chat_id);
            let err = ShortlinkError::rate_limited("Too many shorten requests");
            self.audit.log_error(msg.from_id, err.message(), err.code());
            return TOO_MANY_TEXT.to_string();
        }

        match self.service.generate(&msg.text, msg.from_id).await {
            Ok(link) => {
                info!("Chat {} shortened to {}", msg.chat_id, link.short_url);
                self.audit.log_action(msg.from_id, "shorten_url");
                format!("{}{}", SHORTENED_PREFIX, link.short_url)
            }
            Err(e) => {
                debug!("Chat {} failed to shorten: {}", msg.chat_id, e);
                self.audit.log_error(msg.from_id, e.message(), e.code());
                FAILED_TEXT.to_string()
            }
        }
    }
}
