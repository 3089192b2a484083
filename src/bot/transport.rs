use async_trait::async_trait;

use crate::errors::Result;

/// 回复键盘（显示在输入框下方）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyKeyboard {
    pub rows: Vec<Vec<String>>,
    pub one_time: bool,
    pub resize: bool,
}

impl ReplyKeyboard {
    /// 单个按钮，点击一次后收起
    pub fn single_button(label: &str) -> Self {
        Self {
            rows: vec![vec![label.to_string()]],
            one_time: true,
            resize: true,
        }
    }
}

/// 消息发送通道
#[async_trait]
pub trait BotTransport: Send + Sync {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<()>;
}
