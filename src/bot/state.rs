use std::collections::HashMap;

use parking_lot::Mutex;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversationState {
    #[default]
    None,
    /// 等待用户发送要缩短的 URL
    AwaitingUrl,
}

/// chat id → 会话状态
///
/// 没有超时回退：会话可以一直停在 `AwaitingUrl`。
#[derive(Debug, Default)]
pub struct ConversationStateStore {
    states: Mutex<HashMap<i64, ConversationState>>,
}

impl ConversationStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chat_id: i64) -> ConversationState {
        self.states
            .lock()
            .get(&chat_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&self, chat_id: i64, state: ConversationState) {
        let mut states = self.states.lock();
        match state {
            ConversationState::None => {
                states.remove(&chat_id);
            }
            other => {
                states.insert(chat_id, other);
            }
        }
    }

    pub fn clear(&self, chat_id: i64) {
        self.set(chat_id, ConversationState::None);
    }

    pub fn begin_shortening(&self, chat_id: i64) {
        self.set(chat_id, ConversationState::AwaitingUrl);
    }

    /// 原子地读取并重置：返回之前是否在等待 URL，之后状态一定是 `None`
    pub fn take_awaiting(&self, chat_id: i64) -> bool {
        self.states.lock().remove(&chat_id) == Some(ConversationState::AwaitingUrl)
    }

    /// 处于非 `None` 状态的会话数
    pub fn active_chats(&self) -> usize {
        self.states.lock().len()
    }
}
