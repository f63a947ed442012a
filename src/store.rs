use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{FanoutError, FanoutResult};
use crate::model::{Conversation, ConversationId, Message, UserId};

/// Local conversation state. Only confirmed sends are appended.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn members(&self, id: &ConversationId) -> FanoutResult<Vec<UserId>>;

    async fn append(&self, id: &ConversationId, message: Message) -> FanoutResult<()>;
}

#[derive(Default)]
pub struct MemoryConversations {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl MemoryConversations {
    pub async fn insert(&self, conversation: Conversation) {
        self.conversations
            .write()
            .await
            .insert(conversation.id.clone(), conversation);
    }

    pub async fn messages(&self, id: &ConversationId) -> Option<Vec<Message>> {
        self.conversations
            .read()
            .await
            .get(id)
            .map(|conversation| conversation.messages().to_vec())
    }
}

#[async_trait]
impl ConversationStore for MemoryConversations {
    async fn members(&self, id: &ConversationId) -> FanoutResult<Vec<UserId>> {
        self.conversations
            .read()
            .await
            .get(id)
            .map(|conversation| conversation.members.clone())
            .ok_or(FanoutError::NotFound(format!("conversation {id}")))
    }

    async fn append(&self, id: &ConversationId, message: Message) -> FanoutResult<()> {
        let mut conversations = self.conversations.write().await;
        let Some(conversation) = conversations.get_mut(id) else {
            return Err(FanoutError::NotFound(format!("conversation {id}")));
        };
        conversation.push(message);
        Ok(())
    }
}
