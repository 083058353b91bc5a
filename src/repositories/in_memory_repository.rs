use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::{
    AssistantMessage, ContentVariation, Conversation, ImageAttachment, UserMessage,
};

use super::error::{RepositoryError, RepositoryResult};
use super::message_repository::{BoxFuture, MessageRepository, NewAssistantMessage, clamp_title};

#[derive(Default)]
struct StoreState {
    conversations: HashMap<String, Conversation>,
    user_messages: HashMap<String, UserMessage>,
    assistant_messages: HashMap<String, AssistantMessage>,
    next_variation_id: i64,
}

/// In-memory repository for conversations and messages.
/// Useful for testing and development.
#[derive(Clone, Default)]
pub struct InMemoryMessageRepository {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryMessageRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().conversations.values().cloned().collect()
    }

    pub fn user_messages(&self) -> Vec<UserMessage> {
        self.state.lock().user_messages.values().cloned().collect()
    }

    pub fn assistant_messages(&self) -> Vec<AssistantMessage> {
        self.state
            .lock()
            .assistant_messages
            .values()
            .cloned()
            .collect()
    }
}

impl MessageRepository for InMemoryMessageRepository {
    fn create_conversation(
        &self,
        title: &str,
    ) -> BoxFuture<'static, RepositoryResult<Conversation>> {
        let state = self.state.clone();
        let title = clamp_title(title);

        Box::pin(async move {
            let conversation = Conversation {
                id: Uuid::new_v4().to_string(),
                title,
                liked: false,
                created_at: Utc::now(),
            };
            state
                .lock()
                .conversations
                .insert(conversation.id.clone(), conversation.clone());
            Ok(conversation)
        })
    }

    fn rename_conversation(
        &self,
        id: &str,
        title: &str,
    ) -> BoxFuture<'static, RepositoryResult<Conversation>> {
        let state = self.state.clone();
        let id = id.to_string();
        let title = clamp_title(title);

        Box::pin(async move {
            let mut store = state.lock();
            let conversation =
                store
                    .conversations
                    .get_mut(&id)
                    .ok_or_else(|| RepositoryError::InvalidData {
                        message: format!("unknown conversation: {id}"),
                    })?;
            conversation.title = title;
            Ok(conversation.clone())
        })
    }

    fn create_user_message(
        &self,
        conversation: &str,
        content: &str,
        image: Option<ImageAttachment>,
    ) -> BoxFuture<'static, RepositoryResult<UserMessage>> {
        let state = self.state.clone();
        let conversation = conversation.to_string();
        let content = content.to_string();

        Box::pin(async move {
            let mut store = state.lock();
            if !store.conversations.contains_key(&conversation) {
                return Err(RepositoryError::InvalidData {
                    message: format!("unknown conversation: {conversation}"),
                });
            }

            let message = UserMessage {
                id: Uuid::new_v4().to_string(),
                conversation,
                content,
                image: image
                    .map(|image| format!("data:{};base64,{}", image.mime, BASE64.encode(image.bytes))),
                is_deleted: false,
                created_at: Utc::now(),
            };
            store
                .user_messages
                .insert(message.id.clone(), message.clone());
            Ok(message)
        })
    }

    fn create_assistant_message(
        &self,
        new: NewAssistantMessage,
    ) -> BoxFuture<'static, RepositoryResult<AssistantMessage>> {
        let state = self.state.clone();

        Box::pin(async move {
            let mut store = state.lock();
            let generated_by = store
                .user_messages
                .get(&new.generated_by)
                .cloned()
                .ok_or_else(|| RepositoryError::InvalidData {
                    message: format!("unknown user message: {}", new.generated_by),
                })?;

            store.next_variation_id += 1;
            let variation = ContentVariation {
                id: Some(store.next_variation_id),
                content: new.content,
            };

            let message = AssistantMessage {
                id: Uuid::new_v4().to_string(),
                conversation: new.conversation,
                content_variations: vec![variation],
                generated_by,
                model: new.model,
                provider: new.provider,
                tools_used: new.tools_used,
                liked: false,
                is_deleted: false,
                created_at: Utc::now(),
            };
            store
                .assistant_messages
                .insert(message.id.clone(), message.clone());
            Ok(message)
        })
    }

    fn add_content_variation(
        &self,
        message_id: &str,
        content: &str,
    ) -> BoxFuture<'static, RepositoryResult<AssistantMessage>> {
        let state = self.state.clone();
        let message_id = message_id.to_string();
        let content = content.to_string();

        Box::pin(async move {
            let mut store = state.lock();
            store.next_variation_id += 1;
            let variation = ContentVariation {
                id: Some(store.next_variation_id),
                content,
            };

            let message = store
                .assistant_messages
                .get_mut(&message_id)
                .ok_or_else(|| RepositoryError::InvalidData {
                    message: format!("unknown assistant message: {message_id}"),
                })?;
            message.content_variations.push(variation);
            Ok(message.clone())
        })
    }
}
