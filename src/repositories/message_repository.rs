use std::future::Future;
use std::pin::Pin;

use crate::models::{
    AssistantMessage, Conversation, ImageAttachment, ModelRef, ToolInvocation, UserMessage,
};

use super::error::RepositoryResult;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The backend caps conversation titles at this length.
pub const MAX_TITLE_LEN: usize = 255;

/// Clamp a title to the backend's limit without splitting a character.
pub fn clamp_title(title: &str) -> String {
    title.chars().take(MAX_TITLE_LEN).collect()
}

/// Input for persisting an assistant reply once generation has finished.
#[derive(Debug, Clone)]
pub struct NewAssistantMessage {
    pub conversation: String,
    /// Full accumulated reply text; becomes the first content variation.
    pub content: String,
    pub model: ModelRef,
    pub provider: String,
    /// Identifier of the user message the reply was generated for.
    pub generated_by: String,
    pub tools_used: Option<Vec<ToolInvocation>>,
}

/// Persistence collaborator for conversations and messages.
///
/// These are thin interfaces over an external store; this core never rolls
/// back a created record. Only persisted entries can reach these calls —
/// the placeholder reply has no identifier to pass.
pub trait MessageRepository: Send + Sync + 'static {
    /// Create a conversation, seeded with a title.
    fn create_conversation(&self, title: &str)
    -> BoxFuture<'static, RepositoryResult<Conversation>>;

    /// Replace a conversation's title.
    fn rename_conversation(
        &self,
        id: &str,
        title: &str,
    ) -> BoxFuture<'static, RepositoryResult<Conversation>>;

    /// Persist a user message, optionally with an image attachment.
    fn create_user_message(
        &self,
        conversation: &str,
        content: &str,
        image: Option<ImageAttachment>,
    ) -> BoxFuture<'static, RepositoryResult<UserMessage>>;

    /// Persist an assistant reply with its first content variation.
    fn create_assistant_message(
        &self,
        new: NewAssistantMessage,
    ) -> BoxFuture<'static, RepositoryResult<AssistantMessage>>;

    /// Append a content variation to an existing assistant reply and return
    /// the updated record.
    fn add_content_variation(
        &self,
        message_id: &str,
        content: &str,
    ) -> BoxFuture<'static, RepositoryResult<AssistantMessage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_title_short_is_untouched() {
        assert_eq!(clamp_title("hello"), "hello");
    }

    #[test]
    fn test_clamp_title_respects_char_boundaries() {
        let long: String = "é".repeat(300);
        let clamped = clamp_title(&long);
        assert_eq!(clamped.chars().count(), MAX_TITLE_LEN);
    }
}
