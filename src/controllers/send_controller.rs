use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::models::{AssistantMessage, ChatEntry, Conversation, ImageAttachment, ModelRef, ToolInvocation, Transcript};
use crate::repositories::{MessageRepository, NewAssistantMessage};
use crate::services::{
    CancelToken, GenerationBackend, GenerationRequest, SendError, SendResult, StreamEvent,
};

/// Everything needed to send one message.
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub content: String,
    pub image: Option<ImageAttachment>,
    pub model: ModelRef,
    pub use_tools: bool,
    /// Stream the reply token by token, or wait for the full reply at once.
    pub streaming: bool,
}

/// Where a send currently stands. Exactly one phase is active at a time;
/// [`Completed`](SendPhase::Completed) and [`Failed`](SendPhase::Failed) are
/// the terminal phases a new send starts over from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPhase {
    Idle,
    ConversationEnsured,
    UserMessagePersisted,
    GeneratingResponse,
    Completed,
    Failed,
}

/// Drives one conversation: sending messages, streaming replies into the
/// transcript, regenerating variations and cancelling in-flight work.
///
/// Holds the canonical client-side view of the open conversation. While a
/// reply is in flight this controller is the sole author of the transcript;
/// refetches are rejected until the send settles.
pub struct SendController {
    repository: Arc<dyn MessageRepository>,
    backend: Arc<dyn GenerationBackend>,
    conversation: Option<Conversation>,
    transcript: Transcript,
    phase: SendPhase,
    cancel: CancelToken,
    /// Raw bytes of images sent this session, keyed by user message id, so
    /// regeneration can re-attach them. Refetched messages only carry a URL.
    attachments: HashMap<String, ImageAttachment>,
}

impl SendController {
    pub fn new(repository: Arc<dyn MessageRepository>, backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            repository,
            backend,
            conversation: None,
            transcript: Transcript::new(),
            phase: SendPhase::Idle,
            cancel: CancelToken::new(),
            attachments: HashMap::new(),
        }
    }

    pub fn conversation(&self) -> Option<&Conversation> {
        self.conversation.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            SendPhase::ConversationEnsured
                | SendPhase::UserMessagePersisted
                | SendPhase::GeneratingResponse
        )
    }

    /// Switch to a conversation, adopting its fetched entries.
    pub fn open_conversation(&mut self, conversation: Conversation, entries: Vec<ChatEntry>) {
        self.conversation = Some(conversation);
        self.transcript.replace_entries(entries);
        self.phase = SendPhase::Idle;
    }

    /// Adopt refetched entries, unless a reply is currently being generated.
    /// Returns whether the refetch was applied.
    pub fn refresh_entries(&mut self, entries: Vec<ChatEntry>) -> bool {
        if self.phase == SendPhase::GeneratingResponse {
            debug!("refetch rejected while a reply is in flight");
            return false;
        }
        self.transcript.replace_entries(entries);
        true
    }

    /// Request cancellation of the in-flight send or regeneration. Takes
    /// effect at the next stream read.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Send a message and drive it to a settled state: conversation ensured,
    /// user message persisted, reply generated and persisted, transcript
    /// updated. Returns the persisted assistant record.
    ///
    /// On failure the placeholder reply is dropped; persisted entries are
    /// never rolled back. The one exception is a persistence failure after
    /// generation finished, which leaves the generated text visible so it is
    /// not silently lost.
    pub async fn send(&mut self, options: SendOptions) -> SendResult<AssistantMessage> {
        if self.is_busy() {
            return Err(SendError::Busy);
        }
        // A placeholder left visible by an earlier failure would stop being
        // the trailing entry once the new user message lands, making it
        // unremovable. Abandon it before authoring anything new: the
        // transcript never holds more than one placeholder.
        self.transcript.clear_pending();
        self.cancel = CancelToken::new();

        let result = self.run_send(options).await;
        match &result {
            Ok(_) => self.phase = SendPhase::Completed,
            Err(err) => {
                warn!(error = %err, "send failed");
                if !matches!(err, SendError::Persistence(_)) {
                    self.transcript.clear_pending();
                }
                self.phase = SendPhase::Failed;
            }
        }
        result
    }

    async fn run_send(&mut self, options: SendOptions) -> SendResult<AssistantMessage> {
        let preexisting = self.conversation.is_some();
        let was_empty = self.transcript.is_empty();

        let conversation = match &self.conversation {
            Some(conversation) => conversation.clone(),
            None => {
                let created = self.repository.create_conversation(&options.content).await?;
                debug!(conversation = %created.id, "created conversation");
                self.conversation = Some(created.clone());
                created
            }
        };
        self.phase = SendPhase::ConversationEnsured;

        let user_message = self
            .repository
            .create_user_message(&conversation.id, &options.content, options.image.clone())
            .await?;
        if let Some(image) = options.image.clone() {
            self.attachments.insert(user_message.id.clone(), image);
        }
        self.transcript.push_user(user_message.clone());
        self.phase = SendPhase::UserMessagePersisted;

        // A pre-existing conversation still carrying its default title gets
        // retitled from the first message sent into it.
        if preexisting && was_empty {
            let renamed = self
                .repository
                .rename_conversation(&conversation.id, &options.content)
                .await?;
            self.conversation = Some(renamed);
        }

        let request = GenerationRequest::compose(
            &conversation.id,
            &options.model,
            &options.content,
            options.image.as_ref(),
            options.use_tools,
        );
        self.phase = SendPhase::GeneratingResponse;

        let (content, tools_used) = if options.streaming {
            self.run_streaming(&request).await?
        } else {
            self.run_direct(&request).await?
        };

        let record = self
            .repository
            .create_assistant_message(NewAssistantMessage {
                conversation: conversation.id,
                content,
                model: options.model,
                provider: request.provider,
                generated_by: user_message.id,
                tools_used,
            })
            .await?;
        self.transcript.resolve_pending(record.clone());
        Ok(record)
    }

    /// Drive a streaming generation, growing the placeholder reply with each
    /// delta. Resolves to the accumulated text once the stream completes.
    async fn run_streaming(
        &mut self,
        request: &GenerationRequest,
    ) -> SendResult<(String, Option<Vec<ToolInvocation>>)> {
        let backend = self.backend.clone();
        let mut events = backend.generate_stream(request, self.cancel.clone()).await?;

        let mut tools_used: Option<Vec<ToolInvocation>> = None;
        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Delta { text, tools_used: tools } => {
                    self.transcript.apply_delta(&text);
                    if tools_used.is_none() {
                        tools_used = tools;
                    }
                }
                StreamEvent::Done => break,
            }
        }

        let content = self.transcript.pending_text().unwrap_or_default().to_string();
        Ok((content, tools_used))
    }

    /// One blocking generation request. No placeholder is created; the reply
    /// appears only once persisted.
    async fn run_direct(
        &self,
        request: &GenerationRequest,
    ) -> SendResult<(String, Option<Vec<ToolInvocation>>)> {
        let reply = self.backend.generate(request).await?;
        if let Some(error) = reply.message.error {
            return Err(SendError::InBand(error));
        }
        Ok((reply.message.content, reply.message.tools_used))
    }

    /// Generate a fresh variation for an existing assistant reply.
    ///
    /// The prompt is rebuilt from the originating user message; tools are
    /// never re-invoked on regeneration. While the new text streams in it
    /// overrides the displayed variation; on failure the previous selection
    /// comes back. A persistence failure after generation keeps the new text
    /// as a local, unsaved variation.
    pub async fn regenerate(&mut self, entry_index: usize, streaming: bool) -> SendResult<()> {
        if self.is_busy() {
            return Err(SendError::Busy);
        }
        let conversation = self
            .conversation
            .clone()
            .ok_or_else(|| SendError::InvalidTarget("no open conversation".to_string()))?;
        let Some(entry) = self.transcript.assistant_entry(entry_index) else {
            return Err(SendError::InvalidTarget(format!(
                "entry {entry_index} is not an assistant reply"
            )));
        };
        let source = entry.message.generated_by.clone();
        if source.is_deleted {
            return Err(SendError::InvalidTarget(
                "originating user message was deleted".to_string(),
            ));
        }
        let message_id = entry.message.id.clone();
        let model = entry.message.model.clone();

        let image = self.attachments.get(&source.id).cloned();
        if image.is_none() && source.image.is_some() {
            warn!(user_message = %source.id, "image bytes unavailable; regenerating without attachment");
        }

        self.cancel = CancelToken::new();
        self.phase = SendPhase::GeneratingResponse;
        if let Some(entry) = self.transcript.assistant_entry_mut(entry_index) {
            entry.variations.begin_regenerate();
        }

        let request = GenerationRequest::compose(
            &conversation.id,
            &model,
            &source.content,
            image.as_ref(),
            false,
        );
        let generated = if streaming {
            self.regenerate_streaming(entry_index, &request).await
        } else {
            self.run_direct(&request).await.map(|(text, _)| text)
        };

        let text = match generated {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "regeneration failed");
                if let Some(entry) = self.transcript.assistant_entry_mut(entry_index) {
                    entry.variations.cancel_regenerate();
                }
                self.phase = SendPhase::Failed;
                return Err(err);
            }
        };

        match self.repository.add_content_variation(&message_id, &text).await {
            Ok(record) => {
                if let Some(entry) = self.transcript.assistant_entry_mut(entry_index) {
                    entry.resync(record);
                }
                self.phase = SendPhase::Completed;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to persist variation; keeping it locally");
                if let Some(entry) = self.transcript.assistant_entry_mut(entry_index) {
                    entry.variations.complete_regenerate(text);
                }
                self.phase = SendPhase::Failed;
                Err(SendError::Persistence(err))
            }
        }
    }

    /// Cycle the entry at `entry_index` to its next variation.
    pub fn next_variation(&mut self, entry_index: usize) {
        if let Some(entry) = self.transcript.assistant_entry_mut(entry_index) {
            entry.variations.next();
        }
    }

    /// Cycle the entry at `entry_index` to its previous variation.
    pub fn previous_variation(&mut self, entry_index: usize) {
        if let Some(entry) = self.transcript.assistant_entry_mut(entry_index) {
            entry.variations.previous();
        }
    }

    async fn regenerate_streaming(
        &mut self,
        entry_index: usize,
        request: &GenerationRequest,
    ) -> SendResult<String> {
        let backend = self.backend.clone();
        let mut events = backend.generate_stream(request, self.cancel.clone()).await?;

        let mut accumulated = String::new();
        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Delta { text, .. } => {
                    accumulated.push_str(&text);
                    if let Some(entry) = self.transcript.assistant_entry_mut(entry_index) {
                        entry.variations.update_streaming(accumulated.clone());
                    }
                }
                StreamEvent::Done => break,
            }
        }
        Ok(accumulated)
    }
}
