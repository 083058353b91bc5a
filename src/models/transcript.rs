use tracing::debug;

use super::message::{AssistantMessage, UserMessage};
use super::variations::VariationCycle;

/// A persisted assistant reply together with its local browse state.
#[derive(Debug, Clone)]
pub struct AssistantEntry {
    pub message: AssistantMessage,
    pub variations: VariationCycle,
}

impl AssistantEntry {
    pub fn new(message: AssistantMessage) -> Self {
        let variations = VariationCycle::new(message.content_variations.clone());
        Self {
            message,
            variations,
        }
    }

    /// Adopt the authoritative record after a server round-trip.
    pub fn resync(&mut self, message: AssistantMessage) {
        self.variations.resync(message.content_variations.clone());
        self.message = message;
    }
}

/// The client-only placeholder shown while a reply is still being generated.
///
/// Carries nothing but the accumulated text: no identifier exists yet, so
/// persistence-only operations (like, delete, edit-variation) cannot be
/// expressed against it at all.
#[derive(Debug, Clone, Default)]
pub struct PendingReply {
    pub text: String,
}

/// One element of a conversation's message list.
#[derive(Debug, Clone)]
pub enum ChatEntry {
    User(UserMessage),
    Assistant(AssistantEntry),
    /// Transient; at most one exists per transcript, always trailing.
    Pending(PendingReply),
}

/// In-memory projection of one conversation's message list.
///
/// During an active send this core is the sole author of the list; the
/// placeholder entry accumulates streamed deltas until the authoritative
/// record replaces it.
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<ChatEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push_user(&mut self, message: UserMessage) {
        self.entries.push(ChatEntry::User(message));
    }

    pub fn push_assistant(&mut self, message: AssistantMessage) {
        self.entries.push(ChatEntry::Assistant(AssistantEntry::new(message)));
    }

    /// Apply one streamed text fragment.
    ///
    /// Grows the trailing placeholder in place, creating it on the first
    /// delta. Constant time: only the trailing entry is ever inspected,
    /// since deltas may arrive many times per second.
    pub fn apply_delta(&mut self, fragment: &str) {
        if let Some(ChatEntry::Pending(pending)) = self.entries.last_mut() {
            pending.text.push_str(fragment);
            return;
        }
        self.entries.push(ChatEntry::Pending(PendingReply {
            text: fragment.to_string(),
        }));
    }

    pub fn has_pending(&self) -> bool {
        matches!(self.entries.last(), Some(ChatEntry::Pending(_)))
    }

    /// The accumulated placeholder text, when a placeholder is live.
    pub fn pending_text(&self) -> Option<&str> {
        match self.entries.last() {
            Some(ChatEntry::Pending(pending)) => Some(&pending.text),
            _ => None,
        }
    }

    /// Replace the trailing placeholder with the authoritative persisted
    /// record, positionally. Appends when no placeholder exists (direct,
    /// non-streaming sends never create one).
    pub fn resolve_pending(&mut self, message: AssistantMessage) {
        let entry = ChatEntry::Assistant(AssistantEntry::new(message));
        if let Some(last @ ChatEntry::Pending(_)) = self.entries.last_mut() {
            *last = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// Drop the trailing placeholder, if any. Persisted entries are never
    /// touched by any failure path.
    pub fn clear_pending(&mut self) {
        if self.has_pending() {
            debug!("clearing placeholder reply");
            self.entries.pop();
        }
    }

    /// Wholesale replacement from a conversation refetch.
    pub fn replace_entries(&mut self, entries: Vec<ChatEntry>) {
        self.entries = entries;
    }

    pub fn assistant_entry(&self, index: usize) -> Option<&AssistantEntry> {
        match self.entries.get(index) {
            Some(ChatEntry::Assistant(entry)) => Some(entry),
            _ => None,
        }
    }

    pub fn assistant_entry_mut(&mut self, index: usize) -> Option<&mut AssistantEntry> {
        match self.entries.get_mut(index) {
            Some(ChatEntry::Assistant(entry)) => Some(entry),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::{ContentVariation, ModelRef};
    use chrono::Utc;

    fn user(id: &str) -> UserMessage {
        UserMessage {
            id: id.to_string(),
            conversation: "conv-1".to_string(),
            content: "hello".to_string(),
            image: None,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    fn assistant(id: &str, content: &str) -> AssistantMessage {
        AssistantMessage {
            id: id.to_string(),
            conversation: "conv-1".to_string(),
            content_variations: vec![ContentVariation {
                id: Some(1),
                content: content.to_string(),
            }],
            generated_by: user("u-1"),
            model: ModelRef {
                id: 1,
                name: "Llama".to_string(),
                model: "llama3.2".to_string(),
                provider: "ollama".to_string(),
            },
            provider: "ollama".to_string(),
            tools_used: None,
            liked: false,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_delta_creates_then_grows_placeholder() {
        let mut transcript = Transcript::new();
        transcript.push_user(user("u-1"));

        transcript.apply_delta("Hi");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.pending_text(), Some("Hi"));

        transcript.apply_delta(" there");
        // Grown in place, not duplicated.
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.pending_text(), Some("Hi there"));
    }

    #[test]
    fn test_delta_concatenation_order() {
        let mut transcript = Transcript::new();
        for fragment in ["a", "b", "c", "d"] {
            transcript.apply_delta(fragment);
        }
        assert_eq!(transcript.pending_text(), Some("abcd"));
    }

    #[test]
    fn test_at_most_one_pending() {
        let mut transcript = Transcript::new();
        for _ in 0..100 {
            transcript.apply_delta("x");
        }
        let pending = transcript
            .entries()
            .iter()
            .filter(|e| matches!(e, ChatEntry::Pending(_)))
            .count();
        assert_eq!(pending, 1);
    }

    #[test]
    fn test_resolve_pending_replaces_positionally() {
        let mut transcript = Transcript::new();
        transcript.push_user(user("u-1"));
        transcript.apply_delta("Hi there");

        transcript.resolve_pending(assistant("a-1", "Hi there"));
        assert_eq!(transcript.len(), 2);
        assert!(!transcript.has_pending());
        match &transcript.entries()[1] {
            ChatEntry::Assistant(entry) => assert_eq!(entry.message.id, "a-1"),
            other => panic!("expected assistant entry, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_without_pending_appends() {
        let mut transcript = Transcript::new();
        transcript.push_user(user("u-1"));

        transcript.resolve_pending(assistant("a-1", "ok"));
        assert_eq!(transcript.len(), 2);
        assert!(!transcript.has_pending());
    }

    #[test]
    fn test_clear_pending_keeps_persisted_entries() {
        let mut transcript = Transcript::new();
        transcript.push_user(user("u-1"));
        transcript.apply_delta("partial");

        transcript.clear_pending();
        assert_eq!(transcript.len(), 1);
        assert!(matches!(transcript.entries()[0], ChatEntry::User(_)));

        // Idempotent when nothing is pending.
        transcript.clear_pending();
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn test_assistant_entry_lookup() {
        let mut transcript = Transcript::new();
        transcript.push_user(user("u-1"));
        transcript.push_assistant(assistant("a-1", "ok"));

        assert!(transcript.assistant_entry(0).is_none());
        assert_eq!(
            transcript.assistant_entry(1).map(|e| e.message.id.as_str()),
            Some("a-1")
        );
    }

    #[test]
    fn test_replace_entries() {
        let mut transcript = Transcript::new();
        transcript.push_user(user("u-1"));

        transcript.replace_entries(vec![
            ChatEntry::User(user("u-2")),
            ChatEntry::Assistant(AssistantEntry::new(assistant("a-9", "refetched"))),
        ]);
        assert_eq!(transcript.len(), 2);
        match &transcript.entries()[1] {
            ChatEntry::Assistant(entry) => assert_eq!(entry.variations.display(), "refetched"),
            other => panic!("expected assistant entry, got {:?}", other),
        }
    }
}
