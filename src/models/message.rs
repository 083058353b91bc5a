use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A conversation as persisted by the backend.
///
/// The backend owns this record; the client only appends messages to its
/// in-memory projection (see [`crate::models::Transcript`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub liked: bool,
    pub created_at: DateTime<Utc>,
}

/// A user message, persisted once per send before generation starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: String,
    pub conversation: String,
    pub content: String,
    /// URL of an attached image, when one was uploaded with the message.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// One alternative generated text for a single assistant reply slot.
///
/// Variations are append-only: regeneration adds a new entry, never mutates
/// an existing one. `id: None` marks a variation appended locally that has
/// not (yet) been persisted by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentVariation {
    pub id: Option<i64>,
    pub content: String,
}

impl ContentVariation {
    /// A variation appended locally, pending persistence.
    pub fn unsaved(content: String) -> Self {
        Self { id: None, content }
    }
}

/// A tool the backend invoked while generating a reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// The model/provider pair a reply is generated with.
///
/// Model selection is an external concern; this core treats the reference as
/// an opaque input to the outbound generation payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRef {
    pub id: i64,
    pub name: String,
    /// Provider-side model identifier (e.g. `"llama3.2"`).
    pub model: String,
    pub provider: String,
}

/// An assistant reply as persisted by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub id: String,
    pub conversation: String,
    pub content_variations: Vec<ContentVariation>,
    /// The user message this reply was generated for.
    pub generated_by: UserMessage,
    pub model: ModelRef,
    pub provider: String,
    #[serde(default)]
    pub tools_used: Option<Vec<ToolInvocation>>,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

/// An outbound image attachment, normalized to raw bytes plus MIME type.
///
/// The request composer encodes this to base64 when building the generation
/// payload; the repository uploads it as a multipart part.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub mime: String,
    pub bytes: Vec<u8>,
}
