pub mod message;
pub mod transcript;
pub mod variations;

pub use message::{
    AssistantMessage, ContentVariation, Conversation, ImageAttachment, ModelRef, ToolInvocation,
    UserMessage,
};
pub use transcript::{AssistantEntry, ChatEntry, PendingReply, Transcript};
pub use variations::VariationCycle;
