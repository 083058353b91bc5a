pub mod cancellation;
pub mod error;
pub mod generation_service;
pub mod stream_decoder;

pub use cancellation::CancelToken;
pub use error::{SendError, SendResult};
pub use generation_service::{
    BackendConfig, DirectReply, GenerationBackend, GenerationRequest, HttpGenerationClient,
    OutboundImage, OutboundMessage, ReplyMessage,
};
pub use stream_decoder::{EventStream, FRAME_PREFIX, StreamEvent, decode_frames};
