pub mod error;
pub mod http_repository;
pub mod in_memory_repository;
pub mod message_repository;

pub use error::{RepositoryError, RepositoryResult};
pub use http_repository::HttpMessageRepository;
pub use in_memory_repository::InMemoryMessageRepository;
pub use message_repository::{
    BoxFuture, MAX_TITLE_LEN, MessageRepository, NewAssistantMessage, clamp_title,
};
