//! Client-side core for a conversational AI application.
//!
//! Covers the full lifecycle of a message: composing and persisting it,
//! streaming the generated reply into the transcript, persisting the reply,
//! and regenerating alternative variations later. The [`SendController`]
//! is the entry point; repositories and the generation backend are traits
//! so the whole flow is testable without a server.

pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::{SendController, SendOptions, SendPhase};
pub use services::{CancelToken, SendError, SendResult};
