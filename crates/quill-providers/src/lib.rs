//! Provider adapters for OpenAI-compatible text generation services.

/// Exponential backoff between provider attempts.
pub mod backoff;
/// Scripted provider for tests and offline runs.
pub mod mock;
/// HTTP provider speaking the chat completions protocol.
pub mod openai_compat;
/// Prompt construction from generation requests.
pub mod prompt;

pub use backoff::BackoffPolicy;
pub use mock::{MockOutcome, MockProvider};
pub use openai_compat::OpenAiCompatibleProvider;
pub use prompt::{ChatMessage, build_messages};
