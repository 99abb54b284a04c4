//! Review orchestration for coderev.
//!
//! Turns uploaded files or a pasted snippet into a single reviewable unit,
//! builds the chat prompt, calls an OpenAI-compatible completion endpoint,
//! and keeps an in-memory history of completed reviews.

pub mod history;
pub mod input;
pub mod llm;
pub mod prompt;
pub mod session;

pub use history::History;
pub use llm::{LlmClient, ReviewBackend};
pub use session::{ReviewFailure, ReviewSession, RunOutcome, SessionState};
