//! The chat session loop of the tumor board orchestrator.
//!
//! Each user turn follows the same cycle:
//!
//! 1. **Receive** the user message into the conversation
//! 2. **Send to the model** with the tool definitions
//! 3. **If tool calls**: dispatch them against the session's `ChatContext`,
//!    append the results (errors as text), loop back to step 2
//! 4. **If text**: return it and persist the transcript
//!
//! The loop stops at the first text-only reply or at the iteration limit.

pub mod session;

pub use session::{ChatSession, DEFAULT_SYSTEM_PROMPT};
