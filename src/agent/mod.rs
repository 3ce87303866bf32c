//! The public face of Skue.
//!
//! [`VisionAgent`] wraps the workflow engine behind three calls: a one-shot
//! [`ask`](VisionAgent::ask), [`ask_with_workflow`](VisionAgent::ask_with_workflow)
//! when the caller also wants the trace, and a multi-turn
//! [`chat`](VisionAgent::chat) over a [`Conversation`].

mod conversation;
mod facade;

pub use conversation::Conversation;
pub use facade::{AgentOptions, AgentReply, VisionAgent};
