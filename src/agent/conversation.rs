//! Multi-turn conversation state.

use crate::lmm::{ChatTurn, Role};
use crate::workflow::Trace;
use serde::{Deserialize, Serialize};

/// Ordered chat turns plus the trace of the most recent workflow.
///
/// Owned by the caller. [`VisionAgent::chat`](super::VisionAgent::chat)
/// returns an updated copy and never touches the original.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<ChatTurn>,
    #[serde(default)]
    pub last_trace: Option<Trace>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last `limit` turns, used as planning context.
    pub fn recent(&self, limit: usize) -> &[ChatTurn] {
        let start = self.turns.len().saturating_sub(limit);
        &self.turns[start..]
    }

    pub fn count(&self, role: Role) -> usize {
        self.turns.iter().filter(|t| t.role == role).count()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
