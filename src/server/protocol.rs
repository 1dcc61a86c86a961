//! WebSocket wire protocol.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::ConversationSnapshot;
use crate::render::{Entry, RenderOp};

/// Messages from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Click the live option at `index`.
    Select { index: usize },
    /// Clear the chat and start over.
    Reset,
}

/// Messages to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full transcript (sent on connect and after a lag).
    Sync {
        session_id: Uuid,
        current: Option<String>,
        entries: Vec<Entry>,
    },
    /// A batch of render operations to apply in order.
    Ops { ops: Vec<RenderOp> },
    /// A client message was rejected.
    Error { message: String },
}

impl ServerMessage {
    pub fn sync(session_id: Uuid, snapshot: ConversationSnapshot) -> Self {
        Self::Sync {
            session_id,
            current: snapshot.current,
            entries: snapshot.entries,
        }
    }
}
