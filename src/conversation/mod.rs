//! Conversation controller — walks the decision tree one selection at a time.
//!
//! `controller` holds the pure state machine, `session` adds the typing delay
//! and fan-out to frontends, `registry` keeps many sessions over one tree.

pub mod controller;
pub mod registry;
pub mod session;
pub mod transcript;

pub use controller::{Conversation, ConversationSnapshot, PendingRender, Selected, Selection};
pub use registry::{SessionRegistry, spawn_expiry_task};
pub use session::ConversationSession;
pub use transcript::Transcript;
