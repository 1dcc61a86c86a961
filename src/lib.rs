//! Decision chat — a conversation driven by a static decision tree.

pub mod channels;
pub mod config;
pub mod conversation;
pub mod error;
pub mod render;
pub mod server;
pub mod tree;
