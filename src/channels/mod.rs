//! Frontends that drive a conversation outside the HTTP surface.

pub mod cli;

pub use cli::{CliChannel, CliCommand, CliExit};
