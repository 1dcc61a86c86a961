//! Conversation state machine — pure, synchronous, no timers.
//!
//! `Conversation` owns the current-state pointer and the transcript. A
//! selection that leads somewhere returns a [`PendingRender`] token; the
//! caller decides when to redeem it with [`Conversation::complete`]. Reset
//! bumps the generation, which invalidates every token issued before it.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::transcript::Transcript;
use crate::error::SessionError;
use crate::render::{self, Entry, RenderOp};
use crate::tree::{DecisionTree, StateNode};

/// A delayed render waiting to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRender {
    pub generation: u64,
    pub target: String,
}

/// What a selection led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// The target exists; its content is rendered once the token is redeemed.
    Scheduled(PendingRender),
    /// The target does not exist. Nothing further will be rendered.
    Stalled,
}

/// Result of selecting an option.
#[derive(Debug, Clone)]
pub struct Selected {
    /// Operations already applied to the transcript (echo + option removal).
    pub ops: Vec<RenderOp>,
    pub outcome: Selection,
}

/// Serializable view of a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub current: Option<String>,
    pub pending: bool,
    pub entries: Vec<Entry>,
}

/// One conversation over a shared decision tree.
#[derive(Debug)]
pub struct Conversation {
    /// `None` when the tree failed to load.
    tree: Option<Arc<DecisionTree>>,
    entry_point: String,
    avatar: String,
    bot_name: String,
    current: Option<String>,
    transcript: Transcript,
    generation: u64,
    pending: Option<PendingRender>,
}

impl Conversation {
    /// Create a conversation in the not-started state. Call [`start`](Self::start)
    /// to render the entry point.
    pub fn new(
        tree: Option<Arc<DecisionTree>>,
        entry_point: impl Into<String>,
        avatar: impl Into<String>,
    ) -> Self {
        Self {
            tree,
            entry_point: entry_point.into(),
            avatar: avatar.into(),
            bot_name: render::DEFAULT_BOT_NAME.to_string(),
            current: None,
            transcript: Transcript::new(),
            generation: 0,
            pending: None,
        }
    }

    /// Name shown on the header avatar.
    pub fn with_bot_name(mut self, bot_name: impl Into<String>) -> Self {
        self.bot_name = bot_name.into();
        self
    }

    /// Render the entry point from a clean transcript.
    ///
    /// Without a tree only the load-error entry is shown. A missing entry
    /// point leaves just the header.
    pub fn start(&mut self) -> Vec<RenderOp> {
        let mut ops = vec![RenderOp::Clear];

        match &self.tree {
            None => {
                self.current = None;
                ops.push(render::render_load_error());
            }
            Some(tree) => {
                ops.push(render::render_header(&self.avatar, &self.bot_name));
                match tree.get(&self.entry_point) {
                    Some(node) => {
                        self.current = Some(self.entry_point.clone());
                        ops.extend(render::render_state(node));
                    }
                    None => {
                        debug!(entry_point = %self.entry_point, "Entry point missing, nothing to render");
                        self.current = None;
                    }
                }
            }
        }

        self.transcript.apply(&ops);
        ops
    }

    /// Start over: drop the transcript and any pending render, then render
    /// the entry point again. The tree is not reloaded.
    pub fn reset(&mut self) -> Vec<RenderOp> {
        self.generation += 1;
        self.pending = None;
        self.start()
    }

    /// Select the option at `index` among the live controls.
    ///
    /// The echo and the option removal are applied immediately. The target is
    /// rendered only when the returned token is completed.
    pub fn select(&mut self, index: usize) -> Result<Selected, SessionError> {
        let tree = self.tree.clone().ok_or(SessionError::NotStarted)?;
        if self.pending.is_some() {
            return Err(SessionError::Busy);
        }

        let choices = self.transcript.live_choices();
        let choice = choices
            .get(index)
            .cloned()
            .ok_or(SessionError::NoSuchOption {
                index,
                available: choices.len(),
            })?;

        let mut ops = render::render_user_echo(&choice);
        ops.push(RenderOp::RemoveOptions);
        self.transcript.apply(&ops);

        let outcome = if tree.contains(&choice.next) {
            self.current = Some(choice.next.clone());
            let token = PendingRender {
                generation: self.generation,
                target: choice.next,
            };
            self.pending = Some(token.clone());
            Selection::Scheduled(token)
        } else {
            debug!(target_state = %choice.next, "Option points nowhere, conversation stalls");
            Selection::Stalled
        };

        Ok(Selected { ops, outcome })
    }

    /// Redeem a pending render. Returns `None` for a stale token (one issued
    /// before a reset, or already completed).
    pub fn complete(&mut self, token: &PendingRender) -> Option<Vec<RenderOp>> {
        if token.generation != self.generation || self.pending.as_ref() != Some(token) {
            debug!(
                token_generation = token.generation,
                generation = self.generation,
                "Discarding stale pending render"
            );
            return None;
        }
        self.pending = None;

        let node = self.tree.as_ref()?.get(&token.target)?;
        let ops = render::render_state(node);
        self.transcript.apply(&ops);
        Some(ops)
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Node for the current state.
    pub fn current_node(&self) -> Option<&StateNode> {
        let tree = self.tree.as_ref()?;
        tree.get(self.current.as_deref()?)
    }

    pub fn tree(&self) -> Option<&Arc<DecisionTree>> {
        self.tree.as_ref()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            current: self.current.clone(),
            pending: self.is_pending(),
            entries: self.transcript.entries().to_vec(),
        }
    }
}
