//! Transcript — the ordered, visible chat history.

use serde::Serialize;

use crate::render::{Choice, Entry, RenderOp};

/// Append-only list of rendered entries. Option blocks are the only entries
/// ever removed individually; everything else goes at once on `Clear`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    entries: Vec<Entry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of render operations in order.
    pub fn apply(&mut self, ops: &[RenderOp]) {
        for op in ops {
            match op {
                RenderOp::Append { entry } => self.entries.push(entry.clone()),
                RenderOp::RemoveOptions => self
                    .entries
                    .retain(|e| !matches!(e, Entry::Options { .. })),
                RenderOp::Clear => self.entries.clear(),
                RenderOp::ScrollToBottom => {}
            }
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    /// Choices currently clickable, empty when no options block is shown.
    pub fn live_choices(&self) -> &[Choice] {
        self.entries
            .iter()
            .rev()
            .find_map(|e| match e {
                Entry::Options { choices } => Some(choices.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// The whole transcript as terminal text.
    pub fn to_plain_text(&self) -> String {
        self.entries
            .iter()
            .map(Entry::to_plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
