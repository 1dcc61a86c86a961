//! Decision tree data model — states, products, and options.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One node of the conversation tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateNode {
    /// Bot message. May contain `\n` line breaks and trusted inline markup.
    pub message: String,
    /// Product cards shown under the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Product>>,
    /// Choices offered to the user. Absent or empty makes this node a leaf.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<ChatOption>>,
}

impl StateNode {
    /// Create a node with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            products: None,
            options: None,
        }
    }

    pub fn with_options(mut self, options: Vec<ChatOption>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn with_products(mut self, products: Vec<Product>) -> Self {
        self.products = Some(products);
        self
    }

    /// Options offered at this node, empty for a leaf.
    pub fn options(&self) -> &[ChatOption] {
        self.options.as_deref().unwrap_or_default()
    }

    /// Products shown at this node.
    pub fn products(&self) -> &[Product] {
        self.products.as_deref().unwrap_or_default()
    }

    /// Whether the conversation ends here.
    pub fn is_leaf(&self) -> bool {
        self.options().is_empty()
    }
}

/// A product card attached to a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub title: String,
    pub description: String,
    /// Relative image references, shown in order.
    #[serde(default)]
    pub images: Vec<String>,
    /// Pre-formatted price text, displayed verbatim.
    pub price: String,
}

/// A labeled transition to another state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatOption {
    /// Button label; may contain inline markup.
    pub label: String,
    /// Target state identifier. Not guaranteed to exist in the tree.
    pub next: String,
}

impl ChatOption {
    pub fn new(label: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next: next.into(),
        }
    }
}

/// The loaded decision tree: state identifier → node. Read-only after load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecisionTree {
    states: BTreeMap<String, StateNode>,
}

impl DecisionTree {
    pub fn get(&self, id: &str) -> Option<&StateNode> {
        self.states.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.states.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateNode)> {
        self.states.iter().map(|(id, node)| (id.as_str(), node))
    }

    /// Option targets that name no state, as `(state, target)` pairs.
    pub fn dangling_references(&self) -> Vec<(&str, &str)> {
        let mut dangling = Vec::new();
        for (id, node) in self.iter() {
            for opt in node.options() {
                if !self.contains(&opt.next) {
                    dangling.push((id, opt.next.as_str()));
                }
            }
        }
        dangling
    }
}

impl FromIterator<(String, StateNode)> for DecisionTree {
    fn from_iter<I: IntoIterator<Item = (String, StateNode)>>(iter: I) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}
