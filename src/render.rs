//! Render engine — pure `StateNode` → render operations.
//!
//! Nothing here touches a conversation or the store. Frontends apply the
//! returned operations to their own view: the in-memory transcript, a
//! WebSocket client, or the terminal.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::tree::{ChatOption, Product, StateNode};

/// Marker shown next to every bot message.
pub const BOT_AVATAR_MARKER: &str = "🤖";

/// Alt text of the header avatar when no bot name is configured.
pub const DEFAULT_BOT_NAME: &str = "Chat assistant";

/// Text of the entry shown when the decision tree cannot be loaded.
pub const LOAD_ERROR_TEXT: &str =
    "⚠️ Unable to load chatbot data. Please refresh the page or contact support.";

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<br\s*/?>|</?[a-z][^>]*>").expect("static tag pattern")
});

/// A product card as shown under a bot message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCard {
    pub title: String,
    pub description: String,
    pub images: Vec<CardImage>,
    pub price: String,
}

/// An image inside a product card. The reference is never fetched here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardImage {
    pub src: String,
    pub alt: String,
}

/// One interactive control in an options block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Label markup, rendered as trusted.
    pub label_html: String,
    /// What the user actually sees on the control.
    pub label_text: String,
    /// Target state identifier.
    pub next: String,
}

/// A rendered transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Entry {
    /// Avatar banner at the top of a started conversation.
    Header { avatar: String, alt: String },
    /// A bot message with optional product cards.
    Bot {
        avatar: String,
        html: String,
        products: Vec<ProductCard>,
        at: DateTime<Utc>,
    },
    /// The live option controls for the latest bot message.
    Options { choices: Vec<Choice> },
    /// The user's echoed selection.
    User { text: String, at: DateTime<Utc> },
    /// Static notice shown when the tree is unavailable.
    Error { avatar: String, text: String },
}

impl Entry {
    /// Terminal rendering of the entry.
    pub fn to_plain_text(&self) -> String {
        match self {
            Entry::Header { alt, .. } => format!("[{alt}]"),
            Entry::Bot {
                avatar,
                html,
                products,
                ..
            } => {
                let mut lines = vec![format!("{avatar} {}", visible_text(html))];
                for product in products {
                    lines.push(format!("   ▸ {}", product.title));
                    lines.push(format!("     {}", product.description));
                    for image in &product.images {
                        lines.push(format!("     [image: {}]", image.src));
                    }
                    lines.push(format!("     {}", product.price));
                }
                lines.join("\n")
            }
            Entry::Options { choices } => choices
                .iter()
                .enumerate()
                .map(|(i, c)| format!("  [{}] {}", i + 1, c.label_text))
                .collect::<Vec<_>>()
                .join("\n"),
            Entry::User { text, .. } => format!("        you › {text}"),
            Entry::Error { avatar, text } => format!("{avatar} {text}"),
        }
    }
}

/// A single instruction for a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RenderOp {
    Append { entry: Entry },
    RemoveOptions,
    Clear,
    ScrollToBottom,
}

/// Render a state: one bot entry, then its options (if any), then a scroll.
pub fn render_state(node: &StateNode) -> Vec<RenderOp> {
    let mut ops = vec![RenderOp::Append {
        entry: Entry::Bot {
            avatar: BOT_AVATAR_MARKER.to_string(),
            html: message_html(&node.message),
            products: node.products().iter().map(product_card).collect(),
            at: Utc::now(),
        },
    }];

    if !node.is_leaf() {
        ops.push(RenderOp::Append {
            entry: Entry::Options {
                choices: node.options().iter().map(choice).collect(),
            },
        });
    }

    ops.push(RenderOp::ScrollToBottom);
    ops
}

/// Echo a selected choice as a user entry.
pub fn render_user_echo(choice: &Choice) -> Vec<RenderOp> {
    vec![
        RenderOp::Append {
            entry: Entry::User {
                text: choice.label_text.clone(),
                at: Utc::now(),
            },
        },
        RenderOp::ScrollToBottom,
    ]
}

/// Avatar banner shown when a conversation starts, labeled with the bot's name.
pub fn render_header(avatar: &str, bot_name: &str) -> RenderOp {
    RenderOp::Append {
        entry: Entry::Header {
            avatar: avatar.to_string(),
            alt: bot_name.to_string(),
        },
    }
}

/// The single entry shown instead of any chat content when loading failed.
pub fn render_load_error() -> RenderOp {
    RenderOp::Append {
        entry: Entry::Error {
            avatar: BOT_AVATAR_MARKER.to_string(),
            text: LOAD_ERROR_TEXT.to_string(),
        },
    }
}

/// Convert `\n` to `<br>`; the rest of the message is trusted markup.
pub fn message_html(message: &str) -> String {
    message.replace('\n', "<br>")
}

/// Visible text of a markup fragment: tags dropped, `<br>` as newline,
/// common entities decoded.
pub fn visible_text(html: &str) -> String {
    let stripped = TAG_RE.replace_all(html, |caps: &regex::Captures<'_>| {
        if caps[0].to_ascii_lowercase().starts_with("<br") {
            "\n"
        } else {
            ""
        }
    });
    decode_entities(&stripped)
}

fn decode_entities(text: &str) -> String {
    // &amp; last so "&amp;lt;" stays "&lt;"
    text.replace("&nbsp;", "\u{a0}")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn product_card(product: &Product) -> ProductCard {
    ProductCard {
        title: product.title.clone(),
        description: product.description.clone(),
        images: product
            .images
            .iter()
            .map(|src| CardImage {
                src: src.clone(),
                alt: product.title.clone(),
            })
            .collect(),
        price: product.price.clone(),
    }
}

fn choice(option: &ChatOption) -> Choice {
    Choice {
        label_html: option.label.clone(),
        label_text: visible_text(&option.label),
        next: option.next.clone(),
    }
}
