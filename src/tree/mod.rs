//! Decision tree store — the static script every conversation follows.

pub mod loader;
pub mod model;

pub use loader::{FileSource, HttpSource, TreeSource, load_tree, parse_tree, source_for};
pub use model::{ChatOption, DecisionTree, Product, StateNode};
