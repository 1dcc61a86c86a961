//! Decision tree loader — one-shot fetch from a file or URL.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::model::DecisionTree;
use crate::error::LoadError;

/// Where the raw decision tree JSON comes from.
#[async_trait]
pub trait TreeSource: Send + Sync {
    /// Human-readable location, used in logs and errors.
    fn describe(&self) -> String;

    /// Fetch the raw JSON payload.
    async fn fetch(&self) -> Result<String, LoadError>;
}

/// Reads the tree from a local file.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TreeSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| LoadError::Read {
                path: self.describe(),
                source,
            })
    }
}

/// Fetches the tree over HTTP(S).
pub struct HttpSource {
    url: String,
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl TreeSource for HttpSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn fetch(&self) -> Result<String, LoadError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| LoadError::Request {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| LoadError::Request {
            url: self.url.clone(),
            reason: e.to_string(),
        })
    }
}

/// Pick a source for a configured location: `http(s)://` URLs go over the
/// network, anything else is a file path.
pub fn source_for(location: &str) -> Box<dyn TreeSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Box::new(HttpSource::new(location))
    } else {
        Box::new(FileSource::new(location))
    }
}

/// Parse a raw payload into a tree. Structurally malformed nodes fail here.
pub fn parse_tree(source_name: &str, raw: &str) -> Result<DecisionTree, LoadError> {
    serde_json::from_str(raw).map_err(|e| LoadError::Malformed {
        source_name: source_name.to_string(),
        reason: e.to_string(),
    })
}

/// Fetch and parse the tree. No retry: a failure here is final.
///
/// Dangling option targets and a missing entry point are logged but do not
/// fail the load; at runtime they stall the conversation or leave it empty.
pub async fn load_tree(
    source: &dyn TreeSource,
    entry_point: &str,
) -> Result<Arc<DecisionTree>, LoadError> {
    let name = source.describe();
    debug!(source = %name, "Loading decision tree");

    let raw = source.fetch().await?;
    let tree = parse_tree(&name, &raw)?;

    if !tree.contains(entry_point) {
        warn!(
            source = %name,
            entry_point,
            "Entry point missing from decision tree; conversations will start empty"
        );
    }
    for (state, target) in tree.dangling_references() {
        warn!(state, missing = target, "Option points at a state that does not exist");
    }

    info!(source = %name, states = tree.len(), "Decision tree loaded");
    Ok(Arc::new(tree))
}
