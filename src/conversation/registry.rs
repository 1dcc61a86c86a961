//! Session registry — independent conversations over one shared tree.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::controller::Conversation;
use super::session::ConversationSession;
use crate::config::ChatConfig;
use crate::error::SessionError;
use crate::tree::DecisionTree;

/// Upper bound on how often idle sessions are swept.
const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Creates, finds, and drops conversation sessions.
pub struct SessionRegistry {
    /// `None` when loading failed; every session then shows the load error.
    tree: Option<Arc<DecisionTree>>,
    entry_point: String,
    avatar: String,
    bot_name: String,
    typing_delay: Duration,
    idle_timeout: Duration,
    sessions: RwLock<HashMap<Uuid, Arc<ConversationSession>>>,
}

impl SessionRegistry {
    pub fn new(tree: Option<Arc<DecisionTree>>, config: &ChatConfig) -> Arc<Self> {
        Arc::new(Self {
            tree,
            entry_point: config.entry_point.clone(),
            avatar: config.avatar.clone(),
            bot_name: config.bot_name.clone(),
            typing_delay: config.typing_delay,
            idle_timeout: config.session_idle_timeout,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// The loaded tree, if any.
    pub fn tree(&self) -> Option<&Arc<DecisionTree>> {
        self.tree.as_ref()
    }

    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// A started conversation that is not tracked by the registry.
    pub fn detached(&self) -> Arc<ConversationSession> {
        let conversation =
            Conversation::new(self.tree.clone(), self.entry_point.clone(), self.avatar.clone())
                .with_bot_name(self.bot_name.clone());
        ConversationSession::start(conversation, self.typing_delay)
    }

    /// Start a new tracked conversation.
    pub async fn create(&self) -> Arc<ConversationSession> {
        let session = self.detached();
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::clone(&session));
        session
    }

    /// Look up a tracked session. A lookup counts as activity.
    pub async fn get(&self, id: Uuid) -> Result<Arc<ConversationSession>, SessionError> {
        let session = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
        session.touch().await;
        Ok(session)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            debug!(session_id = %id, "Session removed");
        }
        removed
    }

    /// Drop sessions idle for at least the idle timeout. Sessions with an
    /// attached frontend are kept. Returns how many were pruned.
    pub async fn prune_idle(&self) -> usize {
        let tracked: Vec<_> = self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for session in tracked {
            if !session.has_subscribers() && session.idle_for().await >= self.idle_timeout {
                expired.push(session);
            }
        }
        if expired.is_empty() {
            return 0;
        }

        {
            let mut sessions = self.sessions.write().await;
            for session in &expired {
                sessions.remove(&session.id());
            }
        }
        for session in &expired {
            session.close().await;
            debug!(session_id = %session.id(), "Idle session pruned");
        }

        info!(count = expired.len(), "Pruned idle sessions");
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// Spawn a background task that periodically prunes idle sessions.
pub fn spawn_expiry_task(registry: Arc<SessionRegistry>) -> tokio::task::JoinHandle<()> {
    let period = registry.idle_timeout.min(EXPIRY_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            registry.prune_idle().await;
        }
    })
}
