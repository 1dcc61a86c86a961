//! Live conversation session — wraps a `Conversation` with the typing delay
//! and fans render operations out to attached frontends.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::controller::{Conversation, ConversationSnapshot, PendingRender, Selection};
use crate::error::SessionError;
use crate::render::RenderOp;

/// Broadcast channel capacity for render batches.
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

struct SessionState {
    conversation: Conversation,
    /// The delayed render currently scheduled, if any.
    typing: Option<JoinHandle<()>>,
    /// Last time a frontend acted on or looked up this session.
    last_active: Instant,
}

/// A conversation plus its scheduling. All mutation goes through one lock,
/// so transcript batches never interleave.
pub struct ConversationSession {
    id: Uuid,
    typing_delay: Duration,
    state: Mutex<SessionState>,
    tx: broadcast::Sender<Vec<RenderOp>>,
}

impl ConversationSession {
    /// Start a conversation (renders the entry point) and wrap it.
    pub fn start(mut conversation: Conversation, typing_delay: Duration) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        conversation.start();
        let id = Uuid::new_v4();
        info!(session_id = %id, current = ?conversation.current(), "Conversation started");

        Arc::new(Self {
            id,
            typing_delay,
            state: Mutex::new(SessionState {
                conversation,
                typing: None,
                last_active: Instant::now(),
            }),
            tx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subscribe to render batches produced after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Vec<RenderOp>> {
        self.tx.subscribe()
    }

    /// Whether a frontend is currently attached to the render stream.
    pub fn has_subscribers(&self) -> bool {
        self.tx.receiver_count() > 0
    }

    /// Mark the session as active now.
    pub async fn touch(&self) {
        self.state.lock().await.last_active = Instant::now();
    }

    /// Time since the session was last touched.
    pub async fn idle_for(&self) -> Duration {
        self.state.lock().await.last_active.elapsed()
    }

    pub async fn snapshot(&self) -> ConversationSnapshot {
        self.state.lock().await.conversation.snapshot()
    }

    /// Debug view: current state id and its node.
    pub async fn inspect(&self) -> serde_json::Value {
        let state = self.state.lock().await;
        let conv = &state.conversation;
        serde_json::json!({
            "session_id": self.id,
            "current": conv.current(),
            "state": conv.current_node(),
            "generation": conv.generation(),
            "pending": conv.is_pending(),
        })
    }

    /// Select a live option. The echo is broadcast right away; the target's
    /// content follows after the typing delay.
    pub async fn select(self: &Arc<Self>, index: usize) -> Result<Vec<RenderOp>, SessionError> {
        let mut state = self.state.lock().await;
        state.last_active = Instant::now();
        let selected = state.conversation.select(index)?;
        self.broadcast(selected.ops.clone());

        match selected.outcome {
            Selection::Scheduled(token) => {
                debug!(session_id = %self.id, next_state = %token.target, "Scheduling render");
                let session = Arc::clone(self);
                state.typing = Some(tokio::spawn(async move {
                    tokio::time::sleep(session.typing_delay).await;
                    session.finish_typing(token).await;
                }));
            }
            Selection::Stalled => {
                info!(session_id = %self.id, "Selected option has no target state");
            }
        }

        Ok(selected.ops)
    }

    /// Clear the transcript and start over. Any scheduled render is cancelled.
    pub async fn reset(&self) -> Vec<RenderOp> {
        let mut state = self.state.lock().await;
        if let Some(task) = state.typing.take() {
            task.abort();
        }
        state.last_active = Instant::now();
        let ops = state.conversation.reset();
        info!(session_id = %self.id, "Conversation reset");
        self.broadcast(ops.clone());
        ops
    }

    /// Cancel any scheduled render. Used when the frontend goes away.
    pub async fn close(&self) {
        if let Some(task) = self.state.lock().await.typing.take() {
            task.abort();
            debug!(session_id = %self.id, "Scheduled render cancelled on close");
        }
    }

    /// Resolves once no render is scheduled.
    pub async fn settled(&self) {
        loop {
            let task = self.state.lock().await.typing.take();
            match task {
                Some(task) => {
                    // aborted tasks resolve with a JoinError, which is fine here
                    let _ = task.await;
                }
                None => return,
            }
        }
    }

    async fn finish_typing(&self, token: PendingRender) {
        let mut state = self.state.lock().await;
        if let Some(ops) = state.conversation.complete(&token) {
            state.typing = None;
            self.broadcast(ops);
        }
    }

    fn broadcast(&self, ops: Vec<RenderOp>) {
        // no subscribers is fine
        let _ = self.tx.send(ops);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Entry;
    use crate::tree::{ChatOption, DecisionTree, StateNode};

    const DELAY: Duration = Duration::from_millis(300);

    fn session() -> Arc<ConversationSession> {
        let tree: DecisionTree = [
            (
                "language_select".to_string(),
                StateNode::new("Hi").with_options(vec![ChatOption::new("English", "en_menu")]),
            ),
            (
                "en_menu".to_string(),
                StateNode::new("Menu").with_products(vec![]),
            ),
        ]
        .into_iter()
        .collect();
        let conv = Conversation::new(Some(Arc::new(tree)), "language_select", "robot.gif");
        ConversationSession::start(conv, DELAY)
    }

    fn last_bot_html(snapshot: &ConversationSnapshot) -> Option<&str> {
        snapshot.entries.iter().rev().find_map(|e| match e {
            Entry::Bot { html, .. } => Some(html.as_str()),
            _ => None,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn renders_target_after_typing_delay() {
        let session = session();
        session.select(0).await.unwrap();

        let snap = session.snapshot().await;
        assert!(snap.pending);
        assert_eq!(last_bot_html(&snap), Some("Hi"));

        tokio::time::sleep(DELAY + Duration::from_millis(10)).await;
        session.settled().await;

        let snap = session.snapshot().await;
        assert!(!snap.pending);
        assert_eq!(snap.current.as_deref(), Some("en_menu"));
        assert_eq!(last_bot_html(&snap), Some("Menu"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_cancels_scheduled_render() {
        let session = session();
        session.select(0).await.unwrap();
        session.reset().await;

        tokio::time::sleep(DELAY * 3).await;
        session.settled().await;

        let snap = session.snapshot().await;
        assert_eq!(snap.current.as_deref(), Some("language_select"));
        assert_eq!(last_bot_html(&snap), Some("Hi"));
        assert!(!snap.entries.iter().any(|e| matches!(e, Entry::User { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_echo_then_render() {
        let session = session();
        let mut rx = session.subscribe();
        session.select(0).await.unwrap();

        let echo = rx.recv().await.unwrap();
        assert!(echo.contains(&RenderOp::RemoveOptions));

        let render = rx.recv().await.unwrap();
        assert!(matches!(
            &render[0],
            RenderOp::Append { entry: Entry::Bot { html, .. } } if html == "Menu"
        ));
    }

    #[tokio::test]
    async fn second_select_while_typing_is_busy() {
        let session = session();
        session.select(0).await.unwrap();
        assert!(matches!(session.select(0).await, Err(SessionError::Busy)));
    }

    #[tokio::test(start_paused = true)]
    async fn activity_resets_idle_clock() {
        let session = session();
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(session.idle_for().await >= Duration::from_secs(60));

        session.reset().await;
        assert!(session.idle_for().await < Duration::from_secs(1));

        tokio::time::advance(Duration::from_secs(5)).await;
        session.touch().await;
        assert!(session.idle_for().await < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn subscriber_count_tracks_receivers() {
        let session = session();
        assert!(!session.has_subscribers());
        let rx = session.subscribe();
        assert!(session.has_subscribers());
        drop(rx);
        assert!(!session.has_subscribers());
    }

    #[tokio::test]
    async fn inspect_reports_current_state() {
        let session = session();
        let debug = session.inspect().await;
        assert_eq!(debug["current"], "language_select");
        assert_eq!(debug["state"]["message"], "Hi");
    }
}
