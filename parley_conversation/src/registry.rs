//! Sessions keyed by id, for hosts that serve several conversations at once.

use std::collections::HashMap;
use std::sync::Arc;

use parley_core::{ChatError, ChatProvider, Reply, ToolRegistry};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::manager::{SessionConfig, SessionManager};
use crate::transcript::Turn;

pub type SharedSession = Arc<Mutex<SessionManager>>;

/// Each session sits behind its own lock; a session that is already
/// answering rejects further submits with [`ChatError::Busy`].
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SharedSession>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(
        &self,
        provider: Arc<dyn ChatProvider>,
        config: SessionConfig,
        tools: Option<ToolRegistry>,
    ) -> Result<Uuid, ChatError> {
        let session = SessionManager::new(provider, config, tools)?;
        Ok(self.insert(session).await)
    }

    pub async fn insert(&self, session: SessionManager) -> Uuid {
        let id = session.session_id();
        self.sessions
            .lock()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        info!("Registered session {id}");
        id
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.lock().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &Uuid) -> Option<SharedSession> {
        let removed = self.sessions.lock().await.remove(id);
        if removed.is_some() {
            info!("Removed session {id}");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Submit to one session without waiting behind an in-flight message.
    pub async fn submit(&self, id: &Uuid, user_text: &str) -> Result<Reply, ChatError> {
        let session = self
            .get(id)
            .await
            .ok_or(ChatError::SessionNotFound(*id))?;

        let Ok(mut session) = session.try_lock_owned() else {
            debug!("Session {id} is busy");
            return Err(ChatError::Busy(*id));
        };
        session.submit(user_text).await
    }

    /// Snapshot of one session's transcript.
    pub async fn history(&self, id: &Uuid) -> Result<Vec<Turn>, ChatError> {
        let session = self
            .get(id)
            .await
            .ok_or(ChatError::SessionNotFound(*id))?;
        let session = session.lock().await;
        Ok(session.history().to_vec())
    }
}
