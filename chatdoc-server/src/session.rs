use std::{collections::HashMap, sync::Arc};

use chatdoc_rag::ChatSession;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{config::Services, protocol::SessionId};

/// Owns every live [`ChatSession`], keyed by an opaque id.
#[derive(Debug, Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<ChatSession>>>>,
    services: Services,
}

impl SessionManager {
    pub fn new(services: Services) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), services }
    }

    pub async fn create_session(&self) -> SessionId {
        let session_id = Uuid::new_v4().to_string();
        let session = Arc::new(ChatSession::new(
            Arc::clone(&self.services.embedder),
            Arc::clone(&self.services.engine),
        ));
        self.sessions.write().await.insert(session_id.clone(), session);
        session_id
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<ChatSession>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Drop a session and everything it holds. Requests already holding the
    /// session finish against their own handle.
    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
