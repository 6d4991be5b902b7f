//! Reading sessions held by the HTTP server, one `AppState` per browser tab.
//!
//! Handlers never hold a state lock across a gateway call: they snapshot
//! what they need, release, await, then re-lock and apply the outcome.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use tuvi_agent::AppState;
use tuvi_core::UserProfile;

pub type SharedState = Arc<Mutex<AppState>>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SharedState>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, profile: UserProfile) -> (Uuid, SharedState) {
        let state = AppState::new(profile);
        let id = state.session_id;
        let shared = Arc::new(Mutex::new(state));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        (id, shared)
    }

    pub async fn get(&self, id: Uuid) -> Option<SharedState> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.sessions.write().await.remove(&id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_remove() {
        let registry = SessionRegistry::new();
        let (id, state) = registry.create(UserProfile::default()).await;
        assert_eq!(state.lock().await.session_id, id);
        assert!(registry.get(id).await.is_some());
        assert_eq!(registry.len().await, 1);

        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(registry.get(id).await.is_none());
    }
}
