//! In-memory session store with idle expiry

use super::{KycSession, SessionId, SessionStore};
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct Entry {
    session: KycSession,
    written_at: Instant,
}

/// Sessions expire `ttl` after their last write.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Entry>>>,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: Some(ttl),
        }
    }

    pub fn without_expiry() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl: None,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        match self.ttl {
            Some(ttl) => entry.written_at.elapsed() >= ttl,
            None => false,
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::without_expiry()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<KycSession>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.session.clone()))
    }

    async fn put(&self, session: KycSession) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session.session_id,
            Entry {
                session,
                written_at: Instant::now(),
            },
        );
        Ok(())
    }

    async fn evict(&self, id: &SessionId) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        Ok(sessions.remove(id).is_some())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| !self.is_expired(entry));
        Ok(before - sessions.len())
    }
}

/// Periodically purge expired sessions until the task is aborted.
pub fn spawn_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "Expired sessions purged"),
                Err(e) => warn!(error = %e, "Session sweep failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facial::FaceRef;

    fn session() -> KycSession {
        KycSession::new(FaceRef::new("document-face"))
    }

    #[tokio::test]
    async fn test_put_get_evict() {
        let store = InMemorySessionStore::without_expiry();
        let session = session();
        let id = session.session_id;

        store.put(session.clone()).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), Some(session));

        assert!(store.evict(&id).await.unwrap());
        assert!(!store.evict(&id).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_session_reads_absent_and_purges() {
        let store = InMemorySessionStore::new(Duration::ZERO);
        let expired = session();
        let id = expired.session_id;

        store.put(expired).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap(), None);
        assert_eq!(store.len().await, 1);

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_live_sessions_survive_purge() {
        let store = InMemorySessionStore::new(Duration::from_secs(3600));
        store.put(session()).await.unwrap();
        store.put(session()).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_sweeper_purges_in_background() {
        let store = Arc::new(InMemorySessionStore::new(Duration::ZERO));
        store.put(session()).await.unwrap();

        let handle = spawn_sweeper(store.clone(), Duration::from_millis(5));
        for _ in 0..100 {
            if store.is_empty().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.abort();

        assert!(store.is_empty().await);
    }
}
