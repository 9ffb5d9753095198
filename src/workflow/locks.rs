//! Per-session exclusive sections

use crate::session::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per session id, created on demand and dropped once idle.
#[derive(Default)]
pub(crate) struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub(crate) async fn acquire(self: &Arc<Self>, id: SessionId) -> SessionGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(id).or_default().clone()
        };

        SessionGuard {
            id,
            guard: Some(lock.lock_owned().await),
            locks: Arc::clone(self),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Held for a whole transition; releasing the last holder forgets the lock.
pub(crate) struct SessionGuard {
    id: SessionId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<SessionLocks>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self.locks.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map's own handle left means nobody holds or awaits it
        let idle = locks
            .get(&self.id)
            .map(|lock| Arc::strong_count(lock) == 1)
            .unwrap_or(false);
        if idle {
            locks.remove(&self.id);
        }
    }
}
