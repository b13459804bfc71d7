//! Session service: load, handle, and save one turn under a per-session lock.
//!
//! Turns for the same session id run strictly one after another; distinct
//! sessions run concurrently. The next turn for a session always sees the
//! fully saved result of the previous one. A session's lock lives only
//! while some turn holds or waits on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use pmos_core::error::StoreError;
use pmos_core::session::{DecisionLog, Session, SessionId};
use pmos_core::store::{SessionStore, SessionSummary};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::response::{RouteDecision, RouterResponse, TurnError};
use crate::router::{Router, TurnRequest};

type LockMap = StdMutex<HashMap<SessionId, Arc<Mutex<()>>>>;

/// A claim on one session's lock. Dropping the last claim removes the map
/// entry, including when the owning future is cancelled.
struct SessionLease<'a> {
    locks: &'a LockMap,
    id: SessionId,
    lock: Arc<Mutex<()>>,
}

impl Drop for SessionLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here: nobody else holds or waits.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.id);
        }
    }
}

pub struct SessionService {
    router: Router,
    store: Arc<dyn SessionStore>,
    locks: LockMap,
}

impl SessionService {
    pub fn new(router: Router, store: Arc<dyn SessionStore>) -> Self {
        Self {
            router,
            store,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn lease(&self, id: &SessionId) -> SessionLease<'_> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        SessionLease {
            locks: &self.locks,
            id: id.clone(),
            lock,
        }
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    async fn load_or_new(&self, id: &SessionId) -> Result<Session, StoreError> {
        match self.store.load(id).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => {
                info!(session_id = %id, "Starting new session");
                Ok(Session::new(id.clone()))
            }
            Err(e) => {
                error!(session_id = %id, store = %self.store.name(), error = %e, "Failed to load session");
                Err(e)
            }
        }
    }

    /// Classify and handle one message.
    pub async fn handle(&self, id: &SessionId, message: &str) -> Result<RouterResponse, StoreError> {
        self.handle_request(id, TurnRequest::classify(message)).await
    }

    /// Handle one turn.
    ///
    /// A load failure aborts before any processing and is the only `Err`.
    /// A save failure still returns the in-memory result, with `saved = false`
    /// and a persistence error attached.
    pub async fn handle_request(
        &self,
        id: &SessionId,
        request: TurnRequest,
    ) -> Result<RouterResponse, StoreError> {
        let lease = self.lease(id);
        let _guard = lease.lock.lock().await;

        let mut session = self.load_or_new(id).await?;
        let mut response = self.router.handle_request(&mut session, request).await;

        match self.store.save(&session).await {
            Ok(()) => response.saved = true,
            Err(e) => {
                error!(session_id = %id, store = %self.store.name(), error = %e, "Failed to save session");
                response.saved = false;
                response.notes.push("Your turn was not saved.".into());
                // An agent error, if any, is more useful to keep than to overwrite
                if response.error.is_none() {
                    response.error = Some(TurnError::Persistence {
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(response)
    }

    /// Dry run against the stored session. Nothing is saved.
    pub async fn route(&self, id: &SessionId, message: &str) -> Result<RouteDecision, StoreError> {
        let session = self.load_or_new(id).await?;
        Ok(self.router.route(&session, message).await)
    }

    pub async fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.store.load(id).await
    }

    pub async fn decisions(&self, id: &SessionId) -> Result<Option<DecisionLog>, StoreError> {
        Ok(self.store.load(id).await?.map(|s| s.decisions().clone()))
    }

    pub async fn list(&self) -> Result<Vec<SessionSummary>, StoreError> {
        self.store.list().await
    }

    /// Clear artifacts and phase. Turn history and decisions are kept.
    /// `Ok(None)` when the session does not exist.
    pub async fn reset(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let lease = self.lease(id);
        let _guard = lease.lock.lock().await;

        let Some(mut session) = self.store.load(id).await? else {
            return Ok(None);
        };
        session.reset();
        self.store.save(&session).await?;
        info!(session_id = %id, "Session reset");
        Ok(Some(session))
    }
}
