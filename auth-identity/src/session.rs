use crate::models::PrincipalType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Server-side session record mirroring the authenticated principal.
///
/// Kept for backward-compatible call sites that predate credential-based
/// auth. The mirror is written at login, touched on activity, and compared
/// against credential claims by the session-consistency check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacySession {
    pub session_id: Uuid,
    pub principal_id: Uuid,
    pub principal_type: PrincipalType,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// In-memory legacy-session store.
///
/// Shared across requests; all mutation goes through the write lock.
#[derive(Clone, Default)]
pub struct LegacySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, LegacySession>>>,
}

impl LegacySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, session_id: Uuid, principal_id: Uuid, principal_type: PrincipalType) {
        let now = Utc::now();
        let session = LegacySession {
            session_id,
            principal_id,
            principal_type,
            created_at: now,
            last_activity: now,
        };
        self.sessions.write().await.insert(session_id, session);
    }

    pub async fn get(&self, session_id: Uuid) -> Option<LegacySession> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// Best-effort activity timestamp update. A miss is not an error; the
    /// session may already be gone.
    pub async fn touch(&self, session_id: Uuid) {
        if let Some(session) = self.sessions.write().await.get_mut(&session_id) {
            session.last_activity = Utc::now();
        }
    }

    pub async fn destroy(&self, session_id: Uuid) {
        self.sessions.write().await.remove(&session_id);
    }

    /// Compare the mirror against credential claims. Drift means the session
    /// no longer describes the same identity and must be invalidated.
    pub async fn matches(
        &self,
        session_id: Uuid,
        principal_id: Uuid,
        principal_type: PrincipalType,
    ) -> Option<bool> {
        self.get(session_id)
            .await
            .map(|s| s.principal_id == principal_id && s.principal_type == principal_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_destroy() {
        let store = LegacySessionStore::new();
        let sid = Uuid::new_v4();
        let pid = Uuid::new_v4();

        store.create(sid, pid, PrincipalType::OrgUser).await;
        let session = store.get(sid).await.expect("session exists");
        assert_eq!(session.principal_id, pid);

        store.destroy(sid).await;
        assert!(store.get(sid).await.is_none());
    }

    #[tokio::test]
    async fn drift_detection() {
        let store = LegacySessionStore::new();
        let sid = Uuid::new_v4();
        let pid = Uuid::new_v4();
        store.create(sid, pid, PrincipalType::OrgUser).await;

        assert_eq!(store.matches(sid, pid, PrincipalType::OrgUser).await, Some(true));
        // Different principal id in the credential: drift
        assert_eq!(
            store.matches(sid, Uuid::new_v4(), PrincipalType::OrgUser).await,
            Some(false)
        );
        // Different principal type: drift
        assert_eq!(store.matches(sid, pid, PrincipalType::Admin).await, Some(false));
        // Unknown session
        assert_eq!(store.matches(Uuid::new_v4(), pid, PrincipalType::OrgUser).await, None);
    }
}
