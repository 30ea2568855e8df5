//! Chat sessions
//!
//! One [`ChatSession`] per session id. A turn locks only its own session, so
//! different users never wait on each other; turns of one user are serialized.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::disclosure::DisclosureAgent;
use crate::models::{RankedScheme, UserProfile};
use crate::profile::ProfileCollector;

pub enum SessionPhase {
    /// Collecting the profile through conversation
    Profiling(ProfileCollector),
    /// Walking the ranked list
    Browsing(DisclosureAgent),
    Closed,
}

impl SessionPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Profiling(_) => "profiling",
            SessionPhase::Browsing(_) => "browsing",
            SessionPhase::Closed => "closed",
        }
    }
}

pub struct ChatSession {
    pub session_id: String,
    pub phase: SessionPhase,
    pub profile: Option<UserProfile>,
    pub schemes: Vec<RankedScheme>,
    last_activity: Instant,
}

impl ChatSession {
    pub fn new(session_id: impl Into<String>, collector: ProfileCollector) -> Self {
        Self {
            session_id: session_id.into(),
            phase: SessionPhase::Profiling(collector),
            profile: None,
            schemes: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_expired(&self, idle: Duration) -> bool {
        self.last_activity.elapsed() > idle
    }
}

pub type SessionHandle = Arc<Mutex<ChatSession>>;

pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    idle_timeout: Duration,
}

impl SessionManager {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Existing session for `session_id`, or a new one built by `make`.
    /// A missing id gets a fresh UUID.
    pub async fn get_or_create<F>(&self, session_id: Option<&str>, make: F) -> (String, SessionHandle)
    where
        F: FnOnce(String) -> ChatSession,
    {
        let id = match session_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        if let Some(handle) = self.get(&id).await {
            return (id, handle);
        }

        let mut sessions = self.sessions.write().await;
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(session_id = %id, "Created session");
                Arc::new(Mutex::new(make(id.clone())))
            })
            .clone();
        (id, handle)
    }

    pub async fn remove(&self, session_id: &str) -> bool {
        self.sessions.write().await.remove(session_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle past the timeout. Sessions mid-turn are skipped.
    pub async fn purge_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, handle| match handle.try_lock() {
            Ok(session) if session.is_expired(self.idle_timeout) => {
                info!(session_id = %id, "Cleaned up expired session");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }

    /// Periodic [`purge_idle`](Self::purge_idle) on the runtime
    pub fn spawn_cleanup(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                manager.purge_idle().await;
            }
        })
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(3600))
    }
}
