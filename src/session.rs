//! Per-user locate sessions.
//!
//! A "find my cup" request sets a target; later frames from the same user
//! are located against it. The store is owned by whoever serves requests
//! and keyed by session id, so concurrent users never see each other's
//! targets.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

use crate::inference::Query;

pub type SessionId = String;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEntry {
    pub timestamp: SystemTime,
    pub text: String,
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct LocateSession {
    /// Query as prepared by the ranker, reused for every frame
    pub target: Query,
    pub started_at: SystemTime,
    pub frames_processed: u64,
    last_active: Instant,
    history: VecDeque<OutcomeEntry>,
}

impl LocateSession {
    pub fn new(target: Query) -> Self {
        Self {
            target,
            started_at: SystemTime::now(),
            frames_processed: 0,
            last_active: Instant::now(),
            history: VecDeque::new(),
        }
    }

    pub fn history(&self) -> &VecDeque<OutcomeEntry> {
        &self.history
    }

    /// Time since the target was set or a frame was located.
    pub fn idle_for(&self) -> Duration {
        self.last_active.elapsed()
    }
}

pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, LocateSession>>,
    max_history: usize,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_history,
        }
    }

    /// Starts (or restarts) a session with a new target.
    pub fn set_target(&self, id: &str, target: Query) {
        debug!("Session {} now looking for '{}'", id, target.describe());
        self.sessions
            .write()
            .insert(id.to_string(), LocateSession::new(target));
    }

    /// Current target for a session, if one was set.
    pub fn target(&self, id: &str) -> Option<Query> {
        self.sessions.read().get(id).map(|s| s.target.clone())
    }

    pub fn session(&self, id: &str) -> Option<LocateSession> {
        self.sessions.read().get(id).cloned()
    }

    pub fn record_outcome(&self, id: &str, text: String, success: bool) {
        let mut sessions = self.sessions.write();
        if let Some(session) = sessions.get_mut(id) {
            session.frames_processed += 1;
            session.last_active = Instant::now();
            session.history.push_back(OutcomeEntry {
                timestamp: SystemTime::now(),
                text,
                success,
            });
            while session.history.len() > self.max_history {
                session.history.pop_front();
            }
        }
    }

    /// Ends a session. Returns whether one existed.
    pub fn clear(&self, id: &str) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Drops sessions idle for at least `max_idle`. Returns how many went.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = session.idle_for() < max_idle;
            if !keep {
                let age = session
                    .started_at
                    .elapsed()
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                debug!(
                    "Evicting idle session {} ('{}', {} frames, started {}s ago)",
                    id,
                    session.target.describe(),
                    session.frames_processed,
                    age
                );
            }
            keep
        });
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(10)
    }
}
