use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::RngCore;

use crate::types::{Detections, RegulatoryUpdate, RiskFinding};

/// Everything the UI remembers about one uploaded document.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub file_name: String,
    pub text: String,
    pub page_count: usize,
    pub chunk_count: usize,
    pub summary: String,
    pub chunks_failed: usize,
    pub clauses: Detections,
    pub obligations: Detections,
    pub risks: Vec<RiskFinding>,
    pub risk_score: u32,
    /// Last fetched regulatory updates; empty until the user asks for them.
    pub updates: Vec<RegulatoryUpdate>,
    pub created_at: DateTime<Utc>,
}

pub fn new_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// In-memory sessions keyed by id. One writer per request; no persistence.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> String {
        let id = session.id.clone();
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(id.clone(), session);
        id
    }

    pub fn get(&self, id: &str) -> Option<Session> {
        let map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        map.get(id).cloned()
    }

    /// Apply `f` to the session in place. Returns `None` when the id is unknown.
    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        map.get_mut(id).map(f)
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut map = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
