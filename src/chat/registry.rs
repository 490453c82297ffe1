//! Nickname registry for parley.
//!
//! Maps each nickname to the session it belongs to. Keys are
//! case-sensitive and unique at all times: a nickname is present exactly
//! while its connection's lifecycle is being served.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::server::ClientSession;

/// Outcome of a rename attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The registry now maps the new nickname to the session.
    Renamed,
    /// The requested nickname failed validation.
    Invalid,
    /// The requested nickname is already held.
    Taken,
}

/// Check a nickname against the protocol rules.
///
/// Commas would corrupt the roster frame and `#` opens a control frame,
/// so neither may appear where a nickname does.
pub fn is_valid_nickname(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(',') && !name.starts_with('#')
}

/// Registry of connected sessions, keyed by nickname.
///
/// Shared across all lifecycles. Each lifecycle mutates only its own
/// entry; broadcasts and commands read concurrently.
pub struct Registry {
    sessions: RwLock<HashMap<String, Arc<ClientSession>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Register a session under a nickname.
    ///
    /// Succeeds iff the nickname is free; the session's own nickname copy
    /// is updated under the same write guard.
    pub async fn try_register(&self, nickname: &str, session: Arc<ClientSession>) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(nickname) {
            return false;
        }
        session.set_nickname(nickname).await;
        sessions.insert(nickname.to_string(), session);
        debug!("registered {} (total: {})", nickname, sessions.len());
        true
    }

    /// Rebind a session from `old` to `new`.
    ///
    /// Validation order: malformed name, then collision. The remove and
    /// insert happen under one write guard, so no reader observes a state
    /// where neither or both keys exist, and two concurrent renames to
    /// the same target cannot both succeed.
    pub async fn try_rename(&self, old: &str, new: &str) -> RenameOutcome {
        if !is_valid_nickname(new) {
            return RenameOutcome::Invalid;
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(new) {
            return RenameOutcome::Taken;
        }
        match sessions.remove(old) {
            Some(session) => {
                session.set_nickname(new).await;
                sessions.insert(new.to_string(), session);
                RenameOutcome::Renamed
            }
            // Only the owning lifecycle renames its entry, so a missing
            // old key means that lifecycle already deregistered.
            None => RenameOutcome::Invalid,
        }
    }

    /// Remove a nickname. No-op if absent.
    pub async fn remove(&self, nickname: &str) -> Option<Arc<ClientSession>> {
        let removed = self.sessions.write().await.remove(nickname);
        if removed.is_some() {
            debug!("removed {}", nickname);
        }
        removed
    }

    /// Look up the session holding a nickname.
    pub async fn lookup(&self, nickname: &str) -> Option<Arc<ClientSession>> {
        self.sessions.read().await.get(nickname).cloned()
    }

    /// Point-in-time copy of all nicknames, case-insensitively sorted.
    pub async fn snapshot_sorted_nicknames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        names.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
        names
    }

    /// Point-in-time copy of the registry entries for a broadcast round.
    pub async fn snapshot_sessions(&self) -> Vec<(String, Arc<ClientSession>)> {
        self.sessions
            .read()
            .await
            .iter()
            .map(|(nickname, session)| (nickname.clone(), Arc::clone(session)))
            .collect()
    }

    /// Number of registered sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
