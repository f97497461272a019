//! The session registry: every logged-in session in the process.
//!
//! # Concurrency note
//!
//! One `RwLock` guards the whole map. Reads clone the session out, so a
//! caller never holds the lock across an `.await`; what it gets back is a
//! snapshot. Whole snapshots go back with [`SessionRegistry::write`];
//! field changes that must not roll back someone else's go through
//! [`SessionRegistry::update`]. Removal revokes the session under the same
//! lock, so neither can bring a removed session back.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::{Session, SessionError, SessionId};

/// Concurrent map of session id to [`Session`].
///
/// Shared between the login flows, every connection supervisor, and any
/// job that pushes messages, usually behind an `Arc`.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a session, stamping its `touched_at`.
    ///
    /// # Errors
    /// - [`SessionError::InvalidSessionId`] for the nil id
    /// - [`SessionError::NotFound`] if the session was already removed;
    ///   a stale snapshot cannot bring it back
    pub fn write(&self, mut session: Session) -> Result<(), SessionError> {
        if session.id.is_nil() {
            return Err(SessionError::InvalidSessionId);
        }

        // Revocation happens under this lock in `remove`, so checking here
        // orders the two.
        let mut sessions = self.sessions.write();
        if session.is_revoked() {
            return Err(SessionError::NotFound(session.id));
        }
        session.touch(chrono::Utc::now());
        sessions.insert(session.id, session);
        Ok(())
    }

    /// Applies `change` to the stored session in place and returns its
    /// result.
    ///
    /// Unlike a `read` followed by a `write`, no other writer can slip in
    /// between, so fields the closure does not touch are never rolled back.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if absent.
    pub fn update<R>(
        &self,
        id: SessionId,
        change: impl FnOnce(&mut Session) -> R,
    ) -> Result<R, SessionError> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        let result = change(session);
        session.touch(chrono::Utc::now());
        Ok(result)
    }

    /// Returns a snapshot of the session.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if absent (the nil id is always absent).
    pub fn read(&self, id: SessionId) -> Result<Session, SessionError> {
        self.sessions
            .read()
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound(id))
    }

    /// Removes a session and fires its revocation signal.
    ///
    /// Removing an absent id is not an error. Returns whether a session
    /// was removed.
    pub fn remove(&self, id: SessionId) -> bool {
        let removed = {
            let mut sessions = self.sessions.write();
            let removed = sessions.remove(&id);
            if let Some(session) = &removed {
                session.revoke();
            }
            removed
        };
        match removed {
            Some(session) => {
                tracing::info!(session_id = %id, user_id = session.user.id, "session removed");
                true
            }
            None => false,
        }
    }

    /// Removes every session belonging to `user_id` and returns how many
    /// were removed.
    pub fn remove_all_for_user(&self, user_id: i64) -> usize {
        let ids: Vec<SessionId> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.user.id == user_id)
            .map(|s| s.id)
            .collect();

        let removed = ids.into_iter().filter(|id| self.remove(*id)).count();
        if removed > 0 {
            tracing::info!(user_id, removed, "terminated user sessions");
        }
        removed
    }

    /// Number of sessions in the registry.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no one is logged in.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
