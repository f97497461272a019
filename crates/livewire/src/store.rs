//! The persistence collaborator.
//!
//! Livewire never owns the user table. It reaches it through
//! [`UserStore`], so the application can back it with whatever database
//! it already uses. [`MemoryUserStore`] is the in-process implementation
//! used by tests and the demo.

use std::collections::HashMap;
use std::future::{ready, Future};

use chrono::{DateTime, Utc};
use livewire_auth::Role;
use livewire_session::UserView;
use parking_lot::RwLock;

use crate::StoreError;

/// A stored account, password hash included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Always lower-case.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Who made the last change, if anyone has.
    pub updated_by: Option<i64>,
}

impl User {
    /// The record without its password hash or audit columns.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// A user to be created. The store assigns the id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// Reads and writes user accounts.
///
/// Methods return `Send` futures so account flows can run inside spawned
/// tasks.
pub trait UserStore: Send + Sync + 'static {
    /// Looks a user up by (lower-case) email.
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Looks a user up by id.
    fn find_user_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Creates a user and returns the stored record.
    fn create_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Overwrites an existing user.
    fn save_user(
        &self,
        user: &User,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// MemoryUserStore
// ---------------------------------------------------------------------------

/// A [`UserStore`] held in a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    users: HashMap<i64, User>,
    last_id: i64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub fn len(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.inner.write();
        if inner.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                new.email
            )));
        }

        inner.last_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.last_id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now,
            updated_at: now,
            updated_by: None,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn replace(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if inner
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        match inner.users.get_mut(&user.id) {
            Some(slot) => {
                *slot = user.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }
}

impl UserStore for MemoryUserStore {
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<User, StoreError>> + Send {
        let found = self
            .inner
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound);
        ready(found)
    }

    fn find_user_by_id(
        &self,
        id: i64,
    ) -> impl Future<Output = Result<User, StoreError>> + Send {
        let found = self
            .inner
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound);
        ready(found)
    }

    fn create_user(
        &self,
        user: NewUser,
    ) -> impl Future<Output = Result<User, StoreError>> + Send {
        ready(self.insert(user))
    }

    fn save_user(
        &self,
        user: &User,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        ready(self.replace(user))
    }
}
