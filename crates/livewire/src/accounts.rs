//! Account flows: registration, login, refresh, password changes, resets.
//!
//! [`AccountService`] owns the process-wide registries and the token
//! issuer, and reaches users and mail through its collaborators. Every
//! flow that changes a credential or a role ends by terminating the
//! user's sessions, so stale tokens and live connections go with them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use livewire_auth::{
    hash_password, verify_password, AuthContext, AuthError, PasswordConfig, Role,
    TokenIssuer,
};
use livewire_session::{
    ResetCodeRegistry, Session, SessionError, SessionId, SessionRegistry, TokenPair,
    UserView,
};

use crate::config::{ResetConfig, ServerConfig};
use crate::{AccountError, LivewireError, Mailer, NewUser, StoreError, User, UserStore};

/// Sign-up form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
}

/// An admin's edit of another account. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Login, session, and password flows over a [`UserStore`] and a
/// [`Mailer`].
pub struct AccountService<S, M> {
    store: S,
    mailer: M,
    tokens: TokenIssuer,
    sessions: Arc<SessionRegistry>,
    resets: ResetCodeRegistry,
    passwords: PasswordConfig,
    reset: ResetConfig,
}

impl<S: UserStore, M: Mailer> AccountService<S, M> {
    /// Creates the service with fresh, empty registries.
    pub fn new(store: S, mailer: M, config: &ServerConfig) -> Self {
        Self {
            store,
            mailer,
            tokens: TokenIssuer::new(config.tokens.clone()),
            sessions: Arc::new(SessionRegistry::new()),
            resets: ResetCodeRegistry::new(config.reset.ttl),
            passwords: config.passwords,
            reset: config.reset.clone(),
        }
    }

    /// The session registry, for supervisors and message producers.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// The token issuer, for authenticating requests.
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Pending reset codes.
    pub fn resets(&self) -> &ResetCodeRegistry {
        &self.resets
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    // -----------------------------------------------------------------------
    // Registration and login
    // -----------------------------------------------------------------------

    /// Creates a `viewer` account.
    pub async fn register(&self, form: Registration) -> Result<UserView, LivewireError> {
        if form.password != form.password_confirm {
            return Err(AccountError::PasswordMismatch.into());
        }

        let password_hash = hash_password(&form.password, self.passwords.cost).await?;
        let user = self
            .store
            .create_user(NewUser {
                name: form.name,
                email: normalize_email(&form.email),
                password_hash,
                role: Role::Viewer,
            })
            .await
            .inspect_err(|e| tracing::error!(error = %e, "failed to create user"))?;

        tracing::info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user.view())
    }

    /// Checks credentials and opens a new session.
    ///
    /// Unknown email and wrong password fail the same way.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, LivewireError> {
        let email = normalize_email(email);

        let user = match self.store.find_user_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                tracing::warn!(%email, "login failed: unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => {
                tracing::error!(%email, error = %e, "login failed: store error");
                return Err(e.into());
            }
        };

        match verify_password(password, &user.password_hash).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(%email, user_id = user.id, "login failed: wrong password");
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => {
                tracing::error!(%email, user_id = user.id, error = %e, "login failed: unusable password hash");
                return Err(AuthError::InvalidCredentials.into());
            }
        }

        let id = SessionId::generate();
        let refresh = self
            .tokens
            .create_refresh_token(user.id)
            .map_err(AccountError::SessionCreationFailed)?;
        let access = self
            .tokens
            .create_access_token(user.id, user.role)
            .map_err(AccountError::SessionCreationFailed)?;

        let session = Session::new(id, user.view(), TokenPair { access, refresh });
        self.sessions.write(session.clone())?;

        tracing::info!(%email, user_id = user.id, session_id = %id, "login succeeded");
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// Looks up a session; a missing one means "log in again".
    pub fn authenticate_session(&self, id: SessionId) -> Result<Session, LivewireError> {
        self.sessions.read(id).map_err(|e| {
            tracing::debug!(session_id = %id, "session lookup failed");
            e.into()
        })
    }

    /// Ends a session. Logging out twice is not an error.
    pub fn logout(&self, id: SessionId) {
        if self.sessions.remove(id) {
            tracing::info!(session_id = %id, "logged out");
        }
    }

    /// Ends every session of `user_id` and returns how many there were.
    pub fn terminate_user_sessions(&self, user_id: i64) -> usize {
        self.sessions.remove_all_for_user(user_id)
    }

    /// Mints a new access token for a session whose refresh token is
    /// still valid, and stores it on the session.
    ///
    /// Only the access token is written back, so a connection attached
    /// meanwhile stays attached.
    pub fn refresh_access_token(&self, id: SessionId) -> Result<Session, LivewireError> {
        let session = self.sessions.read(id)?;

        let claims = self.tokens.claims_from_token(&session.tokens.refresh)?;
        if claims.is_expired_at(Utc::now().timestamp()) {
            tracing::info!(session_id = %id, user_id = session.user.id, "refresh token expired");
            return Err(AccountError::RefreshExpired.into());
        }

        let access = self
            .tokens
            .create_access_token(session.user.id, session.user.role)?;
        let session = self.sessions.update(id, |s| {
            s.tokens.access = access;
            s.clone()
        })?;

        tracing::debug!(session_id = %id, "access token refreshed");
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Account changes
    // -----------------------------------------------------------------------

    /// Changes the caller's own password and logs out all their sessions.
    pub async fn update_password(
        &self,
        caller: &AuthContext,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), LivewireError> {
        let user = self.store.find_user_by_id(caller.subject_id).await?;
        self.set_password(user, password, password_confirm).await
    }

    /// Lets an admin edit another account. `super` accounts are off-limits
    /// and the `super` role cannot be handed out.
    pub async fn update_user(
        &self,
        caller: &AuthContext,
        user_id: i64,
        update: UserUpdate,
    ) -> Result<UserView, LivewireError> {
        caller.require(Role::Admin)?;

        let mut user = self.store.find_user_by_id(user_id).await?;
        if user.role == Role::Super || update.role == Some(Role::Super) {
            tracing::warn!(caller = caller.subject_id, user_id, "attempt to modify super role");
            return Err(AccountError::ProtectedRole.into());
        }

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(email) = update.email {
            user.email = normalize_email(&email);
        }
        if let Some(role) = update.role {
            user.role = role;
        }
        user.updated_at = Utc::now();
        user.updated_by = Some(caller.subject_id);
        self.store.save_user(&user).await?;

        let terminated = self.terminate_user_sessions(user.id);
        tracing::info!(caller = caller.subject_id, user_id, role = %user.role, terminated, "user updated");
        Ok(user.view())
    }

    // -----------------------------------------------------------------------
    // Password reset
    // -----------------------------------------------------------------------

    /// Mails a reset code to `email`.
    ///
    /// Succeeds the same way whether or not the account exists. When it
    /// does, all of its sessions are terminated once the mail is sent.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), LivewireError> {
        let email = normalize_email(email);

        let user = match self.store.find_user_by_email(&email).await {
            Ok(user) => Some(user),
            Err(StoreError::NotFound) => {
                tracing::info!(%email, "password reset requested for unknown email");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let entry = self.resets.issue(&email);
        let variables = BTreeMap::from([
            ("Code".to_string(), entry.code.clone()),
            (
                "Expire".to_string(),
                entry.expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ),
        ]);

        if let Err(e) = self
            .mailer
            .send_templated_email(
                std::slice::from_ref(&email),
                &self.reset.template,
                &self.reset.subject,
                variables,
            )
            .await
        {
            tracing::error!(%email, error = %e, "failed to send reset email");
            self.resets.remove(&entry.code);
            return Err(e.into());
        }

        if let Some(user) = user {
            self.terminate_user_sessions(user.id);
        }
        Ok(())
    }

    /// Redeems a reset code: sets the new password, terminates the user's
    /// sessions, and burns the code.
    pub async fn complete_password_reset(
        &self,
        code: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), LivewireError> {
        let code = code.trim().trim_matches('"');
        let entry = self.resets.read(code)?;

        let user = match self.store.find_user_by_email(&entry.email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => {
                self.resets.remove(code);
                return Err(SessionError::InvalidCode.into());
            }
            Err(e) => return Err(e.into()),
        };

        self.set_password(user, password, password_confirm).await?;
        self.resets.remove(code);
        Ok(())
    }

    async fn set_password(
        &self,
        mut user: User,
        password: &str,
        password_confirm: &str,
    ) -> Result<(), LivewireError> {
        if password != password_confirm {
            return Err(AccountError::PasswordMismatch.into());
        }

        user.password_hash = hash_password(password, self.passwords.cost).await?;
        user.updated_at = Utc::now();
        user.updated_by = Some(user.id);
        self.store.save_user(&user).await?;

        let terminated = self.terminate_user_sessions(user.id);
        tracing::info!(user_id = user.id, terminated, "password updated");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// =========================================================================
// Tests
// =========================================================================
