//! `LivewireServer` builder and server loop.
//!
//! This is the entry point for running a Livewire server. It ties the
//! layers together: transport → auth → session → supervisor.

use std::sync::Arc;

use livewire_auth::{RequestCredentials, Role};
use livewire_protocol::{kind, Codec, Envelope, JsonCodec};
use livewire_session::{SessionError, SessionId};
use livewire_transport::{Connection, Transport, WebSocketTransport};

use crate::accounts::AccountService;
use crate::config::ServerConfig;
use crate::supervisor::{CloseReason, ConnectionSupervisor, SupervisorConfig};
use crate::{LivewireError, Mailer, UserStore};

/// Query parameter carrying the session id on the upgrade request.
pub const SESSION_QUERY_PARAM: &str = "sid";

/// Builder for configuring and starting a Livewire server.
///
/// # Example
///
/// ```rust,ignore
/// use livewire::prelude::*;
///
/// let server = LivewireServer::builder()
///     .config(ServerConfig::from_env()?)
///     .build(my_store, my_mailer)
///     .await?;
/// server.run().await
/// ```
pub struct LivewireServerBuilder {
    config: ServerConfig,
}

impl LivewireServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and builds the server around the given
    /// collaborators.
    ///
    /// # Errors
    /// A [`ConfigError`](crate::ConfigError) if [`ServerConfig::validate`] rejects the
    /// configuration, or a transport error if the address cannot be bound.
    pub async fn build<S: UserStore, M: Mailer>(
        self,
        store: S,
        mailer: M,
    ) -> Result<LivewireServer<S, M>, LivewireError> {
        self.config.validate()?;

        let transport = WebSocketTransport::bind(&self.config.bind_addr).await?;
        let accounts = Arc::new(AccountService::new(store, mailer, &self.config));

        Ok(LivewireServer {
            transport,
            accounts,
            supervisor: self.config.supervisor,
        })
    }
}

impl Default for LivewireServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Livewire server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LivewireServer<S, M> {
    transport: WebSocketTransport,
    accounts: Arc<AccountService<S, M>>,
    supervisor: SupervisorConfig,
}

impl<S: UserStore, M: Mailer> LivewireServer<S, M> {
    /// Creates a new builder.
    pub fn builder() -> LivewireServerBuilder {
        LivewireServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The account flows and registries this server uses.
    pub fn accounts(&self) -> Arc<AccountService<S, M>> {
        Arc::clone(&self.accounts)
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection is admitted and supervised on its own task.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), LivewireError> {
        tracing::info!("Livewire server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let accounts = Arc::clone(&self.accounts);
                    let config = self.supervisor.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, accounts, config).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

/// Admits a connection and supervises it until it closes.
pub(crate) async fn handle_connection<C, S, M>(
    conn: C,
    accounts: Arc<AccountService<S, M>>,
    config: SupervisorConfig,
) -> Result<CloseReason, LivewireError>
where
    C: Connection,
    S: UserStore,
    M: Mailer,
{
    let conn_id = conn.id();

    let session_id = match admit(&conn, &accounts) {
        Ok(id) => id,
        Err(e) => {
            tracing::info!(%conn_id, error = %e, "connection refused");
            reject(&conn, &e).await;
            return Err(e);
        }
    };

    ConnectionSupervisor::new(conn, Arc::clone(accounts.sessions()), session_id, config)
        .run()
        .await
}

/// Authenticates the upgrade request and resolves the session it names.
///
/// The token's subject must own the session.
fn admit<C, S, M>(conn: &C, accounts: &AccountService<S, M>) -> Result<SessionId, LivewireError>
where
    C: Connection,
    S: UserStore,
    M: Mailer,
{
    let request = conn.request();
    let credentials = RequestCredentials::from_parts(
        request.header("authorization"),
        request.header("cookie"),
        request.query.as_deref(),
    );
    let caller = accounts.tokens().authenticate(&credentials)?;
    caller.require(Role::Viewer)?;

    let session_id: SessionId = request
        .query_param(SESSION_QUERY_PARAM)
        .ok_or(SessionError::InvalidSessionId)?
        .parse()?;
    let session = accounts.authenticate_session(session_id)?;

    if session.user.id != caller.subject_id {
        tracing::warn!(
            %session_id,
            owner = session.user.id,
            caller = caller.subject_id,
            "token does not own session"
        );
        return Err(SessionError::NotFound(session_id).into());
    }

    Ok(session_id)
}

/// Tells the client why it is being refused, then closes.
async fn reject<C: Connection>(conn: &C, err: &LivewireError) {
    match JsonCodec.encode(&Envelope::new(kind::ERROR, err.public_message())) {
        Ok(frame) => {
            if let Err(e) = conn.send(&frame).await {
                tracing::debug!(error = %e, "failed to send refusal");
            }
        }
        Err(e) => tracing::debug!(error = %e, "failed to encode refusal"),
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(error = %e, "failed to close refused connection");
    }
}
