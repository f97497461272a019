//! # Livewire
//!
//! Real-time session layer for device-telemetry backends.
//!
//! Livewire authenticates users, keeps a registry of their sessions, and
//! holds one persistent duplex connection per session so that server-side
//! jobs can push progress updates and computed aggregates to the right
//! client. Users and mail are reached through the [`UserStore`] and
//! [`Mailer`] traits; everything else is handled here.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use livewire::prelude::*;
//!
//! # async fn start() -> Result<(), LivewireError> {
//! livewire::telemetry::init_tracing();
//!
//! let server = LivewireServer::<MemoryUserStore, RecordingMailer>::builder()
//!     .config(ServerConfig::from_env()?)
//!     .build(MemoryUserStore::new(), RecordingMailer::new())
//!     .await?;
//!
//! // Jobs push to a session through the shared registry:
//! // server.accounts().sessions().progress_at(sid, "dataset-7", "import", 3, 4).await?;
//! server.run().await
//! # }
//! ```

mod accounts;
mod config;
mod error;
mod mail;
mod server;
mod store;
mod supervisor;
pub mod telemetry;

pub use accounts::{AccountService, Registration, UserUpdate};
pub use config::{ResetConfig, ServerConfig};
pub use error::{AccountError, ConfigError, LivewireError, MailError, StoreError};
pub use mail::{Mailer, RecordingMailer, SentMail};
pub use server::{LivewireServer, LivewireServerBuilder, SESSION_QUERY_PARAM};
pub use store::{MemoryUserStore, NewUser, User, UserStore};
pub use supervisor::{CloseReason, ConnectionSupervisor, SupervisorConfig};

/// Everything an application needs to run a server and push messages.
pub mod prelude {
    pub use crate::{
        AccountService, LivewireError, LivewireServer, Mailer, MemoryUserStore,
        RecordingMailer, Registration, ServerConfig, UserStore,
    };
    pub use livewire_auth::{AuthContext, Role};
    pub use livewire_protocol::{kind, Aggregate, ProgressMessage};
    pub use livewire_session::{Delivery, Session, SessionId, SessionRegistry};
}
