//! Session state for Livewire.
//!
//! This crate holds everything the server remembers between requests:
//!
//! 1. **Sessions** — who is logged in, with which tokens, and the channels
//!    a live connection uses ([`Session`])
//! 2. **The registry** — the process-wide map every flow reads and writes
//!    ([`SessionRegistry`])
//! 3. **Outbound delivery** — pushing a frame to whichever connection a
//!    session currently has ([`SessionRegistry::send_message`])
//! 4. **Error budgets** — bounding how many I/O faults a connection may
//!    absorb before it is dropped ([`ErrorBudget`])
//! 5. **Reset codes** — short-lived password-reset codes
//!    ([`ResetCodeRegistry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Server layer (above)  ← login/reset flows, connection supervisor
//!     ↕
//! Session layer (this crate)  ← registry, delivery, budgets, reset codes
//!     ↕
//! Protocol + auth (below)  ← envelopes and codecs, roles and tokens
//! ```

mod budget;
mod error;
mod outbound;
mod registry;
mod reset;
mod session;

pub use budget::ErrorBudget;
pub use error::SessionError;
pub use outbound::Delivery;
pub use registry::SessionRegistry;
pub use reset::{generate_reset_code, ResetCodeRegistry, ResetEntry};
pub use session::{
    CloseSignals, ConnectionState, Session, SessionId, TokenPair, UserView,
};
