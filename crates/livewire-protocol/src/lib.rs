//! Wire protocol for Livewire.
//!
//! This crate defines what travels over a session's duplex connection:
//!
//! - **Types** ([`Envelope`], [`ProgressMessage`], [`AggregateMessage`],
//!   [`InboundFrame`]) — the frames pushed to clients and the few inbound
//!   frames the server understands.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how envelopes become
//!   text frames.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while encoding.
//!
//! # Architecture
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session (outbound queue)
//! ```
//!
//! Every outbound frame is `{"type": <kind>, "data": <payload>}`. Inbound
//! frames are opaque except the literal `close`.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    kind, progress_percent, Aggregate, AggregateMessage, Envelope,
    InboundFrame, ProgressMessage,
};
