//! Per-connection supervisor: heartbeat, reader, writer, and teardown.
//!
//! Each authenticated connection gets its own Tokio task running
//! [`ConnectionSupervisor::run`]. The flow is:
//!   1. Attach an outbound queue to the stored session
//!   2. Spawn the reader and the writer
//!   3. Wait for the first terminal signal, sending heartbeats while idle
//!   4. Stop both loops, persist the detached session, close the socket
//!
//! No step waits on the socket without also watching the stop signals, and
//! the final close is bounded by a timeout, so a stalled peer cannot hold
//! teardown open.
//!
//! The session stays in the registry after a disconnect; only logout and
//! forced termination remove it.

use std::sync::Arc;
use std::time::Duration;

use livewire_protocol::{kind, InboundFrame};
use livewire_session::{
    CloseSignals, ConnectionState, ErrorBudget, Session, SessionId, SessionRegistry,
};
use livewire_transport::Connection;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{ConfigError, LivewireError};

/// How long teardown waits for the peer to accept the close.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Idle time after which a `live` frame is pushed. Default: 30 seconds.
    pub heartbeat_interval: Duration,

    /// Gap after which an error budget starts a new window. Default: 3s.
    pub quiet_period: Duration,

    /// Failures tolerated per window before disconnecting. Default: 10.
    pub error_ceiling: u32,

    /// Frames buffered per connection before senders wait. Default: 64.
    pub queue_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            quiet_period: ErrorBudget::DEFAULT_QUIET_PERIOD,
            error_ceiling: ErrorBudget::DEFAULT_CEILING,
            queue_capacity: 64,
        }
    }
}

/// Why a supervised connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed the socket or sent `close`.
    ClientClosed,
    /// Too many receive failures in one window.
    InboundErrors,
    /// Too many send failures in one window.
    OutboundErrors,
    /// The session was removed from the registry.
    Revoked,
    /// Another connection attached to the same session.
    Replaced,
}

impl CloseReason {
    /// Whether the detached session should be written back.
    fn persists_session(self) -> bool {
        !matches!(self, Self::Revoked | Self::Replaced)
    }
}

/// Drives one connection for one session.
pub struct ConnectionSupervisor<C: Connection> {
    conn: Arc<C>,
    registry: Arc<SessionRegistry>,
    session_id: SessionId,
    config: SupervisorConfig,
}

impl<C: Connection> ConnectionSupervisor<C> {
    pub fn new(
        conn: C,
        registry: Arc<SessionRegistry>,
        session_id: SessionId,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            conn: Arc::new(conn),
            registry,
            session_id,
            config,
        }
    }

    /// Runs the connection until a terminal event and returns what ended it.
    ///
    /// # Errors
    /// Fails before attaching if the heartbeat interval is zero or the
    /// session is gone. Once the connection is live, every fault is
    /// absorbed into a [`CloseReason`].
    pub async fn run(self) -> Result<CloseReason, LivewireError> {
        let session_id = self.session_id;
        let conn_id = self.conn.id();
        let every = self.config.heartbeat_interval;
        if every.is_zero() {
            return Err(ConfigError::Invalid {
                var: "LIVEWIRE_HEARTBEAT_SECS",
                value: "0".into(),
            }
            .into());
        }

        // --- Attach ---
        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let (signals, revoked) = self
            .registry
            .update(session_id, |s| (s.attach(queue_tx), s.revoked()))?;
        tracing::info!(%session_id, %conn_id, "connection attached");

        let last_sent = Arc::new(Mutex::new(Instant::now()));
        let reader = tokio::spawn(read_loop(
            Arc::clone(&self.conn),
            signals.clone(),
            self.budget(),
        ));
        let writer = tokio::spawn(write_loop(
            Arc::clone(&self.conn),
            queue_rx,
            signals.clone(),
            self.budget(),
            Arc::clone(&last_sent),
        ));

        // --- Active ---
        let mut heartbeat = tokio::time::interval_at(Instant::now() + every, every);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;
                _ = signals.closed_by_client.cancelled() => break CloseReason::ClientClosed,
                _ = signals.inbound_limit.cancelled() => break CloseReason::InboundErrors,
                _ = signals.outbound_limit.cancelled() => break CloseReason::OutboundErrors,
                _ = revoked.cancelled() => break CloseReason::Revoked,
                _ = signals.replaced.cancelled() => break CloseReason::Replaced,
                _ = heartbeat.tick() => {
                    let idle = last_sent.lock().elapsed();
                    if idle >= every {
                        self.send_heartbeat().await;
                    }
                }
            }
        };

        // --- Closing ---
        tracing::info!(%session_id, %conn_id, ?reason, "connection closing");
        let persist = reason.persists_session();
        if persist {
            self.update_session(&signals, |s| s.state = ConnectionState::Closing);
        }
        signals.stop();

        if let Err(e) = reader.await {
            tracing::warn!(%session_id, error = %e, "reader task failed");
        }
        if let Err(e) = writer.await {
            tracing::warn!(%session_id, error = %e, "writer task failed");
        }
        if persist {
            self.update_session(&signals, Session::detach);
        }
        match tokio::time::timeout(CLOSE_TIMEOUT, self.conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(%session_id, error = %e, "close after disconnect failed"),
            Err(_) => tracing::warn!(%session_id, %conn_id, "peer did not take the close, abandoning"),
        }

        tracing::info!(%session_id, %conn_id, "connection closed");
        Ok(reason)
    }

    fn budget(&self) -> ErrorBudget {
        ErrorBudget::new(self.config.quiet_period, self.config.error_ceiling)
    }

    async fn send_heartbeat(&self) {
        let now = chrono::Utc::now().timestamp_millis();
        if let Err(e) = self
            .registry
            .send_message(self.session_id, kind::LIVE, now)
            .await
        {
            tracing::debug!(session_id = %self.session_id, error = %e, "heartbeat not sent");
        }
    }

    /// Applies `change` to the registry's copy of the session, unless the
    /// session was removed or another connection took it over.
    fn update_session(&self, signals: &CloseSignals, change: impl FnOnce(&mut Session)) {
        // `attach` fires `replaced` under the registry lock, so the check
        // belongs inside the update.
        let result = self.registry.update(self.session_id, |session| {
            if !signals.replaced.is_cancelled() {
                change(session);
            }
        });
        if let Err(e) = result {
            tracing::debug!(session_id = %self.session_id, error = %e, "session not persisted");
        }
    }
}

async fn read_loop<C: Connection>(
    conn: Arc<C>,
    signals: CloseSignals,
    mut budget: ErrorBudget,
) {
    loop {
        let received = tokio::select! {
            _ = signals.stop_listen.cancelled() => break,
            received = conn.recv() => received,
        };

        match received {
            Ok(Some(frame)) => {
                if InboundFrame::parse(frame) == InboundFrame::Close {
                    signals.closed_by_client.cancel();
                    break;
                }
            }
            Ok(None) => {
                signals.closed_by_client.cancel();
                break;
            }
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "receive failed");
                if budget.record_failure() {
                    tracing::warn!(conn_id = %conn.id(), "inbound error budget exhausted");
                    signals.inbound_limit.cancel();
                    break;
                }
            }
        }
    }
}

async fn write_loop<C: Connection>(
    conn: Arc<C>,
    mut queue: mpsc::Receiver<String>,
    signals: CloseSignals,
    mut budget: ErrorBudget,
    last_sent: Arc<Mutex<Instant>>,
) {
    loop {
        let frame = tokio::select! {
            _ = signals.stop_send.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let sent = tokio::select! {
            _ = signals.stop_send.cancelled() => break,
            sent = conn.send(&frame) => sent,
        };

        match sent {
            Ok(()) => *last_sent.lock() = Instant::now(),
            Err(e) => {
                tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
                if budget.record_failure() {
                    tracing::warn!(conn_id = %conn.id(), "outbound error budget exhausted");
                    signals.outbound_limit.cancel();
                    break;
                }
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
