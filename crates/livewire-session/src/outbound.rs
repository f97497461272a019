//! Server-originated messages for a session's client.
//!
//! Delivery is at most once: a frame is queued only if the session has a
//! live connection with room in its queue at the moment of sending;
//! otherwise it is dropped. Sending never waits on the socket.

use livewire_protocol::{
    kind, Aggregate, AggregateMessage, Codec, Envelope, JsonCodec, ProgressMessage,
};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;

use crate::{SessionError, SessionId, SessionRegistry};

/// What happened to a frame handed to
/// [`send_message`](SessionRegistry::send_message).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Delivery {
    /// On the session's outbound queue.
    Queued,
    /// The session had no live connection, or its writer is too far
    /// behind, so the frame was discarded.
    Dropped,
}

impl SessionRegistry {
    /// Encodes `{type, data}` and queues it on the session's connection.
    ///
    /// The session is re-read from the registry first, so a connection
    /// attached or closed since the caller last looked is honoured.
    ///
    /// # Errors
    /// - [`SessionError::MissingMessageType`] if `kind` is empty
    /// - [`SessionError::SerializationFailed`] if `data` cannot be encoded
    /// - [`SessionError::NotFound`] if the session is gone
    pub async fn send_message<T: Serialize>(
        &self,
        id: SessionId,
        kind: &str,
        data: T,
    ) -> Result<Delivery, SessionError> {
        if kind.is_empty() {
            return Err(SessionError::MissingMessageType);
        }
        let frame = JsonCodec.encode(&Envelope::new(kind, data))?;

        let session = self.read(id)?;
        if !session.is_connected() {
            tracing::debug!(session_id = %id, kind, "not connected, message dropped");
            return Ok(Delivery::Dropped);
        }
        let Some((guard, queue)) = session.outbound() else {
            return Ok(Delivery::Dropped);
        };

        let _held = guard.lock().await;
        match queue.try_send(frame) {
            Ok(()) => Ok(Delivery::Queued),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(session_id = %id, kind, "outbound queue full, message dropped");
                Ok(Delivery::Dropped)
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(session_id = %id, kind, "writer gone, message dropped");
                Ok(Delivery::Dropped)
            }
        }
    }

    /// Reports that a job on `source` has started.
    pub async fn progress_start(
        &self,
        id: SessionId,
        source: &str,
        label: &str,
    ) -> Result<Delivery, SessionError> {
        self.send_message(id, kind::PROGRESS, ProgressMessage::start(source, label))
            .await
    }

    /// Reports that a job on `source` has finished.
    pub async fn progress_complete(
        &self,
        id: SessionId,
        source: &str,
        label: &str,
    ) -> Result<Delivery, SessionError> {
        self.send_message(id, kind::PROGRESS, ProgressMessage::complete(source, label))
            .await
    }

    /// Reports that a job on `source` has processed `current` of `total`.
    pub async fn progress_at(
        &self,
        id: SessionId,
        source: &str,
        label: &str,
        current: u64,
        total: u64,
    ) -> Result<Delivery, SessionError> {
        self.send_message(
            id,
            kind::PROGRESS,
            ProgressMessage::at(source, label, current, total),
        )
        .await
    }

    /// Pushes a computed cluster.
    pub async fn send_cluster(
        &self,
        id: SessionId,
        source: &str,
        aggregate: Aggregate,
    ) -> Result<Delivery, SessionError> {
        self.send_aggregate(id, kind::CLUSTER, source, aggregate).await
    }

    /// Pushes a computed qualification set.
    pub async fn send_qset(
        &self,
        id: SessionId,
        source: &str,
        aggregate: Aggregate,
    ) -> Result<Delivery, SessionError> {
        self.send_aggregate(id, kind::QSET, source, aggregate).await
    }

    async fn send_aggregate(
        &self,
        id: SessionId,
        kind: &str,
        source: &str,
        aggregate: Aggregate,
    ) -> Result<Delivery, SessionError> {
        let message = AggregateMessage {
            source: source.to_string(),
            aggregate,
        };
        self.send_message(id, kind, message).await
    }
}

#[cfg(test)]
mod tests {
    use serde::ser::Error as _;
    use tokio::sync::mpsc;

    use super::*;
    use crate::session::tests::session_for;

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    /// A registry holding one attached session.
    fn attached() -> (SessionRegistry, SessionId, mpsc::Receiver<String>) {
        let registry = SessionRegistry::new();
        let mut session = session_for(1);
        let (tx, rx) = mpsc::channel(16);
        session.attach(tx);
        let id = session.id;
        registry.write(session).unwrap();
        (registry, id, rx)
    }

    fn parse(frame: &str) -> serde_json::Value {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn test_send_message_connected_is_queued() {
        let (registry, id, mut rx) = attached();

        let delivery = registry.send_message(id, "custom", 7).await.unwrap();

        assert_eq!(delivery, Delivery::Queued);
        let frame = parse(&rx.recv().await.unwrap());
        assert_eq!(frame["type"], "custom");
        assert_eq!(frame["data"], 7);
    }

    #[tokio::test]
    async fn test_send_message_unattached_is_dropped() {
        let registry = SessionRegistry::new();
        let session = session_for(1);
        let id = session.id;
        registry.write(session).unwrap();

        let delivery = registry.send_message(id, "custom", 7).await.unwrap();

        assert_eq!(delivery, Delivery::Dropped);
    }

    #[tokio::test]
    async fn test_send_message_after_detach_is_dropped() {
        let (registry, id, mut rx) = attached();
        let mut session = registry.read(id).unwrap();
        session.detach();
        registry.write(session).unwrap();

        let delivery = registry.send_message(id, "custom", 7).await.unwrap();

        assert_eq!(delivery, Delivery::Dropped);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_message_writer_gone_is_dropped() {
        let (registry, id, rx) = attached();
        drop(rx);

        let delivery = registry.send_message(id, "custom", 7).await.unwrap();

        assert_eq!(delivery, Delivery::Dropped);
    }

    #[tokio::test]
    async fn test_send_message_full_queue_is_dropped_without_waiting() {
        let registry = SessionRegistry::new();
        let mut session = session_for(1);
        let (tx, mut rx) = mpsc::channel(1);
        session.attach(tx);
        let id = session.id;
        registry.write(session).unwrap();

        let first = registry.send_message(id, "seq", 1).await.unwrap();
        let second = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            registry.send_message(id, "seq", 2),
        )
        .await
        .expect("a stalled writer must not block senders")
        .unwrap();

        assert_eq!(first, Delivery::Queued);
        assert_eq!(second, Delivery::Dropped);
        assert_eq!(parse(&rx.recv().await.unwrap())["data"], 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_message_empty_type_is_rejected() {
        let (registry, id, _rx) = attached();

        let result = registry.send_message(id, "", 7).await;

        assert!(matches!(result, Err(SessionError::MissingMessageType)));
    }

    #[tokio::test]
    async fn test_send_message_unserializable_is_rejected() {
        let (registry, id, _rx) = attached();

        let result = registry.send_message(id, "custom", Unserializable).await;

        assert!(matches!(result, Err(SessionError::SerializationFailed(_))));
    }

    #[tokio::test]
    async fn test_send_message_unknown_session_is_not_found() {
        let registry = SessionRegistry::new();

        let result = registry.send_message(SessionId::generate(), "custom", 7).await;

        assert!(matches!(result, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_send_message_preserves_submission_order() {
        let (registry, id, mut rx) = attached();

        for i in 0..10 {
            let _ = registry.send_message(id, "seq", i).await.unwrap();
        }

        for i in 0..10 {
            assert_eq!(parse(&rx.recv().await.unwrap())["data"], i);
        }
    }

    #[tokio::test]
    async fn test_progress_helpers_compute_percent() {
        let (registry, id, mut rx) = attached();

        let _ = registry.progress_start(id, "dev-1", "import").await.unwrap();
        let _ = registry.progress_at(id, "dev-1", "import", 50, 200).await.unwrap();
        let _ = registry.progress_at(id, "dev-1", "import", 1, 3).await.unwrap();
        let _ = registry.progress_complete(id, "dev-1", "import").await.unwrap();

        let percents: Vec<u64> = (0..4)
            .map(|_| {
                let frame = parse(&rx.try_recv().unwrap());
                assert_eq!(frame["type"], "progress");
                assert_eq!(frame["data"]["source"], "dev-1");
                frame["data"]["percent"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(percents, vec![0, 25, 33, 100]);
    }

    #[tokio::test]
    async fn test_send_cluster_and_qset_use_agg_key() {
        let (registry, id, mut rx) = attached();
        let aggregate = Aggregate {
            id: 3,
            size: 40,
            ..Aggregate::default()
        };

        let _ = registry.send_cluster(id, "proc-1", aggregate.clone()).await.unwrap();
        let _ = registry.send_qset(id, "proc-1", aggregate).await.unwrap();

        let cluster = parse(&rx.recv().await.unwrap());
        let qset = parse(&rx.recv().await.unwrap());
        assert_eq!(cluster["type"], "cluster");
        assert_eq!(qset["type"], "qset");
        assert_eq!(cluster["data"]["source"], "proc-1");
        assert_eq!(cluster["data"]["agg"]["id"], 3);
        assert_eq!(qset["data"]["agg"]["size"], 40);
    }
}
