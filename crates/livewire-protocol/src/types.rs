//! Core protocol types for Livewire's wire format.
//!
//! Outbound frames are envelopes with a string `type` and an arbitrary
//! `data` payload. The payload shapes the server pushes (heartbeats,
//! progress, aggregates) are defined here so the client-facing JSON is
//! pinned down in one place.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Message kinds
// ---------------------------------------------------------------------------

/// The `type` values the server pushes.
pub mod kind {
    /// Heartbeat. `data` is the server timestamp.
    pub const LIVE: &str = "live";
    /// Progress of a long-running job. `data` is a
    /// [`ProgressMessage`](crate::ProgressMessage).
    pub const PROGRESS: &str = "progress";
    /// A computed cluster. `data` is an
    /// [`AggregateMessage`](crate::AggregateMessage).
    pub const CLUSTER: &str = "cluster";
    /// A computed qualification set. `data` is an
    /// [`AggregateMessage`](crate::AggregateMessage).
    pub const QSET: &str = "qset";
    /// The connection is being refused. `data` is a message that is safe
    /// to show the user.
    pub const ERROR: &str = "error";
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The top-level wire wrapper. Every outbound frame is an Envelope.
///
/// ```text
/// { "type": "progress", "data": { "source": "...", "label": "...", "percent": 40 } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Message kind, see [`kind`].
    #[serde(rename = "type")]
    pub kind: String,

    /// The payload. Opaque to the transport.
    pub data: T,
}

impl<T> Envelope<T> {
    /// Wraps a payload under the given message kind.
    pub fn new(kind: impl Into<String>, data: T) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress of a server-side job, pushed under [`kind::PROGRESS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressMessage {
    /// What the job is working on (dataset, device, file...).
    pub source: String,
    /// Human-readable step name.
    pub label: String,
    /// Whole percent, truncated.
    pub percent: u64,
}

impl ProgressMessage {
    /// A job that has just started (0%).
    pub fn start(source: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_percent(source, label, 0)
    }

    /// A job that has finished (100%).
    pub fn complete(
        source: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self::with_percent(source, label, 100)
    }

    /// A job that has processed `current` of `total` units.
    pub fn at(
        source: impl Into<String>,
        label: impl Into<String>,
        current: u64,
        total: u64,
    ) -> Self {
        Self::with_percent(source, label, progress_percent(current, total))
    }

    fn with_percent(
        source: impl Into<String>,
        label: impl Into<String>,
        percent: u64,
    ) -> Self {
        Self {
            source: source.into(),
            label: label.into(),
            percent,
        }
    }
}

/// `current / total × 100`, truncated toward zero.
///
/// A zero `total` yields 0 rather than dividing by zero.
pub fn progress_percent(current: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    current.saturating_mul(100) / total
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// A computed aggregate over a window of samples.
///
/// Produced by the analysis side of the application; this layer only
/// carries it to the client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    pub id: i64,
    pub created_at: i64,
    pub updated_at: i64,
    /// Process id.
    pub pid: i64,
    /// Variate id.
    pub vid: i64,
    /// Colour code used when charting.
    pub code: i64,
    pub a_date: i64,
    /// First sample time in the cluster.
    pub start: i64,
    /// Last sample time in the cluster.
    pub end: i64,
    /// Number of samples in the cluster.
    pub size: i64,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    pub slope: f32,
    pub devi: f32,
    pub score: f32,
    pub valid: bool,
}

/// An aggregate tagged with the job that produced it, pushed under
/// [`kind::CLUSTER`] or [`kind::QSET`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMessage {
    pub source: String,
    #[serde(rename = "agg")]
    pub aggregate: Aggregate,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// How the server interprets a frame received from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// The literal `close`: the client asks for a graceful disconnect.
    Close,
    /// Anything else. Not interpreted by this layer.
    Opaque(Vec<u8>),
}

impl InboundFrame {
    /// The control value a client sends to request a disconnect.
    pub const CLOSE: &'static [u8] = b"close";

    /// Classifies a received frame.
    pub fn parse(frame: Vec<u8>) -> Self {
        if frame == Self::CLOSE {
            Self::Close
        } else {
            Self::Opaque(frame)
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Envelope
    // =====================================================================

    #[test]
    fn test_envelope_serializes_kind_as_type() {
        let envelope = Envelope::new(kind::LIVE, 1234);
        let json: serde_json::Value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(json["type"], "live");
        assert_eq!(json["data"], 1234);
        assert!(json.get("kind").is_none());
    }

    #[test]
    fn test_envelope_deserializes_arbitrary_data() {
        let json = r#"{"type":"cluster","data":{"source":"s","agg":{"id":4}}}"#;
        let envelope: Envelope<serde_json::Value> =
            serde_json::from_str(json).unwrap();

        assert_eq!(envelope.kind, "cluster");
        assert_eq!(envelope.data["agg"]["id"], 4);
    }

    #[test]
    fn test_envelope_missing_type_fails_to_decode() {
        let result: Result<Envelope<serde_json::Value>, _> =
            serde_json::from_str(r#"{"data":1}"#);
        assert!(result.is_err());
    }

    // =====================================================================
    // Progress
    // =====================================================================

    #[test]
    fn test_progress_percent_exact_quarter() {
        assert_eq!(progress_percent(50, 200), 25);
    }

    #[test]
    fn test_progress_percent_truncates_not_rounds() {
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 66);
        assert_eq!(progress_percent(29, 100), 29);
    }

    #[test]
    fn test_progress_percent_zero_total_is_zero() {
        assert_eq!(progress_percent(10, 0), 0);
    }

    #[test]
    fn test_progress_start_and_complete_bounds() {
        assert_eq!(ProgressMessage::start("s", "l").percent, 0);
        assert_eq!(ProgressMessage::complete("s", "l").percent, 100);
    }

    #[test]
    fn test_progress_at_computes_percent() {
        let msg = ProgressMessage::at("dev-1", "upload", 3, 4);
        assert_eq!(msg.source, "dev-1");
        assert_eq!(msg.label, "upload");
        assert_eq!(msg.percent, 75);
    }

    #[test]
    fn test_progress_json_format() {
        let msg = ProgressMessage::at("dev-1", "upload", 1, 2);
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["source"], "dev-1");
        assert_eq!(json["label"], "upload");
        assert_eq!(json["percent"], 50);
    }

    // =====================================================================
    // Aggregates
    // =====================================================================

    #[test]
    fn test_aggregate_message_uses_agg_key() {
        let msg = AggregateMessage {
            source: "proc-2".into(),
            aggregate: Aggregate {
                id: 9,
                size: 120,
                mean: 1.5,
                valid: true,
                ..Aggregate::default()
            },
        };
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["source"], "proc-2");
        assert_eq!(json["agg"]["id"], 9);
        assert_eq!(json["agg"]["size"], 120);
        assert_eq!(json["agg"]["mean"], 1.5);
        assert_eq!(json["agg"]["valid"], true);
    }

    // =====================================================================
    // Inbound
    // =====================================================================

    #[test]
    fn test_inbound_close_literal_is_close() {
        assert_eq!(InboundFrame::parse(b"close".to_vec()), InboundFrame::Close);
    }

    #[test]
    fn test_inbound_other_frames_are_opaque() {
        assert_eq!(
            InboundFrame::parse(b"\"close\"".to_vec()),
            InboundFrame::Opaque(b"\"close\"".to_vec())
        );
        assert_eq!(
            InboundFrame::parse(b"CLOSE".to_vec()),
            InboundFrame::Opaque(b"CLOSE".to_vec())
        );
    }
}
