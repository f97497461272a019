//! Codec trait and implementations for serializing outbound frames.
//!
//! The duplex connection carries text frames, so a codec here turns a value
//! into a `String`. Inbound frames are control words, not envelopes, and go
//! through [`InboundFrame::parse`](crate::InboundFrame::parse) instead.
//! [`JsonCodec`] is the only implementation; the trait exists so the
//! session layer does not hard-code `serde_json` at every call site.

use serde::Serialize;

use crate::ProtocolError;

/// A codec that encodes Rust types to text frames.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// session's outbound path.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use livewire_protocol::{kind, Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = codec.encode(&Envelope::new(kind::LIVE, 1_700_000_000u64)).unwrap();
/// assert_eq!(frame, r#"{"type":"live","data":1700000000}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use std::collections::BTreeMap;

    use serde::ser::Error as _;

    use super::*;
    use crate::{kind, Envelope, ProgressMessage};

    /// A value whose `Serialize` impl always fails.
    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(
            &self,
            _serializer: S,
        ) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refused"))
        }
    }

    #[test]
    fn test_encode_progress_envelope_produces_wire_shape() {
        let envelope = Envelope::new(
            kind::PROGRESS,
            ProgressMessage::start("dataset-7", "import"),
        );

        let frame = JsonCodec.encode(&envelope).unwrap();

        assert_eq!(
            frame,
            r#"{"type":"progress","data":{"source":"dataset-7","label":"import","percent":0}}"#
        );
    }

    #[test]
    fn test_encode_failure_maps_to_encode_error() {
        let result = JsonCodec.encode(&Envelope::new(kind::LIVE, Unserializable));

        assert!(matches!(result, Err(ProtocolError::Encode(_))));
    }

    #[test]
    fn test_encode_non_string_map_keys_fails() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], 1);

        let result = JsonCodec.encode(&map);

        assert!(matches!(result, Err(ProtocolError::Encode(_))));
    }
}
