//! User Data Stream Codec
//!
//! Encodes request envelopes and classifies inbound text frames.
//!
//! Classification is structural and exhaustive:
//!
//! 1. an `error` key makes the frame an error frame, whatever else it carries;
//! 2. otherwise a frame without an `id` key is a stream event;
//! 3. everything else is a response.
//!
//! Only the key's presence matters, so `"id": null` still selects the
//! response path (and then fails to decode there).

use serde::Deserialize;

use crate::domain::events::UserDataEvent;

use super::error::ProtocolError;
use super::messages::{RemoteError, StreamRequest, StreamResponse};

/// Classified inbound frame.
#[derive(Debug)]
pub enum InboundFrame {
    /// Server-reported error.
    Error(RemoteError),
    /// Push event without a correlation ID.
    Event(Box<UserDataEvent>),
    /// Response to a previously issued request.
    Response(StreamResponse),
}

/// Structural class of a frame, decided before typed decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    /// Has an `error` key.
    Error,
    /// Has neither `error` nor `id`.
    Event,
    /// Has `id` and no `error`.
    Response,
}

impl FrameClass {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Event => "event",
            Self::Response => "response",
        }
    }
}

/// Outcome of decoding one inbound frame.
#[derive(Debug)]
pub enum Decoded {
    /// Frame was classified and decoded.
    Frame(InboundFrame),
    /// Frame was classified but its typed decode failed; the stream may continue.
    Undecodable(FrameClass, ProtocolError),
    /// Response whose `id` is readable but whose body failed to decode. The
    /// pending request under that ID still has to be completed.
    BrokenResponse(u64, ProtocolError),
}

/// JSON codec for the user data stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classify a parsed frame by key presence.
    #[must_use]
    pub fn classify(value: &serde_json::Value) -> FrameClass {
        let has_key = |key: &str| value.as_object().is_some_and(|o| o.contains_key(key));

        if has_key("error") {
            FrameClass::Error
        } else if has_key("id") {
            FrameClass::Response
        } else {
            FrameClass::Event
        }
    }

    /// Decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Malformed`] if the text is not JSON at all.
    /// Typed decode failures of a well-formed frame are reported as
    /// [`Decoded::Undecodable`] instead.
    pub fn decode(&self, text: &str) -> Result<Decoded, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(ProtocolError::Malformed)?;

        let class = Self::classify(&value);
        let decoded = match class {
            FrameClass::Error => {
                let remote = value
                    .get("error")
                    .and_then(|e| RemoteError::deserialize(e).ok())
                    .unwrap_or_default();
                Decoded::Frame(InboundFrame::Error(remote))
            }
            FrameClass::Event => match UserDataEvent::deserialize(&value) {
                Ok(event) => Decoded::Frame(InboundFrame::Event(Box::new(event))),
                Err(source) => Decoded::Undecodable(
                    class,
                    ProtocolError::Decode {
                        what: "stream event",
                        source,
                    },
                ),
            },
            // Decoded from the original text so the raw result payload is preserved.
            FrameClass::Response => match serde_json::from_str::<StreamResponse>(text) {
                Ok(response) => Decoded::Frame(InboundFrame::Response(response)),
                Err(source) => {
                    let error = ProtocolError::Decode {
                        what: "response",
                        source,
                    };
                    match value.get("id").and_then(serde_json::Value::as_u64) {
                        Some(id) => Decoded::BrokenResponse(id, error),
                        None => Decoded::Undecodable(class, error),
                    }
                }
            },
        };

        Ok(decoded)
    }

    /// Encode a request envelope to JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, request: &StreamRequest) -> Result<String, serde_json::Error> {
        serde_json::to_string(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(r#"{"error":{"code":1,"msg":"x"}}"#, FrameClass::Error ; "error only")]
    #[test_case(r#"{"error":{"code":1,"msg":"x"},"id":5}"#, FrameClass::Error ; "error wins over id")]
    #[test_case(r#"{"id":5,"result":[]}"#, FrameClass::Response ; "id selects response")]
    #[test_case(r#"{"id":null}"#, FrameClass::Response ; "null id is still present")]
    #[test_case(r#"{"e":"ACCOUNT_UPDATE","E":1}"#, FrameClass::Event ; "no id is event")]
    #[test_case(r#"[]"#, FrameClass::Event ; "non object is event")]
    fn classification(text: &str, expected: FrameClass) {
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(JsonCodec::classify(&value), expected);
    }

    #[test]
    fn decode_error_frame() {
        let codec = JsonCodec::new();
        let decoded = codec
            .decode(r#"{"error":{"code":-1121,"msg":"Invalid symbol."},"id":9}"#)
            .unwrap();

        match decoded {
            Decoded::Frame(InboundFrame::Error(err)) => {
                assert_eq!(err.code, -1121);
                assert_eq!(err.msg, "Invalid symbol.");
            }
            other => panic!("expected error frame, got {other:?}"),
        }
    }

    #[test]
    fn decode_error_frame_with_odd_payload() {
        let codec = JsonCodec::new();
        let decoded = codec.decode(r#"{"error":"boom"}"#).unwrap();
        assert!(matches!(
            decoded,
            Decoded::Frame(InboundFrame::Error(RemoteError { code: 0, .. }))
        ));
    }

    #[test]
    fn decode_event_frame() {
        let codec = JsonCodec::new();
        let decoded = codec
            .decode(r#"{"e":"listenKeyExpired","E":1576653824250,"listenKey":"k"}"#)
            .unwrap();
        assert!(matches!(decoded, Decoded::Frame(InboundFrame::Event(_))));
    }

    #[test]
    fn decode_response_frame() {
        let codec = JsonCodec::new();
        let decoded = codec
            .decode(r#"{"id":7,"result":[{"req":"x","res":{"accountAlias":"a","balances":[]}}]}"#)
            .unwrap();

        match decoded {
            Decoded::Frame(InboundFrame::Response(response)) => assert_eq!(response.id, 7),
            other => panic!("expected response frame, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_response_is_not_fatal() {
        let codec = JsonCodec::new();
        let decoded = codec.decode(r#"{"id":"seven"}"#).unwrap();
        assert!(matches!(
            decoded,
            Decoded::Undecodable(FrameClass::Response, ProtocolError::Decode { .. })
        ));
    }

    #[test]
    fn broken_response_keeps_its_id() {
        let codec = JsonCodec::new();
        let decoded = codec.decode(r#"{"id":1,"result":[{"req":"x"}]}"#).unwrap();
        assert!(matches!(
            decoded,
            Decoded::BrokenResponse(1, ProtocolError::Decode { what: "response", .. })
        ));
    }

    #[test]
    fn undecodable_event_is_not_fatal() {
        let codec = JsonCodec::new();
        let decoded = codec.decode(r#"{"foo":"bar"}"#).unwrap();
        assert!(matches!(
            decoded,
            Decoded::Undecodable(FrameClass::Event, _)
        ));
    }

    #[test]
    fn malformed_text_is_an_error() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode("not json"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn encode_request() {
        let codec = JsonCodec::new();
        let request = StreamRequest::snapshot(1, super::super::messages::RequestKind::Account, "k");
        let json = codec.encode(&request).unwrap();
        assert_eq!(json, r#"{"id":1,"method":"REQUEST","params":["k@account"]}"#);
    }
}
