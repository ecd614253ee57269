//! Push-connection message envelope.
//!
//! Every frame is a JSON object `{"Type": ..., "Data": ...}` whose payload
//! shape depends on the type:
//!
//! | Type      | Direction        | Data                  |
//! |-----------|------------------|-----------------------|
//! | `watch`   | client → server  | path to watch         |
//! | `error`   | client → server  | client diagnostic     |
//! | `refresh` | server → client  | none                  |

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "Type", content = "Data")]
pub(crate) enum Message {
    /// Add a path to the session's watch set.
    #[serde(rename = "watch")]
    Watch(String),
    /// Diagnostic reported by the browser.
    #[serde(rename = "error")]
    Error(String),
    /// Ask the browser to reload the page.
    #[serde(rename = "refresh")]
    Refresh,
}

/// Frame decode failure.
#[derive(Debug, thiserror::Error)]
pub(crate) enum ProtocolError {
    /// Frame is not a JSON envelope.
    #[error("could not unmarshal JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Envelope type is not part of the protocol.
    #[error("unhandled message type {0:?}")]
    UnknownType(String),
    /// Payload does not match what the type requires.
    #[error("invalid payload for {kind:?} message: {data}")]
    InvalidPayload {
        /// Envelope type.
        kind: String,
        /// Payload as received.
        data: Value,
    },
}

/// Envelope as it appears on the wire, before the payload is interpreted.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Data", default)]
    data: Value,
}

impl Message {
    /// Decode a text frame, interpreting `Data` according to `Type`.
    pub(crate) fn decode(text: &str) -> Result<Self, ProtocolError> {
        let RawEnvelope { kind, data } = serde_json::from_str(text)?;

        match kind.as_str() {
            "watch" | "error" => {
                let Value::String(payload) = data else {
                    return Err(ProtocolError::InvalidPayload { kind, data });
                };
                Ok(if kind == "watch" {
                    Self::Watch(payload)
                } else {
                    Self::Error(payload)
                })
            }
            "refresh" => Ok(Self::Refresh),
            _ => Err(ProtocolError::UnknownType(kind)),
        }
    }

    /// Encode as a JSON text frame.
    pub(crate) fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_refresh_has_no_payload() {
        assert_eq!(Message::Refresh.encode().unwrap(), r#"{"Type":"refresh"}"#);
    }

    #[test]
    fn test_watch_encoding_matches_client_format() {
        let text = Message::Watch("res/x.css".to_owned()).encode().unwrap();
        assert_eq!(text, r#"{"Type":"watch","Data":"res/x.css"}"#);
    }

    #[test]
    fn test_decode_watch() {
        let message = Message::decode(r#"{"Type":"watch","Data":"/talk.slide"}"#).unwrap();
        assert_eq!(message, Message::Watch("/talk.slide".to_owned()));
    }

    #[test]
    fn test_decode_error() {
        let message = Message::decode(r#"{"Type":"error","Data":"boom"}"#).unwrap();
        assert_eq!(message, Message::Error("boom".to_owned()));
    }

    #[test]
    fn test_decode_refresh_without_data() {
        assert_eq!(Message::decode(r#"{"Type":"refresh"}"#).unwrap(), Message::Refresh);
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = Message::decode("{not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }

    #[test]
    fn test_decode_missing_type() {
        let err = Message::decode(r#"{"Data":"x"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Json(_)));
    }

    #[test]
    fn test_decode_unknown_type() {
        let err = Message::decode(r#"{"Type":"scroll","Data":3}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(kind) if kind == "scroll"));
    }

    #[test]
    fn test_decode_watch_with_non_string_payload() {
        let err = Message::decode(r#"{"Type":"watch","Data":42}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { kind, .. } if kind == "watch"));

        let err = Message::decode(r#"{"Type":"watch"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { data: Value::Null, .. }));
    }
}
