//! SignalR JSON hub protocol codec.
//!
//! Frames are JSON objects terminated by the 0x1e record separator; several
//! frames may share one WebSocket text message. Only the frame types this
//! client exchanges are modeled: Invocation (1), Completion (3), Ping (6)
//! and Close (7). Anything else is surfaced as [`HubFrame::Other`] and
//! ignored upstream.

use serde::Deserialize;
use serde_json::{json, Value};

use ch_core::error::{HubError, HubResult};

/// Record separator terminating every hub protocol frame.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Frame type tag for invocations.
const TYPE_INVOCATION: u64 = 1;
/// Frame type tag for completions.
const TYPE_COMPLETION: u64 = 3;
/// Frame type tag for pings.
const TYPE_PING: u64 = 6;
/// Frame type tag for close notifications.
const TYPE_CLOSE: u64 = 7;

/// A decoded hub protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub enum HubFrame {
    /// A hub method call. Server→client invocations carry no
    /// `invocationId` for fire-and-forget delivery.
    Invocation {
        invocation_id: Option<String>,
        target: String,
        arguments: Vec<Value>,
    },
    /// Acknowledgment of a client invocation.
    Completion {
        invocation_id: String,
        error: Option<String>,
    },
    /// Keepalive.
    Ping,
    /// Server-initiated close.
    Close { error: Option<String> },
    /// Any frame type this client does not handle.
    Other(u64),
}

/// The handshake request sent immediately after the WebSocket opens.
pub fn handshake_frame() -> String {
    format!("{}{RECORD_SEPARATOR}", json!({"protocol": "json", "version": 1}))
}

/// Parse the server's handshake response frame. An empty object means
/// success; an `error` field means the handshake was rejected.
pub fn parse_handshake_response(frame: &str) -> HubResult<()> {
    let value: Value = serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR))
        .map_err(|e| HubError::Handshake(format!("invalid handshake response: {e}")))?;
    match value.get("error").and_then(Value::as_str) {
        Some(error) => Err(HubError::Handshake(error.to_string())),
        None => Ok(()),
    }
}

/// Encode a client invocation frame.
pub fn invocation_frame(invocation_id: &str, target: &str, arguments: &[Value]) -> String {
    let frame = json!({
        "type": TYPE_INVOCATION,
        "invocationId": invocation_id,
        "target": target,
        "arguments": arguments,
    });
    format!("{frame}{RECORD_SEPARATOR}")
}

/// Encode a keepalive ping frame.
pub fn ping_frame() -> String {
    format!("{}{RECORD_SEPARATOR}", json!({"type": TYPE_PING}))
}

/// Decode every frame in a WebSocket text payload.
///
/// Unparseable frames are dropped rather than failing the whole payload;
/// the hub protocol treats each frame independently.
pub fn parse_frames(payload: &str) -> Vec<HubFrame> {
    payload
        .split(RECORD_SEPARATOR)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(|chunk| serde_json::from_str::<Value>(chunk).ok())
        .map(|value| decode_frame(&value))
        .collect()
}

fn decode_frame(value: &Value) -> HubFrame {
    let frame_type = value.get("type").and_then(Value::as_u64).unwrap_or(0);
    match frame_type {
        TYPE_INVOCATION => HubFrame::Invocation {
            invocation_id: value
                .get("invocationId")
                .and_then(Value::as_str)
                .map(str::to_string),
            target: value
                .get("target")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            arguments: value
                .get("arguments")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        },
        TYPE_COMPLETION => HubFrame::Completion {
            invocation_id: value
                .get("invocationId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            error: value.get("error").and_then(Value::as_str).map(str::to_string),
        },
        TYPE_PING => HubFrame::Ping,
        TYPE_CLOSE => HubFrame::Close {
            error: value.get("error").and_then(Value::as_str).map(str::to_string),
        },
        other => HubFrame::Other(other),
    }
}

/// Response body of the negotiate request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    /// Connection id (negotiate version 0).
    #[serde(default)]
    pub connection_id: Option<String>,
    /// Connection token (negotiate version 1); used as the `id` query
    /// parameter on the WebSocket URL.
    #[serde(default)]
    pub connection_token: Option<String>,
}

impl NegotiateResponse {
    /// The value to present as the WebSocket `id` query parameter.
    pub fn session_id(&self) -> Option<&str> {
        self.connection_token
            .as_deref()
            .or(self.connection_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_frame_shape() {
        let frame = handshake_frame();
        assert!(frame.ends_with(RECORD_SEPARATOR));
        let body: Value = serde_json::from_str(frame.trim_end_matches(RECORD_SEPARATOR)).unwrap();
        assert_eq!(body["protocol"], "json");
        assert_eq!(body["version"], 1);
    }

    #[test]
    fn test_handshake_response_ok_and_error() {
        assert!(parse_handshake_response("{}\u{1e}").is_ok());

        let err = parse_handshake_response("{\"error\":\"unsupported protocol\"}\u{1e}")
            .unwrap_err();
        assert!(matches!(err, HubError::Handshake(msg) if msg == "unsupported protocol"));
    }

    #[test]
    fn test_invocation_frame_roundtrip() {
        let frame = invocation_frame("42", "SendGroupMessage", &[json!("g1"), json!("hello")]);
        let parsed = parse_frames(&frame);
        assert_eq!(
            parsed,
            vec![HubFrame::Invocation {
                invocation_id: Some("42".into()),
                target: "SendGroupMessage".into(),
                arguments: vec![json!("g1"), json!("hello")],
            }]
        );
    }

    #[test]
    fn test_multiple_frames_in_one_payload() {
        let payload = format!("{}{}", ping_frame(), invocation_frame("1", "JoinGroup", &[json!("g1")]));
        let frames = parse_frames(&payload);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], HubFrame::Ping);
        assert!(matches!(&frames[1], HubFrame::Invocation { target, .. } if target == "JoinGroup"));
    }

    #[test]
    fn test_completion_with_error() {
        let frames = parse_frames("{\"type\":3,\"invocationId\":\"7\",\"error\":\"boom\"}\u{1e}");
        assert_eq!(
            frames,
            vec![HubFrame::Completion {
                invocation_id: "7".into(),
                error: Some("boom".into()),
            }]
        );
    }

    #[test]
    fn test_close_frame() {
        let frames = parse_frames("{\"type\":7,\"error\":\"server shutting down\"}\u{1e}");
        assert_eq!(
            frames,
            vec![HubFrame::Close {
                error: Some("server shutting down".into())
            }]
        );
    }

    #[test]
    fn test_unknown_type_is_other() {
        let frames = parse_frames("{\"type\":2,\"invocationId\":\"1\",\"item\":1}\u{1e}");
        assert_eq!(frames, vec![HubFrame::Other(2)]);
    }

    #[test]
    fn test_garbage_chunks_are_dropped() {
        let frames = parse_frames("not-json\u{1e}{\"type\":6}\u{1e}");
        assert_eq!(frames, vec![HubFrame::Ping]);
    }

    #[test]
    fn test_negotiate_response_prefers_token() {
        let resp: NegotiateResponse = serde_json::from_str(
            "{\"connectionId\":\"cid\",\"connectionToken\":\"ctok\",\"negotiateVersion\":1}",
        )
        .unwrap();
        assert_eq!(resp.session_id(), Some("ctok"));

        let legacy: NegotiateResponse =
            serde_json::from_str("{\"connectionId\":\"cid\"}").unwrap();
        assert_eq!(legacy.session_id(), Some("cid"));
    }
}
