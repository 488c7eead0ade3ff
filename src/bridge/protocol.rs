//! Runner bridge control-frame protocol (§4.10/§6.3): a JSON tagged enum,
//! strictly decoded, exactly as `RunnerRequest`/`RunnerResponse` are.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

pub const PROTOCOL_VERSION: u32 = 1;

/// Control frames exchanged as WS text frames. `deny_unknown_fields`
/// enforces the "unknown fields in a control frame are rejected" wire
/// invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ControlFrame {
    Hello { protocol_version: u32 },
    Ping,
    Pong,
    Resize { cols: u16, rows: u16 },
    Exit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i32>,
    },
}

impl ControlFrame {
    pub fn hello() -> Self {
        ControlFrame::Hello {
            protocol_version: PROTOCOL_VERSION,
        }
    }

    pub fn exit(code: Option<i32>) -> Self {
        ControlFrame::Exit { code }
    }

    /// Decodes and validates a text frame per §4.10/§6.3: unknown `type`
    /// values are rejected by `deny_unknown_fields`'s tagged-enum
    /// counterpart (serde's `#[serde(tag)]` already errors on an unknown
    /// variant name), and `resize` additionally requires both dimensions
    /// to be non-zero.
    pub fn decode(text: &str) -> Result<Self, BridgeError> {
        let frame: ControlFrame =
            serde_json::from_str(text).map_err(|e| BridgeError::Protocol(e.to_string()))?;
        if let ControlFrame::Resize { cols, rows } = frame {
            if cols == 0 || rows == 0 {
                return Err(BridgeError::Protocol(format!(
                    "resize requires both dimensions > 0, got {cols}x{rows}"
                )));
            }
        }
        Ok(frame)
    }

    pub fn encode(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::Protocol(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let frame = ControlFrame::hello();
        let text = frame.encode().unwrap();
        assert_eq!(text, r#"{"type":"hello","protocol_version":1}"#);
        assert_eq!(ControlFrame::decode(&text).unwrap(), frame);
    }

    #[test]
    fn resize_requires_nonzero_dimensions() {
        assert!(ControlFrame::decode(r#"{"type":"resize","cols":0,"rows":24}"#).is_err());
        assert!(ControlFrame::decode(r#"{"type":"resize","cols":80,"rows":24}"#).is_ok());
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(ControlFrame::decode(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn unknown_extra_field_is_rejected() {
        assert!(ControlFrame::decode(r#"{"type":"ping","extra":true}"#).is_err());
    }

    #[test]
    fn exit_code_is_optional() {
        let frame = ControlFrame::decode(r#"{"type":"exit"}"#).unwrap();
        assert_eq!(frame, ControlFrame::Exit { code: None });
    }
}
