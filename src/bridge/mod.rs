//! Runner WebSocket bridge (C10): wire protocol plus the bridging task.

pub mod bridge;
pub mod protocol;

pub use bridge::{ws_url_from_http, Bridge};
pub use protocol::{ControlFrame, PROTOCOL_VERSION};
