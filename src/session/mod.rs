//! Session reference resolution (C5) and the catalog types it operates on.

pub mod reference;

pub use reference::{
    normalize, resolve_agent, resolve_send_target, resolve_session_id, AgentCatalogEntry,
    SendTarget, SessionCatalogEntry,
};
