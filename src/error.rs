//! Crate-wide error taxonomy.
//!
//! Each component that has a closed set of failure modes gets its own
//! `thiserror` enum; `main()` functions and the orchestrator compose them
//! behind `anyhow::Result` and classify the final error into one of the
//! frozen exit codes via [`exit_code_for`].

use thiserror::Error;

/// Errors raised by the config flattener and per-CLI argv builders (C1/C2).
#[derive(Debug, Error)]
pub enum ShellgenError {
    #[error("unknown cli_type '{0}'")]
    UnknownCliType(String),
    #[error("cli_config for '{cli_type}' has no usable keys")]
    EmptyConfig { cli_type: String },
}

/// Errors raised by the prompt composer (C3).
#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("prompt not found: {0}")]
    NotFound(String),
    #[error("include cycle detected: {chain}")]
    Cycle { chain: String },
    #[error("include depth exceeded (max {max}): {chain}")]
    DepthExceeded { max: usize, chain: String },
    #[error("skill not found: {0}")]
    SkillNotFound(String),
}

/// Errors raised by port address parsing (C4).
#[derive(Debug, Error)]
pub enum PortError {
    #[error("could not parse port from '{0}'")]
    Unparseable(String),
    #[error("port out of range: {0}")]
    OutOfRange(i64),
}

/// Errors raised by session-reference and agent-name resolution (C5).
#[derive(Debug, Error)]
pub enum SessionRefError {
    #[error("session reference is empty")]
    Empty,
    #[error("agent not found: {0}")]
    AgentNotFound(String),
    #[error("ambiguous agent reference '{token}': matches {candidates:?}")]
    Ambiguous {
        token: String,
        candidates: Vec<String>,
    },
}

/// Errors raised by the HTTP control client (C6).
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("timed out waiting for session '{0}' to become ready")]
    WaitReadyTimeout(String),
}

impl HttpError {
    /// Maps this error onto the frozen CLI exit codes (§4.11 / §7 of SPEC_FULL.md).
    pub fn exit_code(&self) -> i32 {
        match self {
            HttpError::Status { status, .. } if *status == 404 => 2,
            HttpError::Status { .. } => 3,
            HttpError::Transport(_) => 3,
            HttpError::Validation(_) => 1,
            HttpError::WaitReadyTimeout(_) => 3,
        }
    }
}

/// Errors raised while loading agent/skill declarative files (§6.1).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not derive an id from {0}")]
    UnreadableId(String),
    #[error("invalid agent '{id}': {reason}")]
    InvalidAgent { id: String, reason: String },
}

/// Errors raised by the multiplexer client (C7).
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("tmux not found on PATH")]
    NotFound,
    #[error("tmux command failed: {0}")]
    CommandFailed(String),
    #[error("invalid session or window name: {0}")]
    InvalidName(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors raised by the runner bridge (C10).
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unsupported base url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("websocket transport error: {0}")]
    Transport(String),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("multiplexer error: {0}")]
    Mux(#[from] MuxError),
    #[error("write deadline exceeded")]
    WriteTimeout,
}

/// Frozen exit codes for the `gestalt` (launch) binary, per §4.12.
pub mod launch_exit {
    pub const OK: i32 = 0;
    pub const USAGE: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const AGENT: i32 = 3;
    pub const PROMPT: i32 = 4;
    pub const SERVER: i32 = 5;
}

/// Frozen exit codes for the `gestalt-send` binary, per §4.11.
pub mod send_exit {
    pub const OK: i32 = 0;
    pub const USAGE: i32 = 1;
    pub const RESOLUTION: i32 = 2;
    pub const NETWORK: i32 = 3;
}

/// Classifies a composed `anyhow::Error` into a `launch` exit code by
/// downcasting onto the typed domain errors, mirroring the teacher's
/// `ApiError::from_anyhow` categorization but driven by type rather than
/// string matching since the domain errors here are already typed.
pub fn launch_exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ComposerError>().is_some() {
        return launch_exit::PROMPT;
    }
    if err.downcast_ref::<SessionRefError>().is_some() {
        return launch_exit::AGENT;
    }
    if let Some(e) = err.downcast_ref::<HttpError>() {
        return if e.exit_code() == 2 {
            launch_exit::AGENT
        } else {
            launch_exit::SERVER
        };
    }
    if err.downcast_ref::<MuxError>().is_some()
        || err.downcast_ref::<ShellgenError>().is_some()
        || err.downcast_ref::<ConfigError>().is_some()
    {
        return launch_exit::CONFIG;
    }
    launch_exit::USAGE
}

/// Classifies a composed `anyhow::Error` into a `send` exit code.
pub fn send_exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<HttpError>() {
        return e.exit_code();
    }
    if err.downcast_ref::<SessionRefError>().is_some() {
        return send_exit::RESOLUTION;
    }
    send_exit::USAGE
}
