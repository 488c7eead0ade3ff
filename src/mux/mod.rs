//! Multiplexer client (C7) and targeting policy (C8).

pub mod client;
pub mod targeting;

pub use client::MuxClient;
pub use targeting::{
    attach_command, compute_target, ensure_and_create_window, inside_multiplexer,
    MultiplexerTarget,
};
