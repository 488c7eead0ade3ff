//! HTTP control client (C6).

pub mod client;

pub use client::{CreateSessionResponse, HttpClient};
