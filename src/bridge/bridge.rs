//! Runner WebSocket bridge (C10): bridges a multiplexer pane to a
//! WS-controlled remote peer.
//!
//! Task split follows `handle_ws_connection`'s forward-task-plus-main-loop
//! shape: one task pushes data outbound (here, tailed pane bytes instead of
//! broadcast events), the main task drains inbound frames and dispatches by
//! type, and a shared writer is serialized behind a lock.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use log::{debug, error, warn};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{watch, Mutex};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use crate::error::BridgeError;
use crate::mux::MuxClient;
use crate::shellgen::shell_quote;

use super::protocol::ControlFrame;

const TAIL_POLL_INTERVAL: Duration = Duration::from_millis(50);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

type WsWriteHalf = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Rewrites an `http(s)://` base URL into its `ws(s)://` equivalent (§4.10).
pub fn ws_url_from_http(base_url: &str, session_id: &str) -> Result<String, BridgeError> {
    let (scheme, rest) = base_url
        .split_once("://")
        .ok_or_else(|| BridgeError::UnsupportedScheme(base_url.to_string()))?;
    let ws_scheme = match scheme {
        "http" => "ws",
        "https" => "wss",
        other => return Err(BridgeError::UnsupportedScheme(other.to_string())),
    };
    let rest = rest.trim_end_matches('/');
    Ok(format!(
        "{ws_scheme}://{rest}/ws/runner/session/{}",
        urlencode(session_id)
    ))
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

/// Bridges `session_id`'s pane (addressed by `target` on the multiplexer)
/// to the runner's WS channel.
pub struct Bridge {
    mux: MuxClient,
    base_url: String,
    token: Option<String>,
    session_id: String,
    target: String,
}

impl Bridge {
    pub fn new(
        mux: MuxClient,
        base_url: impl Into<String>,
        token: Option<String>,
        session_id: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            mux,
            base_url: base_url.into(),
            token,
            session_id: session_id.into(),
            target: target.into(),
        }
    }

    fn tail_file_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("gestalt-agent-{}.log", self.session_id))
    }

    /// Runs the bridge to completion. Returns once the WS peer disconnects
    /// or an unrecoverable error occurs (§4.10 shutdown semantics).
    pub async fn run(&self) -> Result<(), BridgeError> {
        let ws_url = ws_url_from_http(&self.base_url, &self.session_id)?;
        let mut request = ws_url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| BridgeError::Transport(e.to_string()))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (ws_stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        let (write_half, mut read_half) = ws_stream.split();
        let writer = Arc::new(Mutex::new(write_half));

        let log_path = self.tail_file_path();
        self.mux
            .pipe_pane(&self.target, &format!("cat >> {}", shell_quote(&log_path.to_string_lossy())))?;

        self.write_frame(&writer, Message::Text(ControlFrame::hello().encode()?.into()))
            .await?;

        let snapshot = self.mux.capture_pane(&self.target)?;
        if !snapshot.is_empty() {
            self.write_frame(&writer, Message::Binary(snapshot.into_bytes().into()))
                .await?;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tail_writer = Arc::clone(&writer);
        let tail_path = log_path.clone();
        let tail_task = tokio::spawn(async move {
            if let Err(e) = tail_loop(tail_path, tail_writer, shutdown_rx).await {
                error!("tail task ended: {e}");
            }
        });

        let result = self.main_loop(&writer, &mut read_half).await;

        let _ = shutdown_tx.send(true);
        let _ = tail_task.await;

        let exit = ControlFrame::exit(None).encode().ok();
        if let Some(text) = exit {
            let _ = self.write_frame(&writer, Message::Text(text.into())).await;
        }
        let _ = writer.lock().await.close().await;

        result
    }

    async fn main_loop(
        &self,
        writer: &Arc<Mutex<WsWriteHalf>>,
        read_half: &mut futures::stream::SplitStream<
            tokio_tungstenite::WebSocketStream<
                tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
            >,
        >,
    ) -> Result<(), BridgeError> {
        while let Some(msg) = read_half.next().await {
            let msg = msg.map_err(|e| BridgeError::Transport(e.to_string()))?;
            match msg {
                Message::Binary(bytes) => {
                    if !bytes.is_empty() {
                        self.mux.load_buffer(&bytes)?;
                        self.mux.paste_buffer(&self.target)?;
                    }
                }
                Message::Text(text) => {
                    let frame = match ControlFrame::decode(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!("rejecting malformed control frame: {e}");
                            return Err(e);
                        }
                    };
                    self.dispatch(writer, frame).await?;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        writer: &Arc<Mutex<WsWriteHalf>>,
        frame: ControlFrame,
    ) -> Result<(), BridgeError> {
        match frame {
            ControlFrame::Ping => {
                let pong = ControlFrame::Pong.encode()?;
                self.write_frame(writer, Message::Text(pong.into())).await?;
            }
            ControlFrame::Resize { cols, rows } => {
                self.mux.resize_pane(&self.target, cols as u32, rows as u32)?;
            }
            ControlFrame::Exit { .. } => {
                let host_session = self
                    .target
                    .split(':')
                    .next()
                    .unwrap_or(&self.target)
                    .to_string();
                if !host_session.is_empty() {
                    self.mux.kill_session(&host_session)?;
                }
            }
            ControlFrame::Hello { .. } | ControlFrame::Pong => {
                debug!("ignoring post-handshake frame");
            }
        }
        Ok(())
    }

    async fn write_frame(
        &self,
        writer: &Arc<Mutex<WsWriteHalf>>,
        message: Message,
    ) -> Result<(), BridgeError> {
        let mut guard = writer.lock().await;
        tokio::time::timeout(WRITE_DEADLINE, guard.send(message))
            .await
            .map_err(|_| BridgeError::WriteTimeout)?
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}

/// Follows `path` from offset 0 at a 50 ms poll; every non-empty chunk is
/// pushed as a binary WS frame. Cancelled by `shutdown`.
async fn tail_loop(
    path: PathBuf,
    writer: Arc<Mutex<WsWriteHalf>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    let mut offset: u64 = 0;
    loop {
        if *shutdown.borrow() {
            return Ok(());
        }
        match tokio::fs::File::open(&path).await {
            Ok(mut file) => {
                file.seek(std::io::SeekFrom::Start(offset))
                    .await
                    .map_err(|e| BridgeError::Transport(e.to_string()))?;
                let mut buf = Vec::new();
                let read = file
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| BridgeError::Transport(e.to_string()))?;
                if read > 0 {
                    offset += read as u64;
                    let mut guard = writer.lock().await;
                    let sent = tokio::time::timeout(WRITE_DEADLINE, guard.send(Message::Binary(buf.into())))
                        .await
                        .map_err(|_| BridgeError::WriteTimeout)?;
                    sent.map_err(|e| BridgeError::Transport(e.to_string()))?;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BridgeError::Transport(e.to_string())),
        }

        tokio::select! {
            _ = tokio::time::sleep(TAIL_POLL_INTERVAL) => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_rewrites_http_scheme() {
        assert_eq!(
            ws_url_from_http("http://localhost:8080", "Coder 1").unwrap(),
            "ws://localhost:8080/ws/runner/session/Coder%201"
        );
    }

    #[test]
    fn ws_url_rewrites_https_scheme() {
        assert_eq!(
            ws_url_from_http("https://gestalt.example", "s").unwrap(),
            "wss://gestalt.example/ws/runner/session/s"
        );
    }

    #[test]
    fn ws_url_rejects_unknown_scheme() {
        assert!(ws_url_from_http("ftp://example.com", "s").is_err());
    }
}
