//! Multiplexer client (C7): a thin, synchronous wrapper around `tmux`.
//!
//! Grounded on `TmuxClient`'s run-and-check-exit-status shape, generalized
//! with the operations SPEC_FULL.md §4.7 names that the teacher's client
//! doesn't have (`load_buffer`/`paste_buffer`, `pipe_pane`, `has_window`,
//! `resize_pane`, `select_window`).

use std::io::Write;
use std::process::{Command, Output, Stdio};

use crate::error::MuxError;

/// Wraps the `tmux` binary. Every operation is a blocking subprocess call;
/// callers on an async executor should run these via `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct MuxClient {
    program: String,
}

impl Default for MuxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MuxClient {
    pub fn new() -> Self {
        Self {
            program: "tmux".to_string(),
        }
    }

    pub fn create_session(&self, name: &str, argv: Option<&[String]>) -> Result<(), MuxError> {
        validate_name(name)?;
        let mut args: Vec<String> = vec![
            "new-session".into(),
            "-d".into(),
            "-s".into(),
            name.to_string(),
        ];
        if let Some(argv) = argv {
            args.extend(argv.iter().cloned());
        }
        self.run(&args).map(|_| ())
    }

    pub fn create_window(
        &self,
        session: &str,
        window: &str,
        argv: Option<&[String]>,
    ) -> Result<(), MuxError> {
        validate_name(window)?;
        let target = format!("{session}:");
        let mut args: Vec<String> = vec![
            "new-window".into(),
            "-t".into(),
            target,
            "-n".into(),
            window.to_string(),
        ];
        if let Some(argv) = argv {
            args.extend(argv.iter().cloned());
        }
        self.run(&args).map(|_| ())
    }

    /// `has-session` — a non-zero exit means "absent", not an error.
    pub fn has_session(&self, name: &str) -> Result<bool, MuxError> {
        self.probe(&["has-session", "-t", name])
    }

    /// `has-window` via `list-windows -F "#{window_name}"`, parsed line-wise.
    pub fn has_window(&self, session: &str, window: &str) -> Result<bool, MuxError> {
        if !self.has_session(session)? {
            return Ok(false);
        }
        let output = self.run(&[
            "list-windows".into(),
            "-t".into(),
            session.to_string(),
            "-F".into(),
            "#{window_name}".into(),
        ])?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().any(|l| l == window))
    }

    pub fn kill_session(&self, name: &str) -> Result<(), MuxError> {
        self.run(&["kill-session", "-t", name]).map(|_| ())
    }

    pub fn kill_window(&self, target: &str) -> Result<(), MuxError> {
        self.run(&["kill-window", "-t", target]).map(|_| ())
    }

    pub fn send_keys(&self, target: &str, keys: &[&str]) -> Result<(), MuxError> {
        let mut args: Vec<String> = vec!["send-keys".into(), "-t".into(), target.to_string()];
        args.extend(keys.iter().map(|k| k.to_string()));
        self.run(&args).map(|_| ())
    }

    /// Feeds `bytes` via stdin to `load-buffer -`.
    pub fn load_buffer(&self, bytes: &[u8]) -> Result<(), MuxError> {
        let mut child = Command::new(&self.program)
            .args(["load-buffer", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(bytes)?;
        }
        let output = child.wait_with_output()?;
        Self::check(output).map(|_| ())
    }

    pub fn paste_buffer(&self, target: &str) -> Result<(), MuxError> {
        self.run(&["paste-buffer", "-t", target]).map(|_| ())
    }

    /// Pipes pane output through `shell_command` (uses `-o`, i.e. toggle-on
    /// semantics: calling this twice on the same target stops the pipe).
    pub fn pipe_pane(&self, target: &str, shell_command: &str) -> Result<(), MuxError> {
        self.run(&["pipe-pane", "-o", "-t", target, shell_command])
            .map(|_| ())
    }

    pub fn capture_pane(&self, target: &str) -> Result<String, MuxError> {
        let output = self.run(&["capture-pane", "-t", target, "-p"])?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    pub fn resize_pane(&self, target: &str, cols: u32, rows: u32) -> Result<(), MuxError> {
        self.run(&[
            "resize-pane".to_string(),
            "-t".to_string(),
            target.to_string(),
            "-x".to_string(),
            cols.to_string(),
            "-y".to_string(),
            rows.to_string(),
        ])
        .map(|_| ())
    }

    pub fn select_window(&self, target: &str) -> Result<(), MuxError> {
        self.run(&["select-window", "-t", target]).map(|_| ())
    }

    pub fn switch_client(&self, session: &str) -> Result<(), MuxError> {
        self.run(&["switch-client", "-t", session]).map(|_| ())
    }

    pub fn attach_command(&self, session: &str) -> Vec<String> {
        vec![
            self.program.clone(),
            "attach".to_string(),
            "-t".to_string(),
            session.to_string(),
        ]
    }

    fn probe(&self, args: &[&str]) -> Result<bool, MuxError> {
        let output = Command::new(&self.program).args(args).output()?;
        if output.status.success() {
            return Ok(true);
        }
        Ok(false)
    }

    fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<Output, MuxError> {
        let output = Command::new(&self.program)
            .args(args.iter().map(|a| a.as_ref()))
            .output()?;
        Self::check(output)
    }

    fn check(output: Output) -> Result<Output, MuxError> {
        if output.status.success() {
            return Ok(output);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(MuxError::CommandFailed(stderr))
    }
}

fn validate_name(name: &str) -> Result<(), MuxError> {
    if name.is_empty() || name.contains(':') || name.contains('.') {
        return Err(MuxError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_name_rejects_colon_and_dot() {
        assert!(validate_name("Codex 1").is_ok());
        assert!(validate_name("bad:name").is_err());
        assert!(validate_name("bad.name").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn attach_command_shape() {
        let client = MuxClient::new();
        assert_eq!(
            client.attach_command("Gestalt workspace"),
            vec!["tmux", "attach", "-t", "Gestalt workspace"]
        );
    }
}
