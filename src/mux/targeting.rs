//! Multiplexer targeting policy (C8): computes `(host_session, window)`
//! from a session ID, the working directory, and whether the current
//! process is already attached to the host multiplexer (§4.8).

use std::path::Path;

use super::client::MuxClient;
use crate::error::MuxError;

const FALLBACK_WINDOW_NAME: &str = "gestalt-agent";
const FALLBACK_HOST_SESSION: &str = "Gestalt workspace";

/// `{host_session, window}`. An empty `host_session` means "current
/// session" (we're already inside the multiplexer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplexerTarget {
    pub host_session: String,
    pub window: String,
}

impl MultiplexerTarget {
    pub fn in_current_session(&self) -> bool {
        self.host_session.is_empty()
    }
}

/// True when the current process already runs inside the host multiplexer,
/// per the standard `TMUX` presence indicator.
pub fn inside_multiplexer(tmux_env: Option<&str>) -> bool {
    matches!(tmux_env, Some(v) if !v.is_empty())
}

fn window_name(session_id: &str) -> String {
    let trimmed = session_id.trim();
    if trimmed.is_empty() {
        FALLBACK_WINDOW_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

fn host_session_for(cwd: &Path) -> String {
    let basename = cwd
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_string();
    if basename.is_empty() || basename == "." || basename == "/" {
        FALLBACK_HOST_SESSION.to_string()
    } else {
        format!("Gestalt {basename}")
    }
}

/// Computes the target for `session_id` given `cwd` and whether we're
/// already inside the multiplexer.
pub fn compute_target(session_id: &str, cwd: &Path, inside: bool) -> MultiplexerTarget {
    let window = window_name(session_id);
    if inside {
        MultiplexerTarget {
            host_session: String::new(),
            window,
        }
    } else {
        MultiplexerTarget {
            host_session: host_session_for(cwd),
            window,
        }
    }
}

/// Ensures the target's host session exists (creating it if necessary, per
/// §4.8) then opens a window running `argv` there; does nothing to the host
/// session when `target` refers to the current session.
pub fn ensure_and_create_window(
    client: &MuxClient,
    target: &MultiplexerTarget,
    argv: &[String],
) -> Result<(), MuxError> {
    if target.in_current_session() {
        client.create_window("", &target.window, Some(argv))
    } else {
        if !client.has_session(&target.host_session)? {
            client.create_session(&target.host_session, None)?;
        }
        client.create_window(&target.host_session, &target.window, Some(argv))
    }
}

/// The command that selects/attaches the pane for `target`, per §4.8's
/// attach-command helpers.
pub fn attach_command(client: &MuxClient, target: &MultiplexerTarget, inside: bool) -> Vec<String> {
    if inside {
        if target.host_session.is_empty() {
            vec![
                "tmux".to_string(),
                "select-window".to_string(),
                "-t".to_string(),
                target.window.clone(),
            ]
        } else {
            vec![
                "tmux".to_string(),
                "switch-client".to_string(),
                "-t".to_string(),
                target.host_session.clone(),
            ]
        }
    } else {
        client.attach_command(&target.host_session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn inside_multiplexer_checks_presence_not_emptiness() {
        assert!(inside_multiplexer(Some("/tmp/tmux-1000/default,1234,0")));
        assert!(!inside_multiplexer(Some("")));
        assert!(!inside_multiplexer(None));
    }

    #[test]
    fn window_name_falls_back_when_empty() {
        assert_eq!(window_name("  "), FALLBACK_WINDOW_NAME);
        assert_eq!(window_name("Codex 1"), "Codex 1");
    }

    #[test]
    fn host_session_uses_prefixed_basename() {
        assert_eq!(host_session_for(&PathBuf::from("/tmp/test")), "Gestalt test");
    }

    #[test]
    fn host_session_falls_back_for_root_and_dot() {
        assert_eq!(host_session_for(&PathBuf::from("/")), FALLBACK_HOST_SESSION);
        assert_eq!(host_session_for(&PathBuf::from(".")), FALLBACK_HOST_SESSION);
    }

    #[test]
    fn compute_target_outside_multiplexer_matches_scenario() {
        let target = compute_target("Codex 1", &PathBuf::from("/tmp/test"), false);
        assert_eq!(target.host_session, "Gestalt test");
        assert_eq!(target.window, "Codex 1");
        assert!(!target.in_current_session());
    }

    #[test]
    fn compute_target_inside_multiplexer_has_empty_host_session() {
        let target = compute_target("Codex 1", &PathBuf::from("/tmp/test"), true);
        assert!(target.in_current_session());
        assert_eq!(target.window, "Codex 1");
    }
}
