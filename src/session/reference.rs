//! Session reference resolution and agent-name resolution (C5).

use crate::error::SessionRefError;

/// An agent, as seen by the resolver: just enough to disambiguate a human
/// token against a catalog (§3, `SessionCatalogEntry` projected onto the
/// `/api/agents` shape).
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct AgentCatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub running: Option<bool>,
}

/// A live session, as seen by the resolver (§3, `SessionCatalogEntry`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct SessionCatalogEntry {
    pub id: String,
}

/// Normalizes a raw human token: trims whitespace, rejects empty input.
pub fn normalize(token: &str) -> Result<String, SessionRefError> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return Err(SessionRefError::Empty);
    }
    Ok(trimmed.to_string())
}

/// Resolves a normalized token against a list of live session IDs (§4.5):
///
/// - If the token already ends in a space-separated positive integer,
///   return it unchanged.
/// - Else if it matches an existing session ID, return it unchanged.
/// - Else append `" 1"` (canonical first-instance form).
pub fn resolve_session_id(token: &str, sessions: &[SessionCatalogEntry]) -> String {
    if ends_with_positive_integer(token) {
        return token.to_string();
    }
    if sessions.iter().any(|s| s.id == token) {
        return token.to_string();
    }
    format!("{token} 1")
}

fn ends_with_positive_integer(token: &str) -> bool {
    match token.rsplit_once(' ') {
        Some((_, suffix)) => matches!(suffix.parse::<u64>(), Ok(n) if n > 0),
        None => false,
    }
}

/// Resolves a token against an agent catalog using case-insensitive
/// equality on both `id` and `name` (§4.5).
pub fn resolve_agent<'a>(
    token: &str,
    agents: &'a [AgentCatalogEntry],
) -> Result<&'a AgentCatalogEntry, SessionRefError> {
    let token_lower = token.to_lowercase();

    let id_matches: Vec<&AgentCatalogEntry> = agents
        .iter()
        .filter(|a| a.id.to_lowercase() == token_lower)
        .collect();
    let name_matches: Vec<&AgentCatalogEntry> = agents
        .iter()
        .filter(|a| a.name.to_lowercase() == token_lower)
        .collect();

    if id_matches.len() > 1 {
        return Err(ambiguous(token, &id_matches));
    }
    if name_matches.len() > 1 {
        return Err(ambiguous(token, &name_matches));
    }
    match (id_matches.first(), name_matches.first()) {
        (Some(id_match), Some(name_match)) if id_match.id != name_match.id => {
            Err(ambiguous(token, &[id_match, name_match]))
        }
        (Some(m), _) => Ok(m),
        (None, Some(m)) => Ok(m),
        (None, None) => Err(SessionRefError::AgentNotFound(token.to_string())),
    }
}

fn ambiguous(token: &str, candidates: &[&AgentCatalogEntry]) -> SessionRefError {
    SessionRefError::Ambiguous {
        token: token.to_string(),
        candidates: candidates.iter().map(|a| a.id.clone()).collect(),
    }
}

/// Resolves the target for the `send` CLI (§4.11, §9 open-question
/// resolution): a token matching a live session ID wins outright;
/// otherwise the token is resolved as an agent name/id.
pub enum SendTarget<'a> {
    Session(String),
    Agent(&'a AgentCatalogEntry),
}

pub fn resolve_send_target<'a>(
    token: &str,
    sessions: &[SessionCatalogEntry],
    agents: &'a [AgentCatalogEntry],
) -> Result<SendTarget<'a>, SessionRefError> {
    let token = normalize(token)?;
    if sessions.iter().any(|s| s.id == token) {
        return Ok(SendTarget::Session(token));
    }
    resolve_agent(&token, agents).map(SendTarget::Agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> SessionCatalogEntry {
        SessionCatalogEntry { id: id.to_string() }
    }

    fn agent(id: &str, name: &str) -> AgentCatalogEntry {
        AgentCatalogEntry {
            id: id.to_string(),
            name: name.to_string(),
            session_id: None,
            running: None,
        }
    }

    #[test]
    fn resolve_session_id_matches_p9() {
        assert_eq!(
            resolve_session_id("Fixer", &[session("Fixer 1")]),
            "Fixer 1"
        );
        assert_eq!(resolve_session_id("Fixer 2", &[]), "Fixer 2");
        assert_eq!(
            resolve_session_id("tmux-hub", &[session("tmux-hub")]),
            "tmux-hub"
        );
    }

    #[test]
    fn normalize_rejects_empty_input() {
        assert!(normalize("   ").is_err());
        assert_eq!(normalize("  Fixer  ").unwrap(), "Fixer");
    }

    #[test]
    fn resolve_agent_is_case_insensitive() {
        let agents = vec![agent("coder", "Coder")];
        assert_eq!(resolve_agent("CODER", &agents).unwrap().id, "coder");
        assert_eq!(resolve_agent("coder", &agents).unwrap().id, "coder");
    }

    #[test]
    fn resolve_agent_detects_ambiguous_names() {
        let agents = vec![agent("a", "Shared"), agent("b", "Shared")];
        assert!(matches!(
            resolve_agent("shared", &agents),
            Err(SessionRefError::Ambiguous { .. })
        ));
    }

    #[test]
    fn resolve_agent_detects_cross_match_ambiguity() {
        let agents = vec![agent("x", "Other"), agent("other", "Something")];
        assert!(matches!(
            resolve_agent("other", &agents),
            Err(SessionRefError::Ambiguous { .. })
        ));
    }

    #[test]
    fn send_target_prefers_live_session_over_agent_name() {
        let sessions = vec![session("coder")];
        let agents = vec![agent("coder", "Coder")];
        match resolve_send_target("coder", &sessions, &agents).unwrap() {
            SendTarget::Session(id) => assert_eq!(id, "coder"),
            SendTarget::Agent(_) => panic!("expected session match to win"),
        }
    }
}
