//! Scans `config/agents/` and `config/skills/` into typed catalogs (§6.1).
//!
//! Follows `discover_templates`'s shallow-`WalkDir` scan-a-directory shape,
//! adapted to parse each entry as a TOML declarative file instead of
//! copying a template tree.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

use super::models::{AgentProfile, Skill};
use crate::error::ConfigError;

const KNOWN_AGENT_FIELDS: &[&str] = &[
    "name",
    "cli_type",
    "interface",
    "prompts",
    "skills",
    "cli_config",
    "hidden",
];
const KNOWN_SKILL_FIELDS: &[&str] = &["name", "prompts"];

/// Loads every `*.toml` file directly under `dir` as an [`AgentProfile`],
/// keyed by id (the file's basename, per §3's invariant).
pub fn load_agents(dir: &Path) -> Result<HashMap<String, AgentProfile>> {
    let mut agents = HashMap::new();
    if !dir.is_dir() {
        return Ok(agents);
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.context("reading agent config directory")?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let id = basename(path)?;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading agent file {}", path.display()))?;
        log_unknown_fields(&id, &raw, KNOWN_AGENT_FIELDS)?;
        let mut profile: AgentProfile = toml::from_str(&raw)
            .with_context(|| format!("parsing agent file {}", path.display()))?;
        profile.id = id.clone();
        profile.validate().map_err(|reason| ConfigError::InvalidAgent {
            id: id.clone(),
            reason,
        })?;
        agents.insert(id, profile);
    }
    Ok(agents)
}

/// Loads every `*.toml` file directly under `dir` as a [`Skill`], keyed by id.
pub fn load_skills(dir: &Path) -> Result<HashMap<String, Skill>> {
    let mut skills = HashMap::new();
    if !dir.is_dir() {
        return Ok(skills);
    }
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.context("reading skill config directory")?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let id = basename(path)?;
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading skill file {}", path.display()))?;
        log_unknown_fields(&id, &raw, KNOWN_SKILL_FIELDS)?;
        let mut skill: Skill = toml::from_str(&raw)
            .with_context(|| format!("parsing skill file {}", path.display()))?;
        skill.id = id.clone();
        skills.insert(id, skill);
    }
    Ok(skills)
}

fn basename(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ConfigError::UnreadableId(path.display().to_string()).into())
}

/// Unknown top-level keys are ignored but logged at debug (§6.1).
fn log_unknown_fields(id: &str, raw: &str, known: &[&str]) -> Result<()> {
    let table: toml::Table = toml::from_str(raw).context("parsing as generic TOML table")?;
    for key in table.keys() {
        if !known.contains(&key.as_str()) {
            log::debug!("'{id}': ignoring unknown field '{key}'");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_agent_with_id_from_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coder.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "name = \"Coder\"\ncli_type = \"codex\"\nprompts = [\"base\"]").unwrap();

        let agents = load_agents(dir.path()).unwrap();
        let agent = agents.get("coder").expect("agent loaded");
        assert_eq!(agent.id, "coder");
        assert_eq!(agent.name, "Coder");
    }

    #[test]
    fn missing_directory_yields_empty_map() {
        let agents = load_agents(Path::new("/nonexistent/path/for/test")).unwrap();
        assert!(agents.is_empty());
    }

    #[test]
    fn rejects_profile_failing_invariants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "name = \"Bad\"\ncli_type = \"codex\"").unwrap();

        assert!(load_agents(dir.path()).is_err());
    }
}
