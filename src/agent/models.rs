//! Agent/skill declarative data model (§3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The CLI tool an agent launches (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliType {
    Codex,
    Copilot,
    Ollama,
}

impl std::fmt::Display for CliType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliType::Codex => write!(f, "codex"),
            CliType::Copilot => write!(f, "copilot"),
            CliType::Ollama => write!(f, "ollama"),
        }
    }
}

/// How a launched agent is driven (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interface {
    Cli,
    Mcp,
}

/// A declarative agent file, one per `config/agents/<id>.toml` (§3, §6.1).
#[derive(Debug, Clone, Deserialize)]
pub struct AgentProfile {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    pub cli_type: CliType,
    #[serde(default = "default_interface")]
    pub interface: Interface,
    #[serde(default)]
    pub prompts: Vec<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub cli_config: toml::Table,
    #[serde(default)]
    pub hidden: bool,
}

fn default_interface() -> Interface {
    Interface::Cli
}

impl AgentProfile {
    /// Checks the invariants from §3: at least one prompt, skill, or
    /// non-empty `cli_config`; `id` non-empty (basename equality is
    /// enforced by the loader, which owns the source path).
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("agent id must not be empty".to_string());
        }
        if self.prompts.is_empty() && self.skills.is_empty() && self.cli_config.is_empty() {
            return Err(format!(
                "agent '{}' has no prompts, skills, or cli_config",
                self.id
            ));
        }
        Ok(())
    }
}

/// An addressable prompt fragment, one per `config/skills/<id>.toml` (§3).
#[derive(Debug, Clone, Deserialize)]
pub struct Skill {
    #[serde(skip)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub prompts: Vec<String>,
}

/// How developer instructions are delivered to a launched process (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptInjectionMode {
    None,
    CodexDeveloperInstructions,
    Stdin,
}

/// Pacing timers for `Stdin` prompt injection (§3); unused by the codex and
/// none modes but always present so a future stdin driver has defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdinPacing {
    pub prompt_delay_ms: u64,
    pub inter_prompt_delay_ms: u64,
    pub final_enter_delay_ms: u64,
    pub enter_key_delay_ms: u64,
    pub on_air_timeout_ms: u64,
}

impl Default for StdinPacing {
    fn default() -> Self {
        Self {
            prompt_delay_ms: 3_000,
            inter_prompt_delay_ms: 100,
            final_enter_delay_ms: 500,
            enter_key_delay_ms: 75,
            on_air_timeout_ms: 5_000,
        }
    }
}

/// Normalized structure handed to the runner after a launch (§3).
#[derive(Debug, Clone, Serialize)]
pub struct LaunchSpec {
    pub session_id: String,
    pub argv: Vec<String>,
    pub interface: Interface,
    pub prompt_files: Vec<String>,
    #[serde(default)]
    pub gui_modules: Vec<String>,
    pub prompt_injection: PromptInjectionMode,
    pub pacing: StdinPacing,
}

/// Flattened key → value view used by C1/C2; kept as [`toml::Value`]
/// rather than a bespoke value type since every consumer already speaks
/// TOML (agent files, skill files, CLI config).
pub type CliConfig = BTreeMap<String, toml::Value>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_profile_with_nothing_to_compose() {
        let profile = AgentProfile {
            id: "empty".into(),
            name: "Empty".into(),
            cli_type: CliType::Codex,
            interface: Interface::Cli,
            prompts: vec![],
            skills: vec![],
            cli_config: toml::Table::new(),
            hidden: false,
        };
        assert!(profile.validate().is_err());
    }

    #[test]
    fn validate_accepts_profile_with_only_cli_config() {
        let mut cli_config = toml::Table::new();
        cli_config.insert("model".into(), toml::Value::String("gpt-4".into()));
        let profile = AgentProfile {
            id: "coder".into(),
            name: "Coder".into(),
            cli_type: CliType::Codex,
            interface: Interface::Cli,
            prompts: vec![],
            skills: vec![],
            cli_config,
            hidden: false,
        };
        assert!(profile.validate().is_ok());
    }
}
