//! Value flattener, shell quoter, and per-CLI argv builders (C1/C2).

pub mod argv;
pub mod flatten;
pub mod quote;

pub use argv::{build_codex_args, build_copilot_args, build_ollama_args, display_command};
pub use flatten::{flatten, format_scalar, normalize_flag_name, FlatEntry};
pub use quote::{display_quote, maybe_quote, needs_quoting, shell_quote};

use crate::error::ShellgenError;
use toml::Value;

/// The three supported agent CLI backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CliType {
    Codex,
    Copilot,
    Ollama,
}

impl std::str::FromStr for CliType {
    type Err = ShellgenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "codex" => Ok(CliType::Codex),
            "copilot" => Ok(CliType::Copilot),
            "ollama" => Ok(CliType::Ollama),
            other => Err(ShellgenError::UnknownCliType(other.to_string())),
        }
    }
}

impl CliType {
    pub fn program_name(&self) -> &'static str {
        match self {
            CliType::Codex => "codex",
            CliType::Copilot => "copilot",
            CliType::Ollama => "ollama",
        }
    }
}

/// Builds the full argv (program name included) for the given CLI type.
pub fn build_argv(cli_type: CliType, config: &Value, developer_prompt: &str) -> Vec<String> {
    let mut argv = vec![cli_type.program_name().to_string()];
    match cli_type {
        CliType::Codex => argv.extend(build_codex_args(config, developer_prompt)),
        CliType::Copilot => argv.extend(build_copilot_args(config)),
        CliType::Ollama => argv.extend(build_ollama_args(config)),
    }
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_type_case_insensitively() {
        assert_eq!("Codex".parse::<CliType>().unwrap(), CliType::Codex);
        assert!("unknown".parse::<CliType>().is_err());
    }
}
