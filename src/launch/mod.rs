//! Launch orchestrator (C9): composes C1..C8 to realize "run agent X".
//!
//! The pipeline shape follows `LocalBackend::start_session`: look up state,
//! build the process's environment/arguments, hand off to the lower-level
//! subsystem (here, C7/C8 instead of `LocalRuntime`), and return a handle.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::agent::{AgentProfile, Interface, LaunchSpec, PromptInjectionMode, Skill, StdinPacing};
use crate::error::{ComposerError, SessionRefError};
use crate::mux::{self, MuxClient, MultiplexerTarget};
use crate::ports::PortRegistry;
use crate::prompts::{Composer, RenderContext};
use crate::shellgen;

/// Everything the orchestrator needs that isn't already owned by the
/// profile/skill catalogs (§4.9's `(agent_id, session_id, renderer,
/// port_resolver, mux, agents_index, skills_index)` tuple).
pub struct LaunchContext<'a> {
    pub agents: &'a HashMap<String, AgentProfile>,
    pub skills: &'a HashMap<String, Skill>,
    pub composer: &'a Composer,
    pub ports: &'a PortRegistry,
    pub mux: &'a MuxClient,
    pub cwd: &'a Path,
    pub inside_multiplexer: bool,
}

/// Renders prompts, builds argv, and (unless `dry_run`) opens the
/// multiplexer window. Implements §4.9 steps 1-8.
pub fn launch(ctx: &LaunchContext<'_>, agent_id: &str, session_id: &str, dry_run: bool) -> Result<LaunchSpec> {
    let profile = ctx
        .agents
        .get(agent_id)
        .ok_or_else(|| SessionRefError::AgentNotFound(agent_id.to_string()))?;

    let render_ctx = RenderContext {
        session_id: Some(session_id.to_string()),
        ports: Some(ctx.ports.clone()),
    };

    let mut files = Vec::new();
    let mut skill_block = String::new();
    for skill_id in &profile.skills {
        let skill = ctx
            .skills
            .get(skill_id)
            .ok_or_else(|| ComposerError::SkillNotFound(skill_id.clone()))?;
        if skill.prompts.is_empty() {
            continue;
        }
        let result = ctx
            .composer
            .render_many(&skill.prompts, &render_ctx)
            .context("composing skill prompts")?;
        files.extend(result.files);
        if !result.content.is_empty() {
            if !skill_block.is_empty() {
                skill_block.push_str("\n\n");
            }
            skill_block.push_str(&result.content);
        }
    }

    let mut agent_block = String::new();
    if !profile.prompts.is_empty() {
        let result = ctx
            .composer
            .render_many(&profile.prompts, &render_ctx)
            .context("composing agent prompts")?;
        files.extend(result.files);
        agent_block = result.content;
    }

    let developer_instructions = [skill_block.as_str(), agent_block.as_str()]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
        .trim_end()
        .to_string();

    let program_argv = shellgen::build_argv(
        cli_type_for(profile)?,
        &toml::Value::Table(profile.cli_config.clone()),
        &developer_instructions,
    );

    let prompt_injection = match profile.cli_type {
        crate::agent::CliType::Codex => PromptInjectionMode::CodexDeveloperInstructions,
        _ => PromptInjectionMode::None,
    };

    if !dry_run {
        let target = mux::compute_target(session_id, ctx.cwd, ctx.inside_multiplexer);
        ensure_window(ctx.mux, &target, &program_argv)?;
    }

    let mut deduped_files = Vec::new();
    for f in files {
        if !deduped_files.contains(&f) {
            deduped_files.push(f);
        }
    }

    Ok(LaunchSpec {
        session_id: session_id.to_string(),
        argv: program_argv,
        interface: profile.interface,
        prompt_files: deduped_files
            .into_iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        gui_modules: Vec::new(),
        prompt_injection,
        pacing: StdinPacing::default(),
    })
}

fn ensure_window(mux: &MuxClient, target: &MultiplexerTarget, argv: &[String]) -> Result<()> {
    mux::ensure_and_create_window(mux, target, argv).context("opening multiplexer window")
}

fn cli_type_for(profile: &AgentProfile) -> Result<shellgen::CliType> {
    use crate::agent::CliType as ModelCliType;
    Ok(match profile.cli_type {
        ModelCliType::Codex => shellgen::CliType::Codex,
        ModelCliType::Copilot => shellgen::CliType::Copilot,
        ModelCliType::Ollama => shellgen::CliType::Ollama,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::CliType as ModelCliType;

    fn codex_profile(id: &str) -> AgentProfile {
        let mut cli_config = toml::Table::new();
        cli_config.insert("model".into(), toml::Value::String("gpt-4".into()));
        AgentProfile {
            id: id.to_string(),
            name: "Test".into(),
            cli_type: ModelCliType::Codex,
            interface: Interface::Cli,
            prompts: vec![],
            skills: vec![],
            cli_config,
            hidden: false,
        }
    }

    #[test]
    fn dry_run_launch_skips_the_multiplexer() {
        let mut agents = HashMap::new();
        agents.insert("coder".to_string(), codex_profile("coder"));
        let skills = HashMap::new();
        let composer = Composer::new(std::env::temp_dir(), vec![]);
        let ports = PortRegistry::from_getter(|_| None);
        let mux = MuxClient::new();

        let ctx = LaunchContext {
            agents: &agents,
            skills: &skills,
            composer: &composer,
            ports: &ports,
            mux: &mux,
            cwd: std::path::Path::new("/tmp"),
            inside_multiplexer: false,
        };

        let spec = launch(&ctx, "coder", "Coder 1", true).unwrap();
        assert_eq!(spec.session_id, "Coder 1");
        assert_eq!(spec.prompt_injection, PromptInjectionMode::CodexDeveloperInstructions);
        assert!(spec.argv.contains(&"codex".to_string()));
    }

    #[test]
    fn launch_rejects_unknown_agent() {
        let agents = HashMap::new();
        let skills = HashMap::new();
        let composer = Composer::new(std::env::temp_dir(), vec![]);
        let ports = PortRegistry::from_getter(|_| None);
        let mux = MuxClient::new();
        let ctx = LaunchContext {
            agents: &agents,
            skills: &skills,
            composer: &composer,
            ports: &ports,
            mux: &mux,
            cwd: std::path::Path::new("/tmp"),
            inside_multiplexer: false,
        };
        assert!(launch(&ctx, "missing", "Missing 1", true).is_err());
    }
}
