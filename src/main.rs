//! gestalt (C12): turns `<agent-id-or-filename>` into a running, attached
//! multiplexer pane.

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, ExitCode};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use gestalt::agent::{self, AgentProfile, Skill};
use gestalt::config;
use gestalt::error::{launch_exit, launch_exit_code_for, SessionRefError};
use gestalt::http::HttpClient;
use gestalt::launch::{self, LaunchContext};
use gestalt::logging;
use gestalt::mux::{self, MuxClient};
use gestalt::ports::PortRegistry;
use gestalt::prompts::{self, Composer};
use gestalt::session;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Parser)]
#[command(
    name = "gestalt",
    author,
    version,
    about = "Launch a Gestalt agent in a multiplexer window."
)]
struct Cli {
    /// Agent id, optionally with a .toml suffix. Must not contain a path separator.
    agent: String,

    /// Resolve and print the command line without touching the server or the multiplexer.
    #[arg(long)]
    dryrun: bool,

    /// Server base URL.
    #[arg(long, env = "GESTALT_URL")]
    url: Option<String>,

    /// Bearer token for authenticated servers.
    #[arg(long, env = "GESTALT_TOKEN")]
    token: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(log::LevelFilter::Info);

    match try_main(cli) {
        Ok(()) => ExitCode::from(launch_exit::OK as u8),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(launch_exit_code_for(&err) as u8)
        }
    }
}

fn try_main(cli: Cli) -> Result<()> {
    let agent_id = normalize_agent_arg(&cli.agent)?;
    let cwd = std::env::current_dir().context("reading current directory")?;
    let config_base = cwd.join("config");

    let agents = agent::load_agents(&config_base.join("agents")).context("loading agents")?;
    let skills = agent::load_skills(&config_base.join("skills")).context("loading skills")?;

    if cli.dryrun {
        return run_dry(&agents, &skills, &cwd, &config_base, &agent_id);
    }

    run_normal(&cwd, &cli, &agent_id)
}

fn normalize_agent_arg(raw: &str) -> Result<String> {
    let stripped = raw.strip_suffix(".toml").unwrap_or(raw);
    if stripped.contains('/') || stripped.contains('\\') {
        anyhow::bail!("agent id must not contain a path separator: {raw}");
    }
    if stripped.is_empty() {
        anyhow::bail!("agent id must not be empty");
    }
    Ok(stripped.to_string())
}

fn run_dry(
    agents: &std::collections::HashMap<String, AgentProfile>,
    skills: &std::collections::HashMap<String, Skill>,
    cwd: &PathBuf,
    config_base: &PathBuf,
    agent_id: &str,
) -> Result<()> {
    let profile = agents
        .get(agent_id)
        .ok_or_else(|| SessionRefError::AgentNotFound(agent_id.to_string()))?;

    let embedded_root = config_base.join("prompts");
    let primary_roots = prompts::primary_roots(cwd, &embedded_root);
    let composer = Composer::new(cwd.clone(), primary_roots);
    let ports = PortRegistry::from_env();
    let mux = MuxClient::new();
    let session_id = session::resolve_session_id(&profile.name, &[]);

    let ctx = LaunchContext {
        agents,
        skills,
        composer: &composer,
        ports: &ports,
        mux: &mux,
        cwd,
        inside_multiplexer: mux::inside_multiplexer(std::env::var("TMUX").ok().as_deref()),
    };

    let spec = launch::launch(&ctx, agent_id, &session_id, true)?;
    let program = spec.argv.first().cloned().unwrap_or_default();
    let display = gestalt::shellgen::display_command(&program, &spec.argv[1..]);
    println!("{display}");
    Ok(())
}

fn run_normal(cwd: &PathBuf, cli: &Cli, agent_id: &str) -> Result<()> {
    let connection = config::load_connection(None, cli.url.clone(), cli.token.clone())
        .context("loading connection config")?;
    let client = HttpClient::new(connection.url, connection.token, HTTP_TIMEOUT);

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    let created = runtime
        .block_on(client.create_session(agent_id, "external"))
        .context("creating session")?;

    let inside = mux::inside_multiplexer(std::env::var("TMUX").ok().as_deref());
    let target = mux::compute_target(&created.id, cwd, inside);
    let mux_client = MuxClient::new();
    let attach = mux::attach_command(&mux_client, &target, inside);

    let (program, args) = attach
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("empty attach command"))?;
    let err = Command::new(program).args(args).exec();
    Err(gestalt::error::MuxError::CommandFailed(err.to_string())).context("exec-ing attach command")
}
