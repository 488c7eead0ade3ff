//! gestalt-send (C11): resolves a session reference or agent name and
//! posts stdin bytes to it over the control HTTP API.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use serde::{Deserialize, Serialize};

use gestalt::config;
use gestalt::error::{send_exit, send_exit_code_for, HttpError, SessionRefError};
use gestalt::http::HttpClient;
use gestalt::logging;
use gestalt::session::{self, AgentCatalogEntry, SendTarget, SessionCatalogEntry};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 57417;
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(
    name = "gestalt-send",
    author,
    version,
    about = "Send input to a running Gestalt agent session."
)]
struct Cli {
    /// Session reference (live session id) or agent name/id to target.
    target: Option<String>,

    /// Server host (ignored if --url is given).
    #[arg(long)]
    host: Option<String>,

    /// Server port (ignored if --url is given).
    #[arg(long)]
    port: Option<u16>,

    /// Full server base URL, e.g. http://127.0.0.1:57417.
    #[arg(long)]
    url: Option<String>,

    /// Bearer token for authenticated servers.
    #[arg(long, env = "GESTALT_TOKEN")]
    token: Option<String>,

    /// Explicit session id to target, bypassing agent-name resolution.
    #[arg(long = "session-id")]
    session_id: Option<String>,

    /// Start the agent's session if it isn't already running.
    #[arg(long)]
    start: bool,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Shorthand for maximum verbosity.
    #[arg(long)]
    debug: bool,

    /// Explicit config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a shell completion script.
    Completion { shell: Shell },

    /// List cached agent ids/names, one per line, for dynamic shell
    /// completion scripts to source. Hidden from `--help`; reads the
    /// on-disk cache only and never touches the network.
    #[command(hide = true)]
    CompleteAgents,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = if cli.debug { 2 } else { cli.verbose };
    logging::init(logging::level_for(false, verbosity));

    match &cli.command {
        Some(Command::Completion { shell }) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut std::io::stdout());
            return exit_code(send_exit::OK);
        }
        Some(Command::CompleteAgents) => {
            for agent in read_cache().unwrap_or_default() {
                println!("{}\t{}", agent.id, agent.name);
            }
            return exit_code(send_exit::OK);
        }
        None => {}
    }

    let Some(target) = cli.target.clone() else {
        eprintln!("Error: missing required argument <target>");
        return exit_code(send_exit::USAGE);
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Error: {err}");
            return exit_code(send_exit::NETWORK);
        }
    };

    match runtime.block_on(run(cli, target)) {
        Ok(()) => exit_code(send_exit::OK),
        Err(err) => {
            eprintln!("Error: {err:#}");
            exit_code(send_exit_code_for(&err))
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}

async fn run(cli: Cli, target: String) -> Result<()> {
    let cli_url = cli.url.clone().or_else(|| {
        if cli.host.is_some() || cli.port.is_some() {
            let host = cli.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string());
            let port = cli.port.unwrap_or(DEFAULT_PORT);
            Some(format!("http://{host}:{port}"))
        } else {
            None
        }
    });
    let connection = config::load_connection(cli.config.as_ref(), cli_url, cli.token.clone())
        .context("loading connection config")?;
    let client = HttpClient::new(connection.url, connection.token, HTTP_TIMEOUT);

    let stdin_bytes = read_stdin().context("reading stdin")?;

    let session_id = resolve_target(&client, &target, cli.session_id.clone(), cli.start).await?;

    send_with_retry(&client, &session_id, &stdin_bytes, cli.start).await
}

fn read_stdin() -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin().read_to_end(&mut buf)?;
    Ok(buf)
}

/// Resolves the session to target (§4.11 steps 1-2). When `--session-id`
/// is given it wins outright; otherwise a live session match wins over
/// agent-name resolution, and an unstarted agent is started if `--start`.
async fn resolve_target(
    client: &HttpClient,
    target: &str,
    explicit_session_id: Option<String>,
    start: bool,
) -> Result<String> {
    if let Some(id) = explicit_session_id {
        return Ok(id);
    }

    let (agents, sessions) = fetch_catalog(client).await?;
    write_cache(&agents).ok();

    match session::resolve_send_target(target, &sessions, &agents)? {
        SendTarget::Session(id) => Ok(id),
        SendTarget::Agent(agent) => match &agent.session_id {
            Some(id) if !id.is_empty() => Ok(id.clone()),
            _ if start => start_session(client, &agent.id).await,
            _ => Err(SessionRefError::AgentNotFound(format!(
                "agent '{}' has no running session (use --start)",
                agent.id
            ))
            .into()),
        },
    }
}

async fn fetch_catalog(
    client: &HttpClient,
) -> Result<(Vec<AgentCatalogEntry>, Vec<SessionCatalogEntry>)> {
    let agents = client.list_agents().await.context("listing agents")?;
    let sessions = client.list_sessions().await.context("listing sessions")?;
    Ok((agents, sessions))
}

async fn start_session(client: &HttpClient, agent_id: &str) -> Result<String> {
    let created = client
        .create_session(agent_id, "external")
        .await
        .context("starting session")?;
    client
        .wait_ready(&created.id, None)
        .await
        .context("waiting for session to become ready")?;
    Ok(created.id)
}

/// Posts `bytes` to `session_id`; on a 404 while `--start` is set, starts
/// the session and retries exactly once (§4.11 step 3).
async fn send_with_retry(
    client: &HttpClient,
    session_id: &str,
    bytes: &[u8],
    start: bool,
) -> Result<()> {
    match client.send_input(session_id, bytes.to_vec()).await {
        Ok(()) => Ok(()),
        Err(HttpError::Status { status: 404, .. }) if start => {
            let (agents, _) = fetch_catalog(client).await?;
            let agent = agents
                .iter()
                .find(|a| a.session_id.as_deref() == Some(session_id) || a.id == session_id)
                .ok_or_else(|| {
                    SessionRefError::AgentNotFound(format!(
                        "session '{session_id}' not found and no matching agent to restart"
                    ))
                })?;
            let new_session_id = start_session(client, &agent.id).await?;
            client
                .send_input(&new_session_id, bytes.to_vec())
                .await
                .context("sending input after restart")?;
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct AgentCache {
    fetched_at_secs: u64,
    agents: Vec<AgentCatalogEntry>,
}

fn cache_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        return Some(PathBuf::from(xdg).join("gestalt-send").join("agents-cache.json"));
    }
    dirs::cache_dir().map(|d| d.join("gestalt-send").join("agents-cache.json"))
}

fn write_cache(agents: &[AgentCatalogEntry]) -> Result<()> {
    let Some(path) = cache_path() else {
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let cache = AgentCache {
        fetched_at_secs: now.as_secs(),
        agents: agents.to_vec(),
    };
    std::fs::write(path, serde_json::to_vec(&cache)?)?;
    Ok(())
}

/// Reads the on-disk agent cache if present and within the TTL. Backs the
/// hidden `complete-agents` subcommand so shell dynamic-completion scripts
/// can list agent ids/names without a network round-trip.
fn read_cache() -> Option<Vec<AgentCatalogEntry>> {
    let path = cache_path()?;
    let raw = std::fs::read(path).ok()?;
    let cache: AgentCache = serde_json::from_slice(&raw).ok()?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    if now.saturating_sub(cache.fetched_at_secs) > CACHE_TTL.as_secs() {
        return None;
    }
    Some(cache.agents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_minimal_invocation() {
        let cli = Cli::parse_from(["gestalt-send", "Coder 1"]);
        assert_eq!(cli.target.as_deref(), Some("Coder 1"));
        assert!(!cli.start);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "gestalt-send",
            "--url",
            "http://example.com",
            "--start",
            "coder",
        ]);
        assert_eq!(cli.url.as_deref(), Some("http://example.com"));
        assert!(cli.start);
        assert_eq!(cli.target.as_deref(), Some("coder"));
    }

    #[test]
    fn completion_subcommand_parses() {
        let cli = Cli::parse_from(["gestalt-send", "completion", "zsh"]);
        assert!(matches!(cli.command, Some(Command::Completion { shell: Shell::Zsh })));
    }

    #[test]
    fn complete_agents_subcommand_parses() {
        let cli = Cli::parse_from(["gestalt-send", "complete-agents"]);
        assert!(matches!(cli.command, Some(Command::CompleteAgents)));
    }

    #[test]
    fn read_cache_round_trips_through_write_cache() {
        let dir = tempfile::tempdir().unwrap();
        std::env::set_var("XDG_CACHE_HOME", dir.path());
        let agents = vec![AgentCatalogEntry {
            id: "coder".into(),
            name: "Coder".into(),
            session_id: None,
            running: Some(false),
        }];
        write_cache(&agents).unwrap();
        let cached = read_cache().expect("cache should be fresh");
        assert_eq!(cached, agents);
        std::env::remove_var("XDG_CACHE_HOME");
    }
}
