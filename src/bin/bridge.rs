//! gestalt-bridge: runs on the external runner host, bridging one session's
//! multiplexer pane to the server's WebSocket control channel (C10).

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use gestalt::bridge::Bridge;
use gestalt::logging;
use gestalt::mux::MuxClient;

#[derive(Debug, Parser)]
#[command(
    name = "gestalt-bridge",
    author,
    version,
    about = "Bridge a multiplexer pane to the Gestalt runner WebSocket channel."
)]
struct Cli {
    /// Session id whose pane should be bridged.
    session_id: String,

    /// Multiplexer target (e.g. "Gestalt workspace:Coder 1" or just the
    /// window name when run inside the host session).
    #[arg(long)]
    target: String,

    /// Server base URL (http/https; rewritten to ws/wss internally).
    #[arg(long, env = "GESTALT_URL", default_value = "http://127.0.0.1:57417")]
    url: String,

    /// Bearer token for authenticated servers.
    #[arg(long, env = "GESTALT_TOKEN")]
    token: Option<String>,

    /// Increase logging verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(logging::level_for(false, cli.verbose));

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mux = MuxClient::new();
    let bridge = Bridge::new(mux, cli.url, cli.token, cli.session_id, cli.target);
    bridge.run().await.context("running bridge")
}
