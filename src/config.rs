//! Ambient configuration loading.
//!
//! Precedence, highest first: CLI flags -> environment variables -> an
//! optional TOML config file -> built-in defaults. Mirrors `main.rs`'s use
//! of the `config` crate (`Config`/`Environment`/`File`/`FileFormat`) to
//! assemble a single settings object ahead of dispatching a subcommand.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_URL: &str = "http://127.0.0.1:57417";

/// Connection settings shared by both CLI tools.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            token: None,
        }
    }
}

/// Locates the default config file path: `$GESTALT_CONFIG`, or
/// `dirs::config_dir()/gestalt/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("GESTALT_CONFIG") {
        return Some(PathBuf::from(p));
    }
    dirs::config_dir().map(|d| d.join("gestalt").join("config.toml"))
}

/// Loads connection settings, layering a config file (if present) under
/// environment variables and finally explicit CLI overrides.
///
/// `cli_url`/`cli_token` are `Some` only when the user actually passed the
/// corresponding flag; they take precedence over everything else.
pub fn load_connection(
    explicit_path: Option<&PathBuf>,
    cli_url: Option<String>,
    cli_token: Option<String>,
) -> Result<ConnectionConfig> {
    let mut builder = config::Config::builder()
        .set_default("url", DEFAULT_URL)
        .context("setting default url")?;

    let path = explicit_path.cloned().or_else(default_config_path);
    if let Some(path) = &path {
        if path.exists() {
            builder = builder.add_source(
                config::File::from(path.as_path()).format(config::FileFormat::Toml),
            );
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("GESTALT")
            .try_parsing(true)
            .separator("_"),
    );

    let mut cfg: ConnectionConfig = builder
        .build()
        .context("building configuration")?
        .try_deserialize()
        .context("deserializing configuration")?;

    if let Some(url) = cli_url {
        cfg.url = url;
    }
    if let Some(token) = cli_token {
        cfg.token = Some(token);
    }
    Ok(cfg)
}

/// Expands a leading `~` in a path-like config value, matching the
/// teacher's `shellexpand` usage for prompt-root overrides.
pub fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}
