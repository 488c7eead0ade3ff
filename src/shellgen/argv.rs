//! Per-CLI argv assembly (C2): Codex, Copilot, Ollama.

use toml::Value;

use super::flatten::{flatten, format_scalar, normalize_flag_name};
use super::quote::{display_quote, needs_quoting};

const DEVELOPER_INSTRUCTIONS_KEY: &str = "developer_instructions";

/// Builds the argv for `codex`, not including the program name itself.
///
/// Flattens with arrays preserved, drops any pre-existing
/// `developer_instructions` entry, special-cases a bare-string `notify`
/// into a one-element array, and appends the developer instructions last
/// regardless of whether the prompt is empty.
pub fn build_codex_args(config: &Value, developer_prompt: &str) -> Vec<String> {
    let mut entries = flatten(config, false);
    entries.retain(|e| e.key != DEVELOPER_INSTRUCTIONS_KEY);

    let mut argv = Vec::with_capacity(entries.len() * 2 + 2);
    for entry in entries {
        let value = if entry.key == "notify" {
            match &entry.value {
                Value::String(s) => Value::Array(vec![Value::String(s.clone())]),
                other => other.clone(),
            }
        } else {
            entry.value
        };
        argv.push("-c".to_string());
        argv.push(format!("{}={}", entry.key, format_scalar(&value)));
    }

    argv.push("-c".to_string());
    argv.push(format!(
        "{DEVELOPER_INSTRUCTIONS_KEY}={developer_prompt}"
    ));
    argv
}

/// Builds the argv for `copilot`, not including the program name.
///
/// Flattens with arrays expanded. Booleans become `--flag`/`--no-flag`;
/// other values become two argv elements `--flag value`.
pub fn build_copilot_args(config: &Value) -> Vec<String> {
    let entries = flatten(config, true);
    let mut argv = Vec::with_capacity(entries.len() * 2);
    for entry in entries {
        let flag = format!("--{}", normalize_flag_name(&entry.key));
        match entry.value {
            Value::Boolean(true) => argv.push(flag),
            Value::Boolean(false) => argv.push(format!("--no-{}", normalize_flag_name(&entry.key))),
            other => {
                argv.push(flag);
                argv.push(format_scalar(&other));
            }
        }
    }
    argv
}

/// Builds the argv for `ollama`, not including the program name.
///
/// If `host` is present, prepends `env OLLAMA_HOST=<value>`; otherwise
/// starts at `run`. `model` is appended verbatim. `host` and `model` are
/// consumed and never repeated as flags.
pub fn build_ollama_args(config: &Value) -> Vec<String> {
    let table = match config {
        Value::Table(t) => t.clone(),
        _ => Default::default(),
    };

    let mut argv = Vec::new();
    if let Some(host) = table.get("host").map(format_scalar) {
        argv.push("env".to_string());
        argv.push(format!("OLLAMA_HOST={host}"));
    }
    argv.push("run".to_string());
    if let Some(model) = table.get("model").map(format_scalar) {
        argv.push(model);
    }

    let mut remainder = table;
    remainder.remove("host");
    remainder.remove("model");

    let entries = flatten(&Value::Table(remainder), true);
    for entry in entries {
        let flag = format!("--{}", normalize_flag_name(&entry.key));
        match entry.value {
            Value::Boolean(true) => argv.push(flag),
            Value::Boolean(false) => {}
            other => {
                argv.push(flag);
                argv.push(format_scalar(&other));
            }
        }
    }
    argv
}

/// Renders `argv` (plus the leading `program` name) as a single
/// human-readable command line, applying display-quoting (§4.2). The
/// `developer_instructions=<prompt>` entry, if present, is always rendered
/// quoted on one line so the full prompt is visible.
pub fn display_command(program: &str, argv: &[String]) -> String {
    let mut parts = vec![program.to_string()];
    for element in argv {
        if let Some(prompt) = element.strip_prefix(&format!("{DEVELOPER_INSTRUCTIONS_KEY}=")) {
            parts.push(format!(
                "{DEVELOPER_INSTRUCTIONS_KEY}={}",
                display_quote(prompt)
            ));
        } else if needs_quoting(element) {
            parts.push(display_quote(element));
        } else {
            parts.push(element.clone());
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Value {
        toml::from_str(src).expect("valid toml fixture")
    }

    #[test]
    fn codex_dry_run_scenario() {
        let cfg = parse("model = \"gpt-4\"\nnotify = \"bell\"\n");
        let argv = build_codex_args(&cfg, "");
        assert_eq!(
            argv,
            vec![
                "-c".to_string(),
                "model=gpt-4".to_string(),
                "-c".to_string(),
                "notify=[\"bell\"]".to_string(),
                "-c".to_string(),
                "developer_instructions=".to_string(),
            ]
        );
        let rendered = display_command("codex", &argv);
        assert_eq!(
            rendered,
            "codex -c model=gpt-4 -c notify=[\"bell\"] -c developer_instructions=\"\""
        );
    }

    #[test]
    fn codex_drops_preexisting_developer_instructions() {
        let cfg = parse("developer_instructions = \"stale\"\nmodel = \"m\"\n");
        let argv = build_codex_args(&cfg, "fresh");
        assert_eq!(
            argv,
            vec![
                "-c".to_string(),
                "model=m".to_string(),
                "-c".to_string(),
                "developer_instructions=fresh".to_string(),
            ]
        );
    }

    #[test]
    fn copilot_booleans_become_flags() {
        let cfg = parse("verbose = true\nquiet = false\nmodel = \"x\"\n");
        let argv = build_copilot_args(&cfg);
        assert!(argv.contains(&"--verbose".to_string()));
        assert!(argv.contains(&"--no-quiet".to_string()));
        assert!(argv.windows(2).any(|w| w == ["--model".to_string(), "x".to_string()]));
    }

    #[test]
    fn ollama_prepends_env_and_appends_model() {
        let cfg = parse("host = \"localhost:11434\"\nmodel = \"llama3\"\ntemperature = 0.5\n");
        let argv = build_ollama_args(&cfg);
        assert_eq!(argv[0], "env");
        assert_eq!(argv[1], "OLLAMA_HOST=localhost:11434");
        assert_eq!(argv[2], "run");
        assert_eq!(argv[3], "llama3");
        assert!(argv.contains(&"--temperature".to_string()));
    }

    #[test]
    fn ollama_without_host_starts_at_run() {
        let cfg = parse("model = \"llama3\"\n");
        let argv = build_ollama_args(&cfg);
        assert_eq!(argv, vec!["run".to_string(), "llama3".to_string()]);
    }
}
