//! Prompt composer (C3): file-based template expansion with include/port/
//! session-id directives, cycle and depth guards, and include dedup.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ComposerError;
use crate::ports::PortRegistry;

/// At most this many nested includes beyond the root are permitted.
const MAX_NESTED_DEPTH: usize = 3;

const EXTENSIONS: &[&str] = &["tmpl", "md", "txt"];

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\\)?\{\{([^{}]*)\}\}").unwrap());
static LINE_DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{\{([^{}]*)\}\}$").unwrap());

enum Directive {
    Include(String),
    Port(String),
    SessionId,
}

fn parse_directive(inner: &str) -> Option<Directive> {
    let inner = inner.trim();
    if let Some(rest) = inner.strip_prefix("include") {
        if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
            return Some(Directive::Include(rest.trim().to_string()));
        }
        return None;
    }
    if let Some(rest) = inner.strip_prefix("port") {
        if rest.starts_with(char::is_whitespace) && !rest.trim().is_empty() {
            return Some(Directive::Port(rest.trim().to_string()));
        }
        return None;
    }
    if inner == "session id" {
        return Some(Directive::SessionId);
    }
    None
}

/// Render-time context: the current session ID (for `{{session id}}`) and
/// a port resolver (for `{{port svc}}`).
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    pub session_id: Option<String>,
    pub ports: Option<PortRegistry>,
}

/// Output of a single `render` call: the fully expanded text plus the
/// ordered, deduped list of source files that contributed to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub content: String,
    pub files: Vec<PathBuf>,
}

/// Resolves prompt names/includes against a layered set of search roots
/// and expands directives.
pub struct Composer {
    /// Searched in order for bare top-level names and bare includes.
    primary_roots: Vec<PathBuf>,
    /// Searched only for bare includes, after `primary_roots`.
    fallback_root: Option<PathBuf>,
    /// Base directory against which path-form includes are resolved.
    workdir: PathBuf,
}

struct RenderState<'a> {
    ctx: &'a RenderContext,
    stack: Vec<String>,
    visited: HashSet<String>,
    files: Vec<PathBuf>,
}

impl Composer {
    /// `primary_roots` should already be ordered with the most specific
    /// (workdir) overlay first and the embedded defaults last.
    pub fn new(workdir: impl Into<PathBuf>, primary_roots: Vec<PathBuf>) -> Self {
        let workdir = workdir.into();
        let fallback_root = Some(workdir.join(".gestalt").join("prompts"));
        Self {
            primary_roots,
            fallback_root,
            workdir,
        }
    }

    /// Renders a single top-level prompt by name. "Not found" is fatal here
    /// (unlike inside an include, where it is a silent skip).
    pub fn render(&self, name: &str, ctx: &RenderContext) -> Result<RenderResult, ComposerError> {
        let candidates = candidate_names(name);
        let path = find_in_roots(&self.primary_roots, &candidates)
            .ok_or_else(|| ComposerError::NotFound(name.to_string()))?;

        let key = canonical_key(&path);
        let mut visited = HashSet::new();
        visited.insert(key.clone());
        let mut state = RenderState {
            ctx,
            stack: vec![key],
            visited,
            files: vec![path.clone()],
        };
        let content = self.expand_file(&path, ctx, &mut state)?;
        Ok(RenderResult {
            content,
            files: state.files,
        })
    }

    /// Renders several prompt names plus skill-provided prompt names,
    /// joining non-empty units with `"\n\n"`.
    pub fn render_many(
        &self,
        names: &[String],
        ctx: &RenderContext,
    ) -> Result<RenderResult, ComposerError> {
        let mut units = Vec::new();
        let mut files = Vec::new();
        for name in names {
            let result = self.render(name, ctx)?;
            if !result.content.trim().is_empty() {
                units.push(result.content);
            }
            for f in result.files {
                if !files.contains(&f) {
                    files.push(f);
                }
            }
        }
        Ok(RenderResult {
            content: units.join("\n\n"),
            files,
        })
    }

    fn expand_file(
        &self,
        path: &Path,
        ctx: &RenderContext,
        state: &mut RenderState,
    ) -> Result<String, ComposerError> {
        let source = std::fs::read_to_string(path)
            .map_err(|_| ComposerError::NotFound(path.display().to_string()))?;
        self.expand_text(&source, ctx, state)
    }

    fn expand_text(
        &self,
        source: &str,
        ctx: &RenderContext,
        state: &mut RenderState,
    ) -> Result<String, ComposerError> {
        let ends_with_newline = source.ends_with('\n');
        let mut out_lines: Vec<String> = Vec::new();

        for line in source.lines() {
            let trimmed = line.trim();
            if let Some(caps) = LINE_DIRECTIVE_RE.captures(trimmed) {
                if let Some(directive) = parse_directive(&caps[1]) {
                    let expansion = self.expand_directive(directive, ctx, state)?;
                    if !expansion.is_empty() {
                        out_lines.push(expansion);
                    }
                    continue;
                }
            }
            out_lines.push(self.expand_inline(line, ctx, state)?);
        }

        let mut content = out_lines.join("\n");
        if ends_with_newline && !content.is_empty() {
            content.push('\n');
        }
        Ok(content)
    }

    fn expand_inline(
        &self,
        line: &str,
        ctx: &RenderContext,
        state: &mut RenderState,
    ) -> Result<String, ComposerError> {
        let mut err: Option<ComposerError> = None;
        let replaced = DIRECTIVE_RE.replace_all(line, |caps: &regex::Captures| {
            let whole = caps.get(0).unwrap().as_str();
            let escaped = caps.get(1).is_some();
            let inner = &caps[2];
            if escaped {
                return format!("{{{{{inner}}}}}");
            }
            match parse_directive(inner) {
                Some(directive) => {
                    if err.is_some() {
                        return String::new();
                    }
                    match self.expand_directive(directive, ctx, state) {
                        Ok(expansion) => expansion,
                        Err(e) => {
                            err = Some(e);
                            String::new()
                        }
                    }
                }
                None => whole.to_string(),
            }
        });
        let replaced = replaced.into_owned();
        match err {
            Some(e) => Err(e),
            None => Ok(replaced),
        }
    }

    fn expand_directive(
        &self,
        directive: Directive,
        ctx: &RenderContext,
        state: &mut RenderState,
    ) -> Result<String, ComposerError> {
        match directive {
            Directive::Port(service) => Ok(ctx
                .ports
                .as_ref()
                .and_then(|p| p.get(&service))
                .map(|p| p.to_string())
                .unwrap_or_default()),
            Directive::SessionId => Ok(ctx.session_id.clone().unwrap_or_default()),
            Directive::Include(target) => self.expand_include(&target, ctx, state),
        }
    }

    fn expand_include(
        &self,
        target: &str,
        ctx: &RenderContext,
        state: &mut RenderState,
    ) -> Result<String, ComposerError> {
        let resolved = if is_path_form(target) {
            resolve_path_include(target, &self.workdir)
        } else {
            let candidates = candidate_names(target);
            find_in_roots(&self.primary_roots, &candidates).or_else(|| {
                self.fallback_root
                    .as_ref()
                    .and_then(|root| find_in_roots(std::slice::from_ref(root), &candidates))
            })
        };

        let path = match resolved {
            Some(p) => p,
            None => return Ok(String::new()),
        };

        let key = canonical_key(&path);
        if state.stack.contains(&key) {
            let mut chain = state.stack.clone();
            chain.push(key);
            return Err(ComposerError::Cycle {
                chain: chain.join(" -> "),
            });
        }
        if state.visited.contains(&key) {
            return Ok(String::new());
        }
        if state.stack.len() >= MAX_NESTED_DEPTH + 1 {
            let mut chain = state.stack.clone();
            chain.push(key);
            return Err(ComposerError::DepthExceeded {
                max: MAX_NESTED_DEPTH,
                chain: chain.join(" -> "),
            });
        }

        state.stack.push(key.clone());
        state.visited.insert(key);
        state.files.push(path.clone());

        let rendered = self.expand_file(&path, ctx, state);
        state.stack.pop();
        let mut rendered = rendered?;
        while rendered.ends_with('\n') {
            rendered.pop();
        }
        Ok(rendered)
    }
}

fn candidate_names(name: &str) -> Vec<String> {
    if EXTENSIONS.iter().any(|ext| name.ends_with(&format!(".{ext}"))) {
        vec![name.to_string()]
    } else {
        EXTENSIONS.iter().map(|ext| format!("{name}.{ext}")).collect()
    }
}

fn is_path_form(target: &str) -> bool {
    target.contains('/') || target.contains('\\') || target.starts_with("./")
}

fn resolve_path_include(target: &str, workdir: &Path) -> Option<PathBuf> {
    let candidate = Path::new(target);
    if candidate.is_absolute() {
        return None;
    }
    if candidate.components().any(|c| c.as_os_str() == "..") {
        return None;
    }
    let full = workdir.join(candidate);
    if full.is_file() && !looks_binary(&full) {
        Some(full)
    } else {
        None
    }
}

fn find_in_roots(roots: &[PathBuf], candidates: &[String]) -> Option<PathBuf> {
    for root in roots {
        for candidate in candidates {
            let full = root.join(candidate);
            if full.is_file() && !looks_binary(&full) {
                return Some(full);
            }
        }
    }
    None
}

fn looks_binary(path: &Path) -> bool {
    let Ok(bytes) = std::fs::read(path) else {
        return true;
    };
    let sample = &bytes[..bytes.len().min(512)];
    if sample.contains(&0u8) {
        return true;
    }
    if sample.is_empty() {
        return false;
    }
    let non_printable = sample
        .iter()
        .filter(|&&b| !(b.is_ascii_graphic() || b == b' ' || b == b'\t' || b == b'\r' || b == b'\n'))
        .count();
    (non_printable as f64 / sample.len() as f64) > 0.2
}

fn canonical_key(path: &Path) -> String {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    canonical.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn prompt_include_and_port_scenario() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "agent.tmpl", "Start\n{{include frag}}\n{{port backend}}\n");
        write(&prompts, "frag.md", "F\n");

        let composer = Composer::new(dir.path(), vec![prompts.clone()]);
        let mut registry_map = std::collections::HashMap::new();
        registry_map.insert("GESTALT_BACKEND_PORT".to_string(), "8080".to_string());
        let ports = PortRegistry::from_getter(|k| registry_map.get(k).cloned());
        let ctx = RenderContext {
            session_id: None,
            ports: Some(ports),
        };

        let result = composer.render("agent", &ctx).unwrap();
        assert_eq!(result.content, "Start\nF\n8080\n");
        assert_eq!(
            result.files,
            vec![prompts.join("agent.tmpl"), prompts.join("frag.md")]
        );
    }

    #[test]
    fn cycle_is_detected() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "{{include b}}\n");
        write(&prompts, "b.tmpl", "{{include a}}\n");

        let composer = Composer::new(dir.path(), vec![prompts]);
        let ctx = RenderContext::default();
        let err = composer.render("a", &ctx).unwrap_err();
        match err {
            ComposerError::Cycle { chain } => {
                assert!(chain.contains("a.tmpl"));
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn depth_is_bounded() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "{{include b}}\n");
        write(&prompts, "b.tmpl", "{{include c}}\n");
        write(&prompts, "c.tmpl", "{{include d}}\n");
        write(&prompts, "d.tmpl", "{{include e}}\n");
        write(&prompts, "e.tmpl", "leaf\n");

        let composer = Composer::new(dir.path(), vec![prompts]);
        let ctx = RenderContext::default();
        let err = composer.render("a", &ctx).unwrap_err();
        assert!(matches!(err, ComposerError::DepthExceeded { .. }));
    }

    #[test]
    fn dedupe_expands_once_and_lists_file_once() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "{{include b}}\n{{include b}}\n");
        write(&prompts, "b.tmpl", "B\n");

        let composer = Composer::new(dir.path(), vec![prompts.clone()]);
        let ctx = RenderContext::default();
        let result = composer.render("a", &ctx).unwrap();
        assert_eq!(result.content, "B\n");
        assert_eq!(result.files, vec![prompts.join("a.tmpl"), prompts.join("b.tmpl")]);
    }

    #[test]
    fn directive_precedence_drops_empty_line() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "before\n{{include missing}}\nafter\n");

        let composer = Composer::new(dir.path(), vec![prompts]);
        let ctx = RenderContext::default();
        let result = composer.render("a", &ctx).unwrap();
        assert_eq!(result.content, "before\nafter\n");
    }

    #[test]
    fn path_form_includes_are_resolved_against_workdir_only() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("notes")).unwrap();
        write(&dir.path().join("notes"), "extra.md", "Extra\n");
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "{{include ./notes/extra.md}}\n");

        let composer = Composer::new(dir.path(), vec![prompts]);
        let ctx = RenderContext::default();
        let result = composer.render("a", &ctx).unwrap();
        assert_eq!(result.content, "Extra\n");
    }

    #[test]
    fn rejects_parent_traversal_silently() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "{{include ../secret}}\n");

        let composer = Composer::new(dir.path(), vec![prompts]);
        let ctx = RenderContext::default();
        let result = composer.render("a", &ctx).unwrap();
        assert_eq!(result.content, "");
    }

    #[test]
    fn escaped_directive_is_left_verbatim() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "literal \\{{port backend}} here\n");

        let composer = Composer::new(dir.path(), vec![prompts]);
        let ctx = RenderContext::default();
        let result = composer.render("a", &ctx).unwrap();
        assert_eq!(result.content, "literal {{port backend}} here\n");
    }

    #[test]
    fn unknown_directive_left_in_place() {
        let dir = tempdir().unwrap();
        let prompts = dir.path().join("prompts");
        fs::create_dir_all(&prompts).unwrap();
        write(&prompts, "a.tmpl", "{{mystery thing}}\n");

        let composer = Composer::new(dir.path(), vec![prompts]);
        let ctx = RenderContext::default();
        let result = composer.render("a", &ctx).unwrap();
        assert_eq!(result.content, "{{mystery thing}}\n");
    }
}
