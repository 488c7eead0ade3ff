//! Prompt composition engine (C3).

pub mod composer;

pub use composer::{Composer, RenderContext, RenderResult};

use std::path::PathBuf;

/// Builds the primary search-root list for a composer: the workdir-local
/// overlay (`<workdir>/config/prompts`) first, then the embedded default
/// root, so user overrides always win (§3, PromptFile).
pub fn primary_roots(workdir: &std::path::Path, embedded_root: &std::path::Path) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let local = workdir.join("config").join("prompts");
    if local != embedded_root {
        roots.push(local);
    }
    roots.push(embedded_root.to_path_buf());
    roots
}
