// src/watch/filter.rs

//! Noise filter for raw change events.
//!
//! A changed path is ignored when, relative to the watched root:
//! - any segment starts with `_` (reserved for generated output),
//! - any segment starts with `.` (hidden), unless hidden files are included,
//! - its file name looks like an editor temp file,
//! - it contains one of the configured exclude substrings.

use std::path::{Path, PathBuf};

/// Editor and tool droppings that never warrant a rebuild.
const TEMP_SUFFIXES: &[&str] = &["~", ".swp", ".swx", ".tmp"];
const TEMP_PREFIXES: &[&str] = &[".#"];

#[derive(Debug, Clone)]
pub struct PathFilter {
    root: PathBuf,
    excludes: Vec<String>,
    include_hidden: bool,
}

impl PathFilter {
    pub fn new(root: impl Into<PathBuf>, excludes: Vec<String>, include_hidden: bool) -> Self {
        let root = root.into();
        // Canonicalize once so event paths (usually absolute) strip cleanly.
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            excludes,
            include_hidden,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a change at `path` should count as a change signal.
    pub fn is_relevant(&self, path: &Path) -> bool {
        match relative_to(&self.root, path) {
            Some(rel) => self.is_relevant_relative(&rel),
            // Unrelated absolute prefix: only the file name and the excludes
            // can be judged without misreading the parents as noise.
            None => {
                let full = path.to_string_lossy().replace('\\', "/");
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                !self.is_excluded(&full) && !self.is_noise_segment(&name) && !is_temp_file(&name)
            }
        }
    }

    /// Same as [`PathFilter::is_relevant`] for a `/`-separated path that is
    /// already relative to the root.
    pub fn is_relevant_relative(&self, rel: &str) -> bool {
        if rel.is_empty() {
            // The root itself changed (e.g. metadata); not interesting.
            return false;
        }

        if self.is_excluded(rel) {
            return false;
        }

        if rel.split('/').any(|seg| self.is_noise_segment(seg)) {
            return false;
        }

        let name = rel.rsplit('/').next().unwrap_or(rel);
        !is_temp_file(name)
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.excludes.iter().any(|ex| path.contains(ex.as_str()))
    }

    fn is_noise_segment(&self, seg: &str) -> bool {
        if seg.starts_with('_') {
            return true;
        }
        !self.include_hidden && seg.starts_with('.') && seg != "." && seg != ".."
    }
}

fn is_temp_file(name: &str) -> bool {
    TEMP_SUFFIXES.iter().any(|s| name.ends_with(s))
        || TEMP_PREFIXES.iter().any(|p| name.starts_with(p))
}

/// `path` relative to `root`, with forward slashes.
///
/// Tries a plain prefix strip first, then canonicalizes the event path (which
/// may not exist any more, e.g. after a delete, hence the fallback order).
fn relative_to(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok().map(Path::to_path_buf).or_else(|| {
        path.canonicalize()
            .ok()
            .and_then(|p| p.strip_prefix(root).ok().map(Path::to_path_buf))
    });

    if rel.is_none() && path.is_relative() {
        return Some(path.to_string_lossy().replace('\\', "/"));
    }

    rel.map(|r| r.to_string_lossy().replace('\\', "/"))
}
