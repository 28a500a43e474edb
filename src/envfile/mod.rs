//! `.env`-style file reconciliation.
//!
//! The file is treated as an ordered list of lines. Updates touch only the
//! assignment lines for the keys involved; comments, ordering and unrelated
//! variables survive untouched. Every save snapshots the previous content to a
//! timestamped sibling first.

pub mod classify;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{LaunchkitError, Result};

pub use classify::{classify_configured_value, Category, ValueState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvLine {
    Blank,
    /// Raw comment line including the `#`.
    Comment(String),
    Assignment {
        key: String,
        value: String,
        raw: String,
    },
    /// Anything that is neither a comment nor a `KEY=VALUE` line.
    Other(String),
}

impl EnvLine {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return EnvLine::Blank;
        }
        if trimmed.starts_with('#') {
            return EnvLine::Comment(raw.to_string());
        }

        let body = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        match body.split_once('=') {
            Some((key, value)) if is_valid_key(key.trim()) => EnvLine::Assignment {
                key: key.trim().to_string(),
                value: value.trim().to_string(),
                raw: raw.to_string(),
            },
            _ => EnvLine::Other(raw.to_string()),
        }
    }

    fn assignment(key: &str, value: &str) -> Self {
        EnvLine::Assignment {
            key: key.to_string(),
            value: value.to_string(),
            raw: format!("{}={}", key, value),
        }
    }

    /// Same key with a new value, keeping the line's indentation and `export`.
    fn with_value(&self, value: &str) -> Self {
        match self {
            EnvLine::Assignment { key, raw, .. } => {
                let prefix_len = raw.len() - raw.trim_start().len();
                let mut prefix = raw[..prefix_len].to_string();
                if raw.trim_start().starts_with("export ") {
                    prefix.push_str("export ");
                }
                EnvLine::Assignment {
                    key: key.clone(),
                    value: value.to_string(),
                    raw: format!("{}{}={}", prefix, key, value),
                }
            }
            other => other.clone(),
        }
    }

    fn is_assignment_of(&self, wanted: &str) -> bool {
        matches!(self, EnvLine::Assignment { key, .. } if key == wanted)
    }
}

impl fmt::Display for EnvLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvLine::Blank => Ok(()),
            EnvLine::Comment(raw) | EnvLine::Other(raw) => write!(f, "{}", raw),
            EnvLine::Assignment { raw, .. } => write!(f, "{}", raw),
        }
    }
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// In-memory view of an env file.
#[derive(Debug, Clone)]
pub struct EnvFile {
    path: PathBuf,
    lines: Vec<EnvLine>,
    trailing_newline: bool,
}

impl EnvFile {
    /// Read the file, or start empty if it does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = match std::fs::read(&path) {
            Ok(bytes) => String::from_utf8(bytes)
                .map_err(|_| LaunchkitError::env_file(&path, "not valid UTF-8"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self::parse(path, &content))
    }

    pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
        let trailing_newline = content.ends_with('\n');
        let body = content.strip_suffix('\n').unwrap_or(content);
        let lines = if content.is_empty() {
            Vec::new()
        } else {
            body.split('\n').map(EnvLine::parse).collect()
        };

        Self {
            path: path.into(),
            lines,
            trailing_newline,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub fn lines(&self) -> &[EnvLine] {
        &self.lines
    }

    /// Value of the first active assignment of `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            EnvLine::Assignment { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn state_of(&self, key: &str) -> ValueState {
        let category = Category::of_key(key).unwrap_or(Category::Site);
        ValueState::of(self.get(key), category)
    }

    /// Replace the first active `key` line in place, or append one.
    /// Later duplicates of `key` are dropped.
    pub fn set(&mut self, key: &str, value: &str) {
        let mut replaced = false;
        self.lines.retain_mut(|line| {
            if !line.is_assignment_of(key) {
                return true;
            }
            if replaced {
                return false;
            }
            *line = line.with_value(value);
            replaced = true;
            true
        });

        if !replaced {
            self.lines.push(EnvLine::assignment(key, value));
            self.trailing_newline = true;
        }
    }

    /// [`set`](Self::set) each pair in order.
    pub fn upsert(&mut self, vars: &[(&str, &str)]) {
        for (key, value) in vars {
            self.set(key, value);
        }
    }

    /// Drop every active assignment of `key`. Returns how many were removed.
    pub fn remove(&mut self, key: &str) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| !line.is_assignment_of(key));
        before - self.lines.len()
    }

    /// Drop comment lines whose text mentions `label` (case-insensitive).
    pub fn remove_section_comment(&mut self, label: &str) -> usize {
        let needle = label.trim().to_lowercase();
        if needle.is_empty() {
            return 0;
        }
        let before = self.lines.len();
        self.lines.retain(|line| match line {
            EnvLine::Comment(raw) => !raw
                .trim_start()
                .trim_start_matches('#')
                .to_lowercase()
                .contains(&needle),
            _ => true,
        });
        before - self.lines.len()
    }

    /// Remove `key` and the comment naming its section, then tidy blank lines.
    pub fn remove_variable_and_section_comment(&mut self, key: &str, section_label: &str) {
        self.remove(key);
        self.remove_section_comment(section_label);
        self.tidy_blank_lines();
    }

    /// Move `vars` into a fresh `# label` section at the end of the file.
    ///
    /// The keys' current lines go first, along with any comment naming `label`
    /// or one of `stale_labels`, so running this again with the same input
    /// leaves the file unchanged.
    pub fn replace_section(&mut self, label: &str, stale_labels: &[&str], vars: &[(&str, &str)]) {
        for stale in stale_labels.iter().chain(std::iter::once(&label)) {
            for (key, _) in vars {
                self.remove_variable_and_section_comment(key, stale);
            }
        }
        self.append_section(label, vars);
    }

    /// Append `# label` followed by the given assignments, after removing any
    /// existing active lines for those keys.
    pub fn append_section(&mut self, label: &str, vars: &[(&str, &str)]) {
        for (key, _) in vars {
            self.remove(key);
        }

        if matches!(self.lines.last(), Some(line) if *line != EnvLine::Blank) {
            self.lines.push(EnvLine::Blank);
        }
        self.lines.push(EnvLine::Comment(format!("# {}", label)));
        for (key, value) in vars {
            self.lines.push(EnvLine::assignment(key, value));
        }
        self.trailing_newline = true;
    }

    /// Reduce every run of two or more blank lines to a single blank line.
    pub fn collapse_blank_runs(&mut self) {
        let mut previous_blank = false;
        self.lines.retain(|line| {
            let blank = *line == EnvLine::Blank;
            let keep = !(blank && previous_blank);
            previous_blank = blank;
            keep
        });
    }

    /// Collapse blank runs and drop blank lines left at the top of the file.
    fn tidy_blank_lines(&mut self) {
        self.collapse_blank_runs();
        let leading = self
            .lines
            .iter()
            .take_while(|line| **line == EnvLine::Blank)
            .count();
        self.lines.drain(..leading);
    }

    pub fn render(&self) -> String {
        let mut out = self
            .lines
            .iter()
            .map(|line| line.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        if self.trailing_newline && !self.lines.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Back up the existing file, then rewrite it in full.
    pub fn save(&self) -> Result<Option<PathBuf>> {
        let backup_path = backup(&self.path)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, self.render())?;

        tracing::info!(
            "Wrote {}{}",
            self.path.display(),
            backup_path
                .as_ref()
                .map(|b| format!(" (backup: {})", b.display()))
                .unwrap_or_default()
        );
        Ok(backup_path)
    }
}

/// Copy `path` to a timestamped sibling if it exists.
pub fn backup(path: &Path) -> Result<Option<PathBuf>> {
    if !path.is_file() {
        return Ok(None);
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| LaunchkitError::env_file(path, "path has no file name"))?;
    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f");

    let mut candidate = path.with_file_name(format!("{}.backup-{}", file_name, stamp));
    let mut n = 1;
    while candidate.exists() {
        candidate = path.with_file_name(format!("{}.backup-{}-{}", file_name, stamp, n));
        n += 1;
    }

    std::fs::copy(path, &candidate)?;
    tracing::debug!("Backed up {} to {}", path.display(), candidate.display());
    Ok(Some(candidate))
}

/// Set each key in place or append it, then rewrite the file.
pub fn upsert_variables(path: &Path, vars: &[(&str, &str)]) -> Result<Option<PathBuf>> {
    let mut file = EnvFile::load(path)?;
    file.upsert(vars);
    file.save()
}
