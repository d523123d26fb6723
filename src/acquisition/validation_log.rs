//! Append-only text audit trail of download/validation events, plus bounded
//! excerpts of responses that failed to parse.

use crate::utils::{ensure_dir_exists, truncate_chars};
use chrono::Local;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationLogEntry {
    pub severity: Severity,
    /// Observation instant (`YYYYMMDDHHmm`), or `None` for day-level events.
    pub tm: Option<String>,
    pub variable: String,
    pub message: String,
    pub exception: Option<String>,
    pub response_preview: Option<String>,
}

impl ValidationLogEntry {
    pub fn new(severity: Severity, tm: Option<String>, variable: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            tm,
            variable: variable.to_string(),
            message: message.into(),
            exception: None,
            response_preview: None,
        }
    }

    pub fn with_exception(mut self, exception: impl fmt::Display) -> Self {
        self.exception = Some(exception.to_string());
        self
    }

    pub fn with_response_preview(mut self, preview: Option<&str>) -> Self {
        self.response_preview = preview.map(str::to_string);
        self
    }

    /// Renders the entry. Response previews are flattened to one line and cut to `preview_chars`.
    pub fn render(&self, timestamp: &str, preview_chars: usize) -> String {
        let mut out = format!(
            "[{}] [{}] tm={} var={} :: {}\n",
            timestamp,
            self.severity,
            self.tm.as_deref().unwrap_or("-"),
            self.variable,
            self.message
        );
        if let Some(exception) = &self.exception {
            out.push_str(&format!("  exception: {}\n", exception));
        }
        if let Some(preview) = self.response_preview.as_deref().filter(|p| !p.is_empty()) {
            let flat = preview.replace(['\r', '\n'], " ");
            out.push_str(&format!(
                "  response_preview: {}\n",
                truncate_chars(&flat, preview_chars)
            ));
        }
        out
    }
}

/// One validation log file (per date and variable).
#[derive(Debug, Clone)]
pub struct ValidationLog {
    path: PathBuf,
    preview_chars: usize,
}

impl ValidationLog {
    pub fn new(path: PathBuf, preview_chars: usize) -> Self {
        Self {
            path,
            preview_chars,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &ValidationLogEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir_exists(parent).await?;
        }
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.render(&timestamp, self.preview_chars).as_bytes())
            .await?;
        file.flush().await
    }
}

/// Writes the first and last `lines` lines of a failed response to `path`.
pub async fn write_response_snippet(
    path: &Path,
    tm: &str,
    variable: &str,
    response: &str,
    exception: Option<&str>,
    lines: usize,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent).await?;
    }
    tokio::fs::write(path, render_snippet(tm, variable, response, exception, lines)).await
}

fn render_snippet(
    tm: &str,
    variable: &str,
    response: &str,
    exception: Option<&str>,
    lines: usize,
) -> String {
    let all: Vec<&str> = response.lines().collect();
    let mut out = format!("tm={} var={}\n", tm, variable);
    out.push_str(&format!(
        "total_chars={} total_lines={}\n",
        response.chars().count(),
        all.len()
    ));
    if let Some(exception) = exception {
        out.push_str(&format!("exception={}\n", exception));
    }
    out.push_str(&format!("\n--- head (first {} lines) ---\n", lines));
    out.push_str(&all[..all.len().min(lines)].join("\n"));
    out.push('\n');
    if all.len() > lines {
        out.push_str(&format!("\n--- tail (last {} lines) ---\n", lines));
        out.push_str(&all[all.len() - lines..].join("\n"));
        out.push('\n');
    }
    out
}
