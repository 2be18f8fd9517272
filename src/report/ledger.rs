//! Append-only, human-readable failure log

use anyhow::{Context, Result};
use chrono::Local;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// One line per failure: `YYYY-MM-DD HH:MM:SS - ERROR - message`
///
/// Lines from earlier runs are never touched.
#[derive(Debug)]
pub struct ErrorLedger {
    path: PathBuf,
    file: File,
}

impl ErrorLedger {
    /// Open (or create) the ledger for appending
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger directory: {:?}", parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open error ledger: {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, severity: Severity, message: &str) -> Result<()> {
        // Keep one entry per line even if a tool put newlines in its stderr
        let message = message.replace(['\r', '\n'], " ");
        writeln!(
            self.file,
            "{} - {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            severity,
            message
        )
        .with_context(|| format!("Failed to write error ledger: {:?}", self.path))?;
        self.file.flush()?;
        Ok(())
    }
}
