//! Typed errors for the recoverable seams of the pipeline
//!
//! Orchestration code uses `anyhow`; these enums exist where callers need
//! to branch on what went wrong (a strategy that found nothing versus a
//! decoder that timed out).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// A strategy could not make sense of a container
///
/// The cascade treats every variant the same way: the strategy yielded
/// nothing and the next one gets a turn.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("malformed {chunk} chunk at offset {offset:#x}: {reason}")]
    Malformed {
        chunk: &'static str,
        offset: usize,
        reason: String,
    },

    #[error("{chunk} chunk at offset {offset:#x} needs {needed} bytes, only {available} available")]
    Truncated {
        chunk: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("failed to decode chunk record: {0}")]
    Binary(#[from] binrw::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tool(#[from] ToolError),
}

/// An external executable could not be run to completion
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{program} not found")]
    NotFound { program: String },

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {}s", .timeout.as_secs_f32())]
    Timeout { program: String, timeout: Duration },

    #[error("{program} exited with {}: {stderr}", exit_label(.code))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Invalid batch configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("input directory does not exist: {0:?}")]
    MissingInput(PathBuf),

    #[error("invalid heuristic setting: {0}")]
    Heuristic(String),

    #[error("invalid signature setting: {0}")]
    Signature(String),

    #[error("file extension must not be empty")]
    EmptyExtension,
}
