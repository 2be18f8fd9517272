//! Waveform decoder seam

use crate::error::ToolError;
use crate::process::run_with_timeout;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Turns one raw sub-stream into a PCM waveform file
///
/// Implementations must be safe to call from several workers at once.
pub trait WaveformDecoder: Send + Sync {
    /// Whether the decoder can be run at all
    fn is_available(&self) -> bool;

    /// Decode `input` into `output`
    fn decode(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Decoder backed by an external command line tool
///
/// Invoked as `<program> [args..] -o <output> <input>`.
#[derive(Debug, Clone)]
pub struct ExternalDecoder {
    program: PathBuf,
    args: Vec<OsString>,
    timeout: Duration,
}

impl ExternalDecoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Arguments placed before the output and input paths
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl WaveformDecoder for ExternalDecoder {
    fn is_available(&self) -> bool {
        let mut check = Command::new(&self.program);
        check.arg("--help");
        match run_with_timeout(check, Duration::from_secs(10)) {
            Ok(_) => true,
            Err(e) => {
                log::debug!("Decoder availability check failed: {}", e);
                false
            }
        }
    }

    fn decode(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut command = Command::new(&self.program);
        command.args(&self.args).arg("-o").arg(output).arg(input);

        let result = run_with_timeout(command, self.timeout)?;
        if result.status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                program: self.program.to_string_lossy().into_owned(),
                code: result.status.code(),
                stderr: result.stderr,
            })
        }
    }
}
