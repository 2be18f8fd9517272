//! Batch configuration

use crate::error::ConfigError;
use crate::extract::{EntropyConfig, SignatureConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one extraction + conversion run
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory scanned recursively for containers
    pub input_dir: PathBuf,

    /// Flat output directory for sub-streams and waveforms
    pub output_dir: PathBuf,

    /// Container file extension, without the dot (matched case-insensitively)
    pub extension: String,

    /// Append-only failure log
    pub ledger_path: PathBuf,

    /// Worker threads (0 = one per core)
    pub workers: usize,

    /// Optional prefix for every output file name
    pub prefix: String,

    /// Keep raw sub-streams after a successful conversion
    pub keep_raw: bool,

    /// Skip the precise strategies and classify by entropy only
    pub heuristic_only: bool,

    /// Run the conversion stage
    pub convert: bool,

    /// External container tool, tried before the built-in strategies
    pub container_tool: Option<PathBuf>,

    /// Wall-clock limit for one container tool run
    pub tool_timeout: Duration,

    /// Smallest waveform accepted as a successful conversion
    pub min_waveform_size: u64,

    pub signature: SignatureConfig,

    pub entropy: EntropyConfig,
}

impl BatchConfig {
    /// Create a configuration with defaults for everything but the paths
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            input_dir,
            output_dir,
            extension: "wsb".to_string(),
            ledger_path: PathBuf::from("extraction_errors.log"),
            workers: 0,
            prefix: String::new(),
            keep_raw: false,
            heuristic_only: false,
            convert: true,
            container_tool: None,
            tool_timeout: Duration::from_secs(120),
            min_waveform_size: 44,
            signature: SignatureConfig::default(),
            entropy: EntropyConfig::default(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn with_ledger(mut self, path: PathBuf) -> Self {
        self.ledger_path = path;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_keep_raw(mut self, keep: bool) -> Self {
        self.keep_raw = keep;
        self
    }

    pub fn with_heuristic_only(mut self, enable: bool) -> Self {
        self.heuristic_only = enable;
        self
    }

    pub fn with_conversion(mut self, enable: bool) -> Self {
        self.convert = enable;
        self
    }

    pub fn with_container_tool(mut self, tool: PathBuf, timeout: Duration) -> Self {
        self.container_tool = Some(tool);
        self.tool_timeout = timeout;
        self
    }

    pub fn with_entropy(mut self, entropy: EntropyConfig) -> Self {
        self.entropy = entropy;
        self
    }

    pub fn with_signature(mut self, signature: SignatureConfig) -> Self {
        self.signature = signature;
        self
    }

    /// Check settings that do not depend on the filesystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extension.is_empty() {
            return Err(ConfigError::EmptyExtension);
        }
        self.entropy.validate()?;
        self.signature.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::new(PathBuf::from("input"), PathBuf::from("output"));
        assert_eq!(config.extension, "wsb");
        assert_eq!(config.workers, 0);
        assert!(config.convert);
        assert!(!config.keep_raw);
        assert!(config.container_tool.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_normalizes_extension() {
        let config = BatchConfig::new(PathBuf::from("in"), PathBuf::from("out"))
            .with_extension(".bnk")
            .with_prefix("ow")
            .with_workers(3);
        assert_eq!(config.extension, "bnk");
        assert_eq!(config.prefix, "ow");
        assert_eq!(config.workers, 3);
    }

    #[test]
    fn test_invalid_heuristic_rejected() {
        let config = BatchConfig::new(PathBuf::from("in"), PathBuf::from("out")).with_entropy(
            EntropyConfig {
                min_entropy: 9.0,
                ..EntropyConfig::default()
            },
        );
        assert!(matches!(config.validate(), Err(ConfigError::Heuristic(_))));

        let config = BatchConfig::new(PathBuf::from("in"), PathBuf::from("out")).with_extension("");
        assert!(matches!(config.validate(), Err(ConfigError::EmptyExtension)));
    }
}
