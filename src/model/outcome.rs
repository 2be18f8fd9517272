use super::StrategyTag;
use std::path::PathBuf;

/// A sub-stream written to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// Synthetic sub-stream identifier
    pub id: String,

    /// Strategy that produced the bytes
    pub origin: StrategyTag,

    /// Final location of the raw sub-stream
    pub path: PathBuf,

    /// Size in bytes
    pub size: u64,
}

/// What happened to one container
#[derive(Debug, Clone)]
pub enum ExtractionStatus {
    /// The cascade produced at least one sub-stream and all were persisted
    Extracted {
        strategy: StrategyTag,
        substreams: Vec<ExtractedFile>,
    },

    /// The container could not be processed
    Failed { error: String },
}

/// Per-container result returned by an extraction task
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// Input file
    pub source: PathBuf,

    /// Name component shared by every output of this container
    pub source_key: String,

    pub status: ExtractionStatus,
}

impl ExtractionOutcome {
    pub fn extracted(
        source: PathBuf,
        source_key: String,
        strategy: StrategyTag,
        substreams: Vec<ExtractedFile>,
    ) -> Self {
        Self {
            source,
            source_key,
            status: ExtractionStatus::Extracted {
                strategy,
                substreams,
            },
        }
    }

    pub fn failed(source: PathBuf, source_key: String, error: impl Into<String>) -> Self {
        Self {
            source,
            source_key,
            status: ExtractionStatus::Failed {
                error: error.into(),
            },
        }
    }

    /// Persisted sub-streams (empty for failures)
    pub fn substreams(&self) -> &[ExtractedFile] {
        match &self.status {
            ExtractionStatus::Extracted { substreams, .. } => substreams,
            ExtractionStatus::Failed { .. } => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, ExtractionStatus::Failed { .. })
    }
}

/// What happened to the raw sub-stream file after conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Deleted,
    Retained,
}

#[derive(Debug, Clone)]
pub enum ConversionStatus {
    Converted { waveform: PathBuf },
    Failed { error: String },
}

/// Per-sub-stream result returned by a conversion task
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// Sub-stream identifier
    pub id: String,

    /// Raw sub-stream file that was fed to the decoder
    pub raw_path: PathBuf,

    pub status: ConversionStatus,

    pub disposition: Disposition,
}

impl ConversionOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self.status, ConversionStatus::Converted { .. })
    }
}
