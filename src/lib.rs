//! Soundbank Ripper - recover embedded audio from sound bank containers
//!
//! Containers are scanned in parallel by a cascade of extraction
//! strategies; every recovered sub-stream is then handed to an external
//! decoder and turned into a waveform file.

pub mod batch;
pub mod convert;
pub mod error;
pub mod extract;
pub mod model;
pub mod process;
pub mod report;

pub use batch::{BatchConfig, BatchPipeline};
pub use convert::{ExternalDecoder, WaveformDecoder};
pub use report::BatchReport;
