//! Sub-stream extraction
//!
//! A cascade of strategies in decreasing order of precision: the bank's
//! own index, container magic markers, and finally byte statistics. An
//! external container tool can be placed in front of all of them.

pub mod bytes;
mod cascade;
mod entropy;
mod external;
mod signature;
mod structured;
mod traits;

pub use cascade::{CascadeResult, ExtractionCascade};
pub use entropy::{window_stats, EntropyConfig, EntropyHeuristic, WindowStats};
pub use external::{collect_tool_output, write_script, ContainerToolStrategy};
pub use signature::{
    Framing, MarkerFamily, Region, SignatureConfig, SignatureScanner, OGG_STREAM, RIFF,
    RIFF_AUDIO,
};
pub use structured::{parse_index, BankIndex, IndexEntry, StructuredParser};
pub use traits::ExtractionStrategy;
