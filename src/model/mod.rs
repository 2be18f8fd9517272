//! Data model shared by the extraction and conversion stages
//!
//! Containers and the records derived from them are owned by a single
//! task; only the outcome values cross thread boundaries.

mod container;
mod outcome;
mod substream;

pub use container::Container;
pub use outcome::{
    ConversionOutcome, ConversionStatus, Disposition, ExtractedFile, ExtractionOutcome,
    ExtractionStatus,
};
pub use substream::{StrategyTag, SubStreamData, SubStreamRecord};
