//! Raw sub-stream to waveform conversion

mod decoder;
mod stage;

pub use decoder::{ExternalDecoder, WaveformDecoder};
pub use stage::{convert_substream, ConversionSettings, ConversionStage, ConversionTask};
