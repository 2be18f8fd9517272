//! Statistical last-resort classification
//!
//! Compressed audio sits in a characteristic entropy band: well above
//! padding and tables, but below the near-perfect 8 bits/byte of
//! encrypted or random data. The thresholds are empirical and meant to be
//! tuned; the decoder downstream is what actually decides.

use super::traits::ExtractionStrategy;
use crate::error::{ConfigError, StrategyError};
use crate::model::{Container, StrategyTag, SubStreamRecord};

/// Tunable window and threshold settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyConfig {
    /// Bytes per window
    pub window_size: usize,

    /// A trailing window shorter than this is ignored
    pub min_window: usize,

    /// Lower bound of the audio-like band (bits per byte)
    pub min_entropy: f64,

    /// Upper bound of the audio-like band (bits per byte)
    pub max_entropy: f64,

    /// Minimum number of distinct byte values in a window
    pub min_distinct: usize,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            window_size: 64 * 1024,
            min_window: 4 * 1024,
            min_entropy: 5.5,
            max_entropy: 7.99,
            min_distinct: 128,
        }
    }
}

impl EntropyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 || self.min_window == 0 {
            return Err(ConfigError::Heuristic(
                "window sizes must be positive".to_string(),
            ));
        }
        if self.min_window > self.window_size {
            return Err(ConfigError::Heuristic(format!(
                "minimum window {} exceeds window size {}",
                self.min_window, self.window_size
            )));
        }
        if !(0.0..=8.0).contains(&self.min_entropy)
            || !(0.0..=8.0).contains(&self.max_entropy)
            || self.min_entropy > self.max_entropy
        {
            return Err(ConfigError::Heuristic(format!(
                "entropy band [{}, {}] must lie within [0, 8]",
                self.min_entropy, self.max_entropy
            )));
        }
        if self.min_distinct > 256 {
            return Err(ConfigError::Heuristic(format!(
                "distinct-value floor {} exceeds 256",
                self.min_distinct
            )));
        }
        Ok(())
    }
}

/// Byte statistics of one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Shannon entropy in bits per byte
    pub entropy: f64,

    /// Number of byte values that occur at least once
    pub distinct: usize,
}

/// Compute entropy and alphabet size of a byte slice
pub fn window_stats(bytes: &[u8]) -> WindowStats {
    let mut histogram = [0usize; 256];
    for &b in bytes {
        histogram[b as usize] += 1;
    }

    let total = bytes.len() as f64;
    let mut entropy = 0.0;
    let mut distinct = 0;
    for &count in histogram.iter().filter(|&&c| c > 0) {
        distinct += 1;
        let p = count as f64 / total;
        entropy -= p * p.log2();
    }

    WindowStats { entropy, distinct }
}

/// Window classifier with a whole-file fallback
#[derive(Debug, Clone, Default)]
pub struct EntropyHeuristic {
    config: EntropyConfig,
}

impl EntropyHeuristic {
    pub fn new(config: EntropyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EntropyConfig {
        &self.config
    }

    /// (offset, len) of every window considered, in order
    pub fn windows(&self, len: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..len)
            .step_by(self.config.window_size.max(1))
            .map(move |offset| (offset, self.config.window_size.min(len - offset)))
            .filter(move |&(_, window_len)| window_len >= self.config.min_window)
    }

    /// Whether a window's statistics look like audio
    pub fn is_audio_like(&self, stats: &WindowStats) -> bool {
        stats.entropy >= self.config.min_entropy
            && stats.entropy <= self.config.max_entropy
            && stats.distinct >= self.config.min_distinct
    }

    /// Audio-like windows of `buffer`
    pub fn classify(&self, buffer: &[u8]) -> Vec<(usize, usize)> {
        self.windows(buffer.len())
            .filter(|&(offset, len)| {
                let stats = window_stats(&buffer[offset..offset + len]);
                log::trace!(
                    "window {:#x}+{}: entropy {:.3}, {} distinct",
                    offset,
                    len,
                    stats.entropy,
                    stats.distinct
                );
                self.is_audio_like(&stats)
            })
            .collect()
    }
}

impl ExtractionStrategy for EntropyHeuristic {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Entropy
    }

    fn attempt(&self, container: &Container) -> Result<Vec<SubStreamRecord>, StrategyError> {
        let mut records: Vec<SubStreamRecord> = Vec::new();
        for (offset, len) in self.classify(container.bytes()) {
            records.extend(SubStreamRecord::from_range(
                container,
                StrategyTag::Entropy,
                records.len(),
                offset,
                len,
            ));
        }

        if records.is_empty() {
            log::debug!(
                "{:?}: no audio-like windows, keeping the whole file",
                container.path()
            );
            records.extend(SubStreamRecord::from_range(
                container,
                StrategyTag::WholeFile,
                0,
                0,
                container.size(),
            ));
        }

        Ok(records)
    }
}
