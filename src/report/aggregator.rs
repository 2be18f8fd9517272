//! Batch result accumulation

use super::ledger::{ErrorLedger, Severity};
use crate::model::{
    ConversionOutcome, ConversionStatus, Disposition, ExtractedFile, ExtractionOutcome,
    ExtractionStatus, StrategyTag,
};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Final counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub files_attempted: usize,

    /// Files that yielded at least one sub-stream
    pub files_recovered: usize,

    pub files_failed: usize,

    pub total_substreams: usize,

    pub converted: usize,

    pub conversion_failed: usize,

    /// Raw sub-streams left in the output directory
    pub raw_retained: usize,

    /// Recovered files per winning strategy
    pub strategies: BTreeMap<StrategyTag, usize>,

    /// Identifier (source path or sub-stream id) to error message
    pub errors: BTreeMap<String, String>,
}

impl BatchReport {
    /// Print the human-readable summary
    pub fn log_summary(&self) {
        log::info!("===========================================");
        log::info!(
            "Files: {} attempted, {} recovered, {} failed",
            self.files_attempted,
            self.files_recovered,
            self.files_failed
        );
        for (strategy, count) in &self.strategies {
            log::info!("  {:<10} {}", strategy.as_str(), count);
        }
        log::info!("Sub-streams: {}", self.total_substreams);
        log::info!(
            "Converted: {}, conversion failures: {}",
            self.converted,
            self.conversion_failed
        );

        if self.raw_retained > 0 {
            log::warn!(
                "{} raw sub-stream(s) left unconverted; they may be non-audio data or need a fallback decoder",
                self.raw_retained
            );
        }
        if !self.errors.is_empty() {
            log::warn!("{} failure(s) recorded in the error ledger", self.errors.len());
        }
    }
}

/// Folds outcomes into a [`BatchReport`], in any order
///
/// Owned by the coordinating thread, which is the only writer of the
/// ledger. Counts are updated even when the ledger write that goes with
/// them fails; the error is returned so the caller can stop the batch.
pub struct ResultAggregator {
    report: BatchReport,
    ledger: Option<ErrorLedger>,
}

impl ResultAggregator {
    pub fn new(ledger: Option<ErrorLedger>) -> Self {
        Self {
            report: BatchReport::default(),
            ledger,
        }
    }

    pub fn record_extraction(&mut self, outcome: &ExtractionOutcome) -> Result<()> {
        self.report.files_attempted += 1;

        match &outcome.status {
            ExtractionStatus::Extracted {
                strategy,
                substreams,
            } => {
                self.report.files_recovered += 1;
                self.report.total_substreams += substreams.len();
                *self.report.strategies.entry(*strategy).or_default() += 1;
                Ok(())
            }
            ExtractionStatus::Failed { error } => {
                self.report.files_failed += 1;
                self.fail(outcome.source.display().to_string(), error)
            }
        }
    }

    pub fn record_conversion(&mut self, outcome: &ConversionOutcome) -> Result<()> {
        if outcome.disposition == Disposition::Retained {
            self.report.raw_retained += 1;
        }
        match &outcome.status {
            ConversionStatus::Converted { .. } => {
                self.report.converted += 1;
                Ok(())
            }
            ConversionStatus::Failed { error } => {
                self.report.conversion_failed += 1;
                self.fail(outcome.id.clone(), error)
            }
        }
    }

    /// Count sub-streams that never went through conversion
    pub fn record_unconverted(&mut self, files: &[ExtractedFile]) {
        self.report.raw_retained += files.len();
    }

    /// Batch-level condition worth keeping next to the failures
    pub fn record_warning(&mut self, message: &str) -> Result<()> {
        match self.ledger.as_mut() {
            Some(ledger) => ledger.append(Severity::Warning, message),
            None => Ok(()),
        }
    }

    fn fail(&mut self, identifier: String, error: &str) -> Result<()> {
        let line = format!("{}: {}", identifier, error);
        self.report.errors.insert(identifier, error.to_string());
        match self.ledger.as_mut() {
            Some(ledger) => ledger.append(Severity::Error, &line),
            None => Ok(()),
        }
    }

    /// Current counts
    pub fn report(&self) -> &BatchReport {
        &self.report
    }

    pub fn finish(self) -> BatchReport {
        self.report
    }
}
