//! Per-container extraction task

use super::organizer::OutputOrganizer;
use super::pool::PoolTask;
use crate::extract::ExtractionCascade;
use crate::model::{Container, ExtractionOutcome};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

/// State shared read-only by every extraction task of a batch
pub struct ExtractionContext {
    pub cascade: ExtractionCascade,
    pub organizer: OutputOrganizer,
}

/// Extract one container: load, run the cascade, persist
pub struct ExtractionTask {
    source: PathBuf,
    key: String,
    ctx: Arc<ExtractionContext>,
}

impl ExtractionTask {
    pub fn new(source: PathBuf, key: String, ctx: Arc<ExtractionContext>) -> Self {
        Self { source, key, ctx }
    }

    fn extract(&self) -> Result<ExtractionOutcome> {
        let container = Container::load(&self.source, self.key.clone())?;

        let result = self
            .ctx
            .cascade
            .run(&container)
            .context("No strategy recovered any sub-stream")?;

        let files = self
            .ctx
            .organizer
            .persist(&container, &result.records)
            .context("Failed to write sub-streams")?;

        log::info!(
            "{:?}: {} sub-stream(s) via {}",
            self.source,
            files.len(),
            result.strategy
        );

        Ok(ExtractionOutcome::extracted(
            self.source.clone(),
            self.key.clone(),
            result.strategy,
            files,
        ))
    }
}

impl PoolTask for ExtractionTask {
    type Output = ExtractionOutcome;

    fn run(&self) -> ExtractionOutcome {
        match self.extract() {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("Extraction failed for {:?}: {:#}", self.source, e);
                ExtractionOutcome::failed(self.source.clone(), self.key.clone(), format!("{:#}", e))
            }
        }
    }

    fn on_panic(&self, message: String) -> ExtractionOutcome {
        log::error!("Extraction task panicked on {:?}: {}", self.source, message);
        ExtractionOutcome::failed(
            self.source.clone(),
            self.key.clone(),
            format!("worker panicked: {}", message),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{EntropyConfig, SignatureConfig};
    use crate::model::{ExtractionStatus, StrategyTag};
    use std::fs;
    use tempfile::TempDir;

    fn context(output: PathBuf, staging: PathBuf) -> Arc<ExtractionContext> {
        Arc::new(ExtractionContext {
            cascade: ExtractionCascade::standard(SignatureConfig::default(), EntropyConfig::default()),
            organizer: OutputOrganizer::new(output, staging, ""),
        })
    }

    #[test]
    fn test_signature_container_is_extracted() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out");
        fs::create_dir_all(&output).unwrap();

        let mut bytes = vec![0u8; 16];
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&8u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVEdata");
        let source = dir.path().join("voice.wsb");
        fs::write(&source, &bytes).unwrap();

        let task = ExtractionTask::new(source, "voice".to_string(), context(output.clone(), dir.path().join("s")));
        let outcome = task.run();

        match &outcome.status {
            ExtractionStatus::Extracted { strategy, substreams } => {
                assert_eq!(*strategy, StrategyTag::Signature);
                assert_eq!(substreams.len(), 1);
                assert_eq!(substreams[0].path, output.join("voice_signature_00000000.wem"));
                assert_eq!(fs::read(&substreams[0].path).unwrap(), &bytes[16..]);
            }
            ExtractionStatus::Failed { error } => panic!("unexpected failure: {}", error),
        }
    }

    #[test]
    fn test_empty_container_fails_without_outputs() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out");
        fs::create_dir_all(&output).unwrap();
        let source = dir.path().join("empty.wsb");
        fs::write(&source, b"").unwrap();

        let task = ExtractionTask::new(source, "empty".to_string(), context(output.clone(), dir.path().join("s")));
        let outcome = task.run();

        assert!(outcome.is_failed());
        assert!(outcome.substreams().is_empty());
        assert_eq!(fs::read_dir(&output).unwrap().count(), 0);
    }

    #[test]
    fn test_panic_maps_to_failed_outcome() {
        let dir = TempDir::new().unwrap();
        let task = ExtractionTask::new(
            PathBuf::from("x.wsb"),
            "x".to_string(),
            context(dir.path().to_path_buf(), dir.path().join("s")),
        );
        let outcome = task.on_panic("boom".to_string());
        match outcome.status {
            ExtractionStatus::Failed { error } => assert!(error.contains("boom")),
            _ => panic!("expected failure"),
        }
    }
}
