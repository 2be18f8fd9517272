//! Conversion of raw sub-streams into waveforms

use super::decoder::WaveformDecoder;
use crate::batch::organizer::waveform_path;
use crate::batch::{PoolTask, WorkerPool};
use crate::model::{ConversionOutcome, ConversionStatus, Disposition, ExtractedFile};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
pub struct ConversionSettings {
    /// Keep the raw file next to a successfully decoded waveform
    pub keep_raw: bool,

    /// A waveform must be strictly larger than this to count as decoded
    pub min_waveform_size: u64,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            keep_raw: false,
            min_waveform_size: 44,
        }
    }
}

/// Decode one raw sub-stream and settle what happens to the raw file
///
/// The raw file is deleted only after a verified success (and only when
/// `keep_raw` is off). On any failure it stays, and a partial waveform is
/// removed.
pub fn convert_substream<D: WaveformDecoder + ?Sized>(
    decoder: &D,
    id: &str,
    raw_path: &Path,
    settings: ConversionSettings,
) -> ConversionOutcome {
    let waveform = waveform_path(raw_path);

    match decode_verified(decoder, raw_path, &waveform, settings.min_waveform_size) {
        Ok(()) => {
            let disposition = if settings.keep_raw {
                Disposition::Retained
            } else {
                match fs::remove_file(raw_path) {
                    Ok(()) => Disposition::Deleted,
                    Err(e) => {
                        log::warn!("Could not delete {:?}: {}", raw_path, e);
                        Disposition::Retained
                    }
                }
            };

            log::debug!("Converted {}", id);
            ConversionOutcome {
                id: id.to_string(),
                raw_path: raw_path.to_path_buf(),
                status: ConversionStatus::Converted { waveform },
                disposition,
            }
        }
        Err(error) => {
            if waveform.exists() {
                let _ = fs::remove_file(&waveform);
            }

            log::debug!("Conversion failed for {}: {}", id, error);
            ConversionOutcome {
                id: id.to_string(),
                raw_path: raw_path.to_path_buf(),
                status: ConversionStatus::Failed { error },
                disposition: Disposition::Retained,
            }
        }
    }
}

fn decode_verified<D: WaveformDecoder + ?Sized>(
    decoder: &D,
    raw_path: &Path,
    waveform: &Path,
    min_size: u64,
) -> Result<(), String> {
    decoder
        .decode(raw_path, waveform)
        .map_err(|e| e.to_string())?;

    let size = fs::metadata(waveform)
        .map_err(|_| "decoder produced no waveform".to_string())?
        .len();
    if size <= min_size {
        return Err(format!("waveform too small ({} bytes)", size));
    }
    Ok(())
}

/// One sub-stream to convert
pub struct ConversionTask<D: WaveformDecoder + 'static> {
    id: String,
    raw_path: PathBuf,
    decoder: Arc<D>,
    settings: ConversionSettings,
}

impl<D: WaveformDecoder + 'static> PoolTask for ConversionTask<D> {
    type Output = ConversionOutcome;

    fn run(&self) -> ConversionOutcome {
        convert_substream(self.decoder.as_ref(), &self.id, &self.raw_path, self.settings)
    }

    fn on_panic(&self, message: String) -> ConversionOutcome {
        log::error!("Conversion task panicked on {}: {}", self.id, message);
        ConversionOutcome {
            id: self.id.clone(),
            raw_path: self.raw_path.clone(),
            status: ConversionStatus::Failed {
                error: format!("worker panicked: {}", message),
            },
            disposition: Disposition::Retained,
        }
    }
}

/// Fans sub-streams out to the worker pool for decoding
pub struct ConversionStage<D: WaveformDecoder + 'static> {
    decoder: Arc<D>,
    settings: ConversionSettings,
}

impl<D: WaveformDecoder + 'static> ConversionStage<D> {
    pub fn new(decoder: Arc<D>, settings: ConversionSettings) -> Self {
        Self { decoder, settings }
    }

    /// Convert every file, reporting each outcome as it completes
    pub fn run<F>(&self, pool: &WorkerPool, files: &[ExtractedFile], on_outcome: F) -> usize
    where
        F: FnMut(ConversionOutcome),
    {
        let tasks: Vec<ConversionTask<D>> = files
            .iter()
            .map(|file| ConversionTask {
                id: file.id.clone(),
                raw_path: file.path.clone(),
                decoder: Arc::clone(&self.decoder),
                settings: self.settings,
            })
            .collect();

        pool.execute(tasks, on_outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolError;
    use crate::model::StrategyTag;
    use tempfile::TempDir;

    /// Writes a fixed number of bytes, or fails
    struct StubDecoder {
        output_size: Option<usize>,
    }

    impl WaveformDecoder for StubDecoder {
        fn is_available(&self) -> bool {
            true
        }

        fn decode(&self, _input: &Path, output: &Path) -> Result<(), ToolError> {
            match self.output_size {
                Some(n) => {
                    fs::write(output, vec![0u8; n]).map_err(|source| ToolError::Spawn {
                        program: "stub".to_string(),
                        source,
                    })?;
                    Ok(())
                }
                None => {
                    // Leave a partial file behind
                    let _ = fs::write(output, b"RIFF");
                    Err(ToolError::Failed {
                        program: "stub".to_string(),
                        code: Some(1),
                        stderr: "unsupported".to_string(),
                    })
                }
            }
        }
    }

    fn raw_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![7u8; 100]).unwrap();
        path
    }

    #[test]
    fn test_success_deletes_raw() {
        let dir = TempDir::new().unwrap();
        let raw = raw_file(dir.path(), "a.wem");

        let outcome = convert_substream(
            &StubDecoder { output_size: Some(1000) },
            "a",
            &raw,
            ConversionSettings::default(),
        );

        assert!(outcome.is_converted());
        assert_eq!(outcome.disposition, Disposition::Deleted);
        assert!(!raw.exists());
        assert!(dir.path().join("a.wav").exists());
    }

    #[test]
    fn test_keep_raw_retains_on_success() {
        let dir = TempDir::new().unwrap();
        let raw = raw_file(dir.path(), "a.wem");
        let settings = ConversionSettings {
            keep_raw: true,
            ..ConversionSettings::default()
        };

        let outcome = convert_substream(&StubDecoder { output_size: Some(1000) }, "a", &raw, settings);
        assert!(outcome.is_converted());
        assert_eq!(outcome.disposition, Disposition::Retained);
        assert!(raw.exists());
    }

    #[test]
    fn test_failure_retains_raw_and_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let raw = raw_file(dir.path(), "a.wem");

        let outcome = convert_substream(
            &StubDecoder { output_size: None },
            "a",
            &raw,
            ConversionSettings::default(),
        );

        assert!(!outcome.is_converted());
        assert_eq!(outcome.disposition, Disposition::Retained);
        assert!(raw.exists());
        assert!(!dir.path().join("a.wav").exists());
    }

    #[test]
    fn test_tiny_waveform_counts_as_failure() {
        let dir = TempDir::new().unwrap();
        let raw = raw_file(dir.path(), "a.wem");

        let outcome = convert_substream(
            &StubDecoder { output_size: Some(44) },
            "a",
            &raw,
            ConversionSettings::default(),
        );

        match &outcome.status {
            ConversionStatus::Failed { error } => assert!(error.contains("too small")),
            _ => panic!("expected failure"),
        }
        assert!(raw.exists());
        assert!(!dir.path().join("a.wav").exists());
    }

    #[test]
    fn test_stage_converts_every_file() {
        let dir = TempDir::new().unwrap();
        let files: Vec<ExtractedFile> = (0..6)
            .map(|i| {
                let id = format!("bank_signature_{:08}", i);
                ExtractedFile {
                    path: raw_file(dir.path(), &format!("{}.wem", id)),
                    id,
                    origin: StrategyTag::Signature,
                    size: 100,
                }
            })
            .collect();

        let pool = WorkerPool::new(3).unwrap();
        let stage = ConversionStage::new(
            Arc::new(StubDecoder { output_size: Some(500) }),
            ConversionSettings::default(),
        );

        let mut outcomes = Vec::new();
        let delivered = stage.run(&pool, &files, |o| outcomes.push(o));

        assert_eq!(delivered, 6);
        assert!(outcomes.iter().all(|o| o.is_converted()));
        assert!(files.iter().all(|f| !f.path.exists()));
    }
}
