//! Batch orchestration: discovery, extraction, conversion, reporting

use super::config::BatchConfig;
use super::organizer::{assign_source_keys, discover_containers, OutputOrganizer};
use super::pool::WorkerPool;
use super::task::{ExtractionContext, ExtractionTask};
use crate::convert::{ConversionSettings, ConversionStage, WaveformDecoder};
use crate::error::ConfigError;
use crate::extract::{write_script, ContainerToolStrategy, ExtractionCascade};
use crate::model::ExtractedFile;
use crate::report::{BatchReport, ErrorLedger, ResultAggregator};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Main extraction pipeline
pub struct BatchPipeline<D: WaveformDecoder + 'static> {
    config: BatchConfig,
    decoder: Arc<D>,
}

impl<D: WaveformDecoder + 'static> BatchPipeline<D> {
    /// Create a pipeline, rejecting invalid settings up front
    pub fn new(config: BatchConfig, decoder: D) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            decoder: Arc::new(decoder),
        })
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Run the complete batch
    ///
    /// Per-file and per-sub-stream failures end up in the report and the
    /// ledger; only environment problems (missing input, unwritable output
    /// or ledger) are returned as errors.
    pub fn run(&self) -> Result<BatchReport> {
        let config = &self.config;
        log::info!("Input: {:?}", config.input_dir);
        log::info!("Output: {:?}", config.output_dir);

        // Step 1: Discover containers
        if !config.input_dir.is_dir() {
            return Err(ConfigError::MissingInput(config.input_dir.clone()).into());
        }
        let sources = discover_containers(&config.input_dir, &config.extension)?;
        if sources.is_empty() {
            bail!("No .{} files found in {:?}", config.extension, config.input_dir);
        }

        // Step 2: Prepare output, ledger, workers and staging area
        fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("Failed to create output directory: {:?}", config.output_dir))?;
        let ledger = ErrorLedger::open(&config.ledger_path)?;
        let pool = WorkerPool::new(config.workers)?;
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&config.output_dir)
            .context("Failed to create staging directory")?;

        log::info!(
            "Found {} container(s), using {} worker(s)",
            sources.len(),
            pool.workers()
        );

        // Step 3: Extract
        let cascade = self.build_cascade(staging.path())?;
        let ctx = Arc::new(ExtractionContext {
            cascade,
            organizer: OutputOrganizer::new(
                config.output_dir.clone(),
                staging.path().join("tasks"),
                config.prefix.clone(),
            ),
        });

        let keys = assign_source_keys(&config.input_dir, &sources);
        let tasks: Vec<ExtractionTask> = sources
            .into_iter()
            .zip(keys)
            .map(|(source, key)| ExtractionTask::new(source, key, Arc::clone(&ctx)))
            .collect();

        let mut aggregator = ResultAggregator::new(Some(ledger));
        let mut extracted: Vec<ExtractedFile> = Vec::new();
        let mut ledger_error: Option<anyhow::Error> = None;
        pool.execute(tasks, |outcome| {
            if let Err(e) = aggregator.record_extraction(&outcome) {
                if ledger_error.is_none() {
                    ledger_error = Some(e);
                }
            }
            extracted.extend(outcome.substreams().iter().cloned());
        });
        drop(ctx);

        staging
            .close()
            .context("Failed to remove staging directory")?;
        abort_on_ledger_error(&aggregator, ledger_error)?;

        log::info!(
            "Extraction complete: {} sub-stream(s) from {} file(s)",
            aggregator.report().total_substreams,
            aggregator.report().files_recovered
        );

        // Step 4: Convert
        extracted.sort_by(|a, b| a.id.cmp(&b.id));
        let ledger_error = self.convert(&pool, &extracted, &mut aggregator);
        abort_on_ledger_error(&aggregator, ledger_error)?;

        Ok(aggregator.finish())
    }

    fn build_cascade(&self, staging: &Path) -> Result<ExtractionCascade> {
        let config = &self.config;

        let cascade = if config.heuristic_only {
            ExtractionCascade::heuristic_only(config.entropy)
        } else {
            let cascade = ExtractionCascade::standard(config.signature, config.entropy);
            match &config.container_tool {
                Some(tool) => {
                    let script = write_script(&staging.join("_script"))?;
                    cascade.with_leading(Box::new(
                        ContainerToolStrategy::new(tool.clone(), script)
                            .with_timeout(config.tool_timeout),
                    ))
                }
                None => cascade,
            }
        };

        let order: Vec<&str> = cascade.order().iter().map(|t| t.as_str()).collect();
        log::info!("Strategy order: {}", order.join(" -> "));
        Ok(cascade)
    }

    /// Run the conversion stage, returning the first ledger write error
    fn convert(
        &self,
        pool: &WorkerPool,
        files: &[ExtractedFile],
        aggregator: &mut ResultAggregator,
    ) -> Option<anyhow::Error> {
        if files.is_empty() {
            return None;
        }

        if !self.config.convert {
            log::info!("Conversion disabled, keeping {} raw sub-stream(s)", files.len());
            aggregator.record_unconverted(files);
            return None;
        }

        if !self.decoder.is_available() {
            let message = format!(
                "Waveform decoder is not available, keeping {} raw sub-stream(s)",
                files.len()
            );
            log::warn!("{}", message);
            aggregator.record_unconverted(files);
            return aggregator.record_warning(&message).err();
        }

        log::info!("Converting {} sub-stream(s)...", files.len());
        let stage = ConversionStage::new(
            Arc::clone(&self.decoder),
            ConversionSettings {
                keep_raw: self.config.keep_raw,
                min_waveform_size: self.config.min_waveform_size,
            },
        );

        let mut ledger_error: Option<anyhow::Error> = None;
        stage.run(pool, files, |outcome| {
            if let Err(e) = aggregator.record_conversion(&outcome) {
                if ledger_error.is_none() {
                    ledger_error = Some(e);
                }
            }
        });
        log::info!("Conversion complete");
        ledger_error
    }
}

/// Stop the batch once the ledger could not be written
///
/// The partial summary is still printed, since the ledger no longer holds
/// a complete record of the failures.
fn abort_on_ledger_error(aggregator: &ResultAggregator, error: Option<anyhow::Error>) -> Result<()> {
    match error {
        Some(e) => {
            aggregator.report().log_summary();
            Err(e.context("Error ledger is not writable, stopping the batch"))
        }
        None => Ok(()),
    }
}
