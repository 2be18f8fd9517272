//! Extraction through an external container-structure decoder
//!
//! The tool is invoked as `<tool> -o <script> <input> <output dir>` and
//! whatever `.wem` files it leaves behind become sub-streams. Only the exit
//! status and those files matter; the script language is the tool's
//! business.

use super::traits::ExtractionStrategy;
use crate::error::StrategyError;
use crate::model::{Container, StrategyTag, SubStreamRecord};
use crate::process::run_with_timeout;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// Extension of the files the tool emits
pub const TOOL_OUTPUT_EXTENSION: &str = "wem";

/// File name of the generated script inside the script directory
pub const SCRIPT_FILE_NAME: &str = "wwise.bms";

/// Index-driven extraction script for BKHD/DIDX/DATA banks
const EXTRACTION_SCRIPT: &str = r#"# BKHD/DIDX/DATA sound bank extraction
idstring "BKHD"
get BKHD_SIZE long
math DIDX_POS = BKHD_SIZE
math DIDX_POS += 8
goto DIDX_POS
idstring "DIDX"
get DIDX_SIZE long
savepos TABLE_POS
math FILES = DIDX_SIZE
math FILES /= 12
math DATA_SEARCH = TABLE_POS
math DATA_SEARCH += DIDX_SIZE
goto DATA_SEARCH
findloc DATA_POS string "DATA"
math BASE = DATA_POS
math BASE += 8
goto TABLE_POS
for i = 0 < FILES
    get ID long
    get OFFSET long
    get SIZE long
    math OFFSET += BASE
    string NAME p= "%08u.wem" ID
    log NAME OFFSET SIZE
next i
"#;

/// Write the extraction script into `dir`, returning its path
pub fn write_script(dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create script directory: {:?}", dir))?;
    let path = dir.join(SCRIPT_FILE_NAME);
    fs::write(&path, EXTRACTION_SCRIPT)
        .with_context(|| format!("Failed to write extraction script: {:?}", path))?;
    Ok(path)
}

/// Strategy delegating to an external container tool
#[derive(Debug, Clone)]
pub struct ContainerToolStrategy {
    program: PathBuf,
    script: PathBuf,
    timeout: Duration,
}

impl ContainerToolStrategy {
    pub fn new(program: PathBuf, script: PathBuf) -> Self {
        Self {
            program,
            script,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Turn the tool's output files into records, ordered by file name
pub fn collect_tool_output(container: &Container, dir: &Path) -> Result<Vec<SubStreamRecord>, StrategyError> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(TOOL_OUTPUT_EXTENSION))
        })
        .collect();
    files.sort();

    let mut records = Vec::with_capacity(files.len());
    for path in files {
        let bytes = fs::read(&path)?;
        let native_id = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.parse::<u32>().ok());

        if let Some(record) =
            SubStreamRecord::materialized(container, StrategyTag::External, records.len(), bytes)
        {
            records.push(match native_id {
                Some(id) => record.with_native_id(id),
                None => record,
            });
        }
    }
    Ok(records)
}

impl ExtractionStrategy for ContainerToolStrategy {
    fn tag(&self) -> StrategyTag {
        StrategyTag::External
    }

    fn attempt(&self, container: &Container) -> Result<Vec<SubStreamRecord>, StrategyError> {
        let scratch = tempfile::tempdir()?;

        let mut command = Command::new(&self.program);
        command
            .arg("-o")
            .arg(&self.script)
            .arg(container.path())
            .arg(scratch.path());

        let output = run_with_timeout(command, self.timeout)?;
        if !output.status.success() {
            // Partial output is still worth keeping
            log::debug!(
                "{:?} exited with {} on {:?}: {}",
                self.program,
                output.status,
                container.path(),
                output.stderr
            );
        }

        collect_tool_output(container, scratch.path())
    }
}
