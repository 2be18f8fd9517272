//! Input discovery and output file layout

use crate::model::{Container, ExtractedFile, SubStreamRecord};
use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Extension of raw sub-stream files
pub const RAW_EXTENSION: &str = "wem";

/// Extension of decoded waveforms
pub const WAVEFORM_EXTENSION: &str = "wav";

/// Find every container below `root`, sorted by path
pub fn discover_containers(root: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(e).with_context(|| format!("Failed to read input directory: {:?}", root))
            }
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        let matches = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container".to_string())
}

/// Relative path without extension, components joined by `_`
fn path_slug(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file).with_extension("");
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Collision-free name component for each input file
///
/// The file stem is used when it is unique in the batch; otherwise the
/// relative path slug, with a numeric suffix as a last resort. Keys only
/// depend on the (sorted) file list, so reruns produce identical names.
pub fn assign_source_keys(root: &Path, files: &[PathBuf]) -> Vec<String> {
    let stems: Vec<String> = files.iter().map(|f| file_stem(f)).collect();

    let mut stem_counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *stem_counts.entry(stem.as_str()).or_default() += 1;
    }

    let mut used = HashSet::new();
    files
        .iter()
        .zip(&stems)
        .map(|(file, stem)| {
            let base = if stem_counts[stem.as_str()] > 1 {
                path_slug(root, file)
            } else {
                stem.clone()
            };

            let mut key = base.clone();
            let mut n = 2;
            while !used.insert(key.clone()) {
                key = format!("{}-{}", base, n);
                n += 1;
            }
            key
        })
        .collect()
}

/// Path of the waveform produced from a raw sub-stream
pub fn waveform_path(raw_path: &Path) -> PathBuf {
    raw_path.with_extension(WAVEFORM_EXTENSION)
}

/// Writes sub-streams into the flat output directory
///
/// Records are first written into a per-container staging directory and
/// then moved into place, so the output directory never holds half-written
/// files.
#[derive(Debug, Clone)]
pub struct OutputOrganizer {
    output_dir: PathBuf,
    staging_dir: PathBuf,
    prefix: String,
}

impl OutputOrganizer {
    pub fn new(output_dir: PathBuf, staging_dir: PathBuf, prefix: impl Into<String>) -> Self {
        Self {
            output_dir,
            staging_dir,
            prefix: prefix.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name of a raw sub-stream
    pub fn raw_file_name(&self, id: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}.{}", id, RAW_EXTENSION)
        } else {
            format!("{}_{}.{}", self.prefix, id, RAW_EXTENSION)
        }
    }

    /// Final location of a raw sub-stream
    pub fn raw_path(&self, id: &str) -> PathBuf {
        self.output_dir.join(self.raw_file_name(id))
    }

    /// Write `records` and move them into the output directory
    pub fn persist(&self, container: &Container, records: &[SubStreamRecord]) -> Result<Vec<ExtractedFile>> {
        let task_dir = self.staging_dir.join(container.key());
        fs::create_dir_all(&task_dir)
            .with_context(|| format!("Failed to create staging directory: {:?}", task_dir))?;

        let mut staged = Vec::with_capacity(records.len());
        for record in records {
            let name = self.raw_file_name(&record.id);
            let path = task_dir.join(&name);
            fs::write(&path, record.bytes(container))
                .with_context(|| format!("Failed to write sub-stream: {:?}", path))?;
            staged.push((record, name, path));
        }

        let mut placed: Vec<ExtractedFile> = Vec::with_capacity(staged.len());
        for (record, name, staged_path) in staged {
            let dest = self.output_dir.join(&name);
            if let Err(e) = move_file(&staged_path, &dest) {
                for file in &placed {
                    let _ = fs::remove_file(&file.path);
                }
                return Err(e);
            }

            placed.push(ExtractedFile {
                id: record.id.clone(),
                origin: record.origin,
                path: dest,
                size: record.len() as u64,
            });
        }

        let _ = fs::remove_dir(&task_dir);
        Ok(placed)
    }
}

/// Rename, falling back to copy + delete across filesystems
fn move_file(source: &Path, dest: &Path) -> Result<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    fs::copy(source, dest)
        .with_context(|| format!("Failed to move {:?} to {:?}", source, dest))?;
    fs::remove_file(source)
        .with_context(|| format!("Failed to remove staged file {:?}", source))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StrategyTag;
    use tempfile::TempDir;

    #[test]
    fn test_discovery_is_recursive_sorted_and_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("b/deep")).unwrap();
        fs::write(root.join("b/deep/z.wsb"), b"x").unwrap();
        fs::write(root.join("a.WSB"), b"x").unwrap();
        fs::write(root.join("b/readme.txt"), b"x").unwrap();
        fs::create_dir_all(root.join("folder.wsb")).unwrap();

        let files = discover_containers(root, "wsb").unwrap();
        assert_eq!(files, vec![root.join("a.WSB"), root.join("b/deep/z.wsb")]);
    }

    #[test]
    fn test_discovery_of_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        assert!(discover_containers(&dir.path().join("missing"), "wsb").is_err());
    }

    #[test]
    fn test_unique_stems_are_used_directly() {
        let root = Path::new("/in");
        let files = vec![PathBuf::from("/in/music.wsb"), PathBuf::from("/in/sfx/voice.wsb")];
        assert_eq!(assign_source_keys(root, &files), vec!["music", "voice"]);
    }

    #[test]
    fn test_duplicate_stems_use_path_slug() {
        let root = Path::new("/in");
        let files = vec![
            PathBuf::from("/in/en/dialog.wsb"),
            PathBuf::from("/in/fr/dialog.wsb"),
            PathBuf::from("/in/music.wsb"),
        ];
        assert_eq!(
            assign_source_keys(root, &files),
            vec!["en_dialog", "fr_dialog", "music"]
        );
    }

    #[test]
    fn test_slug_collisions_get_suffix() {
        let root = Path::new("/in");
        let files = vec![
            PathBuf::from("/in/a_b/c.wsb"),
            PathBuf::from("/in/a/b_c.wsb"),
            PathBuf::from("/in/a_b_c.wsb"),
            PathBuf::from("/in/x/c.wsb"),
        ];
        let keys = assign_source_keys(root, &files);
        assert_eq!(keys, vec!["a_b_c", "b_c", "a_b_c-2", "x_c"]);
    }

    #[test]
    fn test_file_names_carry_prefix() {
        let organizer = OutputOrganizer::new(PathBuf::from("/out"), PathBuf::from("/tmp/s"), "ow");
        assert_eq!(
            organizer.raw_path("bank_signature_00000001"),
            PathBuf::from("/out/ow_bank_signature_00000001.wem")
        );
        let bare = OutputOrganizer::new(PathBuf::from("/out"), PathBuf::from("/tmp/s"), "");
        assert_eq!(bare.raw_file_name("bank_entropy_00000000"), "bank_entropy_00000000.wem");
        assert_eq!(
            waveform_path(Path::new("/out/x.wem")),
            PathBuf::from("/out/x.wav")
        );
    }

    #[test]
    fn test_persist_moves_records_into_output() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out");
        let staging = dir.path().join("staging");
        fs::create_dir_all(&output).unwrap();
        let organizer = OutputOrganizer::new(output.clone(), staging.clone(), "");

        let container = Container::from_bytes("bank.wsb", "bank", (0u8..64).collect());
        let records = vec![
            SubStreamRecord::from_range(&container, StrategyTag::Signature, 0, 0, 16).unwrap(),
            SubStreamRecord::from_range(&container, StrategyTag::Signature, 1, 32, 8).unwrap(),
        ];

        let files = organizer.persist(&container, &records).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].path, output.join("bank_signature_00000001.wem"));
        assert_eq!(fs::read(&files[1].path).unwrap(), (32u8..40).collect::<Vec<_>>());
        assert_eq!(files[0].size, 16);
        assert!(!staging.join("bank").exists());
    }
}
