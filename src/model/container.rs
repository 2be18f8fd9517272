use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A sound bank loaded fully into memory
///
/// Owned by the extraction task that loaded it and dropped as soon as
/// the cascade has produced its records.
#[derive(Debug, Clone)]
pub struct Container {
    /// Path the bytes were read from
    path: PathBuf,

    /// Collision-free name component used for every sub-stream derived
    /// from this container
    key: String,

    /// File contents
    bytes: Vec<u8>,
}

impl Container {
    /// Read a container from disk
    ///
    /// Empty files are rejected here: there is nothing any strategy could
    /// recover from them.
    pub fn load(path: &Path, key: impl Into<String>) -> Result<Self> {
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read container: {:?}", path))?;

        if bytes.is_empty() {
            bail!("Container is empty: {:?}", path);
        }

        Ok(Self {
            path: path.to_path_buf(),
            key: key.into(),
            bytes,
        })
    }

    /// Wrap an in-memory buffer (used by tests and by callers that already
    /// hold the bytes)
    pub fn from_bytes(path: impl Into<PathBuf>, key: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_reads_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bank.wsb");
        fs::write(&path, b"BKHD1234").unwrap();

        let container = Container::load(&path, "bank").unwrap();
        assert_eq!(container.size(), 8);
        assert_eq!(container.key(), "bank");
        assert_eq!(container.bytes(), b"BKHD1234");
    }

    #[test]
    fn test_load_rejects_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.wsb");
        fs::write(&path, b"").unwrap();

        let err = Container::load(&path, "empty").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(Container::load(&dir.path().join("nope.wsb"), "nope").is_err());
    }
}
