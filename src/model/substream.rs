use super::Container;
use serde::Serialize;
use std::fmt;

/// Which part of the cascade produced a sub-stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    /// Emitted by the external container tool
    External,

    /// Read from the BKHD/DIDX/DATA index
    Structured,

    /// Bounded by a known magic marker
    Signature,

    /// A window whose byte statistics look like audio
    Entropy,

    /// The whole container, when nothing else matched
    WholeFile,
}

impl StrategyTag {
    /// Short tag used in file names and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::External => "external",
            StrategyTag::Structured => "structured",
            StrategyTag::Signature => "signature",
            StrategyTag::Entropy => "entropy",
            StrategyTag::WholeFile => "whole-file",
        }
    }
}

impl fmt::Display for StrategyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the bytes of a sub-stream live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubStreamData {
    /// A byte range of the source container
    Range { offset: usize, len: usize },

    /// Bytes produced outside the container buffer (e.g. by an external tool)
    Materialized(Vec<u8>),
}

/// One candidate audio unit recovered from a container
///
/// Constructors enforce `len > 0` and `offset + len <= container.size()`,
/// so a record that exists is always in bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubStreamRecord {
    /// `{source key}_{tag}_{sequence:08}`
    pub id: String,

    /// Strategy that produced this record
    pub origin: StrategyTag,

    /// Position of this record within its strategy's output
    pub sequence: usize,

    /// Identifier read from the container's own index, if any
    pub native_id: Option<u32>,

    data: SubStreamData,
}

impl SubStreamRecord {
    /// Build a record referencing a byte range of `container`
    ///
    /// Returns `None` for empty or out-of-bounds ranges.
    pub fn from_range(
        container: &Container,
        origin: StrategyTag,
        sequence: usize,
        offset: usize,
        len: usize,
    ) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if len == 0 || end > container.size() {
            return None;
        }

        Some(Self {
            id: make_id(container.key(), origin, sequence),
            origin,
            sequence,
            native_id: None,
            data: SubStreamData::Range { offset, len },
        })
    }

    /// Build a record from bytes that already live outside the container
    pub fn materialized(
        container: &Container,
        origin: StrategyTag,
        sequence: usize,
        bytes: Vec<u8>,
    ) -> Option<Self> {
        if bytes.is_empty() {
            return None;
        }

        Some(Self {
            id: make_id(container.key(), origin, sequence),
            origin,
            sequence,
            native_id: None,
            data: SubStreamData::Materialized(bytes),
        })
    }

    /// Attach the container's native identifier
    pub fn with_native_id(mut self, native_id: u32) -> Self {
        self.native_id = Some(native_id);
        self
    }

    pub fn data(&self) -> &SubStreamData {
        &self.data
    }

    /// Offset within the source container (None for materialized records)
    pub fn offset(&self) -> Option<usize> {
        match self.data {
            SubStreamData::Range { offset, .. } => Some(offset),
            SubStreamData::Materialized(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.data {
            SubStreamData::Range { len, .. } => *len,
            SubStreamData::Materialized(bytes) => bytes.len(),
        }
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the record's bytes
    ///
    /// `container` must be the container the record was built from.
    pub fn bytes<'a>(&'a self, container: &'a Container) -> &'a [u8] {
        match &self.data {
            SubStreamData::Range { offset, len } => &container.bytes()[*offset..*offset + *len],
            SubStreamData::Materialized(bytes) => bytes,
        }
    }
}

fn make_id(key: &str, origin: StrategyTag, sequence: usize) -> String {
    format!("{}_{}_{:08}", key, origin, sequence)
}
