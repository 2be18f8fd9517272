//! Magic-marker scanning for banks without a usable index

use super::bytes::find_all;
use super::traits::ExtractionStrategy;
use crate::error::{ConfigError, StrategyError};
use crate::model::{Container, StrategyTag, SubStreamRecord};

/// How the extent of a sub-stream is derived from its marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// Marker is followed by a little-endian u32 payload length
    LengthPrefixed,

    /// Only the start is marked; the stream runs to the next boundary
    StartOnly,
}

/// A family of audio containers recognised by a start marker
#[derive(Debug, Clone, Copy)]
pub struct MarkerFamily {
    pub name: &'static str,
    pub magic: &'static [u8],
    pub framing: Framing,

    /// Extra check on an occurrence (buffer, offset of the marker)
    pub accept: fn(&[u8], usize) -> bool,
}

fn accept_any(_: &[u8], _: usize) -> bool {
    true
}

/// Ogg pages carry a version byte (0) and a header-type byte; only pages
/// flagged beginning-of-stream start a new sub-stream.
fn accept_ogg_stream_start(buffer: &[u8], offset: usize) -> bool {
    match buffer.get(offset + 4..offset + 6) {
        Some(&[version, header_type]) => version == 0 && header_type & 0x02 != 0,
        _ => false,
    }
}

/// Form types of RIFF chunks that hold audio
const RIFF_AUDIO_FORMS: [&[u8; 4]; 3] = [b"WAVE", b"XWMA", b"OggS"];

fn accept_riff_audio_form(buffer: &[u8], offset: usize) -> bool {
    match buffer.get(offset + 8..offset + 12) {
        Some(form) => RIFF_AUDIO_FORMS.iter().any(|known| form == &known[..]),
        None => false,
    }
}

/// RIFF/WAVE-style chunk: `RIFF` + u32 LE size of everything after it
pub const RIFF: MarkerFamily = MarkerFamily {
    name: "RIFF",
    magic: b"RIFF",
    framing: Framing::LengthPrefixed,
    accept: accept_any,
};

/// RIFF chunk whose form type is a known audio form
pub const RIFF_AUDIO: MarkerFamily = MarkerFamily {
    name: "RIFF",
    magic: b"RIFF",
    framing: Framing::LengthPrefixed,
    accept: accept_riff_audio_form,
};

/// First page of an Ogg logical stream
pub const OGG_STREAM: MarkerFamily = MarkerFamily {
    name: "OggS",
    magic: b"OggS",
    framing: Framing::StartOnly,
    accept: accept_ogg_stream_start,
};

/// Bytes counted before a length-prefixed payload (marker + length field)
const LENGTH_PREFIX_HEADER: usize = 8;

/// Sanity bounds for marker-derived extents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureConfig {
    /// Smallest acceptable length field
    pub min_length: u32,

    /// Largest believable length field
    pub max_length: u32,

    /// Cap on start-only extents
    pub max_extent: usize,

    /// Skip RIFF chunks whose form type is not WAVE, XWMA or OggS
    pub riff_audio_only: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 100_000_000,
            max_extent: 64 * 1024 * 1024,
            riff_audio_only: false,
        }
    }
}

impl SignatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_length == 0 {
            return Err(ConfigError::Signature(
                "minimum length must be positive".to_string(),
            ));
        }
        if self.min_length > self.max_length {
            return Err(ConfigError::Signature(format!(
                "minimum length {} exceeds maximum {}",
                self.min_length, self.max_length
            )));
        }
        if self.max_extent == 0 {
            return Err(ConfigError::Signature(
                "maximum extent must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A claimed region of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
    pub family: &'static str,
}

impl Region {
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Strategy bounding sub-streams by known container markers
#[derive(Debug, Clone)]
pub struct SignatureScanner {
    config: SignatureConfig,
    families: Vec<MarkerFamily>,
}

impl SignatureScanner {
    pub fn new(config: SignatureConfig) -> Self {
        let riff = if config.riff_audio_only { RIFF_AUDIO } else { RIFF };
        Self {
            config,
            families: vec![riff, OGG_STREAM],
        }
    }

    /// Replace the marker families
    pub fn with_families(mut self, families: Vec<MarkerFamily>) -> Self {
        self.families = families;
        self
    }

    /// Find non-overlapping regions, in buffer order
    pub fn scan(&self, buffer: &[u8]) -> Vec<Region> {
        let mut candidates: Vec<(usize, usize)> = Vec::new();
        for (family_idx, family) in self.families.iter().enumerate() {
            candidates.extend(
                find_all(buffer, family.magic)
                    .filter(|&pos| (family.accept)(buffer, pos))
                    .map(|pos| (pos, family_idx)),
            );
        }
        candidates.sort_unstable();

        let mut regions = Vec::new();
        let mut claimed_end = 0usize;

        for (i, &(pos, family_idx)) in candidates.iter().enumerate() {
            if pos < claimed_end {
                continue;
            }
            let family = &self.families[family_idx];

            let extent = match family.framing {
                Framing::LengthPrefixed => self.length_prefixed_extent(buffer, pos, family),
                Framing::StartOnly => {
                    let next_boundary = candidates[i + 1..]
                        .iter()
                        .map(|&(next, _)| next)
                        .find(|&next| next > pos)
                        .unwrap_or(buffer.len());
                    Some((next_boundary - pos).min(self.config.max_extent))
                }
            };

            if let Some(len) = extent.filter(|&len| len > 0) {
                let region = Region {
                    offset: pos,
                    len,
                    family: family.name,
                };
                claimed_end = region.end();
                regions.push(region);
            }
        }

        regions
    }

    /// Validate the length field following a marker at `pos`
    fn length_prefixed_extent(&self, buffer: &[u8], pos: usize, family: &MarkerFamily) -> Option<usize> {
        let field_at = pos + family.magic.len();
        let field: [u8; 4] = buffer.get(field_at..field_at + 4)?.try_into().ok()?;
        let length = u32::from_le_bytes(field);

        if length == 0 || length < self.config.min_length || length > self.config.max_length {
            log::trace!("{} at {:#x}: implausible length {}", family.name, pos, length);
            return None;
        }

        let extent = length as usize + LENGTH_PREFIX_HEADER;
        if pos + extent > buffer.len() {
            log::trace!(
                "{} at {:#x}: {} bytes run past end of buffer",
                family.name,
                pos,
                extent
            );
            return None;
        }

        Some(extent)
    }
}

impl Default for SignatureScanner {
    fn default() -> Self {
        Self::new(SignatureConfig::default())
    }
}

impl ExtractionStrategy for SignatureScanner {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Signature
    }

    fn attempt(&self, container: &Container) -> Result<Vec<SubStreamRecord>, StrategyError> {
        let regions = self.scan(container.bytes());

        let mut records = Vec::with_capacity(regions.len());
        for region in &regions {
            if let Some(record) = SubStreamRecord::from_range(
                container,
                StrategyTag::Signature,
                records.len(),
                region.offset,
                region.len,
            ) {
                records.push(record);
            }
        }

        if !records.is_empty() {
            log::debug!("{:?}: {} marker regions", container.path(), records.len());
        }
        Ok(records)
    }
}
