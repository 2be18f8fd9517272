//! Structured sound bank parsing
//!
//! Layout (all little-endian):
//! - `BKHD` u32 size, header body
//! - `DIDX` u32 size, then `size / 12` records of (id, offset, length)
//! - `DATA` u32 size, payload; record offsets are relative to payload start

use super::bytes::find_first;
use super::traits::ExtractionStrategy;
use crate::error::StrategyError;
use crate::model::{Container, StrategyTag, SubStreamRecord};
use binrw::BinRead;
use std::io::Cursor;

pub const HEADER_MAGIC: &[u8; 4] = b"BKHD";
pub const INDEX_MAGIC: &[u8; 4] = b"DIDX";
pub const DATA_MAGIC: &[u8; 4] = b"DATA";

/// Magic + size field
pub const CHUNK_HEADER_SIZE: usize = 8;
/// id + offset + length
pub const INDEX_RECORD_SIZE: usize = 12;

#[derive(BinRead, Debug, Clone, Copy)]
#[br(little)]
struct ChunkHeader {
    magic: [u8; 4],
    size: u32,
}

/// One entry of the DIDX table
#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct IndexEntry {
    pub id: u32,
    pub offset: u32,
    pub length: u32,
}

/// Parsed index of a structured bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankIndex {
    pub entries: Vec<IndexEntry>,

    /// Absolute offset that entry offsets are relative to
    pub data_base: usize,
}

/// Read a chunk header at `offset`, or None if the buffer ends first
fn read_chunk_header(buffer: &[u8], offset: usize) -> Result<Option<ChunkHeader>, StrategyError> {
    if offset.saturating_add(CHUNK_HEADER_SIZE) > buffer.len() {
        return Ok(None);
    }
    let mut cursor = Cursor::new(&buffer[offset..offset + CHUNK_HEADER_SIZE]);
    Ok(Some(ChunkHeader::read(&mut cursor)?))
}

/// Parse the BKHD/DIDX/DATA index of a bank
///
/// `Ok(None)` means "not a structured bank": a required marker is missing.
/// Errors are reserved for banks that carry the markers but are broken.
pub fn parse_index(buffer: &[u8]) -> Result<Option<BankIndex>, StrategyError> {
    let header = match read_chunk_header(buffer, 0)? {
        Some(h) if &h.magic == HEADER_MAGIC => h,
        _ => return Ok(None),
    };

    let index_offset = match CHUNK_HEADER_SIZE.checked_add(header.size as usize) {
        Some(offset) => offset,
        None => return Ok(None),
    };
    let index = match read_chunk_header(buffer, index_offset)? {
        Some(h) if &h.magic == INDEX_MAGIC => h,
        _ => {
            log::debug!("No DIDX chunk at {:#x}", index_offset);
            return Ok(None);
        }
    };

    let index_size = index.size as usize;
    if index_size % INDEX_RECORD_SIZE != 0 {
        return Err(StrategyError::Malformed {
            chunk: "DIDX",
            offset: index_offset,
            reason: format!(
                "size {} is not a multiple of {}",
                index_size, INDEX_RECORD_SIZE
            ),
        });
    }

    let table_start = index_offset + CHUNK_HEADER_SIZE;
    let table_end = table_start.saturating_add(index_size);
    if table_end > buffer.len() {
        return Err(StrategyError::Truncated {
            chunk: "DIDX",
            offset: index_offset,
            needed: index_size,
            available: buffer.len() - table_start,
        });
    }

    let count = index_size / INDEX_RECORD_SIZE;
    let mut cursor = Cursor::new(&buffer[table_start..table_end]);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(IndexEntry::read(&mut cursor)?);
    }

    let data_offset = match find_first(buffer, DATA_MAGIC, table_end) {
        Some(offset) => offset,
        None => {
            log::debug!("DIDX lists {} entries but no DATA chunk follows", count);
            return Ok(None);
        }
    };

    Ok(Some(BankIndex {
        entries,
        data_base: data_offset + CHUNK_HEADER_SIZE,
    }))
}

/// Strategy reading sub-stream boundaries from the bank's own index
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredParser;

impl StructuredParser {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractionStrategy for StructuredParser {
    fn tag(&self) -> StrategyTag {
        StrategyTag::Structured
    }

    fn attempt(&self, container: &Container) -> Result<Vec<SubStreamRecord>, StrategyError> {
        let index = match parse_index(container.bytes())? {
            Some(index) => index,
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::with_capacity(index.entries.len());
        for entry in &index.entries {
            let offset = index.data_base.saturating_add(entry.offset as usize);
            let record = SubStreamRecord::from_range(
                container,
                StrategyTag::Structured,
                records.len(),
                offset,
                entry.length as usize,
            );

            match record {
                Some(record) => records.push(record.with_native_id(entry.id)),
                None => log::debug!(
                    "Dropping index entry {} ({} bytes at {:#x}): outside {:?}",
                    entry.id,
                    entry.length,
                    offset,
                    container.path()
                ),
            }
        }

        log::debug!(
            "{:?}: index lists {} entries, {} in bounds",
            container.path(),
            index.entries.len(),
            records.len()
        );
        Ok(records)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a bank with the given (id, payload) entries laid out back to back
    pub(crate) fn build_bank(entries: &[(u32, Vec<u8>)]) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(HEADER_MAGIC);
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&[0x8c, 0, 0, 0, 0x42, 0, 0, 0]);

        buf.extend_from_slice(INDEX_MAGIC);
        buf.extend_from_slice(&((entries.len() * INDEX_RECORD_SIZE) as u32).to_le_bytes());
        let mut offset = 0u32;
        for (id, payload) in entries {
            buf.extend_from_slice(&id.to_le_bytes());
            buf.extend_from_slice(&offset.to_le_bytes());
            buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            offset += payload.len() as u32;
        }

        buf.extend_from_slice(DATA_MAGIC);
        buf.extend_from_slice(&offset.to_le_bytes());
        for (_, payload) in entries {
            buf.extend_from_slice(payload);
        }
        buf
    }

    fn container(bytes: Vec<u8>) -> Container {
        Container::from_bytes("bank.wsb", "bank", bytes)
    }

    #[test]
    fn test_recovers_every_indexed_entry() {
        let entries = vec![
            (1001, vec![0xaa; 40]),
            (1002, vec![0xbb; 7]),
            (1003, (0u8..=255).collect()),
        ];
        let c = container(build_bank(&entries));

        let records = StructuredParser::new().attempt(&c).unwrap();
        assert_eq!(records.len(), 3);

        for (record, (id, payload)) in records.iter().zip(&entries) {
            assert_eq!(record.native_id, Some(*id));
            assert_eq!(record.origin, StrategyTag::Structured);
            assert_eq!(record.bytes(&c), payload.as_slice());
        }
        assert_eq!(records[2].id, "bank_structured_00000002");
    }

    #[test]
    fn test_exact_offsets() {
        let entries = vec![(7, vec![1; 10]), (8, vec![2; 20])];
        let bytes = build_bank(&entries);
        let index = parse_index(&bytes).unwrap().unwrap();

        // 8 (BKHD) + 8 (body) + 8 (DIDX) + 24 (table) + 8 (DATA header)
        assert_eq!(index.data_base, 56);
        assert_eq!(
            index.entries,
            vec![
                IndexEntry { id: 7, offset: 0, length: 10 },
                IndexEntry { id: 8, offset: 10, length: 20 },
            ]
        );
    }

    #[test]
    fn test_missing_header_is_not_an_error() {
        let c = container(b"RIFF\x10\x00\x00\x00WAVEfmt sixteen!".to_vec());
        assert!(StructuredParser::new().attempt(&c).unwrap().is_empty());

        let c = container(b"BK".to_vec());
        assert!(StructuredParser::new().attempt(&c).unwrap().is_empty());
    }

    #[test]
    fn test_missing_index_or_data_is_not_an_error() {
        let mut bytes = build_bank(&[(1, vec![9; 4])]);
        bytes[16..20].copy_from_slice(b"HIRC");
        assert!(parse_index(&bytes).unwrap().is_none());

        let mut bytes = build_bank(&[(1, vec![9; 4])]);
        let data_at = bytes.len() - 12;
        bytes[data_at..data_at + 4].copy_from_slice(b"XXXX");
        assert!(parse_index(&bytes).unwrap().is_none());
    }

    #[test]
    fn test_index_size_must_be_record_multiple() {
        let mut bytes = build_bank(&[(1, vec![9; 4])]);
        bytes[20..24].copy_from_slice(&13u32.to_le_bytes());
        let err = parse_index(&bytes).unwrap_err();
        assert!(matches!(err, StrategyError::Malformed { chunk: "DIDX", .. }));
    }

    #[test]
    fn test_out_of_bounds_entries_are_dropped() {
        let mut bytes = build_bank(&[(1, vec![9; 4]), (2, vec![8; 4])]);
        // Second entry claims far more data than the bank holds
        bytes[44..48].copy_from_slice(&4000u32.to_le_bytes());
        let c = container(bytes);

        let records = StructuredParser::new().attempt(&c).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].native_id, Some(1));
    }
}
