//! Partition table detection
//!
//! Parses an MBR and, behind a protective MBR, a GPT from the first sectors
//! of an image. Only primary MBR partitions are listed; logical partitions
//! live in extended boot records further into the image.

use serde::{Deserialize, Serialize};

use crate::config::source::SECTOR_SIZE;
use crate::error::SourceError;
use crate::log_debug;

const MODULE: &str = "source::partition";

const MBR_SIGNATURE_OFFSET: usize = 510;
const MBR_ENTRIES_OFFSET: usize = 446;
const MBR_ENTRY_SIZE: usize = 16;
const MBR_ENTRY_COUNT: usize = 4;
const GPT_PROTECTIVE_TYPE_ID: &str = "0xee";

const GPT_SIGNATURE: &[u8; 8] = b"EFI PART";
const GPT_MIN_ENTRY_SIZE: usize = 128;
const GPT_NAME_OFFSET: usize = 56;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionTableKind {
    Mbr,
    Gpt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    pub kind: PartitionTableKind,
    pub partitions: Vec<Partition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// 1-based slot in the table
    pub index: u32,
    /// Byte offset from the start of the image
    pub offset: u64,
    /// Size in bytes
    pub size: u64,
    /// MBR type byte ("0x83") or GPT type GUID
    pub type_id: String,
    /// GPT unique partition GUID
    pub guid: Option<String>,
    /// GPT partition name
    pub name: Option<String>,
    pub bootable: bool,
}

/// Parse the partition table found in `data`, the first bytes of an image
///
/// Returns `Ok(None)` when there is no MBR signature. A protective MBR with
/// an invalid GPT header is reported as the MBR it is.
pub fn parse_partition_table(data: &[u8]) -> Result<Option<PartitionTable>, SourceError> {
    if data.len() < SECTOR_SIZE {
        log_debug!(MODULE, "Image shorter than one sector ({} bytes)", data.len());
        return Ok(None);
    }

    if data[MBR_SIGNATURE_OFFSET..MBR_SIGNATURE_OFFSET + 2] != [0x55u8, 0xAA] {
        return Ok(None);
    }

    let mbr = parse_mbr(data);

    if mbr.iter().any(|p| p.type_id == GPT_PROTECTIVE_TYPE_ID) {
        match parse_gpt(data)? {
            Some(partitions) => {
                return Ok(Some(PartitionTable {
                    kind: PartitionTableKind::Gpt,
                    partitions,
                }))
            }
            None => log_debug!(MODULE, "Protective MBR without a valid GPT header"),
        }
    }

    Ok(Some(PartitionTable {
        kind: PartitionTableKind::Mbr,
        partitions: mbr,
    }))
}

fn parse_mbr(data: &[u8]) -> Vec<Partition> {
    (0..MBR_ENTRY_COUNT)
        .filter_map(|i| {
            let entry = &data[MBR_ENTRIES_OFFSET + i * MBR_ENTRY_SIZE..][..MBR_ENTRY_SIZE];
            let type_byte = entry[4];
            if type_byte == 0 {
                return None;
            }
            let start_lba = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]);
            let sectors = u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]);

            Some(Partition {
                index: i as u32 + 1,
                offset: start_lba as u64 * SECTOR_SIZE as u64,
                size: sectors as u64 * SECTOR_SIZE as u64,
                type_id: format!("0x{:02x}", type_byte),
                guid: None,
                name: None,
                bootable: entry[0] == 0x80,
            })
        })
        .collect()
}

fn parse_gpt(data: &[u8]) -> Result<Option<Vec<Partition>>, SourceError> {
    let header = match data.get(SECTOR_SIZE..2 * SECTOR_SIZE) {
        Some(header) if &header[..8] == GPT_SIGNATURE => header,
        _ => return Ok(None),
    };

    let entries_lba = read_u64(header, 72);
    let entry_count = read_u32(header, 80) as usize;
    let entry_size = read_u32(header, 84) as usize;

    if entry_size < GPT_MIN_ENTRY_SIZE {
        return Err(SourceError::Format(format!(
            "Invalid GPT partition entry size: {}",
            entry_size
        )));
    }

    let entries_start = usize::try_from(entries_lba)
        .ok()
        .and_then(|lba| lba.checked_mul(SECTOR_SIZE))
        .ok_or_else(|| {
            SourceError::Format(format!("Invalid GPT partition entries LBA: {}", entries_lba))
        })?;

    let mut partitions = Vec::new();
    for i in 0..entry_count {
        let Some(offset) = i
            .checked_mul(entry_size)
            .and_then(|o| o.checked_add(entries_start))
        else {
            break;
        };
        let Some(entry) = data.get(offset..offset + GPT_MIN_ENTRY_SIZE) else {
            log_debug!(
                MODULE,
                "GPT entries beyond probed data, stopping at entry {}",
                i
            );
            break;
        };

        let type_guid = &entry[0..16];
        if type_guid.iter().all(|&b| b == 0) {
            continue;
        }

        let first_lba = read_u64(entry, 32);
        let last_lba = read_u64(entry, 40);
        let attributes = read_u64(entry, 48);

        partitions.push(Partition {
            index: i as u32 + 1,
            offset: first_lba.saturating_mul(SECTOR_SIZE as u64),
            size: last_lba
                .saturating_sub(first_lba)
                .saturating_add(1)
                .saturating_mul(SECTOR_SIZE as u64),
            type_id: format_guid(type_guid),
            guid: Some(format_guid(&entry[16..32])),
            name: decode_gpt_name(&entry[GPT_NAME_OFFSET..GPT_MIN_ENTRY_SIZE]),
            // Legacy BIOS bootable attribute
            bootable: attributes & (1 << 2) != 0,
        });
    }

    Ok(Some(partitions))
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Mixed-endian GUID as printed by partitioning tools
fn format_guid(bytes: &[u8]) -> String {
    format!(
        "{:08X}-{:04X}-{:04X}-{}-{}",
        read_u32(bytes, 0),
        u16::from_le_bytes([bytes[4], bytes[5]]),
        u16::from_le_bytes([bytes[6], bytes[7]]),
        hex::encode_upper(&bytes[8..10]),
        hex::encode_upper(&bytes[10..16])
    )
}

fn decode_gpt_name(raw: &[u8]) -> Option<String> {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    if units.is_empty() {
        None
    } else {
        Some(String::from_utf16_lossy(&units))
    }
}
