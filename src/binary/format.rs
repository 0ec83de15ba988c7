//! Binary format constants and the on-disk header.

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::node::LabelId;

/// Current format version, carried in bits 0..30 of the version word.
pub const FORMAT_VERSION: u32 = 1;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 20;

/// Node record size for narrow (16-bit) label ids.
pub const NODE_SIZE_NARROW: usize = <i16 as LabelId>::RECORD_SIZE;

/// Node record size for wide (32-bit) label ids.
pub const NODE_SIZE_WIDE: usize = <i32 as LabelId>::RECORD_SIZE;

bitflags! {
    /// Flags packed into the high bits of the header's version word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatFlags: u32 {
        /// Node records carry 32-bit label ids.
        const WIDE_IDS = 1 << 31;
    }
}

/// Decoded file header.
///
/// All fields are big-endian `u32` on disk:
///
/// ```text
/// offset  field
/// 0       version_and_flags  (bit 31 = wide ids, bits 0..30 = version)
/// 4       total              (prefix count)
/// 8       nodes_len          (node record count)
/// 12      labels_len         (label record count)
/// 16      metadata_len       (bytes of JSON metadata that follow)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Header {
    pub wide_ids: bool,
    pub total: u32,
    pub nodes_len: u32,
    pub labels_len: u32,
    pub metadata_len: u32,
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut word = FORMAT_VERSION;
        if self.wide_ids {
            word |= FormatFlags::WIDE_IDS.bits();
        }

        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&word.to_be_bytes());
        buf[4..8].copy_from_slice(&self.total.to_be_bytes());
        buf[8..12].copy_from_slice(&self.nodes_len.to_be_bytes());
        buf[12..16].copy_from_slice(&self.labels_len.to_be_bytes());
        buf[16..20].copy_from_slice(&self.metadata_len.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8; HEADER_SIZE]) -> Result<Self> {
        let word = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let flags = FormatFlags::from_bits_truncate(word);
        let version = word & !FormatFlags::all().bits();
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        Ok(Self {
            wide_ids: flags.contains(FormatFlags::WIDE_IDS),
            total: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            nodes_len: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            labels_len: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
            metadata_len: u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]),
        })
    }

    /// Size of one node record under this header's id width.
    pub fn node_size(&self) -> usize {
        if self.wide_ids {
            NODE_SIZE_WIDE
        } else {
            NODE_SIZE_NARROW
        }
    }

    /// Byte offset of the first node record.
    pub fn nodes_offset(&self) -> u64 {
        HEADER_SIZE as u64 + self.metadata_len as u64
    }

    /// Byte offset of the first label record.
    pub fn labels_offset(&self) -> u64 {
        self.nodes_offset() + self.nodes_len as u64 * self.node_size() as u64
    }
}
