//! Versioned binary format for CIDR indexes.
//!
//! # File structure
//!
//! ```text
//! +--------------------+
//! |  HEADER (20 bytes) |  version/flags, total, nodes_len, labels_len,
//! +--------------------+  metadata_len; all big-endian u32
//! |  METADATA JSON     |  metadata_len bytes, absent when empty
//! +--------------------+
//! |  NODE RECORDS      |  nodes_len * 11 (narrow ids) or 13 (wide ids)
//! +--------------------+
//! |  LABEL RECORDS     |  u32 length + raw bytes each
//! +--------------------+
//! ```
//!
//! Bit 31 of the version word selects the wide node record; bits 0..30
//! hold the format version, currently 1.
//!
//! The same bytes can be consumed two ways: [`load`] decodes the whole
//! file into an in-memory [`CidrIndex`](crate::CidrIndex), while [`open`]
//! keeps the node region on disk and reads records on demand through a
//! block-aligned cache.

mod file_index;
mod format;
mod read_at;
mod reader;
mod writer;


pub use file_index::{
    open, open_file, open_file_with_config, open_with_config, CidrFileIndex, FileIndexConfig,
    DEFAULT_BUFFER_SIZE,
};
pub use format::{FormatFlags, FORMAT_VERSION, HEADER_SIZE, NODE_SIZE_NARROW, NODE_SIZE_WIDE};
pub use read_at::ReadAt;
pub use reader::{load, load_from_file};
