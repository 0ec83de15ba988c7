//! Error types for lpmtrie.

use thiserror::Error;

/// Error type for index operations.
#[derive(Error, Debug)]
pub enum Error {
    /// CIDR text could not be parsed or its prefix length is out of range
    #[error("invalid CIDR ({label}): {cidr}")]
    InvalidCidr {
        /// The offending CIDR text.
        cidr: String,
        /// The label the caller tried to attach.
        label: String,
    },

    /// Strict insertion found the prefix already covered
    #[error("overlap {incoming} with {existing}: {cidr}")]
    Overlap {
        /// The CIDR that was being inserted.
        cidr: String,
        /// Label of the prefix already in the index.
        existing: String,
        /// Label of the rejected insertion.
        incoming: String,
    },

    /// Unsupported binary format version
    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    /// Typed decode was asked for the wrong label id width
    #[error("label id width mismatch")]
    WidthMismatch,

    /// Input ended inside a header, node record, or label record
    #[error("truncated index: {0}")]
    Truncated(&'static str),

    /// Label record is not valid UTF-8
    #[error("label {0} is not valid UTF-8")]
    InvalidLabel(usize),

    /// Metadata region is not valid JSON
    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;
