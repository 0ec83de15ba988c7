//! lpmtrie - a longest-prefix-match index over IP CIDR blocks.
//!
//! This crate answers, for any IPv4 or IPv6 address, the label attached
//! to the longest CIDR prefix containing it: a country code, an ASN, a
//! cloud provider name, or any other short string.
//!
//! # Features
//!
//! - **Mixed families**: IPv4 and IPv6 prefixes share one index
//! - **Flat-array trie**: node identities are array indices, giving cache
//!   locality and a trivially serializable layout
//! - **DAWG compaction**: [`CidrIndex::minimize`] collapses isomorphic
//!   subtrees, typically shrinking geographic tables by well over half
//! - **Compact binary format**: versioned big-endian layout with embedded
//!   JSON metadata and a choice of 16-bit or 32-bit label ids
//! - **File-backed lookups**: [`open`] serves queries straight from a
//!   seekable file through a block-aligned read cache, without loading
//!   the node array
//!
//! # Quick start
//!
//! ```
//! use lpmtrie::CidrIndex;
//!
//! let mut idx = CidrIndex::new();
//! idx.add_cidr("192.168.1.0/24", "net1").unwrap();
//! idx.add_cidr("192.168.0.0/16", "net2").unwrap();
//! idx.add_cidr("2001:db8::/32", "net4").unwrap();
//!
//! assert_eq!(idx.lookup("192.168.1.100"), Some("net1"));
//! assert_eq!(idx.lookup("192.168.2.100"), Some("net2"));
//! assert_eq!(idx.lookup("2001:db8::1"), Some("net4"));
//! assert_eq!(idx.lookup("invalid"), None);
//! ```
//!
//! # Building and shipping an index
//!
//! ```ignore
//! let mut idx = CidrIndex::new();
//! // ... feed prefixes from a GeoIP dump, ASN table, cloud range list ...
//! idx.minimize();
//! idx.save_to_file("countries.bin")?;
//!
//! // Load fully into memory:
//! let mem = lpmtrie::load_from_file("countries.bin")?;
//! // Or serve lookups from the file itself:
//! let disk = lpmtrie::open_file("countries.bin")?;
//! assert_eq!(mem.lookup("2.125.160.217"), disk.lookup("2.125.160.217"));
//! ```

mod addr;
mod error;
mod metadata;
mod node;
mod trie;

pub mod binary;

pub use error::{Error, Result};
pub use metadata::Metadata;
pub use node::LabelId;
pub use trie::CidrIndex;

pub use binary::{
    load, load_from_file, open, open_file, open_file_with_config, open_with_config,
    CidrFileIndex, FileIndexConfig, ReadAt, DEFAULT_BUFFER_SIZE,
};

use std::net::IpAddr;

use ipnet::IpNet;

/// Capability to feed CIDR prefixes into an index under construction.
pub trait CidrAdd {
    /// Insert a CIDR block in textual form.
    fn add_cidr(&mut self, cidr: &str, label: &str) -> Result<()>;

    /// Insert a parsed CIDR block.
    fn add_net(&mut self, net: IpNet, label: &str);

    /// Mutable access to the index metadata.
    fn metadata_mut(&mut self) -> &mut Metadata;
}

impl<S: LabelId> CidrAdd for CidrIndex<S> {
    fn add_cidr(&mut self, cidr: &str, label: &str) -> Result<()> {
        CidrIndex::add_cidr(self, cidr, label)
    }

    fn add_net(&mut self, net: IpNet, label: &str) {
        CidrIndex::add_net(self, net, label)
    }

    fn metadata_mut(&mut self) -> &mut Metadata {
        CidrIndex::metadata_mut(self)
    }
}

/// Capability to answer longest-prefix-match queries.
///
/// Implemented by the in-memory [`CidrIndex`] and the file-backed
/// [`CidrFileIndex`]; [`load`] and [`open`] return either behind this
/// trait. Resources held by an implementation are released on drop.
pub trait IpLookup {
    /// Find the label of the longest prefix containing the given address
    /// text. Invalid text yields `None`, never an error.
    fn lookup(&self, ip_str: &str) -> Option<&str>;

    /// Find the label of the longest prefix containing `ip`.
    ///
    /// File-backed implementations panic when the underlying reader
    /// fails; use [`try_lookup_ip`](IpLookup::try_lookup_ip) where read
    /// errors must be handled.
    fn lookup_ip(&self, ip: IpAddr) -> Option<&str>;

    /// Like [`lookup_ip`](IpLookup::lookup_ip), surfacing read errors to
    /// the caller.
    fn try_lookup_ip(&self, ip: IpAddr) -> Result<Option<&str>>;

    /// Number of inserted prefixes.
    fn len(&self) -> usize;

    /// True when no prefix was inserted.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct labels.
    fn len_labels(&self) -> usize;

    /// Number of trie nodes.
    fn len_nodes(&self) -> usize;

    /// Metadata attached to the index.
    fn metadata(&self) -> &Metadata;
}

impl std::fmt::Debug for dyn IpLookup + Send + Sync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("dyn IpLookup")
            .field("len", &self.len())
            .field("len_labels", &self.len_labels())
            .field("len_nodes", &self.len_nodes())
            .finish()
    }
}

impl<S: LabelId> IpLookup for CidrIndex<S> {
    fn lookup(&self, ip_str: &str) -> Option<&str> {
        CidrIndex::lookup(self, ip_str)
    }

    fn lookup_ip(&self, ip: IpAddr) -> Option<&str> {
        CidrIndex::lookup_ip(self, ip)
    }

    fn try_lookup_ip(&self, ip: IpAddr) -> Result<Option<&str>> {
        Ok(CidrIndex::lookup_ip(self, ip))
    }

    fn len(&self) -> usize {
        CidrIndex::len(self)
    }

    fn len_labels(&self) -> usize {
        CidrIndex::len_labels(self)
    }

    fn len_nodes(&self) -> usize {
        CidrIndex::len_nodes(self)
    }

    fn metadata(&self) -> &Metadata {
        CidrIndex::metadata(self)
    }
}
