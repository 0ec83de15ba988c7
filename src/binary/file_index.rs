//! File-backed index serving lookups without loading the node array.

use std::fs::File;
use std::marker::PhantomData;
use std::net::IpAddr;
use std::path::Path;

use parking_lot::Mutex;

use super::format::{Header, HEADER_SIZE};
use super::read_at::{BlockReader, ReadAt};
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::node::{LabelId, TrieNode};
use crate::IpLookup;

/// Default size of the block-aligned read cache, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Configuration for opening a file-backed index.
#[derive(Debug, Clone)]
pub struct FileIndexConfig {
    /// Size of the block-aligned read cache. 0 disables caching and every
    /// node record is read straight from the source.
    pub buffer_size: usize,
}

impl Default for FileIndexConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl FileIndexConfig {
    /// Configuration with the given cache block size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Configuration with caching disabled.
    pub fn unbuffered() -> Self {
        Self { buffer_size: 0 }
    }
}

/// Longest-prefix-match index answering lookups from a positional reader.
///
/// Only the header, metadata, and label table are read eagerly; node
/// records are fetched on demand as a lookup walks the trie. The reader
/// state, including the block cache and the per-call record buffer, sits
/// behind a mutex, so concurrent lookups are serialized.
///
/// The underlying source is owned and released on drop.
pub struct CidrFileIndex<S: LabelId, R> {
    meta: Metadata,

    nodes_offset: u64,
    nodes_len: usize,

    labels: Vec<String>,
    total: usize,

    state: Mutex<LookupState<R>>,

    _width: PhantomData<S>,
}

struct LookupState<R> {
    reader: BlockReader<R>,
    record: [u8; 13],
}

/// Open a file-backed index over any positional reader with the default
/// cache size.
///
/// The label id width recorded in the header decides the node record
/// size; lookups dispatch through [`IpLookup`] either way.
pub fn open<R>(r: R) -> Result<Box<dyn IpLookup + Send + Sync>>
where
    R: ReadAt + Send + 'static,
{
    open_with_config(r, FileIndexConfig::default())
}

/// Open a file-backed index with explicit configuration.
pub fn open_with_config<R>(
    r: R,
    config: FileIndexConfig,
) -> Result<Box<dyn IpLookup + Send + Sync>>
where
    R: ReadAt + Send + 'static,
{
    let mut reader = BlockReader::new(r, config.buffer_size);

    let mut buf = [0u8; HEADER_SIZE];
    read_exact_at(&mut reader, &mut buf, 0, "header")?;
    let header = Header::decode(&buf)?;

    let meta = if header.metadata_len > 0 {
        let mut buf = vec![0u8; header.metadata_len as usize];
        read_exact_at(&mut reader, &mut buf, HEADER_SIZE as u64, "metadata")?;
        serde_json::from_slice(&buf)?
    } else {
        Metadata::default()
    };

    if header.wide_ids {
        Ok(Box::new(CidrFileIndex::<i32, R>::from_parts(
            reader, &header, meta,
        )?))
    } else {
        Ok(Box::new(CidrFileIndex::<i16, R>::from_parts(
            reader, &header, meta,
        )?))
    }
}

/// Open a file-backed index from a path with the default cache size.
pub fn open_file(path: impl AsRef<Path>) -> Result<Box<dyn IpLookup + Send + Sync>> {
    open_file_with_config(path, FileIndexConfig::default())
}

/// Open a file-backed index from a path with explicit configuration.
pub fn open_file_with_config(
    path: impl AsRef<Path>,
    config: FileIndexConfig,
) -> Result<Box<dyn IpLookup + Send + Sync>> {
    let path = path.as_ref();
    let idx = open_with_config(File::open(path)?, config)?;

    log::debug!("opened file-backed index {:?}: {} prefixes", path, idx.len());

    Ok(idx)
}

fn read_exact_at<R: ReadAt>(
    reader: &mut BlockReader<R>,
    buf: &mut [u8],
    offset: u64,
    what: &'static str,
) -> Result<()> {
    let n = reader.read_at(buf, offset)?;
    if n != buf.len() {
        return Err(Error::Truncated(what));
    }
    Ok(())
}

impl<S: LabelId, R: ReadAt> CidrFileIndex<S, R> {
    fn from_parts(mut reader: BlockReader<R>, header: &Header, meta: Metadata) -> Result<Self> {
        let mut labels = Vec::with_capacity(header.labels_len as usize);
        let mut offset = header.labels_offset();
        let mut len_buf = [0u8; 4];
        for i in 0..header.labels_len as usize {
            read_exact_at(&mut reader, &mut len_buf, offset, "label length")?;
            offset += 4;

            let mut bytes = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            read_exact_at(&mut reader, &mut bytes, offset, "label bytes")?;
            offset += bytes.len() as u64;

            labels.push(String::from_utf8(bytes).map_err(|_| Error::InvalidLabel(i))?);
        }

        Ok(Self {
            meta,
            nodes_offset: header.nodes_offset(),
            nodes_len: header.nodes_len as usize,
            labels,
            total: header.total as usize,
            state: Mutex::new(LookupState {
                reader,
                record: [0u8; 13],
            }),
            _width: PhantomData,
        })
    }

    fn read_node(&self, state: &mut LookupState<R>, index: u32) -> Result<TrieNode<S>> {
        let offset = self.nodes_offset + index as u64 * S::RECORD_SIZE as u64;
        let record = &mut state.record[..S::RECORD_SIZE];
        let n = state.reader.read_at(record, offset)?;
        if n != S::RECORD_SIZE {
            return Err(Error::Truncated("node record"));
        }

        Ok(TrieNode::decode(record))
    }

    fn lookup_position(&self, ip: IpAddr) -> Result<Option<usize>> {
        let octets = crate::addr::Octets::from_ip(ip);

        let mut state = self.state.lock();
        let state = &mut *state;

        let mut cur = 0u32;
        let mut best = S::NONE;
        let mut best_mask = -1i8;

        // Visits the nodes at depths 0..=max_bits along the query's path,
        // each read exactly once.
        let mut depth = 0;
        loop {
            let node = self.read_node(state, cur)?;
            if node.is_terminal() && node.mask_len > best_mask {
                best = node.id;
                best_mask = node.mask_len;
            }

            if depth == octets.max_bits() {
                break;
            }
            let next = node.children[octets.bit(depth)];
            if next == -1 {
                break;
            }
            cur = next as u32;
            depth += 1;
        }

        Ok(best.index())
    }
}

impl<S: LabelId, R: ReadAt> IpLookup for CidrFileIndex<S, R> {
    fn lookup(&self, ip_str: &str) -> Option<&str> {
        let ip: IpAddr = ip_str.parse().ok()?;
        self.lookup_ip(ip)
    }

    /// # Panics
    ///
    /// Panics when the underlying reader fails; use
    /// [`try_lookup_ip`](IpLookup::try_lookup_ip) to handle read errors.
    fn lookup_ip(&self, ip: IpAddr) -> Option<&str> {
        match self.try_lookup_ip(ip) {
            Ok(label) => label,
            Err(e) => panic!("file-backed lookup: {e}"),
        }
    }

    fn try_lookup_ip(&self, ip: IpAddr) -> Result<Option<&str>> {
        Ok(self
            .lookup_position(ip)?
            .and_then(|pos| self.labels.get(pos))
            .map(String::as_str))
    }

    fn len(&self) -> usize {
        self.total
    }

    fn len_labels(&self) -> usize {
        self.labels.len()
    }

    fn len_nodes(&self) -> usize {
        self.nodes_len
    }

    fn metadata(&self) -> &Metadata {
        &self.meta
    }
}
