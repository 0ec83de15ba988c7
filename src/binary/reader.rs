//! Whole-file binary index decoding.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use super::format::{Header, HEADER_SIZE};
use crate::error::{Error, Result};
use crate::metadata::Metadata;
use crate::node::{LabelId, TrieNode};
use crate::trie::CidrIndex;
use crate::IpLookup;

/// Decode an index from `r`, materializing the node array in memory.
///
/// The label id width recorded in the header decides whether a narrow or
/// a wide [`CidrIndex`] is produced; use [`CidrIndex::read_from`] when the
/// width is known up front.
pub fn load<R: Read>(mut r: R) -> Result<Box<dyn IpLookup + Send + Sync>> {
    let (header, meta) = read_prelude(&mut r)?;

    if header.wide_ids {
        Ok(Box::new(CidrIndex::<i32>::read_body(&header, meta, &mut r)?))
    } else {
        Ok(Box::new(CidrIndex::<i16>::read_body(&header, meta, &mut r)?))
    }
}

/// Decode an index from a file, buffered.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Box<dyn IpLookup + Send + Sync>> {
    let path = path.as_ref();
    let idx = load(BufReader::new(File::open(path)?))?;

    log::debug!("loaded index from {:?}: {} prefixes", path, idx.len());

    Ok(idx)
}

fn read_prelude<R: Read>(r: &mut R) -> Result<(Header, Metadata)> {
    let mut buf = [0u8; HEADER_SIZE];
    read_exact(r, &mut buf, "header")?;
    let header = Header::decode(&buf)?;

    let meta = if header.metadata_len > 0 {
        let mut buf = vec![0u8; header.metadata_len as usize];
        read_exact(r, &mut buf, "metadata")?;
        serde_json::from_slice(&buf)?
    } else {
        Metadata::default()
    };

    Ok((header, meta))
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], what: &'static str) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::Truncated(what),
        _ => Error::Io(e),
    })
}

impl<S: LabelId> CidrIndex<S> {
    /// Decode an index of a known id width from `r`.
    ///
    /// Fails with [`Error::WidthMismatch`] when the file was written with
    /// the other width.
    pub fn read_from<R: Read>(mut r: R) -> Result<Self> {
        let (header, meta) = read_prelude(&mut r)?;
        if header.wide_ids != S::WIDE {
            return Err(Error::WidthMismatch);
        }

        Self::read_body(&header, meta, &mut r)
    }

    fn read_body<R: Read>(header: &Header, meta: Metadata, r: &mut R) -> Result<Self> {
        let mut nodes = Vec::with_capacity(header.nodes_len as usize);
        let mut record = [0u8; 13];
        for _ in 0..header.nodes_len {
            let record = &mut record[..S::RECORD_SIZE];
            read_exact(r, record, "node record")?;
            nodes.push(TrieNode::decode(record));
        }

        let mut labels = Vec::with_capacity(header.labels_len as usize);
        let mut id_by_label = HashMap::with_capacity(header.labels_len as usize);
        let mut len_buf = [0u8; 4];
        for i in 0..header.labels_len as usize {
            read_exact(r, &mut len_buf, "label length")?;
            let mut bytes = vec![0u8; u32::from_be_bytes(len_buf) as usize];
            read_exact(r, &mut bytes, "label bytes")?;

            let label = String::from_utf8(bytes).map_err(|_| Error::InvalidLabel(i))?;
            id_by_label.insert(label.clone(), S::from_position(i + 1));
            labels.push(label);
        }

        Ok(Self {
            meta,
            nodes,
            labels,
            total: header.total as usize,
            id_by_label,
        })
    }
}
