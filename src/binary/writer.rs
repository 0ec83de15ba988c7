//! Binary index encoding.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use super::format::Header;
use crate::error::Result;
use crate::node::LabelId;
use crate::trie::CidrIndex;

impl<S: LabelId> CidrIndex<S> {
    /// Encode the index to `w`: header, metadata JSON, node records,
    /// label records. The layout is byte-exact and big-endian; writing
    /// the same index twice produces identical bytes.
    ///
    /// The writer is not flushed and nothing is written atomically;
    /// callers needing crash safety should write to a temporary file and
    /// rename it into place.
    pub fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        let metadata_json = if self.meta.is_empty() {
            Vec::new()
        } else {
            serde_json::to_vec(&self.meta)?
        };

        let header = Header {
            wide_ids: S::WIDE,
            total: self.total as u32,
            nodes_len: self.nodes.len() as u32,
            labels_len: self.labels.len() as u32,
            metadata_len: metadata_json.len() as u32,
        };

        w.write_all(&header.encode())?;
        w.write_all(&metadata_json)?;

        let mut record = [0u8; 13];
        for node in &self.nodes {
            let record = &mut record[..S::RECORD_SIZE];
            node.encode(record);
            w.write_all(record)?;
        }

        for label in &self.labels {
            w.write_all(&(label.len() as u32).to_be_bytes())?;
            w.write_all(label.as_bytes())?;
        }

        Ok(())
    }

    /// Encode the index to a file, buffered.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut w = BufWriter::new(File::create(path)?);
        self.save(&mut w)?;
        w.flush()?;

        log::debug!(
            "saved index to {:?}: {} prefixes, {} nodes, {} labels",
            path,
            self.len(),
            self.len_nodes(),
            self.len_labels(),
        );

        Ok(())
    }
}
