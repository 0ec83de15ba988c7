//! Positional readers and the block-aligned read cache.

use std::fs::File;
use std::io;

/// A source of bytes readable at arbitrary offsets.
///
/// The file-backed index reads node records through this trait instead of
/// materializing the node array. A return of 0 bytes means end of input;
/// short reads are permitted and retried internally.
pub trait ReadAt {
    /// Read into `buf` starting at `offset`, returning how many bytes
    /// were read.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

#[cfg(unix)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if offset >= self.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }
}

impl ReadAt for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        self.as_slice().read_at(buf, offset)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

/// Read until `buf` is full or the source reports end of input. Returns
/// the number of bytes read.
pub(crate) fn read_full_at<R: ReadAt + ?Sized>(
    r: &R,
    buf: &mut [u8],
    offset: u64,
) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        let m = r.read_at(&mut buf[n..], offset + n as u64)?;
        if m == 0 {
            break;
        }
        n += m;
    }
    Ok(n)
}

/// Block-aligned single-block cache over a positional reader.
///
/// Keeps one block of fixed size resident. Requests that fit inside the
/// aligned block containing their offset are served from the cache;
/// requests larger than a block or straddling an aligned boundary go
/// straight to the source. A short fill marks end of input, and reads
/// beyond that boundary return 0 without touching the source again.
///
/// A block size of 0 disables caching entirely.
pub(crate) struct BlockReader<R> {
    inner: R,
    block: Vec<u8>,
    block_off: u64,
    /// Bytes of `block` holding data; less than the block size only after
    /// a short fill at end of input.
    valid: usize,
    resident: bool,
}

impl<R: ReadAt> BlockReader<R> {
    pub fn new(inner: R, block_size: usize) -> Self {
        Self {
            inner,
            block: vec![0; block_size],
            block_off: 0,
            valid: 0,
            resident: false,
        }
    }

    pub fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let size = self.block.len() as u64;
        if size == 0 {
            return read_full_at(&self.inner, buf, offset);
        }

        let aligned = offset - offset % size;
        if buf.len() as u64 > size || offset + buf.len() as u64 > aligned + size {
            return read_full_at(&self.inner, buf, offset);
        }

        if !self.resident || self.block_off != aligned {
            let valid = read_full_at(&self.inner, &mut self.block, aligned)?;
            self.block_off = aligned;
            self.valid = valid;
            self.resident = true;
        }

        let start = (offset - aligned) as usize;
        if start >= self.valid {
            return Ok(0);
        }
        let n = buf.len().min(self.valid - start);
        buf[..n].copy_from_slice(&self.block[start..start + n]);
        Ok(n)
    }
}
