//! Backing media for block storage.
//!
//! A [`Medium`] is a contiguous, byte-addressable resource. The block store
//! only needs positioned reads and writes, length queries and truncation, so
//! both a real file and an in-memory buffer qualify.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// A byte-addressable resource that blocks are laid out on.
pub trait Medium {
    /// Current length in bytes.
    fn byte_len(&self) -> io::Result<u64>;

    /// Grow or shrink to exactly `len` bytes. New bytes are zero.
    fn set_byte_len(&mut self, len: u64) -> io::Result<()>;

    /// Fill `buf` from `offset`. Fails if the range is not fully present.
    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

    /// Write all of `buf` at `offset`.
    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

    /// Push buffered writes down to durable storage.
    fn sync(&mut self) -> io::Result<()>;
}

impl Medium for File {
    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn set_byte_len(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.read_exact(buf)
    }

    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(buf)?;
        self.flush()
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

/// An in-memory medium backed by a `Vec<u8>`.
///
/// Useful for tests and for throwaway stores.
///
/// # Example
/// ```
/// use chainstore::storage::{Medium, MemoryMedium};
///
/// let mut medium = MemoryMedium::new();
/// medium.set_byte_len(8).unwrap();
/// medium.write_all_at(2, &[7, 7]).unwrap();
/// assert_eq!(medium.as_bytes(), &[0, 0, 7, 7, 0, 0, 0, 0]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct MemoryMedium {
    data: Vec<u8>,
}

impl MemoryMedium {
    /// Create an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap existing bytes.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Raw contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw contents, for corrupting bytes in tests.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn range(&self, offset: u64, len: usize) -> io::Result<std::ops::Range<usize>> {
        let start = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset too large"))?;
        let end = start
            .checked_add(len)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "range overflows"))?;
        Ok(start..end)
    }
}

impl Medium for MemoryMedium {
    fn byte_len(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn set_byte_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length too large"))?;
        self.data.resize(len, 0);
        Ok(())
    }

    fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(offset, buf.len())?;
        let src = self.data.get(range).ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of medium")
        })?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write_all_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        let range = self.range(offset, buf.len())?;
        if range.end > self.data.len() {
            self.data.resize(range.end, 0);
        }
        self.data[range].copy_from_slice(buf);
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        Ok(())
    }
}
