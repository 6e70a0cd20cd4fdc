//! Mutex-guarded random access to an archive's backing bytes: either an
//! in-memory buffer or an open file, read under a lock so concurrent
//! lookups can share one handle without each needing `&mut`.

use std::fs::File;
use std::io::{Read as _, Seek as _, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{Error, Result};

pub enum IoContext {
    Memory(Vec<u8>),
    File(Mutex<File>),
}

impl IoContext {
    pub fn open_path(path: impl AsRef<Path>) -> Result<IoContext> {
        let file = File::open(path).map_err(Error::OpenForRead)?;
        Ok(IoContext::File(Mutex::new(file)))
    }

    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> IoContext {
        IoContext::Memory(bytes)
    }

    /// Read the whole backing store into an owned buffer. Called once by
    /// `Archive::open`/`open_bytes` to materialize the record table the
    /// lazy property/column iterators then borrow slices of.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        match self {
            IoContext::Memory(bytes) => Ok(bytes.clone()),
            IoContext::File(file) => {
                let mut file = file.lock().map_err(|_| Error::IllegalState("io context mutex poisoned"))?;
                file.seek(SeekFrom::Start(0)).map_err(Error::Io)?;
                let mut buf = Vec::new();
                file.read_to_end(&mut buf).map_err(Error::Io)?;
                Ok(buf)
            }
        }
    }

    /// Read `len` bytes at `offset`, for callers that only need one span
    /// (e.g. re-fetching a single string-table entry without the whole
    /// file already in hand).
    pub fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        match self {
            IoContext::Memory(bytes) => {
                let start = offset as usize;
                let end = start.checked_add(len).ok_or(Error::Alloc)?;
                bytes.get(start..end).map(<[u8]>::to_vec).ok_or(Error::ReadOutOfBounds {
                    at: offset,
                    requested: len as u64,
                    len: bytes.len() as u64,
                })
            }
            IoContext::File(file) => {
                let mut file = file.lock().map_err(|_| Error::IllegalState("io context mutex poisoned"))?;
                file.seek(SeekFrom::Start(offset)).map_err(Error::Io)?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf).map_err(Error::Io)?;
                Ok(buf)
            }
        }
    }
}
