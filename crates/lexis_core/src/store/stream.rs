//! Buffered input and output streams over storage backends.
//!
//! Index readers decode compressed integers one byte at a time, so reads go
//! through a window of [`IO_BUF_SIZE`] bytes fetched from the backend with a
//! single `read_at`. Writers accumulate bytes and append them in batches.

use crate::error::{CoreError, CoreResult};
use lexis_storage::{Folder, StorageBackend};
use std::fmt;
use std::io::{self, Read, Write};

/// Size of the read window and of the write batch.
pub const IO_BUF_SIZE: usize = 4096;

/// A seekable reader over one file.
pub struct InStream {
    name: String,
    backend: Box<dyn StorageBackend>,
    len: u64,
    pos: u64,
    buf: Vec<u8>,
    buf_start: u64,
}

impl fmt::Debug for InStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InStream")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("pos", &self.pos)
            .finish()
    }
}

impl InStream {
    /// Opens `path` in `folder` for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open(folder: &dyn Folder, path: &str) -> CoreResult<Self> {
        let backend = folder.open_in(path)?;
        Self::new(path, backend)
    }

    /// Wraps an existing backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's size cannot be determined.
    pub fn new(name: impl Into<String>, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let len = backend.size()?;
        Ok(Self {
            name: name.into(),
            backend,
            len,
            pos: 0,
            buf: Vec::new(),
            buf_start: 0,
        })
    }

    /// Returns the name the stream was opened with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total length of the file in bytes.
    #[must_use]
    pub fn length(&self) -> u64 {
        self.len
    }

    /// Current read position.
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.pos
    }

    /// Moves the read position.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if `pos` is beyond the end of
    /// the file.
    pub fn seek(&mut self, pos: u64) -> CoreResult<()> {
        if pos > self.len {
            return Err(CoreError::invalid_format(format!(
                "can't seek '{}' to {pos} past EOF ({})",
                self.name, self.len
            )));
        }
        self.pos = pos;
        Ok(())
    }

    fn map_read_err(&self, e: io::Error) -> CoreError {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CoreError::invalid_format(format!("read past EOF of '{}'", self.name))
        } else {
            CoreError::Io(e)
        }
    }

    fn map_codec_err(&self, e: lexis_codec::CodecError) -> CoreError {
        match e {
            lexis_codec::CodecError::UnexpectedEof => {
                CoreError::invalid_format(format!("read past EOF of '{}'", self.name))
            }
            other => CoreError::Codec(other),
        }
    }

    /// Reads exactly `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] if the file ends first.
    pub fn read_bytes(&mut self, len: usize) -> CoreResult<Vec<u8>> {
        if self.pos.saturating_add(len as u64) > self.len {
            return Err(CoreError::invalid_format(format!(
                "read past EOF of '{}': {len} bytes at {}",
                self.name, self.pos
            )));
        }
        let mut out = vec![0u8; len];
        self.read_exact(&mut out).map_err(|e| self.map_read_err(e))?;
        Ok(out)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] at end of file.
    pub fn read_u8(&mut self) -> CoreResult<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte).map_err(|e| self.map_read_err(e))?;
        Ok(byte[0])
    }

    /// Reads a compressed 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error at end of file or if the value overflows.
    pub fn read_c32(&mut self) -> CoreResult<u32> {
        lexis_codec::read_c32(self).map_err(|e| self.map_codec_err(e))
    }

    /// Reads a compressed 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error at end of file or if the value overflows.
    pub fn read_c64(&mut self) -> CoreResult<u64> {
        lexis_codec::read_c64(self).map_err(|e| self.map_codec_err(e))
    }

    /// Reads a big-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidFormat`] at end of file.
    pub fn read_u64_be(&mut self) -> CoreResult<u64> {
        let bytes = self.read_bytes(8)?;
        Ok(lexis_codec::get_u64_be(&bytes)?)
    }

    /// Reads from the current position to the end of the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub fn read_to_end_bytes(&mut self) -> CoreResult<Vec<u8>> {
        let remaining = (self.len - self.pos) as usize;
        self.read_bytes(remaining)
    }

    fn refill(&mut self) -> io::Result<()> {
        let want = (self.len - self.pos).min(IO_BUF_SIZE as u64) as usize;
        self.buf = self
            .backend
            .read_at(self.pos, want)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.buf_start = self.pos;
        Ok(())
    }
}

impl Read for InStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.len || out.is_empty() {
            return Ok(0);
        }
        let buf_end = self.buf_start + self.buf.len() as u64;
        if self.pos < self.buf_start || self.pos >= buf_end {
            self.refill()?;
        }
        let offset = (self.pos - self.buf_start) as usize;
        let n = out.len().min(self.buf.len() - offset);
        out[..n].copy_from_slice(&self.buf[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

/// An append-only writer over one file.
///
/// Bytes are buffered until [`OutStream::flush`] or until the buffer
/// fills; [`OutStream::tell`] always reports the logical position.
pub struct OutStream {
    name: String,
    backend: Box<dyn StorageBackend>,
    buf: Vec<u8>,
    flushed: u64,
}

impl fmt::Debug for OutStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutStream")
            .field("name", &self.name)
            .field("tell", &self.tell())
            .finish()
    }
}

impl OutStream {
    /// Creates (or truncates) `path` in `folder` for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn open(folder: &dyn Folder, path: &str) -> CoreResult<Self> {
        let backend = folder.open_out(path)?;
        Self::new(path, backend)
    }

    /// Wraps an existing backend. Writes continue at its current end.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's size cannot be determined.
    pub fn new(name: impl Into<String>, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let flushed = backend.size()?;
        Ok(Self {
            name: name.into(),
            backend,
            buf: Vec::with_capacity(IO_BUF_SIZE),
            flushed,
        })
    }

    /// Returns the name the stream was opened with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Logical write position, including buffered bytes.
    #[must_use]
    pub fn tell(&self) -> u64 {
        self.flushed + self.buf.len() as u64
    }

    /// Writes raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer spill to the backend fails.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> CoreResult<()> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() >= IO_BUF_SIZE {
            self.spill()?;
        }
        Ok(())
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer spill to the backend fails.
    pub fn write_u8(&mut self, value: u8) -> CoreResult<()> {
        self.write_bytes(&[value])
    }

    /// Writes a compressed 32-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer spill to the backend fails.
    pub fn write_c32(&mut self, value: u32) -> CoreResult<()> {
        let mut bytes = Vec::with_capacity(lexis_codec::MAX_C32_LEN);
        lexis_codec::encode_c32(value, &mut bytes);
        self.write_bytes(&bytes)
    }

    /// Writes a compressed 64-bit integer.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer spill to the backend fails.
    pub fn write_c64(&mut self, value: u64) -> CoreResult<()> {
        let mut bytes = Vec::with_capacity(lexis_codec::MAX_C64_LEN);
        lexis_codec::encode_c64(value, &mut bytes);
        self.write_bytes(&bytes)
    }

    /// Writes a big-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if a buffer spill to the backend fails.
    pub fn write_u64_be(&mut self, value: u64) -> CoreResult<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    fn spill(&mut self) -> CoreResult<()> {
        if !self.buf.is_empty() {
            self.backend.append(&self.buf)?;
            self.flushed += self.buf.len() as u64;
            self.buf.clear();
        }
        Ok(())
    }

    /// Pushes buffered bytes to the backend and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend append or flush fails.
    pub fn flush(&mut self) -> CoreResult<()> {
        self.spill()?;
        self.backend.flush()?;
        Ok(())
    }

    /// Flushes and returns the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn into_backend(mut self) -> CoreResult<Box<dyn StorageBackend>> {
        self.flush()?;
        let placeholder: Box<dyn StorageBackend> = Box::new(lexis_storage::InMemoryBackend::new());
        Ok(std::mem::replace(&mut self.backend, placeholder))
    }
}

impl Write for OutStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write_bytes(data)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        OutStream::flush(self).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
    }
}

impl Drop for OutStream {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            if let Err(e) = self.spill() {
                tracing::warn!(stream = %self.name, error = %e, "dropping unflushed output");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexis_storage::{InMemoryBackend, RamFolder};

    #[test]
    fn out_then_in_round_trip() {
        let folder = RamFolder::new();
        let mut out = OutStream::open(&folder, "data").unwrap();
        out.write_c32(300).unwrap();
        out.write_c64(1 << 40).unwrap();
        out.write_u64_be(7).unwrap();
        out.write_bytes(b"tail").unwrap();
        assert_eq!(out.tell(), 2 + 6 + 8 + 4);
        out.flush().unwrap();

        let mut input = InStream::open(&folder, "data").unwrap();
        assert_eq!(input.length(), 20);
        assert_eq!(input.read_c32().unwrap(), 300);
        assert_eq!(input.read_c64().unwrap(), 1 << 40);
        assert_eq!(input.read_u64_be().unwrap(), 7);
        assert_eq!(input.read_to_end_bytes().unwrap(), b"tail");
        assert_eq!(input.tell(), 20);
    }

    #[test]
    fn seek_past_eof_fails() {
        let backend = InMemoryBackend::with_data(vec![1, 2, 3]);
        let mut input = InStream::new("three", Box::new(backend)).unwrap();
        assert!(input.seek(3).is_ok());
        assert!(matches!(input.seek(4), Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn read_past_eof_is_format_error() {
        let backend = InMemoryBackend::with_data(vec![0x81]);
        let mut input = InStream::new("short", Box::new(backend)).unwrap();
        assert!(matches!(input.read_c32(), Err(CoreError::InvalidFormat { .. })));

        input.seek(0).unwrap();
        assert!(matches!(input.read_bytes(2), Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn reads_cross_window_boundaries() {
        let data: Vec<u8> = (0..3 * IO_BUF_SIZE).map(|i| (i % 251) as u8).collect();
        let backend = InMemoryBackend::with_data(data.clone());
        let mut input = InStream::new("big", Box::new(backend)).unwrap();

        input.seek(IO_BUF_SIZE as u64 - 2).unwrap();
        let got = input.read_bytes(4).unwrap();
        assert_eq!(got, &data[IO_BUF_SIZE - 2..IO_BUF_SIZE + 2]);

        // Seeking backwards refills the window.
        input.seek(1).unwrap();
        assert_eq!(input.read_u8().unwrap(), data[1]);
    }

    #[test]
    fn large_writes_spill_in_batches() {
        let backend = InMemoryBackend::new();
        let view = backend.clone();
        let mut out = OutStream::new("batch", Box::new(backend)).unwrap();

        out.write_bytes(&vec![9u8; IO_BUF_SIZE + 1]).unwrap();
        assert_eq!(view.data().len(), IO_BUF_SIZE + 1);
        out.write_u8(1).unwrap();
        assert_eq!(view.data().len(), IO_BUF_SIZE + 1);
        assert_eq!(out.tell(), IO_BUF_SIZE as u64 + 2);

        let backend = out.into_backend().unwrap();
        assert_eq!(backend.size().unwrap(), IO_BUF_SIZE as u64 + 2);
    }
}
