use std::{io, sync::Arc};

use bytes::Bytes;
use log::*;

use crate::{
    CamError, CamResult,
    driver::{Driver, FileHandle},
    result::Translate,
};

/// Camera file object held in driver memory, e.g. a preview frame or a
/// fetched image. Owns the native object; the data buffer lives as long as it.
pub struct CameraFile {
    driver: Arc<dyn Driver>,
    handle: FileHandle,
    data: Bytes,
    freed: bool,
}

impl CameraFile {
    /// Takes ownership of a populated file object and reads its buffer.
    /// The object is freed if the buffer cannot be read.
    pub(crate) fn adopt(driver: Arc<dyn Driver>, handle: FileHandle) -> CamResult<Self> {
        match driver.file_data_and_size(handle) {
            Ok(data) => Ok(Self {
                driver,
                handle,
                data,
                freed: false,
            }),
            Err(code) => {
                if let Err(free_code) = driver.file_free(handle) {
                    warn!("Unable to free camera file after a failed read ({free_code})");
                }
                Err(code.into_error(&*driver))
            }
        }
    }

    /// Size of the data buffer in bytes. Zero once freed.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }

    /// Wraps the file in a chunked reader.
    pub fn into_reader(self, chunk_cap: usize) -> FileStreamReader {
        FileStreamReader {
            full_size: self.data.len(),
            file: self,
            offset: 0,
            chunk_cap: chunk_cap.max(1),
            closed: false,
        }
    }

    /// Releases the native file object and its buffer. Only the first call
    /// reaches the driver.
    pub fn free(&mut self) -> CamResult<()> {
        if self.freed {
            return Ok(());
        }

        self.freed = true;
        self.data = Bytes::new();
        self.driver.file_free(self.handle).translate(&*self.driver)?;

        Ok(())
    }
}

impl Drop for CameraFile {
    fn drop(&mut self) {
        if let Err(e) = self.free() {
            warn!("Error while freeing camera file on drop ({e})");
        }
    }
}

impl std::fmt::Debug for CameraFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraFile")
            .field("size", &self.data.len())
            .field("freed", &self.freed)
            .finish()
    }
}

/// Outcome of a single [`FileStreamReader::read_chunk`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadChunk {
    /// Bytes copied into the caller's buffer.
    pub len: usize,
    /// The stream is exhausted. Reported together with the final bytes.
    pub eof: bool,
}

/// Sequential reader over a file that is fully resident in driver memory.
///
/// A single read copies at most `chunk_cap` bytes. The offset only moves
/// forward and never passes the file size. After [`close`](Self::close) every
/// read fails with [`CamError::StreamClosed`].
#[derive(Debug)]
pub struct FileStreamReader {
    file: CameraFile,
    full_size: usize,
    offset: usize,
    chunk_cap: usize,
    closed: bool,
}

impl FileStreamReader {
    /// Copies the next chunk into `buf`.
    ///
    /// Copies `min(buf.len(), remaining, chunk_cap)` bytes. `eof` is set by
    /// the call that delivers the last byte and by every call after it.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> CamResult<ReadChunk> {
        if self.closed {
            return Err(CamError::StreamClosed);
        }

        let remaining = self.full_size - self.offset;
        let to_read = buf.len().min(remaining).min(self.chunk_cap);

        buf[..to_read].copy_from_slice(&self.file.data()[self.offset..self.offset + to_read]);
        self.offset += to_read;

        Ok(ReadChunk {
            len: to_read,
            eof: self.offset == self.full_size,
        })
    }

    /// Frees the underlying file object. Calling it again does nothing.
    pub fn close(&mut self) -> CamResult<()> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;
        self.file.free()
    }

    /// Total number of bytes, fixed when the stream was opened.
    pub fn full_size(&self) -> usize {
        self.full_size
    }

    /// Number of bytes delivered so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.full_size - self.offset
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl io::Read for FileStreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf)
            .map(|chunk| chunk.len)
            .map_err(|e| io::Error::new(io::ErrorKind::BrokenPipe, e))
    }
}
