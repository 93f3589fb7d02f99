use std::io::SeekFrom;
use std::path::Path;

use bima_protocol::ContentRange;
use bima_protocol::constants::DEFAULT_CHUNK_SIZE;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::TransferError;

// ---------------------------------------------------------------------------
// Chunk windows
// ---------------------------------------------------------------------------

/// A contiguous byte window `[start, end)` of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl Chunk {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Range header for this window within a file of `total` bytes.
    pub fn content_range(&self, total: u64) -> ContentRange {
        ContentRange {
            start: self.start,
            end: self.end,
            total,
        }
    }
}

/// Deterministic split of a file into fixed-size windows.
///
/// `start = index * chunk_size`, `end = min(start + chunk_size, total_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Plans `total_size` bytes in windows of `chunk_size`.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(total_size: u64, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            total_size,
            chunk_size: chunk_size as u64,
        }
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of windows: `ceil(total_size / chunk_size)`.
    pub fn chunks_total(&self) -> usize {
        self.total_size.div_ceil(self.chunk_size) as usize
    }

    /// Returns the window at `index`, if in range.
    pub fn window(&self, index: usize) -> Option<Chunk> {
        if index >= self.chunks_total() {
            return None;
        }
        let start = index as u64 * self.chunk_size;
        let end = (start + self.chunk_size).min(self.total_size);
        Some(Chunk { index, start, end })
    }

    /// Iterates windows in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.chunks_total()).filter_map(|i| self.window(i))
    }

    /// Windows to transmit. An empty file is still sent as one empty
    /// request so the server issues an upload id.
    pub fn upload_windows(&self) -> Vec<Chunk> {
        if self.total_size == 0 {
            return vec![Chunk {
                index: 0,
                start: 0,
                end: 0,
            }];
        }
        self.iter().collect()
    }
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads planned windows out of a seekable source.
pub struct ChunkReader<R> {
    inner: R,
    position: u64,
}

impl ChunkReader<tokio::fs::File> {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(file))
    }
}

impl<R: AsyncRead + AsyncSeek + Unpin> ChunkReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Reads exactly the bytes of `chunk`.
    ///
    /// A source shorter than the window is an error; no partial window is
    /// returned.
    pub async fn read_chunk(&mut self, chunk: &Chunk) -> Result<Vec<u8>, TransferError> {
        if self.position != chunk.start {
            self.inner.seek(SeekFrom::Start(chunk.start)).await?;
            self.position = chunk.start;
        }

        let mut buf = vec![0u8; chunk.len() as usize];
        read_window(&mut self.inner, &mut buf, chunk.start).await?;
        self.position = chunk.end;
        Ok(buf)
    }
}

/// Fills `buf` completely, mapping a premature EOF to [`TransferError::ShortRead`].
pub(crate) async fn read_window<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
    offset: u64,
) -> Result<(), TransferError> {
    match reader.read_exact(buf).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransferError::ShortRead {
            offset,
            expected: buf.len() as u64,
        }),
        Err(e) => Err(e.into()),
    }
}
