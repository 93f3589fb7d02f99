use md5::{Digest, Md5};
use tokio::io::AsyncRead;
use tracing::debug;

use crate::chunked::{Chunk, ChunkPlan, read_window};
use crate::types::UploadFile;
use crate::TransferError;

/// Computes MD5 of `data` and returns the hex-encoded digest.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Running MD5 context fed window by window.
///
/// Windows must arrive in ascending index order; anything else would
/// corrupt the digest and is rejected.
pub struct Md5Accumulator {
    ctx: Md5,
    next_index: usize,
}

impl Default for Md5Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Md5Accumulator {
    pub fn new() -> Self {
        Self {
            ctx: Md5::new(),
            next_index: 0,
        }
    }

    /// Appends the bytes of `chunk`.
    pub fn append(&mut self, chunk: &Chunk, data: &[u8]) -> Result<(), TransferError> {
        if chunk.index != self.next_index {
            return Err(TransferError::OutOfOrder {
                expected: self.next_index,
                got: chunk.index,
            });
        }
        self.ctx.update(data);
        self.next_index += 1;
        Ok(())
    }

    /// Finalizes into a lowercase hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.ctx.finalize())
    }
}

/// Hashes a file by reading it in fixed-size windows.
#[derive(Debug, Clone, Copy)]
pub struct ChunkHasher {
    chunk_size: usize,
}

impl ChunkHasher {
    /// Creates a hasher reading `chunk_size` bytes per window.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    /// Hashes `total_size` bytes from `reader`.
    ///
    /// Any read failure aborts the computation and no digest is returned.
    pub async fn hash_reader<R: AsyncRead + Unpin>(
        &self,
        mut reader: R,
        total_size: u64,
    ) -> Result<String, TransferError> {
        let plan = ChunkPlan::new(total_size, self.chunk_size);
        let mut acc = Md5Accumulator::new();
        let mut buf = vec![0u8; plan.chunk_size().min(total_size) as usize];

        for chunk in plan.iter() {
            let window = &mut buf[..chunk.len() as usize];
            read_window(&mut reader, window, chunk.start).await?;
            acc.append(&chunk, window)?;
        }

        Ok(acc.finish())
    }

    /// Hashes the whole of `file`.
    pub async fn hash_file(&self, file: &UploadFile) -> Result<String, TransferError> {
        let handle = tokio::fs::File::open(&file.path).await?;
        let digest = self.hash_reader(handle, file.size).await?;
        debug!(file = %file.name, size = file.size, md5 = %digest, "hash complete");
        Ok(digest)
    }
}
