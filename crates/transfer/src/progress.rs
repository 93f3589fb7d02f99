/// Acknowledged-bytes progress of one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub bytes_acked: u64,
    pub total_bytes: u64,
}

impl Progress {
    pub fn new(bytes_acked: u64, total_bytes: u64) -> Self {
        Self {
            bytes_acked,
            total_bytes,
        }
    }

    /// Fraction in `[0, 1]`. An empty file counts as done once acked.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_acked as f64 / self.total_bytes as f64).min(1.0)
    }

    /// Whole percent, truncated (a progress bar never shows 100 early).
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        (self.bytes_acked.min(self.total_bytes) * 100 / self.total_bytes) as u8
    }

    pub fn is_done(&self) -> bool {
        self.bytes_acked >= self.total_bytes
    }
}
