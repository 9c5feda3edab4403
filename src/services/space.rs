//! Free-space probing and admission accounting for the storage volume.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Reports how many bytes are still available on the volume holding `path`.
#[async_trait]
pub trait SpaceProbe: Send + Sync {
    async fn available_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Queries the real filesystem (`statvfs` / `GetDiskFreeSpaceEx`).
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeSpaceProbe;

#[async_trait]
impl SpaceProbe for VolumeSpaceProbe {
    async fn available_space(&self, path: &Path) -> std::io::Result<u64> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || fs2::available_space(&path))
            .await
            .map_err(std::io::Error::other)?
    }
}

/// Reports a fixed amount of free space. Lets callers exercise the space
/// checks without filling a real disk.
#[derive(Debug, Clone, Copy)]
pub struct FixedSpaceProbe(pub u64);

#[async_trait]
impl SpaceProbe for FixedSpaceProbe {
    async fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}

/// Bytes promised to uploads that passed admission but may not have written
/// them yet. Subtracted from measured free space before admitting another upload.
#[derive(Debug, Clone, Default)]
pub struct SpaceLedger {
    promised: Arc<Mutex<u64>>,
}

impl SpaceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes currently promised.
    pub fn promised(&self) -> u64 {
        *self.promised.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Promises `bytes` if `available` still covers them plus `margin` after
    /// subtracting everything already promised. The check and the promise are
    /// taken under one lock.
    pub fn try_reserve(
        &self,
        bytes: u64,
        available: u64,
        margin: u64,
    ) -> Result<SpaceReservation, u64> {
        let mut promised = self.promised.lock().unwrap_or_else(PoisonError::into_inner);
        let headroom = available.saturating_sub(*promised);
        if headroom < bytes.saturating_add(margin) {
            return Err(headroom);
        }
        *promised += bytes;
        Ok(SpaceReservation {
            ledger: self.clone(),
            bytes,
        })
    }

    fn release(&self, bytes: u64) {
        let mut promised = self.promised.lock().unwrap_or_else(PoisonError::into_inner);
        *promised = promised.saturating_sub(bytes);
    }
}

/// A promise held for the lifetime of one upload session.
#[derive(Debug)]
pub struct SpaceReservation {
    ledger: SpaceLedger,
    bytes: u64,
}

impl Drop for SpaceReservation {
    fn drop(&mut self) {
        self.ledger.release(self.bytes);
    }
}
