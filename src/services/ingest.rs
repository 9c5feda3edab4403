//! Streaming ingestion pipeline.
//!
//! An upload is admitted against the size ceiling and the volume's free space,
//! written chunk by chunk to a freshly reserved name under the storage root, and
//! hashed by a separate full re-read once the write is closed. Any failure,
//! including the caller dropping the future mid-stream, unlinks the partial file.

use crate::config::StorageConfig;
use crate::models::StoredFile;
use crate::services::error::{Result, StorageError};
use crate::services::space::{SpaceLedger, SpaceProbe, SpaceReservation};
use crate::utils::hash::hash_file;
use crate::utils::keyed_mutex::KeyedMutex;
use crate::utils::naming::{base_name_or_default, candidate_name};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct IngestService {
    config: StorageConfig,
    probe: Arc<dyn SpaceProbe>,
    ledger: SpaceLedger,
    name_locks: KeyedMutex,
}

impl IngestService {
    pub fn new(config: StorageConfig, probe: Arc<dyn SpaceProbe>) -> Self {
        Self {
            config,
            probe,
            ledger: SpaceLedger::new(),
            name_locks: KeyedMutex::new(),
        }
    }

    /// Bytes currently promised to in-flight uploads.
    pub fn promised_bytes(&self) -> u64 {
        self.ledger.promised()
    }

    /// Streams `reader` into the storage root under a name derived from
    /// `filename_hint` and returns the committed file with its SHA-256.
    ///
    /// `declared_size` is advisory: it allows early rejection, but the ceiling
    /// is enforced on the bytes actually received.
    pub async fn ingest<R>(
        &self,
        filename_hint: &str,
        declared_size: Option<u64>,
        mut reader: R,
    ) -> Result<StoredFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        let limit = self.config.size_limit();

        // 1. Pre-flight size check
        if let (Some(declared), Some(limit)) = (declared_size, limit) {
            if declared > limit {
                warn!(
                    "Rejecting '{}': declared size {} exceeds limit {}",
                    filename_hint, declared, limit
                );
                return Err(StorageError::TooLarge { limit });
            }
        }

        // 2. Pre-flight space check, held as a promise until the session ends
        let _reservation = self.admit(declared_size, limit).await?;

        // 3. Collision-safe destination
        let base = base_name_or_default(filename_hint);
        let (name, mut partial) = self.reserve_destination(&base).await?;
        info!("Receiving upload '{}' into '{}'", filename_hint, name);

        // 4 + 5. Stream with live enforcement, close, then hash by re-reading
        let outcome = async {
            let written = self.copy_with_limits(&mut reader, &mut partial, limit).await?;
            partial.close().await?;
            let content_hash = hash_file(partial.path(), self.config.chunk_size()).await?;
            Ok::<_, StorageError>((written, content_hash))
        }
        .await;

        match outcome {
            Ok((size_bytes, content_hash)) => {
                partial.keep();
                info!(
                    "Stored '{}' ({} bytes, sha256={})",
                    name, size_bytes, content_hash
                );
                Ok(StoredFile {
                    name,
                    size_bytes,
                    content_hash,
                })
            }
            Err(e) => {
                // 6. Cleanup before the error is surfaced
                partial.discard().await;
                Err(e)
            }
        }
    }

    async fn admit(
        &self,
        declared_size: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Option<SpaceReservation>> {
        let expected = declared_size
            .filter(|&d| d > 0)
            .or(limit)
            .unwrap_or(0);
        if expected == 0 {
            return Ok(None);
        }

        let margin = self.config.safety_margin;
        let available = self
            .probe
            .available_space(&self.config.upload_dir)
            .await?;

        self.ledger
            .try_reserve(expected, available, margin)
            .map(Some)
            .map_err(|headroom| {
                warn!(
                    "Insufficient space: {} bytes unpromised, {} needed (margin {})",
                    headroom, expected, margin
                );
                StorageError::InsufficientSpace {
                    available: headroom,
                    required: expected.saturating_add(margin),
                }
            })
    }

    /// Picks the first free candidate for `base` and creates it exclusively.
    ///
    /// The returned file is already guarded, so no await point exists at which
    /// a created destination is unowned.
    async fn reserve_destination(&self, base: &str) -> Result<(String, PartialFile)> {
        let guard = self.name_locks.lock(base).await;

        let mut attempt = 0u32;
        let reserved = loop {
            let name = candidate_name(base, attempt);
            let path = self.config.upload_dir.join(&name);
            match PendingCreate::start(path.clone()).finish().await {
                Ok(file) => break Ok((name, PartialFile::new(path, file))),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("'{}' is taken, trying next suffix", name);
                    attempt += 1;
                }
                Err(e) => break Err(StorageError::Io(e)),
            }
        };

        drop(guard);
        self.name_locks.cleanup();
        reserved
    }

    async fn copy_with_limits<R>(
        &self,
        reader: &mut R,
        partial: &mut PartialFile,
        limit: Option<u64>,
    ) -> Result<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let margin = self.config.safety_margin;
        let mut buffer = vec![0u8; self.config.chunk_size()];
        let mut written: u64 = 0;

        loop {
            let n = read_chunk(reader, &mut buffer).await?;
            if n == 0 {
                break;
            }
            written += n as u64;

            if let Some(limit) = limit.filter(|&l| written > l) {
                warn!(
                    "Upload into '{}' exceeded limit of {} bytes",
                    partial.path().display(),
                    limit
                );
                return Err(StorageError::TooLarge { limit });
            }

            if margin > 0 {
                let available = self
                    .probe
                    .available_space(&self.config.upload_dir)
                    .await?;
                if available < margin {
                    warn!(
                        "Free space dropped to {} bytes (margin {}) while writing '{}'",
                        available,
                        margin,
                        partial.path().display()
                    );
                    return Err(StorageError::InsufficientSpace {
                        available,
                        required: margin,
                    });
                }
            }

            partial.write_all(&buffer[..n]).await?;
        }

        Ok(written)
    }
}

/// Fills `buf` from `reader`, stopping early only at end of stream.
async fn read_chunk<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Exclusive create running on the blocking pool.
///
/// If dropped before `finish` observes the result, the create may still land
/// on disk, so a detached task waits for it and unlinks what it produced.
struct PendingCreate {
    path: PathBuf,
    handle: Option<JoinHandle<std::io::Result<std::fs::File>>>,
}

impl PendingCreate {
    fn start(path: PathBuf) -> Self {
        let target = path.clone();
        let handle = tokio::task::spawn_blocking(move || {
            std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(target)
        });
        Self {
            path,
            handle: Some(handle),
        }
    }

    async fn finish(mut self) -> std::io::Result<File> {
        let joined = match self.handle.as_mut() {
            Some(handle) => handle.await,
            None => return Err(std::io::Error::other("create already finished")),
        };
        // Ownership of the outcome moves to the caller from here on
        self.handle = None;
        match joined {
            Ok(opened) => opened.map(File::from_std),
            Err(e) => Err(std::io::Error::other(e)),
        }
    }
}

impl Drop for PendingCreate {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let path = std::mem::take(&mut self.path);
        let reap_path = path.clone();
        let reap = async move {
            let path = reap_path;
            // Only a create that succeeded is ours to remove
            if let Ok(Ok(file)) = handle.await {
                drop(file);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => warn!(
                        "Upload aborted during reservation, removed '{}'",
                        path.display()
                    ),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => error!(
                        "Failed to remove abandoned reservation '{}': {}",
                        path.display(),
                        e
                    ),
                }
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(reap);
            }
            Err(_) => error!(
                "No runtime to clean up abandoned reservation '{}'",
                path.display()
            ),
        }
    }
}

/// Destination file that is unlinked unless explicitly kept.
struct PartialFile {
    path: PathBuf,
    file: Option<File>,
    armed: bool,
}

impl PartialFile {
    fn new(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file: Some(file),
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn write_all(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(chunk).await,
            None => Err(std::io::Error::other("destination already closed")),
        }
    }

    /// Flushes outstanding writes and releases the handle.
    async fn close(&mut self) -> std::io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        Ok(())
    }

    fn keep(mut self) {
        self.armed = false;
    }

    async fn discard(mut self) {
        self.armed = false;
        if let Some(mut file) = self.file.take() {
            let _ = file.flush().await;
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!("Removed partial upload '{}'", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!(
                "Failed to remove partial upload '{}': {}",
                self.path.display(),
                e
            ),
        }
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Reached when the upload future is dropped mid-stream
        drop(self.file.take());
        match std::fs::remove_file(&self.path) {
            Ok(()) => warn!("Upload aborted, removed '{}'", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!(
                "Failed to remove aborted upload '{}': {}",
                self.path.display(),
                e
            ),
        }
    }
}
