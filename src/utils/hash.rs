use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

pub fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// SHA-256 of everything `reader` yields, read `chunk_size` bytes at a time.
pub async fn calculate_hash_from_reader<R: AsyncRead + Unpin>(
    mut reader: R,
    chunk_size: usize,
) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Full sequential re-read of the file at `path`.
pub async fn hash_file(path: &Path, chunk_size: usize) -> std::io::Result<String> {
    let file = tokio::fs::File::open(path).await?;
    calculate_hash_from_reader(file, chunk_size).await
}
