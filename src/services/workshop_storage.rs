//! Local disk storage for uploaded workshop files.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::{
    fs::{self, File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::warn;

const FALLBACK_NAME: &str = "upload";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("file exceeds the {0} byte upload limit")]
    TooLarge(u64),
    #[error("upload storage failure: {0}")]
    Io(#[from] std::io::Error),
}

/// File persisted under the storage directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    /// `file://` URL handed out by the download endpoint.
    pub url: String,
    /// Hex SHA-256 of the stored bytes.
    pub checksum: String,
    pub size: u64,
}

/// Streams one upload to disk while hashing it.
pub struct UploadSink {
    file: File,
    path: PathBuf,
    digest: Sha256,
    size: u64,
    max_bytes: u64,
}

/// Keep only the final path component of a client supplied name.
fn sanitize(filename: &str) -> &str {
    Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(FALLBACK_NAME)
}

/// `name`, then `stem_1.ext`, `stem_2.ext` and so on.
fn candidate(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_owned();
    }
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(name);
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{stem}_{attempt}.{ext}"),
        None => format!("{stem}_{attempt}"),
    }
}

impl UploadSink {
    /// Create the target file under `dir`, never overwriting an earlier upload.
    pub async fn create(dir: &Path, filename: &str, max_bytes: u64) -> Result<Self, UploadError> {
        fs::create_dir_all(dir).await?;
        let name = sanitize(filename);
        let mut attempt = 0;
        loop {
            let path = dir.join(candidate(name, attempt));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => {
                    return Ok(Self {
                        file,
                        path,
                        digest: Sha256::new(),
                        size: 0,
                        max_bytes,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.size += chunk.len() as u64;
        if self.size > self.max_bytes {
            return Err(UploadError::TooLarge(self.max_bytes));
        }
        self.digest.update(chunk);
        self.file.write_all(chunk).await?;
        Ok(())
    }

    pub async fn finish(mut self) -> Result<StoredFile, UploadError> {
        self.file.flush().await?;
        let url = format!("file://{}", self.path.display());
        Ok(StoredFile {
            url,
            checksum: hex::encode(self.digest.finalize()),
            size: self.size,
            path: self.path,
        })
    }

    /// Drop a partial upload.
    pub async fn abort(self) {
        let Self { file, path, .. } = self;
        drop(file);
        discard(&path).await;
    }
}

/// Remove a stored file that ended up unused.
pub async fn discard(path: &Path) {
    if let Err(err) = fs::remove_file(path).await {
        warn!(path = %path.display(), error = %err, "failed to remove workshop upload");
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("workshop-storage-{}", Uuid::new_v4()))
    }

    async fn store(dir: &Path, name: &str, bytes: &[u8]) -> StoredFile {
        let mut sink = UploadSink::create(dir, name, 1024).await.unwrap();
        sink.write(bytes).await.unwrap();
        sink.finish().await.unwrap()
    }

    #[tokio::test]
    async fn duplicate_names_get_numbered_suffixes() {
        let dir = scratch_dir();
        let first = store(&dir, "map.tar.gz", b"one").await;
        let second = store(&dir, "map.tar.gz", b"two").await;
        let third = store(&dir, "map.tar.gz", b"three").await;
        assert_eq!(first.path, dir.join("map.tar.gz"));
        assert_eq!(second.path, dir.join("map.tar_1.gz"));
        assert_eq!(third.path, dir.join("map.tar_2.gz"));
        assert_eq!(fs::read(&first.path).await.unwrap(), b"one");
        assert!(second.url.starts_with("file://"));
        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn checksum_is_sha256_of_the_content() {
        let dir = scratch_dir();
        let stored = store(&dir, "notes", b"abc").await;
        assert_eq!(
            stored.checksum,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(stored.size, 3);
        assert_eq!(stored.path, dir.join("notes"));
        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn client_paths_cannot_escape_the_storage_dir() {
        let dir = scratch_dir();
        let stored = store(&dir, "../../etc/passwd", b"x").await;
        assert_eq!(stored.path, dir.join("passwd"));
        let fallback = store(&dir, "", b"x").await;
        assert_eq!(fallback.path, dir.join(FALLBACK_NAME));
        fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn oversized_uploads_stop_at_the_limit() {
        let dir = scratch_dir();
        let mut sink = UploadSink::create(&dir, "big.bin", 4).await.unwrap();
        sink.write(b"1234").await.unwrap();
        assert!(matches!(sink.write(b"5").await, Err(UploadError::TooLarge(4))));
        let path = dir.join("big.bin");
        sink.abort().await;
        assert!(!path.exists());
        fs::remove_dir_all(&dir).await.unwrap();
    }
}
