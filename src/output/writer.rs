//! Streaming writes of saved response bodies

use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Size of each write issued while saving a body
pub const CHUNK_SIZE: usize = 2048;

/// Writes `body` to `path` in binary chunks, replacing any existing file
///
/// Missing parent directories are created. Returns the number of bytes written.
pub async fn write_body(path: &Path, body: &[u8]) -> std::io::Result<u64> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = File::create(path).await?;
    let mut written = 0u64;
    for chunk in body.chunks(CHUNK_SIZE) {
        file.write_all(chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_body_is_byte_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blob.bin");

        // Larger than one chunk and not valid UTF-8
        let body: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8 | 0x80).collect();
        let written = write_body(&path, &body).await.unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(std::fs::read(&path).unwrap(), body);
    }

    #[tokio::test]
    async fn test_write_body_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");

        write_body(&path, b"a much longer first body").await.unwrap();
        write_body(&path, b"short").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_write_body_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("c.txt");

        write_body(&path, b"nested").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"nested");
    }

    #[tokio::test]
    async fn test_write_body_reports_errors() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened as a file
        assert!(write_body(dir.path(), b"nope").await.is_err());
    }
}
