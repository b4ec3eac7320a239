//! # Recording Sink
//!
//! The durable side of a call: one append-only file per token collecting
//! every inbound audio frame in arrival order.

use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Append-only recording of one call's inbound audio.
///
/// Exactly one sink exists per session and only the inbound recorder writes
/// to it. Opening replaces any artifact left behind by an earlier call that
/// used the same token.
#[derive(Debug)]
pub struct RecordingSink {
    file: File,
    path: PathBuf,
    bytes_written: u64,
    frames_written: u64,
}

impl RecordingSink {
    /// Open the recording for `token` under `dir`.
    pub async fn create(dir: &Path, token: &str) -> std::io::Result<Self> {
        let path = dir.join(format!("{token}.webm"));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;

        info!(path = %path.display(), "Recording inbound audio");

        Ok(Self {
            file,
            path,
            bytes_written: 0,
            frames_written: 0,
        })
    }

    /// Append one frame's bytes. A zero-length frame is a no-op.
    pub async fn append(&mut self, frame: &[u8]) -> std::io::Result<()> {
        if frame.is_empty() {
            return Ok(());
        }

        self.file.write_all(frame).await?;
        self.bytes_written += frame.len() as u64;
        self.frames_written += 1;
        debug!(bytes = frame.len(), "Appended audio frame");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Flush everything to disk and release the file handle.
    pub async fn finish(mut self) -> std::io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        info!(
            path = %self.path.display(),
            bytes = self.bytes_written,
            frames = self.frames_written,
            "Recording closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn appends_preserve_order_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RecordingSink::create(dir.path(), "abc123").await.unwrap();

        sink.append(b"first-").await.unwrap();
        sink.append(b"").await.unwrap();
        sink.append(b"second").await.unwrap();

        assert_eq!(sink.bytes_written(), 12);
        assert_eq!(sink.frames_written(), 2);

        let path = sink.path().to_path_buf();
        sink.finish().await.unwrap();

        let contents = tokio::fs::read(&path).await.unwrap();
        assert_eq!(contents, b"first-second");
    }

    #[tokio::test]
    async fn reopening_replaces_previous_recording() {
        let dir = tempfile::tempdir().unwrap();

        let mut sink = RecordingSink::create(dir.path(), "tok").await.unwrap();
        sink.append(b"old call").await.unwrap();
        sink.finish().await.unwrap();

        let sink = RecordingSink::create(dir.path(), "tok").await.unwrap();
        let path = sink.path().to_path_buf();
        sink.finish().await.unwrap();

        let contents = tokio::fs::read(&path).await.unwrap();
        assert!(contents.is_empty());
    }
}
