//! Chunk Store — the on-disk layer.
//!
//! Owns the directory layout `{root}/{session}/chunks/shard_{NNNN}/{index}`
//! plus `{root}/{session}/completed/`. No other component writes under the
//! storage root.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use wavecap_core::error::CoreError;
use wavecap_core::identifier::validate_session_id;

/// Chunks above 1000 live in the next shard directory, keeping any one
/// directory's entry count bounded.
const SHARD_SIZE: u32 = 1000;

#[derive(Clone)]
pub struct ChunkStore {
    root: PathBuf,
    session_identifier_alphabet: String,
}

impl ChunkStore {
    pub fn new(root: PathBuf, session_identifier_alphabet: String) -> Self {
        Self {
            root,
            session_identifier_alphabet,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn validated(&self, session_id: &str) -> Result<(), CoreError> {
        validate_session_id(session_id, &self.session_identifier_alphabet)
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    fn shard_dir(&self, session_id: &str, index: u32) -> PathBuf {
        self.session_dir(session_id)
            .join("chunks")
            .join(format!("shard_{:04}", index / SHARD_SIZE))
    }

    fn chunk_path(&self, session_id: &str, index: u32) -> PathBuf {
        self.shard_dir(session_id, index).join(index.to_string())
    }

    fn completed_dir(&self, session_id: &str) -> PathBuf {
        self.session_dir(session_id).join("completed")
    }

    /// Creates the shard directory if absent and returns the path the chunk
    /// will live at. Idempotent.
    pub async fn ensure_chunk_slot(&self, session_id: &str, index: u32) -> Result<PathBuf, CoreError> {
        self.validated(session_id)?;
        let dir = self.shard_dir(session_id, index);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::io(&dir, e))?;
        Ok(self.chunk_path(session_id, index))
    }

    /// Returns the on-disk size of a chunk, or `None` if it has never been
    /// started.
    pub async fn size_of(&self, session_id: &str, index: u32) -> Result<Option<u64>, CoreError> {
        self.validated(session_id)?;
        let path = self.chunk_path(session_id, index);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::io(&path, e)),
        }
    }

    /// Writes `bytes` at `offset`. Fails with `OffsetMismatch` if the current
    /// on-disk size is not exactly `offset`. Returns the new size.
    pub async fn append_at(
        &self,
        session_id: &str,
        index: u32,
        offset: u64,
        bytes: &[u8],
    ) -> Result<u64, CoreError> {
        self.validated(session_id)?;
        self.ensure_chunk_slot(session_id, index).await?;
        let path = self.chunk_path(session_id, index);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .await
            .map_err(|e| CoreError::io(&path, e))?;

        let current_size = file
            .metadata()
            .await
            .map_err(|e| CoreError::io(&path, e))?
            .len();
        if current_size != offset {
            return Err(CoreError::OffsetMismatch {
                actual_offset: current_size,
            });
        }

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| CoreError::io(&path, e))?;
        file.write_all(bytes).await.map_err(|e| {
            if e.raw_os_error() == Some(libc_enospc()) {
                CoreError::StorageFull
            } else {
                CoreError::io(&path, e)
            }
        })?;
        file.sync_all().await.map_err(|e| CoreError::io(&path, e))?;

        Ok(offset + bytes.len() as u64)
    }

    /// Writes the full chunk content in one shot, truncating whatever was
    /// there before. Used by the multipart fallback verb, which always
    /// writes at offset 0 regardless of any partial resumable append.
    pub async fn write_full(&self, session_id: &str, index: u32, bytes: &[u8]) -> Result<u64, CoreError> {
        self.validated(session_id)?;
        self.ensure_chunk_slot(session_id, index).await?;
        let path = self.chunk_path(session_id, index);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await
            .map_err(|e| CoreError::io(&path, e))?;
        file.write_all(bytes).await.map_err(|e| {
            if e.raw_os_error() == Some(libc_enospc()) {
                CoreError::StorageFull
            } else {
                CoreError::io(&path, e)
            }
        })?;
        file.sync_all().await.map_err(|e| CoreError::io(&path, e))?;

        Ok(bytes.len() as u64)
    }

    /// Reads the full content of one chunk (used during assembly).
    pub async fn read_chunk(&self, session_id: &str, index: u32) -> Result<Vec<u8>, CoreError> {
        self.validated(session_id)?;
        let path = self.chunk_path(session_id, index);
        tokio::fs::read(&path).await.map_err(|e| CoreError::io(&path, e))
    }

    /// Streams one chunk's bytes into `sink` using a bounded buffer, without
    /// holding the whole chunk in memory at once.
    pub async fn stream_chunk_into(
        &self,
        session_id: &str,
        index: u32,
        sink: &mut (impl tokio::io::AsyncWrite + Unpin),
        buffer_bytes: usize,
    ) -> Result<u64, CoreError> {
        self.validated(session_id)?;
        let path = self.chunk_path(session_id, index);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| CoreError::io(&path, e))?;
        let mut buf = vec![0u8; buffer_bytes.max(4096)];
        let mut total = 0u64;
        loop {
            let n = file.read(&mut buf).await.map_err(|e| CoreError::io(&path, e))?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])
                .await
                .map_err(|e| CoreError::io(&path, e))?;
            total += n as u64;
        }
        Ok(total)
    }

    /// Streams the byte range `[start, end)` of one chunk into `sink`. Used
    /// by range-style reads (e.g. resuming a partial download of a chunk)
    /// without holding the range in memory at once.
    pub async fn stream_range(
        &self,
        session_id: &str,
        index: u32,
        start: u64,
        end: u64,
        sink: &mut (impl tokio::io::AsyncWrite + Unpin),
        buffer_bytes: usize,
    ) -> Result<u64, CoreError> {
        self.validated(session_id)?;
        if end < start {
            return Err(CoreError::BadIdentifier(format!(
                "invalid range [{start}, {end})"
            )));
        }
        let path = self.chunk_path(session_id, index);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| CoreError::io(&path, e))?;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| CoreError::io(&path, e))?;

        let mut remaining = end - start;
        let mut buf = vec![0u8; buffer_bytes.max(4096)];
        let mut total = 0u64;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = file
                .read(&mut buf[..want])
                .await
                .map_err(|e| CoreError::io(&path, e))?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n])
                .await
                .map_err(|e| CoreError::io(&path, e))?;
            total += n as u64;
            remaining -= n as u64;
        }
        Ok(total)
    }

    /// Ordered (index, size) pairs for every chunk currently on disk.
    pub async fn list_session(&self, session_id: &str) -> Result<Vec<(u32, u64)>, CoreError> {
        self.validated(session_id)?;
        let chunks_dir = self.session_dir(session_id).join("chunks");
        let mut out = Vec::new();
        let mut shard_entries = match tokio::fs::read_dir(&chunks_dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(CoreError::io(&chunks_dir, e)),
        };
        while let Some(shard) = shard_entries
            .next_entry()
            .await
            .map_err(|e| CoreError::io(&chunks_dir, e))?
        {
            let shard_path = shard.path();
            if !shard_path.is_dir() {
                continue;
            }
            let mut entries = tokio::fs::read_dir(&shard_path)
                .await
                .map_err(|e| CoreError::io(&shard_path, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| CoreError::io(&shard_path, e))?
            {
                let file_name = entry.file_name();
                let Some(index_str) = file_name.to_str() else {
                    continue;
                };
                let Ok(index) = index_str.parse::<u32>() else {
                    continue;
                };
                let size = entry
                    .metadata()
                    .await
                    .map_err(|e| CoreError::io(entry.path(), e))?
                    .len();
                out.push((index, size));
            }
        }
        out.sort_by_key(|(index, _)| *index);
        Ok(out)
    }

    /// Best-effort recursive removal of the chunks subtree only. Never
    /// touches the completed directory.
    pub async fn delete_session_chunks(&self, session_id: &str) -> Result<(), CoreError> {
        self.validated(session_id)?;
        let chunks_dir = self.session_dir(session_id).join("chunks");
        match tokio::fs::remove_dir_all(&chunks_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::io(&chunks_dir, e)),
        }
    }

    /// Removes the whole session subtree (chunks and completed artifact).
    /// Used by cancel.
    pub async fn delete_session(&self, session_id: &str) -> Result<(), CoreError> {
        self.validated(session_id)?;
        let dir = self.session_dir(session_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::io(&dir, e)),
        }
    }

    /// Writes `content` into a temp file under the completed directory, then
    /// atomically renames it to `name`.
    pub async fn publish_completed_file(
        &self,
        session_id: &str,
        name: &str,
        content_path: &Path,
    ) -> Result<PathBuf, CoreError> {
        self.validated(session_id)?;
        let dir = self.completed_dir(session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::io(&dir, e))?;
        let final_path = dir.join(name);
        tokio::fs::rename(content_path, &final_path)
            .await
            .map_err(|e| CoreError::io(&final_path, e))?;
        Ok(final_path)
    }

    /// Opens a fresh temp file in the completed directory for streaming
    /// assembly output into, before the final atomic rename.
    pub async fn open_completed_temp(
        &self,
        session_id: &str,
    ) -> Result<(PathBuf, tokio::fs::File), CoreError> {
        self.validated(session_id)?;
        let dir = self.completed_dir(session_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CoreError::io(&dir, e))?;
        let temp_path = dir.join(format!(".assembling-{}", wavecap_core::session::now_ms()));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(|e| CoreError::io(&temp_path, e))?;
        Ok((temp_path, file))
    }

    pub fn completed_artifact_path(&self, session_id: &str, name: &str) -> PathBuf {
        self.completed_dir(session_id).join(name)
    }

    pub async fn remove_file_best_effort(&self, path: &Path) {
        let _ = tokio::fs::remove_file(path).await;
    }
}

fn libc_enospc() -> i32 {
    28 // ENOSPC, stable across the Linux/BSD targets this server runs on
}
