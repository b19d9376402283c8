use bytes::Bytes;
use moka::future::Cache;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::domain::tts::CacheKey;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to prepare cache directory {path}: {source}")]
    Init { path: PathBuf, source: io::Error },
    #[error("cache I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("refusing to cache an empty blob for {0}")]
    EmptyBlob(String),
    #[error("cache write task failed: {0}")]
    Task(String),
}

/// Write `data` to `path` through a temporary file in the same directory and an
/// atomic rename, so readers see either nothing or the complete file.
pub async fn write_atomic(path: &Path, data: Bytes) -> Result<(), CacheError> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let path = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> io::Result<()> {
        let mut pending = tempfile::Builder::new()
            .prefix(".pending-")
            .suffix(".mp3")
            .tempfile_in(&dir)?;
        pending.write_all(&data)?;
        pending.as_file().sync_all()?;
        pending.persist(&path).map_err(|err| err.error)?;
        Ok(())
    })
    .await
    .map_err(|e| CacheError::Task(e.to_string()))??;

    Ok(())
}

/// Two-tier content-addressed store for synthesized audio.
///
/// Entries are immutable: the text/voice/rate mapping never changes, so
/// nothing is invalidated except zero-byte files left behind by a crash.
pub struct AudioStore {
    dir: PathBuf,
    memory: Cache<CacheKey, Bytes>,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, memory_capacity: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CacheError::Init {
            path: dir.clone(),
            source,
        })?;

        Ok(Self {
            dir,
            memory: Cache::builder().max_capacity(memory_capacity).build(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    pub async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        if let Some(hit) = self.memory.get(key).await {
            tracing::debug!(cache_key = %key, tier = "memory", "Audio cache hit");
            return Ok(Some(hit));
        }

        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(data) if data.is_empty() => {
                tracing::warn!(
                    cache_key = %key,
                    path = %path.display(),
                    "Zero-byte cache entry found; deleting for regeneration"
                );
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                }
                Ok(None)
            }
            Ok(data) => {
                let data = Bytes::from(data);
                self.memory.insert(key.clone(), data.clone()).await;
                tracing::debug!(cache_key = %key, tier = "disk", "Audio cache hit");
                Ok(Some(data))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn put(&self, key: &CacheKey, data: Bytes) -> Result<(), CacheError> {
        if data.is_empty() {
            return Err(CacheError::EmptyBlob(key.to_string()));
        }

        write_atomic(&self.path_for(key), data.clone()).await?;
        self.memory.insert(key.clone(), data).await;
        tracing::debug!(cache_key = %key, "Audio cached");
        Ok(())
    }

    pub async fn exists(&self, key: &CacheKey) -> bool {
        if self.memory.contains_key(key) {
            return true;
        }

        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(metadata) => metadata.len() > 0,
            Err(_) => false,
        }
    }
}
