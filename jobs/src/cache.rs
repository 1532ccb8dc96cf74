//! On-disk audio cache.

use std::path::{Path, PathBuf};

use tokio::fs;

/// Directory-backed blob store for synthesized segment audio.
///
/// File names are deterministic (`{job_id}-seg-{index}.{ext}`), so lookup
/// needs no secondary index. Files are written whole, once, by the
/// executor, and deleted together with their job.
#[derive(Clone)]
pub struct AudioCache {
    dir: PathBuf,
}

impl AudioCache {
    /// Creates the cache, ensuring the directory exists.
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Resolves a cache file name to its on-disk path.
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Whole-file write. Segment identity is unique per job, so there are
    /// never two writers for the same name.
    pub async fn write(&self, file_name: &str, bytes: &[u8]) -> std::io::Result<()> {
        fs::write(self.path(file_name), bytes).await
    }

    /// Opens a cache file for streaming, with its size.
    ///
    /// Returns `None` if the file does not exist yet - a client can poll
    /// between record creation and the executor's write, and gets "not
    /// found" rather than blocking.
    pub async fn open(&self, file_name: &str) -> std::io::Result<Option<(fs::File, u64)>> {
        match fs::File::open(self.path(file_name)).await {
            Ok(file) => {
                let size = file.metadata().await?.len();
                Ok(Some((file, size)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deletes a cache file. A missing file is not an error.
    pub async fn delete(&self, file_name: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Whether a cache file currently exists.
    pub fn exists(&self, file_name: &str) -> bool {
        self.path(file_name).exists()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
