use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{Backend, Capabilities, WriteSession};
use crate::entry::{Entry, FileEntry, FolderEntry};
use crate::error::{Error, Result};
use crate::remote_path;

const STAGING_SUFFIX: &str = ".cloudbackup-part";

/// Backend over a local directory. Remote paths are resolved below `root`;
/// a leading `/` is ignored.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            root: path.as_ref().to_path_buf(),
        }
    }

    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| Error::io(&root.display().to_string(), "create root", e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a remote path below `root`. Parent directory segments are
    /// rejected so no path can leave the root.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        let mut full = self.root.clone();
        for segment in path.split(remote_path::SEPARATOR) {
            match segment {
                "" | "." => {}
                ".." => return Err(Error::msg(format!("path leaves the backend root: {path}"))),
                segment => full.push(segment),
            }
        }
        Ok(full)
    }
}

fn is_staging(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

fn file_entry(name: &str, parent: &str, meta: &std::fs::Metadata) -> FileEntry {
    let modified = meta
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_default();
    let created = meta
        .created()
        .map(DateTime::<Utc>::from)
        .unwrap_or(modified);
    FileEntry::new(name, parent, created, modified)
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming_write: true,
            create_dir: true,
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.full_path(path)?;
        tokio::fs::try_exists(&full)
            .await
            .map_err(|e| Error::backend(format!("failed to stat: {}", full.display()), e))
    }

    /// Folders are removed together with their contents.
    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.full_path(path)?;
        let meta = match tokio::fs::symlink_metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::io(path, "stat", e)),
        };
        let removed = if meta.is_dir() {
            tokio::fs::remove_dir_all(&full).await
        } else {
            tokio::fs::remove_file(&full).await
        };
        removed.map_err(|e| Error::io(path, "delete", e))?;
        debug!(path, "deleted");
        Ok(())
    }

    async fn dirs(&self, path: &str, recursive: bool) -> Result<Vec<Entry>> {
        let mut entries = Vec::new();
        let mut pending = vec![remote_path::normalize(path).to_string()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(self.full_path(&dir)?)
                .await
                .map_err(|e| Error::io(&dir, "list", e))?;
            while let Some(item) = read_dir
                .next_entry()
                .await
                .map_err(|e| Error::io(&dir, "list", e))?
            {
                let Some(name) = item.file_name().to_str().map(str::to_string) else {
                    warn!(dir = %dir, "skipping entry with non UTF-8 name");
                    continue;
                };
                if is_staging(&name) {
                    continue;
                }
                let meta = item
                    .metadata()
                    .await
                    .map_err(|e| Error::io(&remote_path::join(&dir, &name), "stat", e))?;
                if meta.is_dir() {
                    let folder = FolderEntry::new(name, &dir);
                    if recursive {
                        pending.push(folder.full_path());
                    }
                    entries.push(folder.into());
                } else if meta.is_file() {
                    entries.push(file_entry(&name, &dir, &meta).into());
                }
            }
        }

        entries.sort_by_key(|e: &Entry| e.full_path());
        debug!(path, recursive, items = entries.len(), "listed");
        Ok(entries)
    }

    async fn chunk(
        &self,
        path: &str,
        filename: &str,
        size: u64,
        offset: u64,
    ) -> Result<(FileEntry, Bytes)> {
        let remote = remote_path::join(path, filename);
        let mut file = tokio::fs::File::open(self.full_path(&remote)?)
            .await
            .map_err(|e| Error::io(&remote, "open", e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| Error::io(&remote, "stat", e))?;
        if !meta.is_file() {
            return Err(Error::msg(format!("not a file: {remote}")));
        }

        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| Error::io(&remote, "seek", e))?;
        let mut content = Vec::new();
        file.take(size)
            .read_to_end(&mut content)
            .await
            .map_err(|e| Error::io(&remote, "read", e))?;

        debug!(path = %remote, offset, size, read = content.len(), "chunk read");
        Ok((file_entry(filename, path, &meta), Bytes::from(content)))
    }

    /// Data is staged in a hidden file next to the target and renamed over it
    /// on close, replacing any existing file.
    async fn open(&self, path: &str) -> Result<Box<dyn WriteSession>> {
        let (parent, name) = remote_path::split(path);
        if name.is_empty() {
            return Err(Error::msg("cannot write to the root directory"));
        }
        let target = self.full_path(path)?;
        let dir = self.full_path(parent)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(parent, "create directory", e))?;

        let staging = dir.join(format!(".{name}.{}{STAGING_SUFFIX}", uuid::Uuid::new_v4()));
        let file = tokio::fs::File::create(&staging)
            .await
            .map_err(|e| Error::io(path, "create", e))?;

        Ok(Box::new(LocalWriteSession {
            remote: path.to_string(),
            target,
            staging,
            file: Some(file),
            offset: 0,
            committed: false,
        }))
    }

    /// Idempotent: an existing directory is not an error.
    async fn create_dir(&self, path: &str) -> Result<()> {
        tokio::fs::create_dir_all(self.full_path(path)?)
            .await
            .map_err(|e| Error::io(path, "create directory", e))
    }
}

pub struct LocalWriteSession {
    remote: String,
    target: PathBuf,
    staging: PathBuf,
    file: Option<tokio::fs::File>,
    offset: u64,
    committed: bool,
}

#[async_trait]
impl WriteSession for LocalWriteSession {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::msg(format!("write session already closed: {}", self.remote)))?;
        file.write_all(data)
            .await
            .map_err(|e| Error::io(&self.remote, "write", e))?;
        file.flush()
            .await
            .map_err(|e| Error::io(&self.remote, "write", e))?;
        self.offset += data.len() as u64;
        Ok(())
    }

    fn offset(&self) -> u64 {
        self.offset
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        if let Some(file) = this.file.take() {
            file.sync_all()
                .await
                .map_err(|e| Error::io(&this.remote, "sync", e))?;
        }
        this.committed = true;
        tokio::fs::rename(&this.staging, &this.target)
            .await
            .map_err(|e| Error::io(&this.remote, "commit", e))?;
        info!(path = %this.remote, bytes = this.offset, "write session committed");
        Ok(())
    }
}

impl Drop for LocalWriteSession {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        warn!(path = %self.remote, "write session dropped without close, committing");
        drop(self.file.take());
        if let Err(e) = std::fs::rename(&self.staging, &self.target) {
            warn!(path = %self.remote, error = %e, "commit on drop failed");
        }
    }
}
