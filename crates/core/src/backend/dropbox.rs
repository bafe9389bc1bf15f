use async_trait::async_trait;
use bytes::Bytes;
use cloudbackup_dropbox::types::{
    CommitInfo, FileMetadata, Metadata, UploadSessionCursor, WriteMode,
};
use cloudbackup_dropbox::{DropboxClient, DropboxError, FilesClient};
use tracing::{debug, info, warn};

use super::{Backend, Capabilities, WriteSession};
use crate::entry::{Entry, FileEntry, FolderEntry};
use crate::error::{Error, Result};
use crate::remote_path;

/// Backend over the Dropbox HTTP API.
///
/// Only [`Backend::chunk`] is safe to call concurrently on one instance: every
/// call runs on its own range session.
pub struct DropboxBackend {
    client: DropboxClient,
}

impl DropboxBackend {
    pub fn new(access_token: &str) -> Result<Self> {
        let client = DropboxClient::new(access_token)
            .map_err(|e| Error::backend("failed to create Dropbox client", e))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: DropboxClient) -> Self {
        Self { client }
    }

    fn files(&self) -> FilesClient<'_> {
        FilesClient::new(&self.client)
    }

    /// A short-lived client of its own, limited to one byte window of a
    /// download. Dropped (and its connections closed) when the read is done.
    fn range_session(&self, offset: u64, size: u64) -> Result<DropboxClient> {
        self.client
            .range_session(offset, size)
            .map_err(|e| Error::backend("failed to open Dropbox range session", e))
    }

    async fn file_metadata(&self, remote: &str) -> Result<FileMetadata> {
        match self
            .files()
            .get_metadata(&api_path(remote))
            .await
            .map_err(|e| translate(remote, "get_metadata", e))?
        {
            Metadata::File(meta) => Ok(meta),
            _ => Err(Error::msg(format!("not a file: {remote}"))),
        }
    }
}

/// Dropbox addresses the root as `""` and everything else with a leading `/`
/// and no trailing separator.
fn api_path(path: &str) -> String {
    let trimmed = path.trim_matches(remote_path::SEPARATOR);
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn translate(path: &str, operation: &str, err: DropboxError) -> Error {
    if err.is_not_found() {
        Error::not_found(path)
    } else {
        Error::backend(format!("dropbox {operation} failed: {path}"), err)
    }
}

fn display_path<'m>(
    name: &'m str,
    display: &'m Option<String>,
    lower: &'m Option<String>,
) -> &'m str {
    display.as_deref().or(lower.as_deref()).unwrap_or(name)
}

fn file_entry(meta: &FileMetadata, fallback_parent: &str) -> FileEntry {
    let full = display_path(&meta.name, &meta.path_display, &meta.path_lower);
    let parent = if full.contains(remote_path::SEPARATOR) {
        remote_path::split(full).0
    } else {
        remote_path::normalize(fallback_parent)
    };
    FileEntry::new(
        meta.name.clone(),
        parent,
        meta.client_modified,
        meta.client_modified,
    )
}

/// Turn a raw listing into entries, dropping deleted markers and the queried
/// folder itself, which recursive listings report as their first entry.
fn entries_from_listing(query: &str, listing: Vec<Metadata>) -> Vec<Entry> {
    let query = api_path(query).to_lowercase();
    listing
        .into_iter()
        .filter_map(|item| {
            let (full, lower) = match &item {
                Metadata::File(m) => (
                    display_path(&m.name, &m.path_display, &m.path_lower),
                    m.path_lower.clone(),
                ),
                Metadata::Folder(m) => (
                    display_path(&m.name, &m.path_display, &m.path_lower),
                    m.path_lower.clone(),
                ),
                Metadata::Deleted(_) => return None,
            };
            let lower = lower.unwrap_or_else(|| full.to_lowercase());
            if remote_path::same(&lower, &query) {
                return None;
            }
            let parent = remote_path::split(full).0;
            let entry: Entry = match &item {
                Metadata::File(m) => FileEntry::new(
                    m.name.clone(),
                    parent,
                    m.client_modified,
                    m.client_modified,
                )
                .into(),
                Metadata::Folder(m) => FolderEntry::new(m.name.clone(), parent).into(),
                Metadata::Deleted(_) => return None,
            };
            Some(entry)
        })
        .collect()
}

/// Cut the requested window out of a download. A partial (206) body already
/// starts at `offset`; a full (200) body means the range header was ignored.
fn clip_to_window(content: Bytes, size: u64, offset: u64, partial: bool) -> Bytes {
    if partial {
        let end = usize::try_from(size).unwrap_or(usize::MAX).min(content.len());
        return content.slice(..end);
    }
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
    let end = usize::try_from(offset.saturating_add(size))
        .unwrap_or(usize::MAX)
        .min(content.len());
    content.slice(start..end)
}

#[async_trait]
impl Backend for DropboxBackend {
    fn name(&self) -> &'static str {
        "dropbox"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            streaming_write: true,
            create_dir: true,
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let api = api_path(path);
        if api.is_empty() {
            return Ok(true);
        }
        match self.files().get_metadata(&api).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(translate(path, "get_metadata", e)),
        }
    }

    /// Files and folders alike; folders go with their contents.
    async fn delete(&self, path: &str) -> Result<()> {
        match self.files().delete(&api_path(path)).await {
            Ok(_) => {
                debug!(path, "deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(translate(path, "delete", e)),
        }
    }

    async fn dirs(&self, path: &str, recursive: bool) -> Result<Vec<Entry>> {
        let listing = self
            .files()
            .list_folder(&api_path(path), recursive)
            .await
            .map_err(|e| translate(path, "list_folder", e))?;
        Ok(entries_from_listing(path, listing))
    }

    async fn chunk(
        &self,
        path: &str,
        filename: &str,
        size: u64,
        offset: u64,
    ) -> Result<(FileEntry, Bytes)> {
        let remote = remote_path::join(path, filename);
        if size == 0 {
            let meta = self.file_metadata(&remote).await?;
            return Ok((file_entry(&meta, path), Bytes::new()));
        }

        let session = self.range_session(offset, size)?;
        let downloaded = FilesClient::new(&session).download(&api_path(&remote)).await;
        drop(session);

        match downloaded {
            Ok(download) => {
                let content = clip_to_window(download.content, size, offset, download.partial);
                debug!(path = %remote, offset, size, read = content.len(), "chunk read");
                Ok((file_entry(&download.metadata, path), content))
            }
            Err(e) if e.is_range_not_satisfiable() => {
                let meta = self.file_metadata(&remote).await?;
                Ok((file_entry(&meta, path), Bytes::new()))
            }
            Err(e) => Err(translate(&remote, "download", e)),
        }
    }

    /// The upload session starts with the first write; closing commits the
    /// object at `path`, silently replacing an existing file.
    async fn open(&self, path: &str) -> Result<Box<dyn WriteSession>> {
        let api = api_path(path);
        if api.is_empty() {
            return Err(Error::msg("cannot write to the root directory"));
        }
        Ok(Box::new(DropboxWriteSession {
            client: self.client.clone(),
            commit: CommitInfo {
                path: api,
                mode: WriteMode::Overwrite,
                autorename: false,
                mute: true,
            },
            cursor: None,
            committed: false,
        }))
    }

    /// Fails when the folder already exists.
    async fn create_dir(&self, path: &str) -> Result<()> {
        self.files()
            .create_folder(&api_path(path))
            .await
            .map_err(|e| translate(path, "create_folder", e))?;
        info!(path, "folder created");
        Ok(())
    }
}

pub struct DropboxWriteSession {
    client: DropboxClient,
    commit: CommitInfo,
    cursor: Option<UploadSessionCursor>,
    committed: bool,
}

impl DropboxWriteSession {
    fn translate(&self, operation: &str, err: DropboxError) -> Error {
        translate(&self.commit.path, operation, err)
    }
}

#[async_trait]
impl WriteSession for DropboxWriteSession {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let files = FilesClient::new(&self.client);
        if let Some(cursor) = self.cursor.as_mut() {
            files
                .upload_session_append(cursor, data.to_vec())
                .await
                .map_err(|e| translate(&self.commit.path, "upload_session/append", e))?;
            cursor.offset += data.len() as u64;
            return Ok(());
        }
        let cursor = files
            .upload_session_start(data.to_vec())
            .await
            .map_err(|e| translate(&self.commit.path, "upload_session/start", e))?;
        self.cursor = Some(cursor);
        Ok(())
    }

    fn offset(&self) -> u64 {
        self.cursor.as_ref().map_or(0, |c| c.offset)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.committed = true;
        let cursor = this.cursor.take();
        let files = FilesClient::new(&this.client);
        let cursor = match cursor {
            Some(cursor) => cursor,
            None => files
                .upload_session_start(Vec::new())
                .await
                .map_err(|e| this.translate("upload_session/start", e))?,
        };
        files
            .upload_session_finish(&cursor, &this.commit)
            .await
            .map_err(|e| this.translate("upload_session/finish", e))?;
        Ok(())
    }
}

impl Drop for DropboxWriteSession {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(path = %self.commit.path, "write session dropped outside a runtime, not committed");
            return;
        };
        warn!(path = %self.commit.path, "write session dropped without close, committing");
        let client = self.client.clone();
        let commit = self.commit.clone();
        let cursor = self.cursor.take();
        runtime.spawn(async move {
            let files = FilesClient::new(&client);
            let cursor = match cursor {
                Some(cursor) => cursor,
                None => match files.upload_session_start(Vec::new()).await {
                    Ok(cursor) => cursor,
                    Err(e) => {
                        warn!(path = %commit.path, error = %e, "commit on drop failed");
                        return;
                    }
                },
            };
            if let Err(e) = files.upload_session_finish(&cursor, &commit).await {
                warn!(path = %commit.path, error = %e, "commit on drop failed");
            }
        });
    }
}
