use tracing::{debug, info};

use crate::client::DropboxClient;
use crate::error::{DropboxError, Result};
use crate::types::{
    CommitInfo, CreateFolderArg, CreateFolderResult, DeleteResult, FileMetadata, FolderMetadata,
    ListFolderArg, ListFolderContinueArg, ListFolderResult, Metadata, PathArg,
    UploadSessionAppendArg, UploadSessionCursor, UploadSessionFinishArg, UploadSessionStartArg,
    UploadSessionStartResult,
};

/// A downloaded file with its metadata.
#[derive(Debug)]
pub struct Download {
    pub metadata: FileMetadata,
    pub content: bytes::Bytes,
    pub partial: bool,
}

/// Typed wrappers for the `files/*` namespace.
pub struct FilesClient<'a> {
    client: &'a DropboxClient,
}

impl<'a> FilesClient<'a> {
    pub fn new(client: &'a DropboxClient) -> Self {
        Self { client }
    }

    pub async fn get_metadata(&self, path: &str) -> Result<Metadata> {
        self.client.rpc("files/get_metadata", &PathArg { path }).await
    }

    /// List a folder, following `list_folder/continue` until the server reports
    /// no more pages.
    pub async fn list_folder(&self, path: &str, recursive: bool) -> Result<Vec<Metadata>> {
        let arg = ListFolderArg {
            path,
            recursive,
            include_deleted: false,
        };
        let mut page: ListFolderResult = self.client.rpc("files/list_folder", &arg).await?;
        let mut entries = std::mem::take(&mut page.entries);

        while page.has_more {
            let cursor = std::mem::take(&mut page.cursor);
            page = self
                .client
                .rpc(
                    "files/list_folder/continue",
                    &ListFolderContinueArg { cursor: &cursor },
                )
                .await?;
            debug!(items = page.entries.len(), "fetched list_folder page");
            entries.append(&mut page.entries);
        }

        debug!(path, total_items = entries.len(), "list_folder complete");
        Ok(entries)
    }

    /// Delete a file or folder (folders recursively).
    pub async fn delete(&self, path: &str) -> Result<Metadata> {
        let result: DeleteResult = self.client.rpc("files/delete_v2", &PathArg { path }).await?;
        Ok(result.metadata)
    }

    pub async fn create_folder(&self, path: &str) -> Result<FolderMetadata> {
        let arg = CreateFolderArg {
            path,
            autorename: false,
        };
        let result: CreateFolderResult = self.client.rpc("files/create_folder_v2", &arg).await?;
        Ok(result.metadata)
    }

    /// Download a file. On a client built by [`DropboxClient::range_session`]
    /// only the requested window is transferred, unless the server ignored the
    /// range and `partial` is false.
    pub async fn download(&self, path: &str) -> Result<Download> {
        let route = "files/download";
        let download = self.client.content_download(route, &PathArg { path }).await?;
        let metadata: FileMetadata =
            serde_json::from_str(&download.api_result).map_err(|source| DropboxError::Decode {
                route: route.to_string(),
                source,
            })?;
        Ok(Download {
            metadata,
            content: download.content,
            partial: download.partial,
        })
    }

    /// Start an upload session with its first block of data.
    pub async fn upload_session_start(&self, data: Vec<u8>) -> Result<UploadSessionCursor> {
        let offset = data.len() as u64;
        let result: UploadSessionStartResult = self
            .client
            .content_upload(
                "files/upload_session/start",
                &UploadSessionStartArg { close: false },
                data,
            )
            .await?;
        debug!(session_id = %result.session_id, "upload session started");
        Ok(UploadSessionCursor {
            session_id: result.session_id,
            offset,
        })
    }

    /// Append `data` at `cursor.offset`.
    pub async fn upload_session_append(
        &self,
        cursor: &UploadSessionCursor,
        data: Vec<u8>,
    ) -> Result<()> {
        let arg = UploadSessionAppendArg {
            cursor,
            close: false,
        };
        self.client
            .content_upload("files/upload_session/append_v2", &arg, data)
            .await
    }

    /// Commit everything uploaded so far as a single file.
    pub async fn upload_session_finish(
        &self,
        cursor: &UploadSessionCursor,
        commit: &CommitInfo,
    ) -> Result<FileMetadata> {
        let arg = UploadSessionFinishArg { cursor, commit };
        let metadata: FileMetadata = self
            .client
            .content_upload("files/upload_session/finish", &arg, Vec::new())
            .await?;
        info!(path = %commit.path, bytes = cursor.offset, "upload session committed");
        Ok(metadata)
    }
}
