use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Union returned by metadata and listing calls, discriminated by `.tag`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = ".tag", rename_all = "snake_case")]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
    Deleted(DeletedMetadata),
}

impl Metadata {
    pub fn name(&self) -> &str {
        match self {
            Metadata::File(m) => &m.name,
            Metadata::Folder(m) => &m.name,
            Metadata::Deleted(m) => &m.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub path_display: Option<String>,
    pub client_modified: DateTime<Utc>,
    pub server_modified: DateTime<Utc>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderMetadata {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub path_display: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeletedMetadata {
    pub name: String,
    #[serde(default)]
    pub path_lower: Option<String>,
    #[serde(default)]
    pub path_display: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PathArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListFolderArg<'a> {
    pub path: &'a str,
    pub recursive: bool,
    pub include_deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateFolderArg<'a> {
    pub path: &'a str,
    pub autorename: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateFolderResult {
    pub metadata: FolderMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteResult {
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSessionStartArg {
    pub close: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSessionStartResult {
    pub session_id: String,
}

/// Position inside an upload session: the next byte the server expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSessionCursor {
    pub session_id: String,
    pub offset: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSessionAppendArg<'a> {
    pub cursor: &'a UploadSessionCursor,
    pub close: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    Add,
    Overwrite,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub path: String,
    pub mode: WriteMode,
    pub autorename: bool,
    /// Suppress user notifications for this write.
    pub mute: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSessionFinishArg<'a> {
    pub cursor: &'a UploadSessionCursor,
    pub commit: &'a CommitInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_folder_result_deser() {
        let json = r#"{
            "entries": [
                {".tag": "folder", "name": "dirs_test", "path_lower": "/test/dirs_test",
                 "path_display": "/Test/dirs_test", "id": "id:a"},
                {".tag": "file", "name": "a.txt", "path_lower": "/test/dirs_test/a.txt",
                 "path_display": "/Test/dirs_test/a.txt", "id": "id:b",
                 "client_modified": "2015-05-12T15:50:38Z",
                 "server_modified": "2015-05-12T15:50:38Z",
                 "rev": "a1c10ce0dd78", "size": 7212, "content_hash": "e3b0"},
                {".tag": "deleted", "name": "gone.txt", "path_lower": "/test/gone.txt"}
            ],
            "cursor": "ZtkX9_EHj3x7PMkVuFIhwKYXEpwpLwyxp9vMKomUhllil9q7eWiAu",
            "has_more": false
        }"#;
        let result: ListFolderResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.entries.len(), 3);
        assert!(!result.has_more);
        assert!(matches!(&result.entries[0], Metadata::Folder(f) if f.name == "dirs_test"));
        match &result.entries[1] {
            Metadata::File(f) => {
                assert_eq!(f.size, 7212);
                assert_eq!(f.client_modified.to_rfc3339(), "2015-05-12T15:50:38+00:00");
            }
            other => panic!("expected file, got {other:?}"),
        }
        assert_eq!(result.entries[2].name(), "gone.txt");
    }

    #[test]
    fn finish_arg_shape() {
        let cursor = UploadSessionCursor {
            session_id: "1234faaf0678bcde".into(),
            offset: 16,
        };
        let commit = CommitInfo {
            path: "/test/creation_test.txt".into(),
            mode: WriteMode::Overwrite,
            autorename: false,
            mute: true,
        };
        let arg = UploadSessionFinishArg {
            cursor: &cursor,
            commit: &commit,
        };
        let value = serde_json::to_value(&arg).unwrap();
        assert_eq!(value["cursor"]["offset"], 16);
        assert_eq!(value["commit"]["mode"], "overwrite");
        assert_eq!(value["commit"]["mute"], true);
    }
}
