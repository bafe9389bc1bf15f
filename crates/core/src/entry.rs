use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote_path;

/// A remote file. Backends without a real creation time report
/// `created == last_modified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    name: String,
    path: String,
    created: DateTime<Utc>,
    last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderEntry {
    name: String,
    path: String,
}

/// A listed remote file or folder, classified once when the backend builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Entry {
    File(FileEntry),
    Folder(FolderEntry),
}

impl FileEntry {
    /// `path` is the containing directory; trailing separators are dropped.
    pub fn new(
        name: impl Into<String>,
        path: &str,
        created: DateTime<Utc>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty() && !name.contains(remote_path::SEPARATOR));
        Self {
            name,
            path: remote_path::normalize(path).to_string(),
            created,
            last_modified,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    pub fn full_path(&self) -> String {
        remote_path::join(&self.path, &self.name)
    }
}

impl FolderEntry {
    pub fn new(name: impl Into<String>, path: &str) -> Self {
        let name = name.into();
        debug_assert!(!name.is_empty() && !name.contains(remote_path::SEPARATOR));
        Self {
            name,
            path: remote_path::normalize(path).to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn full_path(&self) -> String {
        remote_path::join(&self.path, &self.name)
    }
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => f.name(),
            Entry::Folder(f) => f.name(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Entry::File(f) => f.path(),
            Entry::Folder(f) => f.path(),
        }
    }

    pub fn full_path(&self) -> String {
        remote_path::join(self.path(), self.name())
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entry::Folder(_))
    }

    pub fn as_file(&self) -> Option<&FileEntry> {
        match self {
            Entry::File(f) => Some(f),
            Entry::Folder(_) => None,
        }
    }
}

impl From<FileEntry> for Entry {
    fn from(file: FileEntry) -> Self {
        Entry::File(file)
    }
}

impl From<FolderEntry> for Entry {
    fn from(folder: FolderEntry) -> Self {
        Entry::Folder(folder)
    }
}
