pub mod backend;
pub mod config;
pub mod entry;
pub mod error;
pub mod remote_path;

pub use backend::{Backend, Capabilities, WriteSession, write_scoped};
pub use config::{BackendConfig, StorageConfig};
pub use entry::{Entry, FileEntry, FolderEntry};
pub use error::{Error, Result};
