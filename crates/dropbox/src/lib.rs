pub mod client;
pub mod error;
pub mod files;
pub mod types;

pub use client::DropboxClient;
pub use error::{DropboxError, Result};
pub use files::FilesClient;
