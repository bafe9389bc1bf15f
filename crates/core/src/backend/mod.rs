pub mod dropbox;
pub mod local;
pub mod sftp;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use tracing::warn;

use crate::entry::{Entry, FileEntry};
use crate::error::Result;

/// Optional parts of the contract a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub streaming_write: bool,
    pub create_dir: bool,
}

/// The operations every storage backend provides.
///
/// Paths use `/` as separator. Unless an implementation says otherwise,
/// calls against one instance should be serialised by the caller.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short identifier used in logs and errors.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Whether anything exists at `path`. Absence is `Ok(false)`, never an error.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Remove the file or folder at `path`. Deleting an absent path succeeds.
    async fn delete(&self, path: &str) -> Result<()>;

    /// List the children of `path`, or with `recursive` everything below it.
    /// The queried folder itself is never part of the result.
    async fn dirs(&self, path: &str, recursive: bool) -> Result<Vec<Entry>>;

    /// Read `size` bytes of `path/filename` starting at `offset`, fewer at end
    /// of file, together with the file's entry.
    async fn chunk(
        &self,
        path: &str,
        filename: &str,
        size: u64,
        offset: u64,
    ) -> Result<(FileEntry, Bytes)>;

    /// [`Backend::chunk`] from the start of the file.
    async fn first_chunk(
        &self,
        path: &str,
        filename: &str,
        size: u64,
    ) -> Result<(FileEntry, Bytes)> {
        self.chunk(path, filename, size, 0).await
    }

    /// Start a write session that produces the object at `path` when closed.
    async fn open(&self, path: &str) -> Result<Box<dyn WriteSession>>;

    async fn create_dir(&self, path: &str) -> Result<()>;
}

/// An incremental upload. Each `write` appends at the current offset;
/// `close` commits everything written so far as one object.
///
/// Dropping a session without closing it still commits, on a best-effort
/// basis; use [`write_scoped`] to observe the outcome of the commit.
#[async_trait]
pub trait WriteSession: Send {
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Bytes written so far.
    fn offset(&self) -> u64;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Open a write session on `path`, run `body` against it and close the
/// session on every exit path. When both fail, the error from `body` is
/// returned and the close error is logged.
pub async fn write_scoped<T, F>(backend: &dyn Backend, path: &str, body: F) -> Result<T>
where
    T: Send,
    F: for<'s> FnOnce(&'s mut (dyn WriteSession + 'static)) -> BoxFuture<'s, Result<T>>,
{
    let mut session = backend.open(path).await?;
    let outcome = body(session.as_mut()).await;
    let closed = session.close().await;

    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(
                backend = backend.name(),
                path,
                error = %close_err,
                "commit after failed write also failed"
            );
            Err(err)
        }
    }
}
