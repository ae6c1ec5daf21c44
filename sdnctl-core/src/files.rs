//! Filesystem access for `GET_FILE`

use async_trait::async_trait;
use std::io;

/// Source of file contents served to authenticated clients
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Read the whole file at `path`
    async fn read(&self, path: &str) -> io::Result<Vec<u8>>;
}

/// Reads from the local filesystem.
///
/// The path is used exactly as the client sent it, relative to the process
/// working directory. There is no root confinement: `../` and absolute
/// paths reach anything the server user can read.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

#[async_trait]
impl FileSource for LocalFiles {
    async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}
