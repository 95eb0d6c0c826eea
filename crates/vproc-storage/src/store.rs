//! Object store contract.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Remote object storage the worker downloads uploads from.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download `bucket/key` to `destination`, creating its parent directory.
    ///
    /// Returns the number of bytes written. Any failure (missing key,
    /// permissions, network) is reported as an error; a successful return
    /// does not by itself prove the file is present on disk.
    async fn download(&self, bucket: &str, key: &str, destination: &Path) -> StorageResult<u64>;
}
