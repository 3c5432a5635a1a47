//! Object store capability.
//!
//! The engines only ever talk to this trait; production wiring binds it to
//! an S3/MinIO-compatible SDK client, tests and dry runs bind it to the
//! in-memory implementation.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::InMemoryObjectStore;

/// Bucket-scoped object operations. Paths are plain `/`-separated object
/// keys, never filesystem paths.
///
/// Implementations must report missing objects as `Error::NotFound` and
/// transient I/O as `Error::Storage` so callers can decide what to retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exist(&self, bucket: &str, path: &str) -> Result<bool>;

    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>>;

    async fn write(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()>;

    /// List objects under `prefix`. When `recursive` is false, common
    /// sub-prefixes collapse into a single entry ending with `/` and size
    /// 0, mirroring S3 delimiter listing. Sizes align with paths.
    async fn list_with_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<(Vec<String>, Vec<i64>)>;

    /// Server-side copy, possibly across buckets. Must be idempotent.
    async fn copy(
        &self,
        src_bucket: &str,
        dst_bucket: &str,
        src_path: &str,
        dst_path: &str,
    ) -> Result<()>;

    async fn remove(&self, bucket: &str, path: &str) -> Result<()>;

    async fn remove_with_prefix(&self, bucket: &str, prefix: &str) -> Result<()>;
}
