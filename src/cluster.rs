//! Vector database capability.
//!
//! Thin, typed surface over the cluster RPC client. Production wiring
//! binds this to the vendor SDK; tests bind it to a scripted fake. Schema
//! and index types are shared with the manifest model so a described
//! collection can be recorded verbatim.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::meta::{CollectionSchema, IndexInfo};

/// Full description of a collection, as returned by `describe_collection`.
#[derive(Debug, Clone, Default)]
pub struct CollectionDesc {
    pub id: i64,
    pub name: String,
    pub schema: CollectionSchema,
    pub shards_num: i32,
    pub consistency_level: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PartitionInfo {
    pub id: i64,
    pub name: String,
}

/// One persistent (sealed or growing-but-persisted) segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentInfo {
    pub segment_id: i64,
    pub collection_id: i64,
    pub partition_id: i64,
    pub num_rows: i64,
}

/// Durable write-ahead-log position of one virtual channel.
#[derive(Debug, Clone, Default)]
pub struct ChannelCheckpoint {
    /// Opaque position token, ready to be persisted as-is.
    pub position: String,
    pub timestamp: u64,
}

/// Outcome of a flush call.
#[derive(Debug, Clone, Default)]
pub struct FlushResult {
    pub new_sealed_segment_ids: Vec<i64>,
    pub flushed_segment_ids: Vec<i64>,
    /// Physical seal time, milliseconds since epoch.
    pub time_of_seal: i64,
    /// Virtual channel name -> checkpoint.
    pub channel_checkpoints: HashMap<String, ChannelCheckpoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkInsertState {
    Pending,
    Importing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BulkInsertInfo {
    pub job_id: i64,
    pub state: BulkInsertState,
    pub reason: String,
}

/// Everything needed to re-create a collection on the restore side.
#[derive(Debug, Clone, Default)]
pub struct CreateCollectionSpec {
    pub db_name: String,
    pub collection_name: String,
    pub schema: CollectionSchema,
    pub shards_num: i32,
    pub consistency_level: i32,
}

#[async_trait]
pub trait VectorDb: Send + Sync {
    async fn get_version(&self) -> Result<String>;

    async fn list_databases(&self) -> Result<Vec<String>>;

    async fn list_collections(&self, db: &str) -> Result<Vec<String>>;

    async fn has_collection(&self, db: &str, collection: &str) -> Result<bool>;

    async fn describe_collection(&self, db: &str, collection: &str) -> Result<CollectionDesc>;

    async fn show_partitions(&self, db: &str, collection: &str) -> Result<Vec<PartitionInfo>>;

    /// Indexes on one field. Absence is signalled with `Error::NotFound`
    /// and is not an error for callers taking a schema snapshot.
    async fn describe_index(
        &self,
        db: &str,
        collection: &str,
        field: &str,
    ) -> Result<Vec<IndexInfo>>;

    async fn get_persistent_segment_info(
        &self,
        db: &str,
        collection: &str,
    ) -> Result<Vec<SegmentInfo>>;

    /// Seal open segments. Returns newly sealed and already-flushed
    /// segment ids plus per-channel checkpoints.
    async fn flush(&self, db: &str, collection: &str) -> Result<FlushResult>;

    /// Loading progress as an integer percentage. An empty partition list
    /// means collection-level progress.
    async fn get_loading_progress(
        &self,
        db: &str,
        collection: &str,
        partitions: &[String],
    ) -> Result<i64>;

    async fn create_database(&self, db: &str) -> Result<()>;

    async fn create_collection(&self, spec: CreateCollectionSpec) -> Result<()>;

    async fn has_partition(&self, db: &str, collection: &str, partition: &str) -> Result<bool>;

    async fn create_partition(&self, db: &str, collection: &str, partition: &str) -> Result<()>;

    /// Create an index from a recorded definition. With `auto_index` the
    /// stored parameters are replaced by the cluster's default auto-index.
    async fn create_index(
        &self,
        db: &str,
        collection: &str,
        index: &IndexInfo,
        auto_index: bool,
    ) -> Result<()>;

    /// Start a bulk-insert job ingesting `files` into the target
    /// partition. Returns the job id.
    async fn bulk_insert(
        &self,
        db: &str,
        collection: &str,
        partition: &str,
        files: &[String],
    ) -> Result<i64>;

    async fn get_bulk_insert_state(&self, job_id: i64) -> Result<BulkInsertInfo>;
}

/// Vector datatype codes start at 100 in the wire enum; everything below
/// is scalar.
pub fn is_vector_data_type(data_type: i32) -> bool {
    data_type >= 100
}
