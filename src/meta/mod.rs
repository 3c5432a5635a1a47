//! Backup and restore task data model.
//!
//! These types are both the in-memory task tree and the on-disk manifest
//! schema, so every field is serde-defaulted: readers ignore unknown
//! fields and tolerate absent ones across versions.

pub mod codec;
pub mod manager;
pub mod paths;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    #[default]
    Initial,
    Executing,
    Success,
    Fail,
    Timeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    #[default]
    NotLoad,
    Loading,
    Loaded,
}

/// Root of a backup task. `collection_backups` is populated only in the
/// materialized ("full meta") view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupInfo {
    pub id: String,
    pub name: String,
    pub state_code: TaskState,
    pub error_message: String,
    /// Milliseconds since epoch.
    pub start_time: i64,
    pub end_time: i64,
    /// Version string reported by the source cluster.
    pub source_version: String,
    pub size: i64,
    pub collection_backups: Vec<CollectionBackup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionBackup {
    pub backup_id: String,
    pub collection_id: i64,
    pub db_name: String,
    pub collection_name: String,
    pub schema: CollectionSchema,
    pub shards_num: i32,
    pub consistency_level: i32,
    pub index_infos: Vec<IndexInfo>,
    pub has_index: bool,
    pub load_state: LoadState,
    /// Virtual channel name -> opaque position token. Populated iff the
    /// backup flushed (non-force).
    pub channel_checkpoints: HashMap<String, String>,
    /// Max checkpoint timestamp across channels.
    pub backup_timestamp: u64,
    /// Physical seal time reported by flush.
    pub backup_physical_timestamp: u64,
    pub state_code: TaskState,
    pub error_message: String,
    pub start_time: i64,
    pub end_time: i64,
    pub size: i64,
    pub partition_backups: Vec<PartitionBackup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PartitionBackup {
    pub collection_id: i64,
    pub partition_id: i64,
    pub partition_name: String,
    pub load_state: LoadState,
    pub size: i64,
    pub segment_backups: Vec<SegmentBackup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SegmentBackup {
    pub collection_id: i64,
    pub partition_id: i64,
    pub segment_id: i64,
    /// Disambiguates segment re-bucketing in the backup path; defaults to
    /// the segment id.
    pub group_id: i64,
    pub num_rows: i64,
    pub insert_logs: Vec<FieldBinlog>,
    pub delta_logs: Vec<FieldBinlog>,
    pub size: i64,
    pub backuped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldBinlog {
    pub field_id: i64,
    pub binlogs: Vec<Binlog>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Binlog {
    pub log_path: String,
    pub log_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionSchema {
    pub name: String,
    pub description: String,
    pub auto_id: bool,
    pub enable_dynamic_field: bool,
    pub fields: Vec<FieldSchema>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldSchema {
    pub field_id: i64,
    pub name: String,
    pub is_primary_key: bool,
    pub description: String,
    pub auto_id: bool,
    /// Numeric datatype code as reported by the cluster; opaque here.
    pub data_type: i32,
    pub element_type: i32,
    pub type_params: HashMap<String, String>,
    pub index_params: HashMap<String, String>,
    pub is_dynamic: bool,
    pub is_partition_key: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IndexInfo {
    pub field_name: String,
    pub index_name: String,
    pub index_type: String,
    pub params: HashMap<String, String>,
}

/// One entry of `channel_cp_meta.json`: a physical channel with the
/// durable position recorded at backup time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelPosition {
    pub name: String,
    pub position: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestoreTask {
    pub id: String,
    pub backup_id: String,
    pub backup_name: String,
    pub state_code: TaskState,
    pub error_message: String,
    pub start_time: i64,
    pub end_time: i64,
    pub to_restore_size: i64,
    pub restored_size: i64,
    /// Integer percent; floored to 1 while any bytes have been restored.
    pub progress: i32,
    pub collection_restore_tasks: Vec<CollectionRestoreTask>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectionRestoreTask {
    pub id: String,
    pub state_code: TaskState,
    pub error_message: String,
    pub db_name: String,
    pub collection_name: String,
    pub target_db_name: String,
    pub target_collection_name: String,
    pub to_restore_size: i64,
    pub restored_size: i64,
}

impl BackupInfo {
    /// Drop per-segment binlog listings and partition trees, keeping the
    /// collection-level summary. Used for "without detail" reads.
    pub fn simplified(&self) -> BackupInfo {
        let mut info = self.clone();
        for collection in &mut info.collection_backups {
            collection.partition_backups.clear();
        }
        info
    }
}
