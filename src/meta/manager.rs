//! Normalized, process-internal store of backup and restore task state.
//!
//! Entities live in flat tables keyed by id; the tree form is materialized
//! on demand by `full_meta`. All adders are upserts, so a retried prepare
//! step converges to the same state. Mutations go through option sets and
//! are serialized under one lock; readers get cloned rows, never torn
//! reads.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{
    BackupInfo, CollectionBackup, FieldBinlog, LoadState, PartitionBackup, RestoreTask,
    SegmentBackup, TaskState,
};

pub enum BackupOpt {
    State(TaskState),
    ErrorMessage(String),
    Size(i64),
    EndTime(i64),
}

pub enum CollectionOpt {
    State(TaskState),
    ErrorMessage(String),
    Size(i64),
    EndTime(i64),
    LoadState(LoadState),
    ChannelCheckpoints(HashMap<String, String>),
    BackupTimestamp(u64),
    BackupPhysicalTimestamp(u64),
}

pub enum SegmentOpt {
    Binlogs(Vec<FieldBinlog>),
    DeltaBinlogs(Vec<FieldBinlog>),
    Size(i64),
    GroupId(i64),
    Backuped(bool),
}

pub enum RestoreOpt {
    State(TaskState),
    ErrorMessage(String),
    EndTime(i64),
}

pub enum RestoreCollectionOpt {
    State(TaskState),
    ErrorMessage(String),
}

#[derive(Default)]
struct Tables {
    /// Backup root rows, children always empty here.
    backups: HashMap<String, BackupInfo>,
    /// (backup id, collection id) -> collection row, partitions empty.
    collections: HashMap<(String, i64), CollectionBackup>,
    /// (collection id, partition id) -> partition row, segments empty.
    partitions: HashMap<(i64, i64), PartitionBackup>,
    /// segment id -> segment row.
    segments: HashMap<i64, SegmentBackup>,
    restore_tasks: HashMap<String, RestoreTask>,
}

#[derive(Default)]
pub struct MetaManager {
    tables: RwLock<Tables>,
}

impl MetaManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_backup(&self, mut backup: BackupInfo) {
        backup.collection_backups.clear();
        let mut tables = self.tables.write().unwrap();
        tables.backups.insert(backup.id.clone(), backup);
    }

    pub fn get_backup(&self, id: &str) -> Option<BackupInfo> {
        self.tables.read().unwrap().backups.get(id).cloned()
    }

    pub fn update_backup(&self, id: &str, opts: impl IntoIterator<Item = BackupOpt>) {
        let mut tables = self.tables.write().unwrap();
        if let Some(backup) = tables.backups.get_mut(id) {
            for opt in opts {
                match opt {
                    BackupOpt::State(state) => backup.state_code = state,
                    BackupOpt::ErrorMessage(msg) => backup.error_message = msg,
                    BackupOpt::Size(size) => backup.size = size,
                    BackupOpt::EndTime(end) => backup.end_time = end,
                }
            }
        }
    }

    pub fn add_collection(&self, mut collection: CollectionBackup) {
        collection.partition_backups.clear();
        let key = (collection.backup_id.clone(), collection.collection_id);
        let mut tables = self.tables.write().unwrap();
        tables.collections.insert(key, collection);
    }

    pub fn get_collections(&self, backup_id: &str) -> Vec<CollectionBackup> {
        let tables = self.tables.read().unwrap();
        let mut collections: Vec<CollectionBackup> = tables
            .collections
            .iter()
            .filter(|((id, _), _)| id == backup_id)
            .map(|(_, collection)| collection.clone())
            .collect();
        collections.sort_by_key(|c| c.collection_id);
        collections
    }

    pub fn update_collection(
        &self,
        backup_id: &str,
        collection_id: i64,
        opts: impl IntoIterator<Item = CollectionOpt>,
    ) {
        let mut tables = self.tables.write().unwrap();
        if let Some(collection) = tables
            .collections
            .get_mut(&(backup_id.to_string(), collection_id))
        {
            for opt in opts {
                match opt {
                    CollectionOpt::State(state) => collection.state_code = state,
                    CollectionOpt::ErrorMessage(msg) => collection.error_message = msg,
                    CollectionOpt::Size(size) => collection.size = size,
                    CollectionOpt::EndTime(end) => collection.end_time = end,
                    CollectionOpt::LoadState(state) => collection.load_state = state,
                    CollectionOpt::ChannelCheckpoints(cps) => {
                        collection.channel_checkpoints = cps;
                    }
                    CollectionOpt::BackupTimestamp(ts) => collection.backup_timestamp = ts,
                    CollectionOpt::BackupPhysicalTimestamp(ts) => {
                        collection.backup_physical_timestamp = ts;
                    }
                }
            }
        }
    }

    pub fn add_partition(&self, mut partition: PartitionBackup) {
        partition.segment_backups.clear();
        let key = (partition.collection_id, partition.partition_id);
        let mut tables = self.tables.write().unwrap();
        tables.partitions.insert(key, partition);
    }

    pub fn get_partitions(&self, collection_id: i64) -> Vec<PartitionBackup> {
        let tables = self.tables.read().unwrap();
        let mut partitions: Vec<PartitionBackup> = tables
            .partitions
            .iter()
            .filter(|((coll_id, _), _)| *coll_id == collection_id)
            .map(|(_, partition)| partition.clone())
            .collect();
        partitions.sort_by_key(|p| p.partition_id);
        partitions
    }

    pub fn add_segment(&self, segment: SegmentBackup) {
        let mut tables = self.tables.write().unwrap();
        tables.segments.insert(segment.segment_id, segment);
    }

    pub fn get_segment(&self, segment_id: i64) -> Option<SegmentBackup> {
        self.tables.read().unwrap().segments.get(&segment_id).cloned()
    }

    pub fn get_segments(&self, partition_id: i64) -> Vec<SegmentBackup> {
        let tables = self.tables.read().unwrap();
        let mut segments: Vec<SegmentBackup> = tables
            .segments
            .values()
            .filter(|s| s.partition_id == partition_id)
            .cloned()
            .collect();
        segments.sort_by_key(|s| s.segment_id);
        segments
    }

    pub fn update_segment(&self, segment_id: i64, opts: impl IntoIterator<Item = SegmentOpt>) {
        let mut tables = self.tables.write().unwrap();
        if let Some(segment) = tables.segments.get_mut(&segment_id) {
            for opt in opts {
                match opt {
                    SegmentOpt::Binlogs(logs) => segment.insert_logs = logs,
                    SegmentOpt::DeltaBinlogs(logs) => segment.delta_logs = logs,
                    SegmentOpt::Size(size) => segment.size = size,
                    SegmentOpt::GroupId(group) => segment.group_id = group,
                    SegmentOpt::Backuped(done) => segment.backuped = done,
                }
            }
        }
    }

    /// Materialize the full tree for one backup. Sizes are rolled up from
    /// the segment level so the tree always satisfies
    /// `backup.size = Σ collection.size = Σ partition.size = Σ segment.size`.
    pub fn full_meta(&self, backup_id: &str) -> Option<BackupInfo> {
        let tables = self.tables.read().unwrap();
        let mut backup = tables.backups.get(backup_id)?.clone();

        let mut collections: Vec<CollectionBackup> = tables
            .collections
            .iter()
            .filter(|((id, _), _)| id == backup_id)
            .map(|(_, collection)| collection.clone())
            .collect();
        collections.sort_by_key(|c| c.collection_id);

        let mut backup_size = 0i64;
        for collection in &mut collections {
            let mut partitions: Vec<PartitionBackup> = tables
                .partitions
                .iter()
                .filter(|((coll_id, _), _)| *coll_id == collection.collection_id)
                .map(|(_, partition)| partition.clone())
                .collect();
            partitions.sort_by_key(|p| p.partition_id);

            let mut collection_size = 0i64;
            for partition in &mut partitions {
                let mut segments: Vec<SegmentBackup> = tables
                    .segments
                    .values()
                    .filter(|s| s.partition_id == partition.partition_id)
                    .cloned()
                    .collect();
                segments.sort_by_key(|s| s.segment_id);
                partition.size = segments.iter().map(|s| s.size).sum();
                collection_size += partition.size;
                partition.segment_backups = segments;
            }
            collection.size = collection_size;
            backup_size += collection_size;
            collection.partition_backups = partitions;
        }
        backup.size = backup_size;
        backup.collection_backups = collections;
        Some(backup)
    }

    pub fn add_restore_task(&self, task: RestoreTask) {
        let mut tables = self.tables.write().unwrap();
        tables.restore_tasks.insert(task.id.clone(), task);
    }

    pub fn get_restore_task(&self, id: &str) -> Option<RestoreTask> {
        self.tables.read().unwrap().restore_tasks.get(id).cloned()
    }

    pub fn update_restore_task(&self, id: &str, opts: impl IntoIterator<Item = RestoreOpt>) {
        let mut tables = self.tables.write().unwrap();
        if let Some(task) = tables.restore_tasks.get_mut(id) {
            for opt in opts {
                match opt {
                    RestoreOpt::State(state) => task.state_code = state,
                    RestoreOpt::ErrorMessage(msg) => task.error_message = msg,
                    RestoreOpt::EndTime(end) => task.end_time = end,
                }
            }
        }
    }

    pub fn update_restore_collection_task(
        &self,
        task_id: &str,
        collection_task_id: &str,
        opts: impl IntoIterator<Item = RestoreCollectionOpt>,
    ) {
        let mut tables = self.tables.write().unwrap();
        let Some(task) = tables.restore_tasks.get_mut(task_id) else {
            return;
        };
        let Some(collection_task) = task
            .collection_restore_tasks
            .iter_mut()
            .find(|t| t.id == collection_task_id)
        else {
            return;
        };
        for opt in opts {
            match opt {
                RestoreCollectionOpt::State(state) => collection_task.state_code = state,
                RestoreCollectionOpt::ErrorMessage(msg) => collection_task.error_message = msg,
            }
        }
    }

    /// Record `bytes` more restored data. Restored sizes only ever grow.
    pub fn add_restored_size(&self, task_id: &str, collection_task_id: &str, bytes: i64) {
        let mut tables = self.tables.write().unwrap();
        if let Some(task) = tables.restore_tasks.get_mut(task_id) {
            task.restored_size += bytes;
            if let Some(collection_task) = task
                .collection_restore_tasks
                .iter_mut()
                .find(|t| t.id == collection_task_id)
            {
                collection_task.restored_size += bytes;
            }
        }
    }

    /// Evict one backup task and every entity under it.
    pub fn remove_backup(&self, id: &str) {
        let mut tables = self.tables.write().unwrap();
        tables.backups.remove(id);
        let collection_ids: Vec<i64> = tables
            .collections
            .keys()
            .filter(|(backup_id, _)| backup_id == id)
            .map(|(_, collection_id)| *collection_id)
            .collect();
        tables
            .collections
            .retain(|(backup_id, _), _| backup_id != id);
        tables
            .partitions
            .retain(|(collection_id, _), _| !collection_ids.contains(collection_id));
        tables
            .segments
            .retain(|_, segment| !collection_ids.contains(&segment.collection_id));
    }

    /// Drop everything. Called when the engine closes.
    pub fn clear(&self) {
        let mut tables = self.tables.write().unwrap();
        *tables = Tables::default();
    }
}
