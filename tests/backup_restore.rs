//! End-to-end scenarios driven through injected in-memory capabilities:
//! an in-memory object store seeded with binlog objects and a scripted
//! vector database fake that records every call.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vectordb_backup::api::{
    CreateBackupRequest, DeleteBackupRequest, GetBackupRequest, GetRestoreStateRequest,
    ListBackupsRequest, ResponseCode, RestoreBackupRequest,
};
use vectordb_backup::cluster::{
    BulkInsertInfo, BulkInsertState, ChannelCheckpoint, CollectionDesc, CreateCollectionSpec,
    FlushResult, PartitionInfo, SegmentInfo, VectorDb,
};
use vectordb_backup::config::BackupParams;
use vectordb_backup::engine::BackupEngine;
use vectordb_backup::error::{Error, Result};
use vectordb_backup::meta::{CollectionSchema, FieldSchema, IndexInfo};
use vectordb_backup::storage::{InMemoryObjectStore, ObjectStore};

#[derive(Clone)]
struct MockCollection {
    desc: CollectionDesc,
    partitions: Vec<PartitionInfo>,
    segments: Vec<SegmentInfo>,
    loading_progress: i64,
}

#[derive(Default)]
struct ClusterState {
    databases: BTreeMap<String, BTreeMap<String, MockCollection>>,
    flush_calls: usize,
    flush_extra_ids: Vec<i64>,
    bulk_inserts: Vec<(String, String, String, Vec<String>)>,
    bulk_jobs: HashMap<i64, usize>,
    next_job_id: i64,
    created_indexes: Vec<(String, String, IndexInfo, bool)>,
}

#[derive(Default)]
struct MockVectorDb {
    state: Mutex<ClusterState>,
}

impl MockVectorDb {
    fn new() -> Self {
        Self::default()
    }

    fn add_collection(&self, db: &str, collection: MockCollection) {
        let mut state = self.state.lock().unwrap();
        state
            .databases
            .entry(db.to_string())
            .or_default()
            .insert(collection.desc.name.clone(), collection);
    }

    fn set_flush_extra_ids(&self, ids: Vec<i64>) {
        self.state.lock().unwrap().flush_extra_ids = ids;
    }

    fn flush_calls(&self) -> usize {
        self.state.lock().unwrap().flush_calls
    }

    fn bulk_inserts(&self) -> Vec<(String, String, String, Vec<String>)> {
        self.state.lock().unwrap().bulk_inserts.clone()
    }

    fn collection(&self, db: &str, name: &str) -> Option<MockCollection> {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(db)
            .and_then(|colls| colls.get(name))
            .cloned()
    }

    fn created_indexes(&self) -> Vec<(String, String, IndexInfo, bool)> {
        self.state.lock().unwrap().created_indexes.clone()
    }
}

#[async_trait]
impl VectorDb for MockVectorDb {
    async fn get_version(&self) -> Result<String> {
        Ok("v2.4.1".to_string())
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().databases.keys().cloned().collect())
    }

    async fn list_collections(&self, db: &str) -> Result<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .databases
            .get(db)
            .map(|colls| colls.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn has_collection(&self, db: &str, collection: &str) -> Result<bool> {
        Ok(self.collection(db, collection).is_some())
    }

    async fn describe_collection(&self, db: &str, collection: &str) -> Result<CollectionDesc> {
        self.collection(db, collection)
            .map(|c| c.desc)
            .ok_or_else(|| Error::NotFound(format!("collection {db}.{collection}")))
    }

    async fn show_partitions(&self, db: &str, collection: &str) -> Result<Vec<PartitionInfo>> {
        self.collection(db, collection)
            .map(|c| c.partitions)
            .ok_or_else(|| Error::NotFound(format!("collection {db}.{collection}")))
    }

    async fn describe_index(&self, db: &str, collection: &str, field: &str) -> Result<Vec<IndexInfo>> {
        let _ = (db, collection);
        Err(Error::NotFound(format!("index on field {field}")))
    }

    async fn get_persistent_segment_info(
        &self,
        db: &str,
        collection: &str,
    ) -> Result<Vec<SegmentInfo>> {
        self.collection(db, collection)
            .map(|c| c.segments)
            .ok_or_else(|| Error::NotFound(format!("collection {db}.{collection}")))
    }

    async fn flush(&self, db: &str, collection: &str) -> Result<FlushResult> {
        let mut state = self.state.lock().unwrap();
        state.flush_calls += 1;
        let mut sealed: Vec<i64> = state
            .databases
            .get(db)
            .and_then(|colls| colls.get(collection))
            .map(|c| c.segments.iter().map(|s| s.segment_id).collect())
            .unwrap_or_default();
        sealed.extend(state.flush_extra_ids.iter().copied());
        Ok(FlushResult {
            new_sealed_segment_ids: sealed,
            flushed_segment_ids: Vec::new(),
            time_of_seal: 1_700_000_000_000,
            channel_checkpoints: HashMap::from([
                (
                    "by-dev-dml_0_449v0".to_string(),
                    ChannelCheckpoint {
                        position: "cp-token-0".to_string(),
                        timestamp: 100,
                    },
                ),
                (
                    "by-dev-dml_1_449v1".to_string(),
                    ChannelCheckpoint {
                        position: "cp-token-1".to_string(),
                        timestamp: 200,
                    },
                ),
            ]),
        })
    }

    async fn get_loading_progress(
        &self,
        db: &str,
        collection: &str,
        _partitions: &[String],
    ) -> Result<i64> {
        self.collection(db, collection)
            .map(|c| c.loading_progress)
            .ok_or_else(|| Error::NotFound(format!("collection {db}.{collection}")))
    }

    async fn create_database(&self, db: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .databases
            .entry(db.to_string())
            .or_default();
        Ok(())
    }

    async fn create_collection(&self, spec: CreateCollectionSpec) -> Result<()> {
        let collection = MockCollection {
            desc: CollectionDesc {
                id: 900,
                name: spec.collection_name.clone(),
                schema: spec.schema,
                shards_num: spec.shards_num,
                consistency_level: spec.consistency_level,
            },
            partitions: vec![PartitionInfo {
                id: 1,
                name: "_default".to_string(),
            }],
            segments: Vec::new(),
            loading_progress: 0,
        };
        let mut state = self.state.lock().unwrap();
        state
            .databases
            .entry(spec.db_name.clone())
            .or_default()
            .insert(spec.collection_name, collection);
        Ok(())
    }

    async fn has_partition(&self, db: &str, collection: &str, partition: &str) -> Result<bool> {
        Ok(self
            .collection(db, collection)
            .map(|c| c.partitions.iter().any(|p| p.name == partition))
            .unwrap_or(false))
    }

    async fn create_partition(&self, db: &str, collection: &str, partition: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(coll) = state
            .databases
            .get_mut(db)
            .and_then(|colls| colls.get_mut(collection))
        {
            let next_id = coll.partitions.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            coll.partitions.push(PartitionInfo {
                id: next_id,
                name: partition.to_string(),
            });
        }
        Ok(())
    }

    async fn create_index(
        &self,
        db: &str,
        collection: &str,
        index: &IndexInfo,
        auto_index: bool,
    ) -> Result<()> {
        self.state.lock().unwrap().created_indexes.push((
            db.to_string(),
            collection.to_string(),
            index.clone(),
            auto_index,
        ));
        Ok(())
    }

    async fn bulk_insert(
        &self,
        db: &str,
        collection: &str,
        partition: &str,
        files: &[String],
    ) -> Result<i64> {
        let mut state = self.state.lock().unwrap();
        state.next_job_id += 1;
        let job_id = state.next_job_id;
        state.bulk_inserts.push((
            db.to_string(),
            collection.to_string(),
            partition.to_string(),
            files.to_vec(),
        ));
        state.bulk_jobs.insert(job_id, 0);
        Ok(job_id)
    }

    async fn get_bulk_insert_state(&self, job_id: i64) -> Result<BulkInsertInfo> {
        let mut state = self.state.lock().unwrap();
        match state.bulk_jobs.get_mut(&job_id) {
            Some(polls_left) if *polls_left == 0 => Ok(BulkInsertInfo {
                job_id,
                state: BulkInsertState::Completed,
                reason: String::new(),
            }),
            Some(polls_left) => {
                *polls_left -= 1;
                Ok(BulkInsertInfo {
                    job_id,
                    state: BulkInsertState::Importing,
                    reason: String::new(),
                })
            }
            None => Err(Error::NotFound(format!("bulk insert job {job_id}"))),
        }
    }
}

fn sample_schema() -> CollectionSchema {
    CollectionSchema {
        name: "c1".to_string(),
        auto_id: false,
        enable_dynamic_field: false,
        description: String::new(),
        fields: vec![
            FieldSchema {
                field_id: 1,
                name: "pk".to_string(),
                is_primary_key: true,
                data_type: 5,
                ..Default::default()
            },
            FieldSchema {
                field_id: 2,
                name: "vec".to_string(),
                data_type: 101,
                type_params: HashMap::from([("dim".to_string(), "128".to_string())]),
                ..Default::default()
            },
        ],
    }
}

/// Source cluster with `default.c1`: two partitions, three segments.
fn seed_source_cluster(cluster: &MockVectorDb) {
    cluster.add_collection(
        "default",
        MockCollection {
            desc: CollectionDesc {
                id: 10,
                name: "c1".to_string(),
                schema: sample_schema(),
                shards_num: 2,
                consistency_level: 1,
            },
            partitions: vec![
                PartitionInfo {
                    id: 100,
                    name: "_default".to_string(),
                },
                PartitionInfo {
                    id: 101,
                    name: "p1".to_string(),
                },
            ],
            segments: vec![
                SegmentInfo {
                    segment_id: 1000,
                    collection_id: 10,
                    partition_id: 100,
                    num_rows: 3,
                },
                SegmentInfo {
                    segment_id: 1001,
                    collection_id: 10,
                    partition_id: 100,
                    num_rows: 5,
                },
                SegmentInfo {
                    segment_id: 1002,
                    collection_id: 10,
                    partition_id: 101,
                    num_rows: 7,
                },
            ],
            loading_progress: 0,
        },
    );
}

/// Binlog objects for the three segments, sizes 10/20/30.
fn seed_source_storage(store: &InMemoryObjectStore) {
    store.put_object("a-bucket", "files/insert_log/10/100/1000/1/log-a", 4);
    store.put_object("a-bucket", "files/insert_log/10/100/1000/2/log-b", 6);
    store.put_object("a-bucket", "files/insert_log/10/100/1001/1/log-c", 20);
    store.put_object("a-bucket", "files/insert_log/10/101/1002/1/log-d", 30);
}

fn engine_with(store: &Arc<InMemoryObjectStore>, cluster: &Arc<MockVectorDb>) -> Arc<BackupEngine> {
    let params = BackupParams::default();
    Arc::new(
        BackupEngine::new(params)
            .with_storage(Arc::clone(store) as Arc<dyn ObjectStore>)
            .with_cluster(Arc::clone(cluster) as Arc<dyn VectorDb>),
    )
}

fn fresh_source() -> (Arc<InMemoryObjectStore>, Arc<MockVectorDb>, Arc<BackupEngine>) {
    let store = Arc::new(InMemoryObjectStore::new());
    let cluster = Arc::new(MockVectorDb::new());
    seed_source_cluster(&cluster);
    seed_source_storage(&store);
    let engine = engine_with(&store, &cluster);
    (store, cluster, engine)
}

#[tokio::test]
async fn test_round_trip_with_generated_name() {
    let (store, cluster, engine) = fresh_source();

    let resp = engine.create_backup(&CreateBackupRequest::default()).await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);
    let backup = resp.data.unwrap();

    // generated name: backup_YYYY_MM_DD_HH_MM_SS_<nanos>
    assert!(backup.name.starts_with("backup_"));
    assert_eq!(backup.name.split('_').count(), 8);
    assert!(backup
        .name
        .split('_')
        .skip(1)
        .all(|part| part.chars().all(|c| c.is_ascii_digit())));

    assert_eq!(backup.size, 60);
    assert_eq!(backup.source_version, "v2.4.1");
    assert_eq!(cluster.flush_calls(), 1);
    let collection = &backup.collection_backups[0];
    assert_eq!(collection.size, 60);
    assert_eq!(collection.backup_timestamp, 200);
    assert_eq!(collection.channel_checkpoints.len(), 2);

    // six meta files
    let meta_prefix = format!("backup/{}/meta/", backup.name);
    let meta_files: Vec<String> = store
        .keys("a-bucket")
        .into_iter()
        .filter(|k| k.starts_with(&meta_prefix))
        .collect();
    assert_eq!(meta_files.len(), 6);

    // copied binlogs carry the group component (== segment id)
    assert!(store
        .keys("a-bucket")
        .contains(&format!("backup/{}/binlogs/insert_log/10/100/1000/1000/1/log-a", backup.name)));

    // restore into an empty cluster
    let target_cluster = Arc::new(MockVectorDb::new());
    let target_store = Arc::clone(&store);
    let restore_engine = engine_with(&target_store, &target_cluster);
    let restore_resp = restore_engine
        .restore_backup(&RestoreBackupRequest {
            backup_name: backup.name.clone(),
            ..Default::default()
        })
        .await;
    assert_eq!(restore_resp.code, ResponseCode::Success, "msg: {}", restore_resp.msg);
    let task = restore_resp.data.unwrap();
    assert_eq!(task.to_restore_size, 60);
    assert_eq!(task.restored_size, 60);

    let restored = target_cluster.collection("default", "c1").unwrap();
    assert_eq!(restored.desc.schema.fields.len(), 2);
    assert_eq!(restored.desc.shards_num, 2);
    // the non-default partition was created
    assert!(restored.partitions.iter().any(|p| p.name == "p1"));

    // one bulk-insert job per segment, referencing backup-side paths
    let jobs = target_cluster.bulk_inserts();
    assert_eq!(jobs.len(), 3);
    for (_, _, _, files) in &jobs {
        assert!(files[0].starts_with(&format!("backup/{}/binlogs/insert_log/10/", backup.name)));
        let (objects, _) = target_store
            .list_with_prefix("a-bucket", &files[0], true)
            .await
            .unwrap();
        assert!(!objects.is_empty(), "bulk insert dir {} is empty", files[0]);
    }

    let state_resp = restore_engine
        .get_restore_state(&GetRestoreStateRequest {
            id: task.id.clone(),
            ..Default::default()
        })
        .await;
    assert_eq!(state_resp.code, ResponseCode::Success);
    assert_eq!(state_resp.data.unwrap().progress, 100);
}

#[tokio::test]
async fn test_force_backup_skips_flush() {
    let (_store, cluster, engine) = fresh_source();

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "force_backup".to_string(),
            force: true,
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);
    assert_eq!(cluster.flush_calls(), 0);

    let collection = &resp.data.unwrap().collection_backups[0];
    assert!(collection.channel_checkpoints.is_empty());
    assert_eq!(collection.backup_timestamp, 0);
}

#[tokio::test]
async fn test_meta_only_backup_skips_copies() {
    let (store, _cluster, engine) = fresh_source();

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "meta_only".to_string(),
            meta_only: true,
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);
    let backup = resp.data.unwrap();
    assert_eq!(backup.size, 0);

    let keys = store.keys("a-bucket");
    assert!(keys.iter().any(|k| k.starts_with("backup/meta_only/meta/")));
    assert!(!keys.iter().any(|k| k.starts_with("backup/meta_only/binlogs/")));

    for collection in &backup.collection_backups {
        for partition in &collection.partition_backups {
            for segment in &partition.segment_backups {
                assert_eq!(segment.size, 0);
                assert!(segment.insert_logs.is_empty());
            }
        }
    }
}

#[tokio::test]
async fn test_rename_on_restore() {
    let (store, _cluster, engine) = fresh_source();

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "rename_src".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);

    let target_cluster = Arc::new(MockVectorDb::new());
    let restore_engine = engine_with(&store, &target_cluster);
    let restore_resp = restore_engine
        .restore_backup(&RestoreBackupRequest {
            backup_name: "rename_src".to_string(),
            collection_renames: BTreeMap::from([(
                "default.c1".to_string(),
                "db2.c1_new".to_string(),
            )]),
            ..Default::default()
        })
        .await;
    assert_eq!(restore_resp.code, ResponseCode::Success, "msg: {}", restore_resp.msg);

    assert!(target_cluster.collection("default", "c1").is_none());
    let renamed = target_cluster.collection("db2", "c1_new").unwrap();
    assert_eq!(renamed.desc.schema.fields, sample_schema().fields);
    assert_eq!(renamed.desc.consistency_level, 1);
}

#[tokio::test]
async fn test_delete_backup_removes_prefix() {
    let (store, _cluster, engine) = fresh_source();

    engine
        .create_backup(&CreateBackupRequest {
            backup_name: "to_delete".to_string(),
            ..Default::default()
        })
        .await;
    assert!(store.keys("a-bucket").iter().any(|k| k.starts_with("backup/to_delete/")));

    let delete_resp = engine
        .delete_backup(&DeleteBackupRequest {
            backup_name: "to_delete".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(delete_resp.code, ResponseCode::Success);
    assert!(!store.keys("a-bucket").iter().any(|k| k.starts_with("backup/to_delete/")));

    let get_resp = engine
        .get_backup(&GetBackupRequest {
            backup_name: "to_delete".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(get_resp.code, ResponseCode::RequestObjectNotFound);

    // deleting again reports not-found
    let delete_again = engine
        .delete_backup(&DeleteBackupRequest {
            backup_name: "to_delete".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(delete_again.code, ResponseCode::RequestObjectNotFound);
}

#[tokio::test]
async fn test_transient_copy_failures_are_retried() {
    let (store, _cluster, engine) = fresh_source();
    store.inject_copy_failures(2);

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "flaky_copy".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);

    let backup = resp.data.unwrap();
    for collection in &backup.collection_backups {
        for partition in &collection.partition_backups {
            for segment in &partition.segment_backups {
                assert!(segment.backuped, "segment {} not backuped", segment.segment_id);
            }
        }
    }
}

#[tokio::test]
async fn test_duplicate_backup_name_is_parameter_error() {
    let (store, _cluster, engine) = fresh_source();

    let first = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "dup".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(first.code, ResponseCode::Success, "msg: {}", first.msg);
    let keys_before = store.keys("a-bucket");

    let second = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "dup".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(second.code, ResponseCode::ParameterError);
    // no side effects in the object store
    assert_eq!(store.keys("a-bucket"), keys_before);
}

#[tokio::test]
async fn test_db_collections_empty_list_selects_whole_db() {
    let (_store, _cluster, engine) = fresh_source();

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "whole_db".to_string(),
            db_collections: Some(serde_json::json!({"default": []})),
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);
    let backup = resp.data.unwrap();
    assert_eq!(backup.collection_backups.len(), 1);
    assert_eq!(backup.collection_backups[0].collection_name, "c1");
}

#[tokio::test]
async fn test_unknown_collection_is_parameter_error() {
    let (_store, _cluster, engine) = fresh_source();

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "missing_coll".to_string(),
            collection_names: vec!["default.nope".to_string()],
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::ParameterError);
    assert!(resp.msg.contains("does not exist"));
}

#[tokio::test]
async fn test_empty_insert_path_fails_the_backup() {
    let store = Arc::new(InMemoryObjectStore::new());
    let cluster = Arc::new(MockVectorDb::new());
    seed_source_cluster(&cluster);
    // no binlog objects seeded at all
    let engine = engine_with(&store, &cluster);

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "empty_segment".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Fail);
    assert!(resp.msg.contains("should not be empty"), "msg: {}", resp.msg);
}

#[tokio::test]
async fn test_flush_ids_missing_from_snapshots_only_warn() {
    let (_store, cluster, engine) = fresh_source();
    cluster.set_flush_extra_ids(vec![9999]);

    let resp = engine
        .create_backup(&CreateBackupRequest {
            backup_name: "ghost_flush".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);
    assert_eq!(resp.data.unwrap().size, 60);
}

#[tokio::test]
async fn test_list_backups_filters_by_collection() {
    let (_store, _cluster, engine) = fresh_source();

    engine
        .create_backup(&CreateBackupRequest {
            backup_name: "list_me".to_string(),
            ..Default::default()
        })
        .await;

    let all = engine.list_backups(&ListBackupsRequest::default()).await;
    assert_eq!(all.code, ResponseCode::Success);
    assert!(all.data.iter().any(|b| b.name == "list_me"));

    let filtered = engine
        .list_backups(&ListBackupsRequest {
            collection_name: "c1".to_string(),
            ..Default::default()
        })
        .await;
    assert!(filtered.data.iter().any(|b| b.name == "list_me"));

    let none = engine
        .list_backups(&ListBackupsRequest {
            collection_name: "unrelated".to_string(),
            ..Default::default()
        })
        .await;
    assert!(none.data.is_empty());
}

#[tokio::test]
async fn test_get_backup_reads_manifest_from_storage() {
    let (store, _cluster, engine) = fresh_source();

    engine
        .create_backup(&CreateBackupRequest {
            backup_name: "persisted".to_string(),
            ..Default::default()
        })
        .await;

    // a second engine with no in-memory state resolves it from storage
    let other_cluster = Arc::new(MockVectorDb::new());
    let cold_engine = engine_with(&store, &other_cluster);
    let resp = cold_engine
        .get_backup(&GetBackupRequest {
            backup_name: "persisted".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success);
    let backup = resp.data.unwrap();
    assert_eq!(backup.size, 60);
    assert_eq!(backup.collection_backups[0].collection_name, "c1");

    let without_detail = cold_engine
        .get_backup(&GetBackupRequest {
            backup_name: "persisted".to_string(),
            without_detail: true,
            ..Default::default()
        })
        .await;
    assert!(without_detail.data.unwrap().collection_backups[0]
        .partition_backups
        .is_empty());
}

#[tokio::test]
async fn test_restore_index_replays_stored_indexes() {
    let (store, _cluster, engine) = fresh_source();

    engine
        .create_backup(&CreateBackupRequest {
            backup_name: "with_index".to_string(),
            ..Default::default()
        })
        .await;

    // splice an index definition into the persisted manifest to simulate
    // a source collection that had one
    let full_meta_key = "backup/with_index/meta/full_meta.json";
    let mut info: vectordb_backup::meta::BackupInfo =
        serde_json::from_slice(&store.read("a-bucket", full_meta_key).await.unwrap()).unwrap();
    info.collection_backups[0].index_infos = vec![IndexInfo {
        field_name: "vec".to_string(),
        index_name: "vec_idx".to_string(),
        index_type: "HNSW".to_string(),
        params: HashMap::from([("M".to_string(), "16".to_string())]),
    }];
    store
        .write("a-bucket", full_meta_key, &serde_json::to_vec(&info).unwrap())
        .await
        .unwrap();

    let target_cluster = Arc::new(MockVectorDb::new());
    let restore_engine = engine_with(&store, &target_cluster);
    let resp = restore_engine
        .restore_backup(&RestoreBackupRequest {
            backup_name: "with_index".to_string(),
            restore_index: true,
            restore_auto_index: true,
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::Success, "msg: {}", resp.msg);

    let indexes = target_cluster.created_indexes();
    assert_eq!(indexes.len(), 1);
    let (db, collection, index, auto) = &indexes[0];
    assert_eq!(db, "default");
    assert_eq!(collection, "c1");
    assert_eq!(index.index_name, "vec_idx");
    // vec is a vector field, so the auto-index substitution applies
    assert!(*auto);
}

#[tokio::test]
async fn test_restore_missing_backup_is_not_found() {
    let (_store, _cluster, engine) = fresh_source();
    let resp = engine
        .restore_backup(&RestoreBackupRequest {
            backup_name: "never_created".to_string(),
            ..Default::default()
        })
        .await;
    assert_eq!(resp.code, ResponseCode::RequestObjectNotFound);
}

#[tokio::test]
async fn test_check_reports_connectivity() {
    let (_store, _cluster, engine) = fresh_source();
    let report = engine.check().await;
    assert!(report.contains("Succeeded"), "report: {report}");
    assert!(report.contains("v2.4.1"));
}
