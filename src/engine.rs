//! Engine state shared by the backup and restore pipelines.
//!
//! One engine owns the capability clients, the task stores and the worker
//! pools. The backup pipeline lives in `backup.rs`, the restore pipeline
//! in `restore.rs`; this module carries the lookup/delete/inspection
//! operations they share.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{
    ensure_request_id, BackupInfoResponse, DeleteBackupRequest, DeleteBackupResponse,
    GetBackupRequest, GetRestoreStateRequest, ListBackupsRequest, ListBackupsResponse,
    ResponseCode, RestoreBackupResponse,
};
use crate::cluster::VectorDb;
use crate::config::BackupParams;
use crate::error::{Error, Result};
use crate::meta::manager::MetaManager;
use crate::meta::{codec, paths, BackupInfo};
use crate::pool::WorkerPool;
use crate::registry::TaskRegistry;
use crate::storage::ObjectStore;

/// Rate ceiling applied to every worker pool, jobs per second.
pub(crate) const RPS: u32 = 1000;

pub struct BackupEngine {
    pub(crate) params: BackupParams,
    storage: OnceLock<Arc<dyn ObjectStore>>,
    cluster: OnceLock<Arc<dyn VectorDb>>,

    pub(crate) source_bucket: String,
    pub(crate) backup_bucket: String,
    pub(crate) source_root: String,
    pub(crate) backup_root: String,

    pub(crate) meta: MetaManager,
    pub(crate) registry: TaskRegistry,

    /// Serializes whole backup executions; held across an entire
    /// `execute_create_backup`.
    pub(crate) exec_mutex: tokio::sync::Mutex<()>,

    collection_pool: Mutex<Option<Arc<WorkerPool>>>,
    copy_pool: Mutex<Option<Arc<WorkerPool>>>,
    restore_pools: Mutex<HashMap<String, Arc<WorkerPool>>>,

    pub(crate) token: CancellationToken,
    pub(crate) http: reqwest::Client,
}

impl BackupEngine {
    pub fn new(params: BackupParams) -> Self {
        Self {
            source_bucket: params.minio.bucket_name.clone(),
            backup_bucket: params.minio.backup_bucket_name.clone(),
            source_root: params.minio.root_path.clone(),
            backup_root: params.minio.backup_root_path.clone(),
            params,
            storage: OnceLock::new(),
            cluster: OnceLock::new(),
            meta: MetaManager::new(),
            registry: TaskRegistry::new(),
            exec_mutex: tokio::sync::Mutex::new(()),
            collection_pool: Mutex::new(None),
            copy_pool: Mutex::new(None),
            restore_pools: Mutex::new(HashMap::new()),
            token: CancellationToken::new(),
            http: reqwest::Client::new(),
        }
    }

    /// Inject the object store client. Must be called before any
    /// operation touching storage.
    pub fn with_storage(self, client: Arc<dyn ObjectStore>) -> Self {
        let _ = self.storage.set(client);
        self
    }

    /// Inject the vector database client. Must be called before any
    /// operation touching the cluster.
    pub fn with_cluster(self, client: Arc<dyn VectorDb>) -> Self {
        let _ = self.cluster.set(client);
        self
    }

    /// A missing client on a required path is a wiring bug, not a runtime
    /// condition.
    pub(crate) fn storage(&self) -> &Arc<dyn ObjectStore> {
        self.storage.get().expect("object store client not configured")
    }

    pub(crate) fn cluster(&self) -> &Arc<dyn VectorDb> {
        self.cluster.get().expect("vector db client not configured")
    }

    pub(crate) fn collection_pool(&self) -> Arc<WorkerPool> {
        let mut guard = self.collection_pool.lock().unwrap();
        guard
            .get_or_insert_with(|| {
                Arc::new(WorkerPool::new(
                    self.params.backup.parallelism,
                    RPS,
                    self.token.child_token(),
                ))
            })
            .clone()
    }

    pub(crate) fn copy_pool(&self) -> Arc<WorkerPool> {
        let mut guard = self.copy_pool.lock().unwrap();
        guard
            .get_or_insert_with(|| {
                Arc::new(WorkerPool::new(
                    self.params.backup.copydata.parallelism,
                    RPS,
                    self.token.child_token(),
                ))
            })
            .clone()
    }

    pub(crate) fn restore_pool(&self, task_id: &str) -> Arc<WorkerPool> {
        let mut pools = self.restore_pools.lock().unwrap();
        pools
            .entry(task_id.to_string())
            .or_insert_with(|| {
                Arc::new(WorkerPool::new(
                    self.params.restore.parallelism,
                    RPS,
                    self.token.child_token(),
                ))
            })
            .clone()
    }

    pub(crate) fn drop_restore_pool(&self, task_id: &str) {
        if let Some(pool) = self.restore_pools.lock().unwrap().remove(task_id) {
            pool.shutdown();
        }
    }

    pub(crate) fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Lookup by id, then by name in memory, then by manifest in the
    /// object store.
    pub async fn get_backup(&self, request: &GetBackupRequest) -> BackupInfoResponse {
        let request_id = ensure_request_id(&request.request_id);
        info!(
            request_id = %request_id,
            backup_id = %request.backup_id,
            backup_name = %request.backup_name,
            "receive GetBackupRequest"
        );

        let mut resp = BackupInfoResponse {
            request_id,
            ..Default::default()
        };

        if request.backup_id.is_empty() && request.backup_name.is_empty() {
            resp.code = ResponseCode::ParameterError;
            resp.msg = "empty backup name and backup id, please set a backup name or id".into();
            return resp;
        }

        let info = if !request.backup_id.is_empty() {
            self.meta.full_meta(&request.backup_id)
        } else if let Some(id) = self.registry.backup_id_by_name(&request.backup_name) {
            self.meta.full_meta(&id)
        } else {
            let (bucket, root) = if request.bucket_name.is_empty() || request.path.is_empty() {
                (self.backup_bucket.clone(), self.backup_root.clone())
            } else {
                (request.bucket_name.clone(), request.path.clone())
            };
            match self.read_backup(&bucket, &root, &request.backup_name).await {
                Ok(info) => Some(info),
                Err(Error::NotFound(_)) => None,
                Err(err) => {
                    warn!(
                        backup_name = %request.backup_name,
                        error = %err,
                        "failed to read backup from storage"
                    );
                    resp.code = ResponseCode::Fail;
                    resp.msg = err.to_string();
                    return resp;
                }
            }
        };

        match info {
            Some(info) => {
                resp.code = ResponseCode::Success;
                resp.msg = "success".into();
                resp.data = if request.without_detail {
                    Some(info.simplified())
                } else {
                    Some(info)
                };
            }
            None => {
                resp.code = ResponseCode::RequestObjectNotFound;
                resp.msg = "not found".into();
            }
        }
        resp
    }

    /// Read a manifest from storage. Tries the hydrated `full_meta.json`
    /// first, then joins the flat tables.
    pub(crate) async fn read_backup(
        &self,
        bucket: &str,
        root: &str,
        name: &str,
    ) -> Result<BackupInfo> {
        let storage = self.storage();

        if let Ok(bytes) = storage.read(bucket, &paths::full_meta_path(root, name)).await {
            match codec::deserialize_full(&bytes) {
                Ok(info) => return Ok(info),
                Err(err) => {
                    warn!(backup_name = %name, error = %err, "full meta unreadable, falling back to flat tables");
                }
            }
        }

        let backup_meta_path = paths::backup_meta_path(root, name);
        if !storage.exist(bucket, &backup_meta_path).await? {
            return Err(Error::NotFound(format!("backup {name} at {bucket}:{root}")));
        }
        let backup_meta = storage.read(bucket, &backup_meta_path).await?;
        let collection_meta = storage
            .read(bucket, &paths::collection_meta_path(root, name))
            .await?;
        let partition_meta = storage
            .read(bucket, &paths::partition_meta_path(root, name))
            .await?;
        let segment_meta = storage
            .read(bucket, &paths::segment_meta_path(root, name))
            .await?;
        codec::deserialize(&backup_meta, &collection_meta, &partition_meta, &segment_meta)
    }

    /// Enumerate backups under the backup root. Unreadable entries are
    /// skipped with a warning.
    pub async fn list_backups(&self, request: &ListBackupsRequest) -> ListBackupsResponse {
        let request_id = ensure_request_id(&request.request_id);
        info!(
            request_id = %request_id,
            collection_name = %request.collection_name,
            "receive ListBackupsRequest"
        );

        let mut resp = ListBackupsResponse {
            request_id,
            ..Default::default()
        };

        let prefix = format!("{}{}", self.backup_root, paths::SEPARATOR);
        let entries = match self
            .storage()
            .list_with_prefix(&self.backup_bucket, &prefix, false)
            .await
        {
            Ok((paths, _sizes)) => paths,
            Err(err) => {
                resp.code = ResponseCode::Fail;
                resp.msg = err.to_string();
                return resp;
            }
        };

        let mut backups = Vec::new();
        for entry in entries {
            let name = paths::backup_name_from_path(&self.backup_root, &entry);
            if name.is_empty() {
                continue;
            }
            let get_resp = self
                .get_backup(&GetBackupRequest {
                    backup_name: name.clone(),
                    ..Default::default()
                })
                .await;
            if get_resp.code != ResponseCode::Success {
                warn!(path = %entry, msg = %get_resp.msg, "skip unreadable backup");
                continue;
            }
            let Some(info) = get_resp.data else { continue };
            if !request.collection_name.is_empty()
                && !info
                    .collection_backups
                    .iter()
                    .any(|c| c.collection_name == request.collection_name)
            {
                continue;
            }
            backups.push(info);
        }

        resp.code = ResponseCode::Success;
        resp.msg = "success".into();
        resp.data = backups;
        resp
    }

    /// Remove a backup's prefix from storage. The removal is issued
    /// unconditionally; the response only classifies what was there.
    pub async fn delete_backup(&self, request: &DeleteBackupRequest) -> DeleteBackupResponse {
        let request_id = ensure_request_id(&request.request_id);
        info!(
            request_id = %request_id,
            backup_name = %request.backup_name,
            "receive DeleteBackupRequest"
        );

        let mut resp = DeleteBackupResponse {
            request_id,
            ..Default::default()
        };

        if request.backup_name.is_empty() {
            resp.code = ResponseCode::ParameterError;
            resp.msg = "empty backup name".into();
            return resp;
        }

        let get_resp = self
            .get_backup(&GetBackupRequest {
                backup_name: request.backup_name.clone(),
                ..Default::default()
            })
            .await;

        let prefix = format!(
            "{}{}",
            paths::backup_dir(&self.backup_root, &request.backup_name),
            paths::SEPARATOR
        );
        let remove_result = self
            .storage()
            .remove_with_prefix(&self.backup_bucket, &prefix)
            .await;

        // forget the in-memory task so later lookups reflect the deletion
        if let Some(id) = self.registry.backup_id_by_name(&request.backup_name) {
            self.meta.remove_backup(&id);
            self.registry.unregister_backup(&request.backup_name, &id);
        }

        if get_resp.code == ResponseCode::RequestObjectNotFound {
            resp.code = ResponseCode::RequestObjectNotFound;
            resp.msg = get_resp.msg;
            return resp;
        }
        if get_resp.code != ResponseCode::Success {
            resp.code = ResponseCode::Fail;
            resp.msg = get_resp.msg;
            return resp;
        }
        if let Err(err) = remove_result {
            resp.code = ResponseCode::Fail;
            resp.msg = err.to_string();
            return resp;
        }

        resp.code = ResponseCode::Success;
        resp.msg = "success".into();
        resp
    }

    /// Progress of a restore task. Percent is floored to 1 while any
    /// bytes have been restored, and pinned to 100 on success.
    pub async fn get_restore_state(&self, request: &GetRestoreStateRequest) -> RestoreBackupResponse {
        let request_id = ensure_request_id(&request.request_id);

        let mut resp = RestoreBackupResponse {
            request_id,
            ..Default::default()
        };

        if request.id.is_empty() {
            resp.code = ResponseCode::ParameterError;
            resp.msg = "empty restore id".into();
            return resp;
        }

        match self.meta.get_restore_task(&request.id) {
            Some(mut task) => {
                task.progress = restore_progress(
                    task.restored_size,
                    task.to_restore_size,
                    task.state_code == crate::meta::TaskState::Success,
                );
                resp.code = ResponseCode::Success;
                resp.msg = "success".into();
                resp.data = Some(task);
            }
            None => {
                resp.code = ResponseCode::RequestObjectNotFound;
                resp.msg = format!("restore task {} does not exist", request.id);
            }
        }
        resp
    }

    /// End-to-end connectivity probe: cluster version, both storage
    /// roots, and a write/copy round trip between them.
    pub async fn check(&self) -> String {
        let version = match self.cluster().get_version().await {
            Ok(version) => version,
            Err(err) => return format!("Failed to connect to the vector database: {err}"),
        };

        let info = format!(
            "Version: {version}\nStorage:\nsource-bucket: {}\nsource-rootpath: {}\nbackup-bucket: {}\nbackup-rootpath: {}\n",
            self.source_bucket, self.source_root, self.backup_bucket, self.backup_root
        );

        let source_prefix = format!("{}{}", self.source_root, paths::SEPARATOR);
        let paths_listed = match self
            .storage()
            .list_with_prefix(&self.source_bucket, &source_prefix, false)
            .await
        {
            Ok((paths, _)) => paths,
            Err(err) => return format!("Failed to connect to the source storage path\n{info}{err}"),
        };
        if paths_listed.is_empty() {
            return format!(
                "Source storage is empty. Please verify whether your cluster is really empty. If not, the storage configs (address, bucket, rootPath) may be wrong\n{info}"
            );
        }

        let backup_prefix = format!("{}{}", self.backup_root, paths::SEPARATOR);
        if let Err(err) = self
            .storage()
            .list_with_prefix(&self.backup_bucket, &backup_prefix, false)
            .await
        {
            return format!("Failed to connect to the backup storage path\n{info}{err}");
        }

        let probe = format!("backup_check_{}", uuid::Uuid::new_v4());
        let source_probe = format!("{}{}{}", self.source_root, paths::SEPARATOR, probe);
        let backup_probe = format!("{}{}{}", self.backup_root, paths::SEPARATOR, probe);

        if let Err(err) = self
            .storage()
            .write(&self.source_bucket, &source_probe, &[1])
            .await
        {
            return format!("Failed to write to the source storage path\n{info}{err}");
        }
        let copy_result = self
            .storage()
            .copy(&self.source_bucket, &self.backup_bucket, &source_probe, &backup_probe)
            .await;
        let _ = self.storage().remove(&self.source_bucket, &source_probe).await;
        let _ = self.storage().remove(&self.backup_bucket, &backup_probe).await;
        if let Err(err) = copy_result {
            return format!("Failed to copy from source storage to backup storage\n{info}{err}");
        }

        format!("Succeeded to connect to the vector database and storage.\n{info}")
    }

    /// Tear down pools and evict all task state.
    pub fn close(&self) {
        self.token.cancel();
        if let Some(pool) = self.collection_pool.lock().unwrap().take() {
            pool.shutdown();
        }
        if let Some(pool) = self.copy_pool.lock().unwrap().take() {
            pool.shutdown();
        }
        for (_, pool) in self.restore_pools.lock().unwrap().drain() {
            pool.shutdown();
        }
        self.registry.clear();
        self.meta.clear();
        info!("backup engine closed");
    }
}

/// Integer percent with the floor-1-while-nonzero rule.
pub(crate) fn restore_progress(restored: i64, to_restore: i64, finished: bool) -> i32 {
    if finished || to_restore <= 0 {
        return 100;
    }
    let percent = ((restored * 100) / to_restore) as i32;
    if percent == 0 && restored > 0 {
        1
    } else {
        percent.min(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_restore_progress_floor_rule() {
        assert_eq!(restore_progress(0, 1000, false), 0);
        assert_eq!(restore_progress(1, 1000, false), 1);
        assert_eq!(restore_progress(5, 1000, false), 1);
        assert_eq!(restore_progress(500, 1000, false), 50);
        assert_eq!(restore_progress(1000, 1000, false), 100);
        assert_eq!(restore_progress(0, 0, false), 100);
        assert_eq!(restore_progress(10, 1000, true), 100);
    }
}
