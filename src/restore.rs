//! Restore pipeline.
//!
//! A restore task is planned from the manifest (selection mirror of the
//! backup side, plus renames), then executed collection by collection:
//! ensure the target database/collection, optionally re-create indexes,
//! and drive one bulk-insert job per segment through the per-task pool,
//! polling each job to a terminal state.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::{
    ensure_request_id, parse_db_collections, GetBackupRequest, ResponseCode,
    RestoreBackupRequest, RestoreBackupResponse,
};
use crate::cluster::{is_vector_data_type, BulkInsertState, CreateCollectionSpec};
use crate::engine::BackupEngine;
use crate::error::{Error, Result};
use crate::meta::manager::{RestoreCollectionOpt, RestoreOpt};
use crate::meta::{paths, BackupInfo, CollectionBackup, CollectionRestoreTask, RestoreTask, TaskState};
use crate::retry::{retry, COPY_RETRY};

/// Hard cap on a single bulk-insert job.
const BULKINSERT_TIMEOUT_SECS: u64 = 3600;
/// Poll interval while a bulk-insert job is running.
const BULKINSERT_SLEEP_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub(crate) struct CollectionRestorePlan {
    subtask_id: String,
    collection: CollectionBackup,
    target_db: String,
    target_collection: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct RestoreOptions {
    restore_index: bool,
    restore_auto_index: bool,
    skip_create_collection: bool,
    skip_create_database: bool,
}

impl BackupEngine {
    /// Restore a backup into the target cluster. Synchronous unless
    /// `request.async_` is set.
    pub async fn restore_backup(self: &Arc<Self>, request: &RestoreBackupRequest) -> RestoreBackupResponse {
        let request_id = ensure_request_id(&request.request_id);
        info!(
            request_id = %request_id,
            backup_name = %request.backup_name,
            collections = ?request.collection_names,
            suffix = %request.collection_suffix,
            renames = ?request.collection_renames,
            is_async = request.async_,
            meta_only = request.meta_only,
            "receive RestoreBackupRequest"
        );

        let mut resp = RestoreBackupResponse {
            request_id: request_id.clone(),
            ..Default::default()
        };

        if request.backup_name.is_empty() {
            resp.code = ResponseCode::ParameterError;
            resp.msg = "empty backup name to restore".into();
            return resp;
        }

        let get_resp = self
            .get_backup(&GetBackupRequest {
                backup_name: request.backup_name.clone(),
                ..Default::default()
            })
            .await;
        let backup = match (get_resp.code, get_resp.data) {
            (ResponseCode::Success, Some(backup)) => backup,
            (ResponseCode::RequestObjectNotFound, _) | (_, None) => {
                resp.code = ResponseCode::RequestObjectNotFound;
                resp.msg = format!("restore backup does not exist: {}", request.backup_name);
                return resp;
            }
            (_, Some(_)) => {
                resp.code = ResponseCode::Fail;
                resp.msg = get_resp.msg;
                return resp;
            }
        };

        let plans = match plan_restore(&backup, request) {
            Ok(plans) => plans,
            Err(err) => {
                resp.code = ResponseCode::from(&err);
                resp.msg = err.to_string();
                return resp;
            }
        };

        let task_id = format!("restore_{}", uuid::Uuid::new_v4());
        let task = RestoreTask {
            id: task_id.clone(),
            backup_id: backup.id.clone(),
            backup_name: backup.name.clone(),
            state_code: TaskState::Initial,
            start_time: Self::now_ms(),
            to_restore_size: plans.iter().map(|p| p.collection.size).sum(),
            collection_restore_tasks: plans
                .iter()
                .map(|plan| CollectionRestoreTask {
                    id: plan.subtask_id.clone(),
                    db_name: plan.collection.db_name.clone(),
                    collection_name: plan.collection.collection_name.clone(),
                    target_db_name: plan.target_db.clone(),
                    target_collection_name: plan.target_collection.clone(),
                    to_restore_size: plan.collection.size,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };
        self.meta.add_restore_task(task.clone());
        self.registry.register_restore(&task_id);

        if request.meta_only {
            info!(task_id = %task_id, "meta only restore, the task is planned but not executed");
            resp.code = ResponseCode::Success;
            resp.msg = "success".into();
            resp.data = Some(task);
            return resp;
        }

        let options = RestoreOptions {
            restore_index: request.restore_index,
            restore_auto_index: request.restore_auto_index,
            skip_create_collection: request.skip_create_collection,
            skip_create_database: request.skip_create_database,
        };

        if request.async_ {
            let engine = Arc::clone(self);
            let token = self.token.child_token();
            let spawned_task_id = task_id.clone();
            tokio::spawn(async move {
                if let Err(err) = engine
                    .execute_restore(&token, &spawned_task_id, &backup, &plans, options)
                    .await
                {
                    warn!(task_id = %spawned_task_id, error = %err, "async restore failed");
                }
            });
            resp.code = ResponseCode::Success;
            resp.msg = "restore backup is executing asynchronously".into();
            resp.data = Some(task);
            return resp;
        }

        let result = self
            .execute_restore(&self.token.child_token(), &task_id, &backup, &plans, options)
            .await;
        resp.data = self.meta.get_restore_task(&task_id);
        match result {
            Ok(()) => {
                resp.code = ResponseCode::Success;
                resp.msg = "success".into();
            }
            Err(err) => {
                resp.code = ResponseCode::from(&err);
                resp.msg = err.to_string();
            }
        }
        resp
    }

    async fn execute_restore(
        self: &Arc<Self>,
        token: &CancellationToken,
        task_id: &str,
        backup: &BackupInfo,
        plans: &[CollectionRestorePlan],
        options: RestoreOptions,
    ) -> Result<()> {
        self.meta
            .update_restore_task(task_id, [RestoreOpt::State(TaskState::Executing)]);

        let mut result = Ok(());
        for plan in plans {
            if let Err(err) = self
                .restore_collection(token, task_id, backup, plan, options)
                .await
            {
                result = Err(err);
                break;
            }
        }
        self.drop_restore_pool(task_id);

        match &result {
            Ok(()) => {
                self.meta.update_restore_task(
                    task_id,
                    [
                        RestoreOpt::State(TaskState::Success),
                        RestoreOpt::EndTime(Self::now_ms()),
                    ],
                );
                info!(task_id = %task_id, "restore task finished");
            }
            Err(err) => {
                self.meta.update_restore_task(
                    task_id,
                    [
                        RestoreOpt::State(TaskState::Fail),
                        RestoreOpt::ErrorMessage(err.to_string()),
                        RestoreOpt::EndTime(Self::now_ms()),
                    ],
                );
                warn!(task_id = %task_id, error = %err, "restore task failed");
            }
        }
        result
    }

    async fn restore_collection(
        self: &Arc<Self>,
        token: &CancellationToken,
        task_id: &str,
        backup: &BackupInfo,
        plan: &CollectionRestorePlan,
        options: RestoreOptions,
    ) -> Result<()> {
        let db = &plan.target_db;
        let collection = &plan.target_collection;
        self.meta.update_restore_collection_task(
            task_id,
            &plan.subtask_id,
            [RestoreCollectionOpt::State(TaskState::Executing)],
        );
        info!(
            source = %format!("{}.{}", plan.collection.db_name, plan.collection.collection_name),
            target = %format!("{db}.{collection}"),
            "start restore collection"
        );

        let result = self
            .restore_collection_inner(token, task_id, backup, plan, options)
            .await;
        match &result {
            Ok(()) => {
                self.meta.update_restore_collection_task(
                    task_id,
                    &plan.subtask_id,
                    [RestoreCollectionOpt::State(TaskState::Success)],
                );
            }
            Err(err) => {
                self.meta.update_restore_collection_task(
                    task_id,
                    &plan.subtask_id,
                    [
                        RestoreCollectionOpt::State(TaskState::Fail),
                        RestoreCollectionOpt::ErrorMessage(err.to_string()),
                    ],
                );
            }
        }
        result
    }

    async fn restore_collection_inner(
        self: &Arc<Self>,
        token: &CancellationToken,
        task_id: &str,
        backup: &BackupInfo,
        plan: &CollectionRestorePlan,
        options: RestoreOptions,
    ) -> Result<()> {
        let db = &plan.target_db;
        let collection = &plan.target_collection;

        if options.skip_create_collection {
            if !self.cluster().has_collection(db, collection).await? {
                return Err(Error::Param(format!(
                    "target collection does not exist and skipCreateCollection is set: {db}.{collection}"
                )));
            }
        } else {
            if !self.cluster().list_databases().await?.contains(db) {
                if options.skip_create_database {
                    return Err(Error::Param(format!(
                        "target database does not exist and skipCreateDatabase is set: {db}"
                    )));
                }
                self.cluster().create_database(db).await?;
                info!(db, "created missing target database");
            }
            if self.cluster().has_collection(db, collection).await? {
                return Err(Error::Param(format!(
                    "target collection already exists: {db}.{collection}"
                )));
            }
            let mut schema = plan.collection.schema.clone();
            schema.name = collection.clone();
            self.cluster()
                .create_collection(CreateCollectionSpec {
                    db_name: db.clone(),
                    collection_name: collection.clone(),
                    schema,
                    shards_num: plan.collection.shards_num,
                    consistency_level: plan.collection.consistency_level,
                })
                .await?;
            info!(db, collection, "created target collection from the stored schema");
        }

        if options.restore_index {
            for index in &plan.collection.index_infos {
                let on_vector_field = plan
                    .collection
                    .schema
                    .fields
                    .iter()
                    .find(|field| field.name == index.field_name)
                    .map(|field| is_vector_data_type(field.data_type))
                    .unwrap_or(false);
                let auto_index = options.restore_auto_index && on_vector_field;
                self.cluster()
                    .create_index(db, collection, index, auto_index)
                    .await?;
                info!(
                    db,
                    collection,
                    index = %index.index_name,
                    auto_index,
                    "restored index"
                );
            }
        }

        let pool = self.restore_pool(task_id);
        let mut job_ids = Vec::new();
        for partition in &plan.collection.partition_backups {
            if !self
                .cluster()
                .has_partition(db, collection, &partition.partition_name)
                .await?
            {
                self.cluster()
                    .create_partition(db, collection, &partition.partition_name)
                    .await?;
                info!(
                    db,
                    collection,
                    partition = %partition.partition_name,
                    "created missing target partition"
                );
            }

            for segment in &partition.segment_backups {
                let mut files = vec![paths::backup_log_dir(
                    &self.backup_root,
                    &backup.name,
                    paths::INSERT_LOG,
                    segment.collection_id,
                    segment.partition_id,
                    segment.group_id,
                    segment.segment_id,
                )];
                if segment.delta_logs.iter().any(|f| !f.binlogs.is_empty()) {
                    files.push(paths::backup_log_dir(
                        &self.backup_root,
                        &backup.name,
                        paths::DELTA_LOG,
                        segment.collection_id,
                        segment.partition_id,
                        segment.group_id,
                        segment.segment_id,
                    ));
                }

                let engine = Arc::clone(self);
                let db = db.clone();
                let collection = collection.clone();
                let partition_name = partition.partition_name.clone();
                let task_id = task_id.to_string();
                let subtask_id = plan.subtask_id.clone();
                let segment_size = segment.size;
                job_ids.push(pool.submit(move |job_token| async move {
                    engine
                        .run_bulk_insert(&job_token, &db, &collection, &partition_name, &files)
                        .await?;
                    engine.meta.add_restored_size(&task_id, &subtask_id, segment_size);
                    Ok(())
                }));
            }
        }
        pool.wait_with_token(&job_ids, token).await
    }

    /// Submit one bulk-insert job and poll it to a terminal state.
    async fn run_bulk_insert(
        &self,
        token: &CancellationToken,
        db: &str,
        collection: &str,
        partition: &str,
        files: &[String],
    ) -> Result<()> {
        let job_id = retry(token, COPY_RETRY, || {
            self.cluster().bulk_insert(db, collection, partition, files)
        })
        .await?;
        info!(db, collection, partition, job_id, files = ?files, "submitted bulk insert job");

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(BULKINSERT_TIMEOUT_SECS);
        loop {
            let state = self.cluster().get_bulk_insert_state(job_id).await?;
            match state.state {
                BulkInsertState::Completed => return Ok(()),
                BulkInsertState::Failed => {
                    return Err(Error::Fatal(format!(
                        "bulk insert job {job_id} failed: {}",
                        state.reason
                    )));
                }
                BulkInsertState::Pending | BulkInsertState::Importing => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(Error::Fatal(format!(
                    "bulk insert job {job_id} timed out after {BULKINSERT_TIMEOUT_SECS}s"
                )));
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(BULKINSERT_SLEEP_INTERVAL_SECS)) => {}
                _ = token.cancelled() => return Err(Error::Cancelled),
            }
        }
    }
}

/// Build the per-collection restore plans: selection (dbCollections >
/// collectionNames > all), then rename resolution.
fn plan_restore(
    backup: &BackupInfo,
    request: &RestoreBackupRequest,
) -> Result<Vec<CollectionRestorePlan>> {
    let mut selected: Vec<&CollectionBackup> = Vec::new();

    if let Some(db_collections) = parse_db_collections(&request.db_collections)? {
        for (db, collections) in db_collections {
            if collections.is_empty() {
                selected.extend(backup.collection_backups.iter().filter(|c| c.db_name == db));
            } else {
                for name in collections {
                    let found = backup
                        .collection_backups
                        .iter()
                        .find(|c| c.db_name == db && c.collection_name == name)
                        .ok_or_else(|| {
                            Error::Param(format!(
                                "collection not found in the backup: {db}.{name}"
                            ))
                        })?;
                    selected.push(found);
                }
            }
        }
    } else if !request.collection_names.is_empty() {
        for full_name in &request.collection_names {
            let (db, name) = match full_name.split_once('.') {
                Some((db, name)) => (db.to_string(), name.to_string()),
                None => ("default".to_string(), full_name.clone()),
            };
            let found = backup
                .collection_backups
                .iter()
                .find(|c| c.db_name == db && c.collection_name == name)
                .ok_or_else(|| {
                    Error::Param(format!("collection not found in the backup: {db}.{name}"))
                })?;
            selected.push(found);
        }
    } else {
        selected.extend(backup.collection_backups.iter());
    }

    let mut plans = Vec::with_capacity(selected.len());
    for collection in selected {
        let (target_db, target_collection) = resolve_target(
            &collection.db_name,
            &collection.collection_name,
            &request.collection_renames,
            &request.collection_suffix,
        );
        plans.push(CollectionRestorePlan {
            subtask_id: uuid::Uuid::new_v4().to_string(),
            collection: collection.clone(),
            target_db,
            target_collection,
        });
    }
    Ok(plans)
}

/// Apply renames: a qualified `db.coll` key wins over a bare collection
/// key; the uniform suffix applies only when no explicit rename matched.
fn resolve_target(
    db: &str,
    collection: &str,
    renames: &BTreeMap<String, String>,
    suffix: &str,
) -> (String, String) {
    let renamed = renames
        .get(&format!("{db}.{collection}"))
        .or_else(|| renames.get(collection));
    if let Some(new_name) = renamed {
        return match new_name.split_once('.') {
            Some((new_db, new_collection)) => (new_db.to_string(), new_collection.to_string()),
            None => (db.to_string(), new_name.clone()),
        };
    }
    if !suffix.is_empty() {
        return (db.to_string(), format!("{collection}{suffix}"));
    }
    (db.to_string(), collection.to_string())
}
