//! Backup creation pipeline.
//!
//! `create_backup` validates and registers the task, then
//! `execute_create_backup` runs two waves over the collection pool: a
//! prepare wave (flush + topology + load state, wrapped in the coarse
//! retry) and an execute wave (binlog inventory + object copies over the
//! copy pool). The manifest is exported last.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{
    ensure_request_id, parse_db_collections, validate_backup_name, BackupInfoResponse,
    CreateBackupRequest, ResponseCode,
};
use crate::cluster::SegmentInfo;
use crate::engine::BackupEngine;
use crate::error::{Error, Result};
use crate::meta::manager::{BackupOpt, CollectionOpt, SegmentOpt};
use crate::meta::{
    codec, paths, BackupInfo, Binlog, CollectionBackup, FieldBinlog, LoadState, PartitionBackup,
    SegmentBackup, TaskState,
};
use crate::retry::{retry, COPY_RETRY, PREPARE_RETRY};

const GC_WARN: &str = "this warning does not fail the backup; pausing GC only protects long-running backups from compaction";

impl BackupEngine {
    /// Create a backup. Synchronous unless `request.async_` is set, in
    /// which case the returned task handle tracks a detached execution.
    pub async fn create_backup(self: &Arc<Self>, request: &CreateBackupRequest) -> BackupInfoResponse {
        let request_id = ensure_request_id(&request.request_id);
        info!(
            request_id = %request_id,
            backup_name = %request.backup_name,
            collections = ?request.collection_names,
            is_async = request.async_,
            force = request.force,
            meta_only = request.meta_only,
            "receive CreateBackupRequest"
        );

        let mut resp = BackupInfoResponse {
            request_id: request_id.clone(),
            ..Default::default()
        };

        let name = if request.backup_name.is_empty() {
            generated_backup_name()
        } else {
            request.backup_name.clone()
        };
        if let Err(err) = validate_backup_name(&name) {
            resp.code = ResponseCode::ParameterError;
            resp.msg = err.to_string();
            return resp;
        }

        match self.backup_exists(&name).await {
            Ok(true) => {
                resp.code = ResponseCode::ParameterError;
                resp.msg = format!("backup already exist with the name: {name}");
                return resp;
            }
            Ok(false) => {}
            Err(err) => {
                resp.code = ResponseCode::Fail;
                resp.msg = format!("fail to check whether backup exists: {err}");
                return resp;
            }
        }

        let source_version = match self.cluster().get_version().await {
            Ok(version) => version,
            Err(err) => {
                resp.code = ResponseCode::Fail;
                resp.msg = format!("fail to get the source cluster version: {err}");
                return resp;
            }
        };

        let backup = BackupInfo {
            id: request_id.clone(),
            name: name.clone(),
            state_code: TaskState::Initial,
            start_time: Self::now_ms(),
            source_version,
            ..Default::default()
        };
        self.meta.add_backup(backup.clone());
        self.registry.register_backup(&name, &backup.id);

        let mut request = request.clone();
        request.backup_name = name;

        if request.async_ {
            let engine = Arc::clone(self);
            let token = self.token.child_token();
            let backup_id = backup.id.clone();
            tokio::spawn(async move {
                if let Err(err) = engine.execute_create_backup(&token, &request, &backup_id).await {
                    warn!(backup_id = %backup_id, error = %err, "async backup failed");
                }
            });
            resp.code = ResponseCode::Success;
            resp.msg = "create backup is executing asynchronously".into();
            resp.data = Some(backup);
            return resp;
        }

        let result = self
            .execute_create_backup(&self.token.child_token(), &request, &backup.id)
            .await;
        resp.data = self.meta.full_meta(&backup.id);
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

    /// Whole-backup execution. The engine-wide mutex is held throughout
    /// so two backups never interleave their flush cuts.
    pub(crate) async fn execute_create_backup(
        self: &Arc<Self>,
        token: &CancellationToken,
        request: &CreateBackupRequest,
        backup_id: &str,
    ) -> Result<()> {
        let _guard = self.exec_mutex.lock().await;

        let gc_address = if request.gc_pause_enable || self.params.backup.gc_pause_enable {
            let seconds = if request.gc_pause_seconds == 0 {
                self.params.backup.gc_pause_seconds
            } else {
                request.gc_pause_seconds
            };
            let address = if request.gc_pause_address.is_empty() {
                self.params.backup.gc_pause_address.clone()
            } else {
                request.gc_pause_address.clone()
            };
            self.pause_gc(&address, seconds).await;
            Some(address)
        } else {
            None
        };

        let result = self.run_backup_waves(token, request, backup_id).await;

        if let Some(address) = gc_address {
            self.resume_gc(&address).await;
        }
        result
    }

    async fn run_backup_waves(
        self: &Arc<Self>,
        token: &CancellationToken,
        request: &CreateBackupRequest,
        backup_id: &str,
    ) -> Result<()> {
        self.meta
            .update_backup(backup_id, [BackupOpt::State(TaskState::Executing)]);

        let collections = match self.parse_backup_collections(request).await {
            Ok(collections) => collections,
            Err(err) => {
                self.fail_backup(backup_id, &err);
                return Err(err);
            }
        };
        info!(
            backup_id = %backup_id,
            collections = ?collections,
            "collections to backup"
        );

        let pool = self.collection_pool();
        let mut prepare_ids = Vec::with_capacity(collections.len());
        for (db, collection) in collections {
            let engine = Arc::clone(self);
            let backup_id = backup_id.to_string();
            let force = request.force;
            prepare_ids.push(pool.submit(move |job_token| async move {
                retry(&job_token, PREPARE_RETRY, || {
                    engine.prepare_collection(&backup_id, &db, &collection, force)
                })
                .await
            }));
        }
        if let Err(err) = pool.wait_with_token(&prepare_ids, token).await {
            self.fail_backup(backup_id, &err);
            return Err(err);
        }
        info!(backup_id = %backup_id, "finish preparing all collection meta");

        if request.meta_only {
            info!(backup_id = %backup_id, "skip copying data for a metaOnly backup");
        } else {
            let mut execute_ids = Vec::new();
            for collection in self.meta.get_collections(backup_id) {
                let engine = Arc::clone(self);
                execute_ids.push(pool.submit(move |job_token| async move {
                    engine.execute_collection(&job_token, &collection).await
                }));
            }
            if let Err(err) = pool.wait_with_token(&execute_ids, token).await {
                self.fail_backup(backup_id, &err);
                return Err(err);
            }
        }

        self.meta.update_backup(
            backup_id,
            [
                BackupOpt::State(TaskState::Success),
                BackupOpt::EndTime(Self::now_ms()),
            ],
        );

        if let Err(err) = self.write_backup_meta(backup_id).await {
            self.fail_backup(backup_id, &err);
            return Err(err);
        }
        info!(
            backup_id = %backup_id,
            backup_name = %request.backup_name,
            "finish executing the backup"
        );
        Ok(())
    }

    fn fail_backup(&self, backup_id: &str, err: &Error) {
        self.meta.update_backup(
            backup_id,
            [
                BackupOpt::State(TaskState::Fail),
                BackupOpt::ErrorMessage(err.to_string()),
                BackupOpt::EndTime(Self::now_ms()),
            ],
        );
    }

    /// Resolve the collection set: explicit `dbCollections` wins, then
    /// `collectionNames` (optionally `db.coll`), then everything.
    /// Duplicates collapse; unknown collections are a parameter error.
    pub(crate) async fn parse_backup_collections(
        &self,
        request: &CreateBackupRequest,
    ) -> Result<Vec<(String, String)>> {
        let mut selected = Vec::new();

        if let Some(db_collections) = parse_db_collections(&request.db_collections)? {
            for (db, collections) in db_collections {
                if collections.is_empty() {
                    for name in self.cluster().list_collections(&db).await? {
                        selected.push((db.clone(), name));
                    }
                } else {
                    for name in collections {
                        if !self.cluster().has_collection(&db, &name).await? {
                            return Err(Error::Param(format!(
                                "request backup collection does not exist: {db}.{name}"
                            )));
                        }
                        selected.push((db.clone(), name));
                    }
                }
            }
        } else if request.collection_names.is_empty() {
            for db in self.cluster().list_databases().await? {
                for name in self.cluster().list_collections(&db).await? {
                    selected.push((db.clone(), name));
                }
            }
        } else {
            for full_name in &request.collection_names {
                let (db, name) = split_collection_name(full_name);
                if !self.cluster().has_collection(&db, &name).await? {
                    return Err(Error::Param(format!(
                        "request backup collection does not exist: {db}.{name}"
                    )));
                }
                selected.push((db, name));
            }
        }

        let mut seen = HashSet::new();
        selected.retain(|pair| seen.insert(pair.clone()));
        Ok(selected)
    }

    /// Snapshot one collection: schema, indexes, load state and the
    /// segment consistency cut. Idempotent; safe to re-run under retry.
    pub(crate) async fn prepare_collection(
        &self,
        backup_id: &str,
        db: &str,
        collection: &str,
        force: bool,
    ) -> Result<()> {
        info!(db, collection, "start backup collection");
        let desc = self.cluster().describe_collection(db, collection).await?;

        let mut index_infos = Vec::new();
        let mut seen_indexes = HashSet::new();
        for field in &desc.schema.fields {
            match self
                .cluster()
                .describe_index(db, &desc.name, &field.name)
                .await
            {
                Ok(indexes) => {
                    for index in indexes {
                        if seen_indexes.insert(index.index_name.clone()) {
                            index_infos.push(index);
                        }
                    }
                }
                Err(Error::NotFound(_)) => {
                    info!(collection = %desc.name, field = %field.name, "field has no index");
                }
                Err(err) => return Err(err),
            }
        }

        let collection_id = desc.id;
        self.meta.add_collection(CollectionBackup {
            backup_id: backup_id.to_string(),
            collection_id,
            db_name: db.to_string(),
            collection_name: desc.name.clone(),
            schema: desc.schema,
            shards_num: desc.shards_num,
            consistency_level: desc.consistency_level,
            has_index: !index_infos.is_empty(),
            index_infos,
            state_code: TaskState::Initial,
            start_time: Self::now_ms(),
            ..Default::default()
        });

        let partitions = self.cluster().show_partitions(db, collection).await?;
        let collection_progress = self
            .cluster()
            .get_loading_progress(db, collection, &[])
            .await?;

        let mut partition_load_states = HashMap::new();
        let collection_load_state = match collection_progress {
            0 => {
                for partition in &partitions {
                    partition_load_states.insert(partition.name.clone(), LoadState::NotLoad);
                }
                LoadState::NotLoad
            }
            100 => {
                for partition in &partitions {
                    partition_load_states.insert(partition.name.clone(), LoadState::Loaded);
                }
                LoadState::Loaded
            }
            _ => {
                for partition in &partitions {
                    let progress = self
                        .cluster()
                        .get_loading_progress(db, collection, &[partition.name.clone()])
                        .await?;
                    let state = match progress {
                        0 => LoadState::NotLoad,
                        100 => LoadState::Loaded,
                        _ => LoadState::Loading,
                    };
                    partition_load_states.insert(partition.name.clone(), state);
                }
                LoadState::Loading
            }
        };

        let unfilled = if force {
            let segments = self
                .cluster()
                .get_persistent_segment_info(db, collection)
                .await?;
            info!(
                db,
                collection,
                segment_num = segments.len(),
                "force backup, use the current persistent segment snapshot"
            );
            segments
        } else {
            self.flush_and_reconcile(backup_id, collection_id, db, collection)
                .await?
        };
        info!(
            db,
            collection,
            segments = ?unfilled.iter().map(|s| s.segment_id).collect::<Vec<_>>(),
            "finished determining the segment set"
        );

        for segment in &unfilled {
            self.meta.add_segment(SegmentBackup {
                collection_id: segment.collection_id,
                partition_id: segment.partition_id,
                segment_id: segment.segment_id,
                group_id: segment.segment_id,
                num_rows: segment.num_rows,
                ..Default::default()
            });
            self.registry.register_segment(segment.segment_id, backup_id);
        }

        for partition in &partitions {
            self.meta.add_partition(PartitionBackup {
                collection_id,
                partition_id: partition.id,
                partition_name: partition.name.clone(),
                load_state: partition_load_states
                    .get(&partition.name)
                    .copied()
                    .unwrap_or_default(),
                ..Default::default()
            });
        }

        self.meta.update_collection(
            backup_id,
            collection_id,
            [CollectionOpt::LoadState(collection_load_state)],
        );
        Ok(())
    }

    /// Flush the collection and reconcile the returned segment ids with
    /// persistent-segment snapshots taken before and after. Flush ids in
    /// neither snapshot are warned about, not fatal.
    async fn flush_and_reconcile(
        &self,
        backup_id: &str,
        collection_id: i64,
        db: &str,
        collection: &str,
    ) -> Result<Vec<SegmentInfo>> {
        let before = self
            .cluster()
            .get_persistent_segment_info(db, collection)
            .await?;
        info!(
            db,
            collection,
            segment_num_before_flush = before.len(),
            "persistent segments before flush"
        );

        let flush = self.cluster().flush(db, collection).await?;
        let mut channel_checkpoints = HashMap::new();
        let mut max_checkpoint_ts = 0u64;
        for (virtual_channel, checkpoint) in &flush.channel_checkpoints {
            channel_checkpoints.insert(virtual_channel.clone(), checkpoint.position.clone());
            max_checkpoint_ts = max_checkpoint_ts.max(checkpoint.timestamp);
        }
        self.meta.update_collection(
            backup_id,
            collection_id,
            [
                CollectionOpt::ChannelCheckpoints(channel_checkpoints),
                CollectionOpt::BackupTimestamp(max_checkpoint_ts),
                CollectionOpt::BackupPhysicalTimestamp(flush.time_of_seal as u64),
            ],
        );
        info!(
            db,
            collection,
            new_sealed = ?flush.new_sealed_segment_ids,
            already_flushed = ?flush.flushed_segment_ids,
            time_of_seal = flush.time_of_seal,
            "flush finished"
        );

        let after = self
            .cluster()
            .get_persistent_segment_info(db, collection)
            .await?;

        let mut flush_ids: HashSet<i64> = flush
            .new_sealed_segment_ids
            .iter()
            .chain(flush.flushed_segment_ids.iter())
            .copied()
            .collect();
        let mut unfilled = Vec::new();
        for segment in &after {
            if flush_ids.remove(&segment.segment_id) {
                unfilled.push(segment.clone());
            } else {
                debug!(segment_id = segment.segment_id, "segment created after flush, skip it");
            }
        }
        for segment in &before {
            if flush_ids.remove(&segment.segment_id) {
                unfilled.push(segment.clone());
            } else {
                debug!(segment_id = segment.segment_id, "segment already handled or gone, skip it");
            }
        }
        if !flush_ids.is_empty() {
            warn!(
                db,
                collection,
                segment_ids = ?flush_ids,
                "segments returned by flush exist in neither snapshot"
            );
        }
        Ok(unfilled)
    }

    /// Inventory and copy every segment of one collection, smallest
    /// first.
    pub(crate) async fn execute_collection(
        self: &Arc<Self>,
        token: &CancellationToken,
        collection: &CollectionBackup,
    ) -> Result<()> {
        let mut segments = Vec::new();
        for partition in self.meta.get_partitions(collection.collection_id) {
            segments.extend(self.meta.get_segments(partition.partition_id));
        }
        info!(
            db = %collection.db_name,
            collection = %collection.collection_name,
            segment_num = segments.len(),
            "begin copy data"
        );

        for segment in &segments {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.fill_segment_backup_info(segment).await?;
        }

        // re-read for the sizes the inventory just filled in
        let mut segments: Vec<SegmentBackup> = segments
            .iter()
            .filter_map(|s| self.meta.get_segment(s.segment_id))
            .collect();
        segments.sort_by_key(|s| s.size);

        let pool = self.copy_pool();
        let mut copy_ids = Vec::with_capacity(segments.len());
        for segment in segments {
            let engine = Arc::clone(self);
            copy_ids.push(pool.submit(move |job_token| async move {
                engine.copy_segment(&job_token, segment.segment_id).await
            }));
        }
        pool.wait(&copy_ids).await?;

        self.meta.update_collection(
            &collection.backup_id,
            collection.collection_id,
            [CollectionOpt::EndTime(Self::now_ms())],
        );
        info!(
            db = %collection.db_name,
            collection = %collection.collection_name,
            "finish copy data"
        );
        Ok(())
    }

    /// List the segment's binlog objects and record the inventory. An
    /// empty insert tree is fatal; an empty delta tree gets the fieldId-0
    /// placeholder the manifest schema requires.
    pub(crate) async fn fill_segment_backup_info(&self, segment: &SegmentBackup) -> Result<()> {
        let mut size = 0i64;

        let insert_dir = paths::source_log_dir(
            &self.source_root,
            paths::INSERT_LOG,
            segment.collection_id,
            segment.partition_id,
            segment.segment_id,
        );
        let (field_dirs, _) = self
            .storage()
            .list_with_prefix(&self.source_bucket, &insert_dir, false)
            .await?;
        if field_dirs.is_empty() {
            return Err(Error::Fatal(format!(
                "got an empty insert path, but the segment should not be empty: {insert_dir}"
            )));
        }
        let mut insert_logs = Vec::with_capacity(field_dirs.len());
        for field_dir in &field_dirs {
            insert_logs.push(self.list_field_binlogs(field_dir, &mut size).await?);
        }

        let delta_dir = paths::source_log_dir(
            &self.source_root,
            paths::DELTA_LOG,
            segment.collection_id,
            segment.partition_id,
            segment.segment_id,
        );
        let (delta_field_dirs, _) = self
            .storage()
            .list_with_prefix(&self.source_bucket, &delta_dir, false)
            .await?;
        let mut delta_logs = Vec::with_capacity(delta_field_dirs.len());
        for field_dir in &delta_field_dirs {
            delta_logs.push(self.list_field_binlogs(field_dir, &mut size).await?);
        }
        if delta_logs.is_empty() {
            delta_logs.push(FieldBinlog {
                field_id: 0,
                binlogs: Vec::new(),
            });
        }

        self.meta.update_segment(
            segment.segment_id,
            [
                SegmentOpt::Binlogs(insert_logs),
                SegmentOpt::DeltaBinlogs(delta_logs),
                SegmentOpt::Size(size),
            ],
        );
        debug!(segment_id = segment.segment_id, size, "filled segment backup info");
        Ok(())
    }

    async fn list_field_binlogs(&self, field_dir: &str, size: &mut i64) -> Result<FieldBinlog> {
        let (log_paths, log_sizes) = self
            .storage()
            .list_with_prefix(&self.source_bucket, field_dir, false)
            .await?;
        let field_id = field_dir
            .trim_end_matches(paths::SEPARATOR)
            .rsplit(paths::SEPARATOR)
            .next()
            .and_then(|component| component.parse().ok())
            .unwrap_or(0);
        let binlogs = log_paths
            .into_iter()
            .zip(log_sizes)
            .map(|(log_path, log_size)| {
                *size += log_size;
                Binlog { log_path, log_size }
            })
            .collect();
        Ok(FieldBinlog { field_id, binlogs })
    }

    /// Copy every binlog of a segment into the backup tree. The group id
    /// is rewritten to the segment id before path computation, so the
    /// destination always carries the extra group component.
    pub(crate) async fn copy_segment(&self, token: &CancellationToken, segment_id: i64) -> Result<()> {
        let segment = self
            .meta
            .get_segment(segment_id)
            .ok_or_else(|| Error::NotFound(format!("segment {segment_id}")))?;
        let backup_id = self
            .registry
            .backup_id_by_segment(segment_id)
            .ok_or_else(|| Error::NotFound(format!("backup owning segment {segment_id}")))?;
        let backup = self
            .meta
            .get_backup(&backup_id)
            .ok_or_else(|| Error::NotFound(format!("backup {backup_id}")))?;
        let dst_root = paths::backup_binlog_dir(&self.backup_root, &backup.name);

        let group_id = segment.segment_id;
        self.meta
            .update_segment(segment_id, [SegmentOpt::GroupId(group_id)]);
        debug!(
            collection_id = segment.collection_id,
            partition_id = segment.partition_id,
            segment_id,
            group_id,
            "copy segment"
        );

        for field_binlog in segment.insert_logs.iter().chain(segment.delta_logs.iter()) {
            for binlog in &field_binlog.binlogs {
                let target = rewrite_binlog_path(
                    &binlog.log_path,
                    &self.source_root,
                    &dst_root,
                    segment.partition_id,
                    group_id,
                )?;

                if !self.storage().exist(&self.source_bucket, &binlog.log_path).await? {
                    return Err(Error::Fatal(format!(
                        "source binlog does not exist: {}",
                        binlog.log_path
                    )));
                }
                retry(token, COPY_RETRY, || {
                    self.storage().copy(
                        &self.source_bucket,
                        &self.backup_bucket,
                        &binlog.log_path,
                        &target,
                    )
                })
                .await
                .map_err(|err| {
                    warn!(from = %binlog.log_path, to = %target, error = %err, "fail to copy binlog after retry");
                    err
                })?;
                debug!(from = %binlog.log_path, to = %target, "copied binlog");
            }
        }

        self.meta
            .update_segment(segment_id, [SegmentOpt::Backuped(true)]);
        Ok(())
    }

    /// Export the six manifest documents.
    pub(crate) async fn write_backup_meta(&self, backup_id: &str) -> Result<()> {
        let info = self
            .meta
            .full_meta(backup_id)
            .ok_or_else(|| Error::NotFound(format!("backup {backup_id}")))?;
        let blobs = codec::serialize(&info)?;

        let storage = self.storage();
        let root = &self.backup_root;
        let name = &info.name;
        storage
            .write(&self.backup_bucket, &paths::backup_meta_path(root, name), &blobs.backup_meta)
            .await?;
        storage
            .write(
                &self.backup_bucket,
                &paths::collection_meta_path(root, name),
                &blobs.collection_meta,
            )
            .await?;
        storage
            .write(
                &self.backup_bucket,
                &paths::partition_meta_path(root, name),
                &blobs.partition_meta,
            )
            .await?;
        storage
            .write(&self.backup_bucket, &paths::segment_meta_path(root, name), &blobs.segment_meta)
            .await?;
        storage
            .write(&self.backup_bucket, &paths::full_meta_path(root, name), &blobs.full_meta)
            .await?;
        storage
            .write(
                &self.backup_bucket,
                &paths::channel_cp_meta_path(root, name),
                &blobs.channel_cp_meta,
            )
            .await?;

        info!(
            path = %paths::backup_dir(root, name),
            backup_name = %name,
            size = info.size,
            "finish writing backup meta"
        );
        Ok(())
    }

    async fn backup_exists(&self, name: &str) -> Result<bool> {
        let prefix = format!(
            "{}{}",
            paths::backup_dir(&self.backup_root, name),
            paths::SEPARATOR
        );
        let (entries, _) = self
            .storage()
            .list_with_prefix(&self.backup_bucket, &prefix, false)
            .await?;
        Ok(!entries.is_empty())
    }

    /// Best-effort pause of the source cluster's datacoord garbage
    /// collection.
    async fn pause_gc(&self, address: &str, pause_seconds: i32) {
        let url = format!(
            "{address}/management/datacoord/garbage_collection/pause?pause_seconds={pause_seconds}"
        );
        match self.http.get(&url).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => info!(address, pause_seconds, response = %body, "paused source GC"),
                Err(err) => warn!(error = %err, "fail to read GC pause response: {GC_WARN}"),
            },
            Err(err) => warn!(error = %err, "fail to pause source GC: {GC_WARN}"),
        }
    }

    async fn resume_gc(&self, address: &str) {
        let url = format!("{address}/management/datacoord/garbage_collection/resume");
        match self.http.get(&url).send().await {
            Ok(response) => match response.text().await {
                Ok(body) => info!(address, response = %body, "resumed source GC"),
                Err(err) => warn!(error = %err, "fail to read GC resume response: {GC_WARN}"),
            },
            Err(err) => warn!(error = %err, "fail to resume source GC: {GC_WARN}"),
        }
    }
}

/// UTC timestamped name for unnamed backups.
fn generated_backup_name() -> String {
    let now = chrono::Utc::now();
    format!(
        "backup_{}_{}",
        now.format("%Y_%m_%d_%H_%M_%S"),
        now.timestamp_subsec_nanos()
    )
}

/// `db.collection`, defaulting the database.
fn split_collection_name(full_name: &str) -> (String, String) {
    match full_name.split_once('.') {
        Some((db, name)) => (db.to_string(), name.to_string()),
        None => ("default".to_string(), full_name.to_string()),
    }
}

/// Compute the destination key for one source binlog: swap the source
/// root for the backup binlog root, then splice the group id in after the
/// partition component (iff non-zero). A destination equal to its source
/// is a configuration error.
fn rewrite_binlog_path(
    log_path: &str,
    source_root: &str,
    dst_root: &str,
    partition_id: i64,
    group_id: i64,
) -> Result<String> {
    let mut target = if source_root.is_empty() {
        format!("{dst_root}{}{log_path}", paths::SEPARATOR)
    } else {
        log_path.replacen(source_root, dst_root, 1)
    };
    if group_id != 0 {
        let needle = format!("/{partition_id}/");
        let replacement = format!("/{partition_id}/{group_id}/");
        target = target.replacen(&needle, &replacement, 1);
    }
    if target == log_path {
        return Err(Error::Fatal(format!(
            "copy source and destination paths must differ, src: {log_path} dst: {target}"
        )));
    }
    Ok(target)
}
