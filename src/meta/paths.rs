//! Object-key layout of a persisted backup.
//!
//! ```text
//! {backupRoot}/{name}/meta/backup_meta.json
//! {backupRoot}/{name}/meta/collection_meta.json
//! {backupRoot}/{name}/meta/partition_meta.json
//! {backupRoot}/{name}/meta/segment_meta.json
//! {backupRoot}/{name}/meta/full_meta.json
//! {backupRoot}/{name}/meta/channel_cp_meta.json
//! {backupRoot}/{name}/binlogs/{kind}/{collId}/{partId}[/{groupId}]/{segId}/{fieldId}/{file}
//! ```

pub const SEPARATOR: &str = "/";

pub const META_PREFIX: &str = "meta";
pub const BACKUP_META_FILE: &str = "backup_meta.json";
pub const COLLECTION_META_FILE: &str = "collection_meta.json";
pub const PARTITION_META_FILE: &str = "partition_meta.json";
pub const SEGMENT_META_FILE: &str = "segment_meta.json";
pub const FULL_META_FILE: &str = "full_meta.json";
pub const CHANNEL_CP_META_FILE: &str = "channel_cp_meta.json";

pub const BINLOG_PREFIX: &str = "binlogs";
pub const INSERT_LOG: &str = "insert_log";
pub const DELTA_LOG: &str = "delta_log";

pub fn backup_dir(root: &str, name: &str) -> String {
    format!("{root}{SEPARATOR}{name}")
}

fn meta_file(root: &str, name: &str, file: &str) -> String {
    format!("{root}{SEPARATOR}{name}{SEPARATOR}{META_PREFIX}{SEPARATOR}{file}")
}

pub fn backup_meta_path(root: &str, name: &str) -> String {
    meta_file(root, name, BACKUP_META_FILE)
}

pub fn collection_meta_path(root: &str, name: &str) -> String {
    meta_file(root, name, COLLECTION_META_FILE)
}

pub fn partition_meta_path(root: &str, name: &str) -> String {
    meta_file(root, name, PARTITION_META_FILE)
}

pub fn segment_meta_path(root: &str, name: &str) -> String {
    meta_file(root, name, SEGMENT_META_FILE)
}

pub fn full_meta_path(root: &str, name: &str) -> String {
    meta_file(root, name, FULL_META_FILE)
}

pub fn channel_cp_meta_path(root: &str, name: &str) -> String {
    meta_file(root, name, CHANNEL_CP_META_FILE)
}

/// Destination root for copied binlogs.
pub fn backup_binlog_dir(root: &str, name: &str) -> String {
    format!("{root}{SEPARATOR}{name}{SEPARATOR}{BINLOG_PREFIX}")
}

/// Source-side directory of one segment's logs of one kind
/// (`insert_log` / `delta_log`). An empty source root collapses to no
/// leading prefix.
pub fn source_log_dir(
    source_root: &str,
    kind: &str,
    collection_id: i64,
    partition_id: i64,
    segment_id: i64,
) -> String {
    let prefix = if source_root.is_empty() {
        String::new()
    } else {
        format!("{source_root}{SEPARATOR}")
    };
    format!("{prefix}{kind}{SEPARATOR}{collection_id}{SEPARATOR}{partition_id}{SEPARATOR}{segment_id}{SEPARATOR}")
}

/// Backup-side directory of one segment's logs, as consumed by
/// bulk-insert on restore. The group segment appears iff `group_id != 0`.
pub fn backup_log_dir(
    root: &str,
    name: &str,
    kind: &str,
    collection_id: i64,
    partition_id: i64,
    group_id: i64,
    segment_id: i64,
) -> String {
    let base = backup_binlog_dir(root, name);
    if group_id != 0 {
        format!("{base}{SEPARATOR}{kind}{SEPARATOR}{collection_id}{SEPARATOR}{partition_id}{SEPARATOR}{group_id}{SEPARATOR}{segment_id}{SEPARATOR}")
    } else {
        format!("{base}{SEPARATOR}{kind}{SEPARATOR}{collection_id}{SEPARATOR}{partition_id}{SEPARATOR}{segment_id}{SEPARATOR}")
    }
}

/// Recover a backup name from a directory entry returned by listing
/// `{root}/`.
pub fn backup_name_from_path(root: &str, path: &str) -> String {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.strip_prefix(root).unwrap_or(trimmed).to_string(),
    }
}
