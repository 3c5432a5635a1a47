//! Manifest codec.
//!
//! A backup is exported as five JSON documents plus a compact
//! channel-checkpoint mapping (§ layout in `paths`). The flat documents
//! normalize the tree one level each; `full_meta.json` carries the whole
//! hydrated tree and serves as the fast path on read.

use std::collections::BTreeMap;

use crate::error::Result;

use super::{BackupInfo, ChannelPosition, CollectionBackup, PartitionBackup, SegmentBackup};

pub struct ManifestBlobs {
    pub backup_meta: Vec<u8>,
    pub collection_meta: Vec<u8>,
    pub partition_meta: Vec<u8>,
    pub segment_meta: Vec<u8>,
    pub full_meta: Vec<u8>,
    pub channel_cp_meta: Vec<u8>,
}

/// Emit all manifest blobs from a materialized tree in one pass.
pub fn serialize(info: &BackupInfo) -> Result<ManifestBlobs> {
    let mut root = info.clone();
    root.collection_backups.clear();

    let mut collections = Vec::with_capacity(info.collection_backups.len());
    let mut partitions = Vec::new();
    let mut segments = Vec::new();
    for collection in &info.collection_backups {
        let mut flat = collection.clone();
        flat.partition_backups.clear();
        collections.push(flat);
        for partition in &collection.partition_backups {
            let mut flat = partition.clone();
            flat.segment_backups.clear();
            partitions.push(flat);
            segments.extend(partition.segment_backups.iter().cloned());
        }
    }

    Ok(ManifestBlobs {
        backup_meta: serde_json::to_vec(&root)?,
        collection_meta: serde_json::to_vec(&collections)?,
        partition_meta: serde_json::to_vec(&partitions)?,
        segment_meta: serde_json::to_vec(&segments)?,
        full_meta: serde_json::to_vec(info)?,
        channel_cp_meta: serde_json::to_vec(&channel_positions(info))?,
    })
}

/// Rebuild the tree from the four flat documents by joining on parent ids.
pub fn deserialize(
    backup_meta: &[u8],
    collection_meta: &[u8],
    partition_meta: &[u8],
    segment_meta: &[u8],
) -> Result<BackupInfo> {
    let mut backup: BackupInfo = serde_json::from_slice(backup_meta)?;
    let collections: Vec<CollectionBackup> = serde_json::from_slice(collection_meta)?;
    let partitions: Vec<PartitionBackup> = serde_json::from_slice(partition_meta)?;
    let segments: Vec<SegmentBackup> = serde_json::from_slice(segment_meta)?;

    let mut segments_by_partition: BTreeMap<i64, Vec<SegmentBackup>> = BTreeMap::new();
    for segment in segments {
        segments_by_partition
            .entry(segment.partition_id)
            .or_default()
            .push(segment);
    }
    let mut partitions_by_collection: BTreeMap<i64, Vec<PartitionBackup>> = BTreeMap::new();
    for mut partition in partitions {
        partition.segment_backups = segments_by_partition
            .remove(&partition.partition_id)
            .unwrap_or_default();
        partitions_by_collection
            .entry(partition.collection_id)
            .or_default()
            .push(partition);
    }

    backup.collection_backups = collections;
    for collection in &mut backup.collection_backups {
        collection.partition_backups = partitions_by_collection
            .remove(&collection.collection_id)
            .unwrap_or_default();
    }
    Ok(backup)
}

/// Fast path: parse the hydrated tree directly.
pub fn deserialize_full(full_meta: &[u8]) -> Result<BackupInfo> {
    Ok(serde_json::from_slice(full_meta)?)
}

/// Virtual channels are named `{physical}_{shardOrd}_{suffix}`; the
/// physical name is the first two underscore-separated tokens. Known-format
/// contract, not general parsing.
pub fn physical_channel(virtual_channel: &str) -> String {
    let mut tokens = virtual_channel.split('_');
    match (tokens.next(), tokens.next()) {
        (Some(first), Some(second)) => format!("{first}_{second}"),
        _ => virtual_channel.to_string(),
    }
}

fn channel_positions(info: &BackupInfo) -> BTreeMap<String, Vec<ChannelPosition>> {
    let mut by_collection = BTreeMap::new();
    for collection in &info.collection_backups {
        let mut positions: Vec<ChannelPosition> = collection
            .channel_checkpoints
            .iter()
            .map(|(virtual_channel, position)| ChannelPosition {
                name: physical_channel(virtual_channel),
                position: position.clone(),
            })
            .collect();
        positions.sort_by(|a, b| a.name.cmp(&b.name));
        by_collection.insert(collection.collection_name.clone(), positions);
    }
    by_collection
}
