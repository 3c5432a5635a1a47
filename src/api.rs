//! Public request/response surface.
//!
//! Transport framing (HTTP, CLI, ...) is layered on top of these types;
//! the engine itself only ever sees and returns them. Every response
//! echoes the request id, assigning a fresh UUID when the caller left it
//! empty.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::meta::{BackupInfo, RestoreTask};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseCode {
    #[default]
    Success,
    Fail,
    ParameterError,
    RequestObjectNotFound,
}

impl ResponseCode {
    pub fn as_i32(self) -> i32 {
        match self {
            ResponseCode::Success => 0,
            ResponseCode::Fail => 1,
            ResponseCode::ParameterError => 400,
            ResponseCode::RequestObjectNotFound => 404,
        }
    }
}

impl From<&Error> for ResponseCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Param(_) => ResponseCode::ParameterError,
            Error::NotFound(_) => ResponseCode::RequestObjectNotFound,
            _ => ResponseCode::Fail,
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

impl Serialize for ResponseCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.as_i32())
    }
}

impl<'de> Deserialize<'de> for ResponseCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match i32::deserialize(deserializer)? {
            0 => Ok(ResponseCode::Success),
            1 => Ok(ResponseCode::Fail),
            400 => Ok(ResponseCode::ParameterError),
            404 => Ok(ResponseCode::RequestObjectNotFound),
            other => Err(de::Error::custom(format!("unknown response code {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateBackupRequest {
    pub request_id: String,
    pub backup_name: String,
    /// `db.collection` or bare collection names (database defaults to
    /// `default`). Ignored when `db_collections` is set.
    pub collection_names: Vec<String>,
    /// Map of database -> collections; an empty list selects every
    /// collection in that database. Accepts either the JSON object itself
    /// or a JSON-encoded string of it.
    pub db_collections: Option<serde_json::Value>,
    #[serde(rename = "async")]
    pub async_: bool,
    /// Skip the flush; back up only what is already persisted.
    pub force: bool,
    pub meta_only: bool,
    pub gc_pause_enable: bool,
    pub gc_pause_seconds: i32,
    pub gc_pause_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetBackupRequest {
    pub request_id: String,
    pub backup_id: String,
    pub backup_name: String,
    /// Optional override of the bucket/path the manifest is read from.
    pub bucket_name: String,
    pub path: String,
    pub without_detail: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListBackupsRequest {
    pub request_id: String,
    /// Only return backups containing this collection.
    pub collection_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteBackupRequest {
    pub request_id: String,
    pub backup_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestoreBackupRequest {
    pub request_id: String,
    pub backup_name: String,
    pub collection_names: Vec<String>,
    /// Uniform rename: append this suffix to every restored collection.
    pub collection_suffix: String,
    /// Explicit renames, `old -> new`, optionally qualified
    /// `db.coll -> db.coll`.
    pub collection_renames: BTreeMap<String, String>,
    pub db_collections: Option<serde_json::Value>,
    #[serde(rename = "async")]
    pub async_: bool,
    /// Plan and register the task without running any bulk-insert.
    pub meta_only: bool,
    pub restore_index: bool,
    /// Replace stored vector indexes with the cluster default auto-index.
    pub restore_auto_index: bool,
    pub skip_create_collection: bool,
    /// When set, restoring into a missing database is an error instead of
    /// creating it.
    pub skip_create_database: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GetRestoreStateRequest {
    pub request_id: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupInfoResponse {
    pub request_id: String,
    pub code: ResponseCode,
    pub msg: String,
    pub data: Option<BackupInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListBackupsResponse {
    pub request_id: String,
    pub code: ResponseCode,
    pub msg: String,
    pub data: Vec<BackupInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeleteBackupResponse {
    pub request_id: String,
    pub code: ResponseCode,
    pub msg: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestoreBackupResponse {
    pub request_id: String,
    pub code: ResponseCode,
    pub msg: String,
    pub data: Option<RestoreTask>,
}

/// Ensure a request id is present, assigning a UUID when empty.
pub fn ensure_request_id(request_id: &str) -> String {
    if request_id.is_empty() {
        uuid::Uuid::new_v4().to_string()
    } else {
        request_id.to_string()
    }
}

/// Parse a `db_collections` value into `db -> collections`. Accepts the
/// object form and the string-wrapped form.
pub fn parse_db_collections(
    value: &Option<serde_json::Value>,
) -> Result<Option<BTreeMap<String, Vec<String>>>> {
    match value {
        None => Ok(None),
        Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => serde_json::from_str(s)
            .map(Some)
            .map_err(|e| Error::Param(format!("invalid dbCollections: {e}"))),
        Some(object @ serde_json::Value::Object(_)) => serde_json::from_value(object.clone())
            .map(Some)
            .map_err(|e| Error::Param(format!("invalid dbCollections: {e}"))),
        Some(other) => Err(Error::Param(format!(
            "invalid dbCollections: expected object or string, got {other}"
        ))),
    }
}

/// Backup names double as path components: letters, digits and
/// underscores, starting with a letter.
pub fn validate_backup_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::Param(format!(
            "illegal backup name: {name:?}, expected letters, digits and underscores starting with a letter"
        )))
    }
}
