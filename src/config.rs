//! Service configuration.
//!
//! Loaded from a TOML file; every field has a default so a partial (or
//! empty) file is valid. Key names mirror the flat dotted form used by the
//! deployment tooling, e.g. `backup.copydata.parallelism` becomes
//! `[backup.copydata] parallelism = ...`.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupParams {
    pub backup: BackupConfig,
    pub restore: RestoreConfig,
    pub milvus: MilvusConfig,
    pub minio: MinioConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupConfig {
    /// Grouping threshold in bytes when bucketing small segments for
    /// bulk-insert.
    pub max_segment_group_size: i64,

    /// Concurrent per-collection prepare/execute jobs.
    pub parallelism: usize,

    pub copydata: CopyDataConfig,

    /// Keep intermediate files after the backup finishes.
    pub keep_temp_files: bool,

    pub gc_pause_enable: bool,
    pub gc_pause_seconds: i32,
    pub gc_pause_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CopyDataConfig {
    /// Concurrent per-segment object copies.
    pub parallelism: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RestoreConfig {
    /// Concurrent bulk-insert jobs per restore task.
    pub parallelism: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MilvusConfig {
    pub address: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub authorization_enabled: bool,
    /// 0 = plaintext, 1 = one-way TLS, 2 = mutual TLS.
    pub tls_mode: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MinioConfig {
    pub address: String,
    pub port: u16,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub use_ssl: bool,
    pub bucket_name: String,
    pub root_path: String,
    pub use_iam: bool,
    pub cloud_provider: String,
    pub iam_endpoint: String,

    // Destination store; defaults mirror the source side so a single-store
    // deployment needs no extra keys.
    pub backup_address: String,
    pub backup_port: u16,
    pub backup_access_key_id: String,
    pub backup_secret_access_key: String,
    pub backup_use_ssl: bool,
    pub backup_bucket_name: String,
    pub backup_root_path: String,
    pub backup_use_iam: bool,
    pub backup_cloud_provider: String,
    pub backup_iam_endpoint: String,

    pub backup_copy_concurrent_number: i64,
    pub backup_copy_enable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            max_segment_group_size: 2 * 1024 * 1024 * 1024,
            parallelism: 1,
            copydata: CopyDataConfig::default(),
            keep_temp_files: false,
            gc_pause_enable: false,
            gc_pause_seconds: 7200,
            gc_pause_address: String::new(),
        }
    }
}

impl Default for CopyDataConfig {
    fn default() -> Self {
        Self { parallelism: 128 }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self { parallelism: 1 }
    }
}

impl Default for MilvusConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 19530,
            user: String::new(),
            password: String::new(),
            authorization_enabled: false,
            tls_mode: 0,
        }
    }
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            address: "localhost".to_string(),
            port: 9000,
            access_key_id: "minioadmin".to_string(),
            secret_access_key: "minioadmin".to_string(),
            use_ssl: false,
            bucket_name: "a-bucket".to_string(),
            root_path: "files".to_string(),
            use_iam: false,
            cloud_provider: "minio".to_string(),
            iam_endpoint: String::new(),

            backup_address: "localhost".to_string(),
            backup_port: 9000,
            backup_access_key_id: "minioadmin".to_string(),
            backup_secret_access_key: "minioadmin".to_string(),
            backup_use_ssl: false,
            backup_bucket_name: "a-bucket".to_string(),
            backup_root_path: "backup".to_string(),
            backup_use_iam: false,
            backup_cloud_provider: "minio".to_string(),
            backup_iam_endpoint: String::new(),

            backup_copy_concurrent_number: 100,
            backup_copy_enable: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

const SUPPORTED_CLOUD_PROVIDERS: &[&str] = &["minio", "aws", "gcp", "aliyun", "azure"];

impl MinioConfig {
    /// The destination-store view of this config, for wiring up a second
    /// object store client when source and destination differ.
    pub fn backup_side(&self) -> MinioConfig {
        MinioConfig {
            address: self.backup_address.clone(),
            port: self.backup_port,
            access_key_id: self.backup_access_key_id.clone(),
            secret_access_key: self.backup_secret_access_key.clone(),
            use_ssl: self.backup_use_ssl,
            bucket_name: self.backup_bucket_name.clone(),
            root_path: self.backup_root_path.clone(),
            use_iam: self.backup_use_iam,
            cloud_provider: self.backup_cloud_provider.clone(),
            iam_endpoint: self.backup_iam_endpoint.clone(),
            ..self.clone()
        }
    }
}

impl BackupParams {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let params: BackupParams = toml::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !SUPPORTED_CLOUD_PROVIDERS.contains(&self.minio.cloud_provider.as_str()) {
            anyhow::bail!("unsupported cloudProvider: {}", self.minio.cloud_provider);
        }
        if !SUPPORTED_CLOUD_PROVIDERS.contains(&self.minio.backup_cloud_provider.as_str()) {
            anyhow::bail!(
                "unsupported backupCloudProvider: {}",
                self.minio.backup_cloud_provider
            );
        }
        if self.milvus.tls_mode > 2 {
            anyhow::bail!("milvus.tlsMode must be 0, 1 or 2");
        }
        Ok(())
    }
}
