//! In-memory object store.
//!
//! Backs the test suite and local dry runs. Buckets are maps of object key
//! to bytes; delimiter listing reproduces the S3 behavior the pipelines
//! rely on (sub-prefix entries end with `/` and carry size 0).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::ObjectStore;

#[derive(Default)]
pub struct InMemoryObjectStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    copy_failures: Mutex<usize>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object with `size` filler bytes.
    pub fn put_object(&self, bucket: &str, path: &str, size: usize) {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(path.to_string(), vec![0u8; size]);
    }

    /// Make the next `n` copy calls fail with a transient storage error.
    /// Test support for exercising the retry path.
    pub fn inject_copy_failures(&self, n: usize) {
        *self.copy_failures.lock().unwrap() = n;
    }

    /// All object keys in a bucket, sorted. Test support.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .lock()
            .unwrap()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn exist(&self, bucket: &str, path: &str) -> Result<bool> {
        let buckets = self.buckets.lock().unwrap();
        Ok(buckets
            .get(bucket)
            .map(|objects| objects.contains_key(path))
            .unwrap_or(false))
    }

    async fn read(&self, bucket: &str, path: &str) -> Result<Vec<u8>> {
        let buckets = self.buckets.lock().unwrap();
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(path))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{bucket}:{path}")))
    }

    async fn write(&self, bucket: &str, path: &str, data: &[u8]) -> Result<()> {
        self.buckets
            .lock()
            .unwrap()
            .entry(bucket.to_string())
            .or_default()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn list_with_prefix(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<(Vec<String>, Vec<i64>)> {
        let buckets = self.buckets.lock().unwrap();
        let Some(objects) = buckets.get(bucket) else {
            return Ok((Vec::new(), Vec::new()));
        };

        let mut paths = Vec::new();
        let mut sizes = Vec::new();
        let mut seen_dirs = BTreeSet::new();
        for (key, data) in objects.range(prefix.to_string()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if recursive {
                paths.push(key.clone());
                sizes.push(data.len() as i64);
                continue;
            }
            let rest = &key[prefix.len()..];
            match rest.find('/') {
                Some(idx) => {
                    let dir = format!("{}{}/", prefix, &rest[..idx]);
                    if seen_dirs.insert(dir.clone()) {
                        paths.push(dir);
                        sizes.push(0);
                    }
                }
                None => {
                    paths.push(key.clone());
                    sizes.push(data.len() as i64);
                }
            }
        }
        Ok((paths, sizes))
    }

    async fn copy(
        &self,
        src_bucket: &str,
        dst_bucket: &str,
        src_path: &str,
        dst_path: &str,
    ) -> Result<()> {
        {
            let mut failures = self.copy_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(Error::Storage("injected copy failure".to_string()));
            }
        }
        let mut buckets = self.buckets.lock().unwrap();
        let data = buckets
            .get(src_bucket)
            .and_then(|objects| objects.get(src_path))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("{src_bucket}:{src_path}")))?;
        buckets
            .entry(dst_bucket.to_string())
            .or_default()
            .insert(dst_path.to_string(), data);
        Ok(())
    }

    async fn remove(&self, bucket: &str, path: &str) -> Result<()> {
        if let Some(objects) = self.buckets.lock().unwrap().get_mut(bucket) {
            objects.remove(path);
        }
        Ok(())
    }

    async fn remove_with_prefix(&self, bucket: &str, prefix: &str) -> Result<()> {
        if let Some(objects) = self.buckets.lock().unwrap().get_mut(bucket) {
            objects.retain(|key, _| !key.starts_with(prefix));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_non_recursive_listing_collapses_prefixes() {
        let store = InMemoryObjectStore::new();
        store.put_object("b", "files/insert_log/1/2/3/100/a.log", 10);
        store.put_object("b", "files/insert_log/1/2/3/100/b.log", 20);
        store.put_object("b", "files/insert_log/1/2/3/101/c.log", 30);

        let (dirs, sizes) = store
            .list_with_prefix("b", "files/insert_log/1/2/3/", false)
            .await
            .unwrap();
        assert_eq!(
            dirs,
            vec![
                "files/insert_log/1/2/3/100/".to_string(),
                "files/insert_log/1/2/3/101/".to_string()
            ]
        );
        assert_eq!(sizes, vec![0, 0]);

        let (files, sizes) = store
            .list_with_prefix("b", "files/insert_log/1/2/3/100/", false)
            .await
            .unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(sizes, vec![10, 20]);
    }

    #[tokio::test]
    async fn test_recursive_listing_returns_all_objects() {
        let store = InMemoryObjectStore::new();
        store.put_object("b", "root/x/a", 1);
        store.put_object("b", "root/y/b", 2);
        let (paths, sizes) = store.list_with_prefix("b", "root/", true).await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(sizes.iter().sum::<i64>(), 3);
    }

    #[tokio::test]
    async fn test_copy_and_remove_with_prefix() {
        let store = InMemoryObjectStore::new();
        store.put_object("src", "files/a", 5);
        store.copy("src", "dst", "files/a", "backup/a").await.unwrap();
        assert!(store.exist("dst", "backup/a").await.unwrap());

        store.remove_with_prefix("dst", "backup/").await.unwrap();
        assert!(!store.exist("dst", "backup/a").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_missing_source_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.copy("src", "dst", "nope", "x").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_injected_copy_failures_are_transient() {
        let store = InMemoryObjectStore::new();
        store.put_object("src", "a", 1);
        store.inject_copy_failures(1);
        let err = store.copy("src", "dst", "a", "b").await.unwrap_err();
        assert!(err.is_transient());
        store.copy("src", "dst", "a", "b").await.unwrap();
    }
}
