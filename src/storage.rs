use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as RemotePath;
use object_store::{
    Attribute, Attributes, ObjectStore as RemoteStore, PutOptions, PutPayload,
};
use tokio::runtime::Runtime;
use tracing::debug;

use crate::error::StorageError;

/// Durable key/blob upload. Writes replace existing objects.
pub trait ObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    fn put_text(&self, key: &str, text: &str, content_type: &str) -> Result<(), StorageError> {
        self.put(key, text.as_bytes(), content_type)
    }
}

fn check_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || Path::new(key)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Uploads into `gs://{bucket}/{key}` through the `object_store` GCS client.
/// Calls block on a private current-thread runtime.
#[derive(Debug, Clone)]
pub struct GcsStore {
    bucket: String,
    client: Arc<dyn RemoteStore>,
    runtime: Arc<Runtime>,
}

impl GcsStore {
    /// Credentials and endpoint come from the `GOOGLE_*` environment variables.
    pub fn from_env(bucket: &str) -> Result<Self, StorageError> {
        let bucket = bucket.trim_end_matches('/');
        let client = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()
            .map_err(StorageError::Client)?;
        Self::with_client(bucket, Arc::new(client))
    }

    pub fn with_client(bucket: &str, client: Arc<dyn RemoteStore>) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(StorageError::Runtime)?;
        Ok(Self {
            bucket: bucket.trim_end_matches('/').to_string(),
            client,
            runtime: Arc::new(runtime),
        })
    }

    pub fn url(&self, key: &str) -> String {
        format!("gs://{}/{}", self.bucket, key)
    }
}

impl ObjectStore for GcsStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let location =
            RemotePath::parse(key).map_err(|_| StorageError::InvalidKey(key.to_string()))?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.runtime
            .block_on(
                self.client
                    .put_opts(&location, PutPayload::from(bytes.to_vec()), opts),
            )
            .map_err(|source| StorageError::Remote {
                key: key.to_string(),
                source,
            })?;
        debug!(url = self.url(key).as_str(), bytes = bytes.len(), "Object uploaded");
        Ok(())
    }
}

/// Writes objects under a local directory, one file per key.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl ObjectStore for LocalStore {
    fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let path = self.path_for(key);
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, bytes).map_err(io_err)?;
        debug!(path = %path.display(), bytes = bytes.len(), "Object written");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-process store; clones share the same objects.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<BTreeMap<String, StoredObject>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError> {
        check_key(key)?;
        let mut guard = self.objects.lock().map_err(|_| StorageError::Rejected {
            key: key.to_string(),
            detail: "store lock poisoned".to_string(),
        })?;
        guard.insert(
            key.to_string(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use tempfile::tempdir;

    #[test]
    fn rejects_escaping_keys() {
        let store = MemoryStore::new();
        assert!(store.put("../x", b"", "text/plain").is_err());
        assert!(store.put("/abs", b"", "text/plain").is_err());
        assert!(store.put("", b"", "text/plain").is_err());
        assert!(store.put("a/b/c.json", b"{}", "application/json").is_ok());
        assert_eq!(store.keys(), vec!["a/b/c.json".to_string()]);
    }

    #[test]
    fn local_store_creates_parents() {
        let temp = tempdir().unwrap();
        let store = LocalStore::new(temp.path());
        store
            .put_text("orchestration/runs/r1/step_SUCCESS.json", "{\"ok\": true}", "application/json")
            .unwrap();
        let written =
            fs::read_to_string(temp.path().join("orchestration/runs/r1/step_SUCCESS.json")).unwrap();
        assert_eq!(written, "{\"ok\": true}");
    }

    #[test]
    fn gcs_store_sets_content_type() {
        let backend = Arc::new(InMemory::new());
        let store = GcsStore::with_client("lake/", backend.clone()).unwrap();
        let key = "orchestration/runs/r1/s1_SUCCESS.json";
        store.put_text(key, "{\"ok\": true}", "application/json").unwrap();
        assert_eq!(store.url(key), format!("gs://lake/{key}"));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let fetched = runtime.block_on(backend.get(&RemotePath::from(key))).unwrap();
        let content_type: Option<&str> = fetched
            .attributes
            .get(&Attribute::ContentType)
            .map(AsRef::as_ref);
        assert_eq!(content_type, Some("application/json"));
        let bytes = runtime.block_on(fetched.bytes()).unwrap();
        assert_eq!(&bytes[..], b"{\"ok\": true}");
    }

    #[test]
    fn gcs_store_rejects_escaping_keys_before_upload() {
        let backend = Arc::new(InMemory::new());
        let store = GcsStore::with_client("lake", backend).unwrap();
        let err = store.put("/runs/r1/x.json", b"{}", "application/json").unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
