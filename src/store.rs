use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Key under which the discovered sign-in email is cached between sessions.
pub const CACHED_EMAIL_KEY: &str = "_cwic_cache_email";

/// Small persisted key/value boundary. The client only stores the cached
/// identity email here, but the seam keeps persistence out of the sign-in
/// machine and lets tests run fully in memory.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<String>;
    async fn set(&self, key: &str, value: &str);
    async fn remove(&self, key: &str);
}

/// Volatile store, the default for tests and short-lived embedders.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<String> {
        self.values.lock().await.get(key).cloned()
    }

    async fn set(&self, key: &str, value: &str) {
        self.values.lock().await.insert(key.to_string(), value.to_string());
    }

    async fn remove(&self, key: &str) {
        self.values.lock().await.remove(key);
    }
}

/// One file per key under a base directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are fixed constants, not user input, so no escaping is needed.
        self.dir.join(key)
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Option<String> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(s) => Some(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(target: "Client/Store", "failed to read {key}: {e}");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(target: "Client/Store", "failed to create store dir: {e}");
            return;
        }
        if let Err(e) = tokio::fs::write(self.path_for(key), value).await {
            warn!(target: "Client/Store", "failed to write {key}: {e}");
        }
    }

    async fn remove(&self, key: &str) {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(target: "Client/Store", "failed to remove {key}: {e}"),
        }
    }
}
