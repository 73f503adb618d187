//! Durable storage backend
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<store>/<digest>.json          entry metadata (key, status, stamp, sequence, body file)
//! <root>/<store>/<digest>.<write>.body   response body of one write
//! ```
//!
//! `<digest>` is the first 16 bytes of SHA-256 over the key, hex encoded;
//! `<write>` is a fresh id per `put`. Each write lands its body under its
//! own name, then renames its metadata into place. That rename is the
//! commit: overlapping writes to one key never share a file, the last
//! rename wins, and the winner's stamp always describes the winner's body.
//! A writer removes the body it superseded once its own metadata is live.
//! Within one process the read-previous/rename step is serialized per
//! store, so every superseded body is removed exactly once.

use super::{validate_store_name, CacheEntry, CacheStorage, CacheStore, StorageEstimate};
use crate::error::{CacheError, CacheResult};
use crate::request::Response;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";

/// On-disk entry metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    status: u16,
    content_type: Option<String>,
    inserted_at: DateTime<Utc>,
    sequence: u64,
    body_len: u64,
    /// Body file name within the store directory
    body_file: String,
}

/// File stem for a key
fn digest(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(&hash[..16])
}

/// Write `content` to `path` via a uniquely named sibling temp file and
/// rename, so concurrent writers to one path never share a temp file
async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    let tmp = PathBuf::from(tmp);
    if let Err(e) = fs::write(&tmp, content).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e);
    }
    match fs::rename(&tmp, path).await {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = fs::remove_file(&tmp).await;
            Err(e)
        }
    }
}

/// Remove a file, treating "already gone" as success
async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// A store backed by one directory
pub struct DiskStore {
    name: String,
    dir: PathBuf,
    next_sequence: AtomicU64,
    /// Held from reading the previous metadata until the new one is live
    commit: Mutex<()>,
}

impl DiskStore {
    async fn open(name: &str, dir: PathBuf) -> CacheResult<Self> {
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| CacheError::io(format!("creating store directory {}", dir.display()), e))?;

        let store = Self {
            name: name.to_string(),
            dir,
            next_sequence: AtomicU64::new(0),
            commit: Mutex::new(()),
        };

        // Continue numbering after the newest entry already on disk
        let last = store
            .read_metas()
            .await?
            .iter()
            .map(|m| m.sequence)
            .max()
            .unwrap_or(0);
        store.next_sequence.store(last, Ordering::SeqCst);

        debug!("Opened disk store {} (last sequence {})", name, last);
        Ok(store)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", digest(key), META_EXT))
    }

    /// Fresh body file name for one write of `key`
    fn new_body_file(key: &str) -> String {
        format!("{}.{}.{}", digest(key), Uuid::new_v4().simple(), BODY_EXT)
    }

    /// Remove a body file no metadata points at any more
    async fn discard_body(&self, body_file: &str) {
        let path = self.dir.join(body_file);
        if let Err(e) = remove_if_exists(&path).await {
            warn!("Cannot remove superseded body {}: {}", path.display(), e);
        }
    }

    async fn read_meta(&self, path: &Path) -> CacheResult<Option<EntryMeta>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::io(
                    format!("reading entry metadata {}", path.display()),
                    e,
                ))
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::CorruptEntry {
                store: self.name.clone(),
                reason: format!("{}: {}", path.display(), e),
            })
    }

    /// All readable metadata records in the store
    async fn read_metas(&self) -> CacheResult<Vec<EntryMeta>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(CacheError::io(
                    format!("reading store directory {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut metas = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io("reading store entry", e))?
        {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == META_EXT) {
                continue;
            }
            match self.read_meta(&path).await {
                Ok(Some(meta)) => metas.push(meta),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable entry in {}: {}", self.name, e),
            }
        }

        Ok(metas)
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let meta_path = self.meta_path(key);
        let mut attempts = 0;

        loop {
            let Some(meta) = self.read_meta(&meta_path).await? else {
                return Ok(None);
            };
            if meta.key != key {
                return Ok(None);
            }

            let body_path = self.dir.join(&meta.body_file);
            match fs::read(&body_path).await {
                Ok(body) => {
                    return Ok(Some(CacheEntry {
                        key: meta.key,
                        status: meta.status,
                        content_type: meta.content_type,
                        body,
                        inserted_at: meta.inserted_at,
                        sequence: meta.sequence,
                    }))
                }
                // A newer write superseded this body between the two reads
                Err(e) if e.kind() == ErrorKind::NotFound && attempts < 3 => {
                    attempts += 1;
                    debug!("Body of {} replaced while reading, retrying", key);
                }
                Err(e) => {
                    return Err(CacheError::CorruptEntry {
                        store: self.name.clone(),
                        reason: format!("missing body {}: {}", body_path.display(), e),
                    })
                }
            }
        }
    }

    async fn put(
        &self,
        key: &str,
        response: &Response,
        inserted_at: DateTime<Utc>,
    ) -> CacheResult<()> {
        let meta_path = self.meta_path(key);
        let body_file = Self::new_body_file(key);

        // Nothing references this file until the metadata rename below
        let body_path = self.dir.join(&body_file);
        fs::write(&body_path, &response.body)
            .await
            .map_err(|e| CacheError::io(format!("writing entry body {}", body_path.display()), e))?;

        let commit = self.commit.lock().await;
        let previous = match self.read_meta(&meta_path).await {
            Ok(previous) => previous,
            Err(e) => {
                warn!("Replacing unreadable entry in {}: {}", self.name, e);
                None
            }
        };

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let meta = EntryMeta {
            key: key.to_string(),
            status: response.status,
            content_type: response.content_type.clone(),
            inserted_at,
            sequence,
            body_len: response.body.len() as u64,
            body_file,
        };

        let committed = match serde_json::to_vec_pretty(&meta) {
            Ok(content) => write_atomic(&meta_path, &content)
                .await
                .map_err(|e| CacheError::io(format!("writing entry metadata {}", meta_path.display()), e)),
            Err(e) => Err(e.into()),
        };
        drop(commit);

        if let Err(e) = committed {
            self.discard_body(&meta.body_file).await;
            return Err(e);
        }

        if let Some(previous) = previous.filter(|p| p.body_file != meta.body_file) {
            self.discard_body(&previous.body_file).await;
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let meta_path = self.meta_path(key);
        let meta = self.read_meta(&meta_path).await.ok().flatten();
        let existed = remove_if_exists(&meta_path).await.map_err(|e| {
            CacheError::io(format!("removing entry metadata {}", meta_path.display()), e)
        })?;

        if let Some(meta) = meta {
            let body_path = self.dir.join(&meta.body_file);
            remove_if_exists(&body_path).await.map_err(|e| {
                CacheError::io(format!("removing entry body {}", body_path.display()), e)
            })?;
        }

        Ok(existed)
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut metas = self.read_metas().await?;
        metas.sort_by_key(|m| m.sequence);
        Ok(metas.into_iter().map(|m| m.key).collect())
    }

    async fn size_bytes(&self) -> CacheResult<u64> {
        dir_size(&self.dir).await
    }
}

/// Sum of file sizes directly inside `dir`
async fn dir_size(dir: &Path) -> CacheResult<u64> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(CacheError::io(format!("reading {}", dir.display()), e)),
    };

    let mut total = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CacheError::io("reading directory entry", e))?
    {
        if let Ok(meta) = entry.metadata().await {
            if meta.is_file() {
                total += meta.len();
            }
        }
    }
    Ok(total)
}

/// Storage rooted at one directory, one subdirectory per store
pub struct DiskStorage {
    root: PathBuf,
    quota: Option<u64>,
    opened: Mutex<HashMap<String, Arc<DiskStore>>>,
}

impl DiskStorage {
    /// Open (and create) the storage root
    pub async fn open(root: PathBuf, quota: Option<u64>) -> CacheResult<Self> {
        fs::create_dir_all(&root)
            .await
            .map_err(|e| CacheError::io(format!("creating store root {}", root.display()), e))?;

        Ok(Self {
            root,
            quota,
            opened: Mutex::new(HashMap::new()),
        })
    }

    fn store_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn CacheStore>> {
        validate_store_name(name)?;
        let mut opened = self.opened.lock().await;

        if let Some(store) = opened.get(name) {
            if fs::try_exists(&store.dir).await.unwrap_or(false) {
                return Ok(store.clone());
            }
        }

        let store = Arc::new(DiskStore::open(name, self.store_dir(name)).await?);
        opened.insert(name.to_string(), store.clone());
        Ok(store)
    }

    async fn has(&self, name: &str) -> CacheResult<bool> {
        if validate_store_name(name).is_err() {
            return Ok(false);
        }
        let dir = self.store_dir(name);
        fs::try_exists(&dir)
            .await
            .map_err(|e| CacheError::io(format!("checking {}", dir.display()), e))
    }

    async fn delete(&self, name: &str) -> CacheResult<bool> {
        validate_store_name(name)?;
        self.opened.lock().await.remove(name);

        let dir = self.store_dir(name);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Deleted disk store {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(format!("deleting store {}", dir.display()), e)),
        }
    }

    async fn names(&self) -> CacheResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| CacheError::io(format!("reading store root {}", self.root.display()), e))?;

        let mut names = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CacheError::io("reading store root entry", e))?
        {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_store_name(name).is_ok() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    async fn estimate(&self) -> CacheResult<Option<StorageEstimate>> {
        let Some(quota) = self.quota else {
            return Ok(None);
        };

        let mut usage = 0;
        for name in self.names().await? {
            usage += dir_size(&self.store_dir(&name)).await?;
        }
        Ok(Some(StorageEstimate::new(usage, quota)))
    }

    fn backend_name(&self) -> &'static str {
        "disk"
    }
}
