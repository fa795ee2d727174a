//! SQLite-backed cache for computed weight results.
//!
//! The engine itself never reads or writes this store; callers key computed
//! results by (category, dataset-set fingerprint, method) to avoid
//! recomputation. The fingerprint is order-insensitive over the dataset
//! collection, so shuffled dataset files hit the same entry. Payloads are
//! opaque serialized JSON; the cache does not interpret them.

use async_trait::async_trait;
use fs2::FileExt;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::dataset::Dataset;

/// Which estimator produced a cached payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Mle,
    Bayesian,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Mle => "mle",
            Method::Bayesian => "bayesian",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WeightCacheKey {
    pub category: String,
    pub method: Method,
    pub dataset_fingerprint: String,
    pub key_hash: String,
}

impl WeightCacheKey {
    pub fn new(
        category: &str,
        datasets: &[Dataset],
        method: Method,
    ) -> Result<Self, CacheError> {
        let dataset_fingerprint = fingerprint_datasets(datasets)?;
        let key_hash = hash_fields(&[category, method.as_str(), &dataset_fingerprint]);
        Ok(Self {
            category: category.to_string(),
            method,
            dataset_fingerprint,
            key_hash,
        })
    }
}

/// Order-insensitive fingerprint of a dataset collection: hash each
/// dataset's canonical JSON, sort the digests, hash the sorted list.
fn fingerprint_datasets(datasets: &[Dataset]) -> Result<String, CacheError> {
    let mut digests = Vec::with_capacity(datasets.len());
    for ds in datasets {
        let canonical =
            serde_json::to_string(ds).map_err(|e| CacheError::Serde(e.to_string()))?;
        digests.push(hash_text(&canonical));
    }
    digests.sort();
    let refs: Vec<&str> = digests.iter().map(String::as_str).collect();
    Ok(hash_fields(&refs))
}

/// A cached result payload, exactly as the caller serialized it.
#[derive(Debug, Clone)]
pub struct CachedWeights {
    pub payload: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache lock poisoned")]
    Poisoned,
    #[error("task join error: {0}")]
    Join(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[async_trait]
pub trait WeightCache: Send + Sync {
    async fn get(&self, key: &WeightCacheKey) -> Result<Option<CachedWeights>, CacheError>;
    async fn put(&self, key: &WeightCacheKey, value: &CachedWeights) -> Result<(), CacheError>;
}

#[derive(Clone)]
pub struct SqliteWeightCache {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWeightCache {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(&path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;\
             PRAGMA synchronous=NORMAL;\
             CREATE TABLE IF NOT EXISTS weight_cache (\
               key_hash TEXT PRIMARY KEY,\
               category TEXT NOT NULL,\
               method TEXT NOT NULL,\
               dataset_fingerprint TEXT NOT NULL,\
               payload TEXT NOT NULL,\
               created_at INTEGER NOT NULL,\
               updated_at INTEGER NOT NULL,\
               hit_count INTEGER NOT NULL DEFAULT 0\
             );",
        )?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("DROPWEIGHTS_CACHE_PATH") {
            return PathBuf::from(path);
        }
        PathBuf::from(".dropweights_cache.sqlite")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_exclusive(&self) -> Result<CacheLock, CacheError> {
        CacheLock::new(&self.path)
    }

    fn with_conn<F, R>(&self, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&Connection) -> Result<R, CacheError>,
    {
        let guard = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        f(&guard)
    }
}

#[async_trait]
impl WeightCache for SqliteWeightCache {
    async fn get(&self, key: &WeightCacheKey) -> Result<Option<CachedWeights>, CacheError> {
        let key_hash = key.key_hash.clone();
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT payload FROM weight_cache WHERE key_hash = ?1")?;
                let mut rows = stmt.query(params![key_hash])?;
                if let Some(row) = rows.next()? {
                    let entry = CachedWeights {
                        payload: row.get(0)?,
                    };
                    conn.execute(
                        "UPDATE weight_cache\
                         SET hit_count = hit_count + 1, updated_at = ?1\
                         WHERE key_hash = ?2",
                        params![now_epoch(), key_hash],
                    )?;
                    Ok(Some(entry))
                } else {
                    Ok(None)
                }
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }

    async fn put(&self, key: &WeightCacheKey, value: &CachedWeights) -> Result<(), CacheError> {
        let key = key.clone();
        let value = value.clone();
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let now = now_epoch();
                conn.execute(
                    "INSERT INTO weight_cache (\
                        key_hash, category, method, dataset_fingerprint, payload,\
                        created_at, updated_at\
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)\
                     ON CONFLICT(key_hash) DO UPDATE SET\
                        payload = excluded.payload,\
                        updated_at = excluded.updated_at",
                    params![
                        key.key_hash,
                        key.category,
                        key.method.as_str(),
                        key.dataset_fingerprint,
                        value.payload,
                        now,
                        now,
                    ],
                )?;
                Ok(())
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }
}

#[derive(Debug)]
pub struct CacheLock {
    _file: std::fs::File,
}

impl CacheLock {
    fn new(db_path: &Path) -> Result<Self, CacheError> {
        let mut lock_path = db_path.to_path_buf();
        lock_path.set_extension("lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(lock_path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

#[derive(Debug, Serialize)]
pub struct CacheExportRow {
    pub key_hash: String,
    pub category: String,
    pub method: String,
    pub dataset_fingerprint: String,
    pub payload: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub hit_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachePruneStats {
    pub deleted: usize,
    pub remaining: usize,
}

impl SqliteWeightCache {
    pub async fn export_jsonl(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let path = path.as_ref().to_path_buf();
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, category, method, dataset_fingerprint, payload,\
                            created_at, updated_at, hit_count\
                     FROM weight_cache ORDER BY updated_at DESC",
                )?;
                let mut rows = stmt.query([])?;
                let mut file = std::fs::File::create(path)?;
                while let Some(row) = rows.next()? {
                    let record = CacheExportRow {
                        key_hash: row.get(0)?,
                        category: row.get(1)?,
                        method: row.get(2)?,
                        dataset_fingerprint: row.get(3)?,
                        payload: row.get(4)?,
                        created_at: row.get(5)?,
                        updated_at: row.get(6)?,
                        hit_count: row.get(7)?,
                    };
                    let line = serde_json::to_string(&record)
                        .map_err(|e| CacheError::Serde(e.to_string()))?;
                    use std::io::Write;
                    writeln!(file, "{line}")?;
                }
                Ok(())
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }

    pub async fn prune(
        &self,
        max_age_days: Option<u64>,
        max_rows: Option<usize>,
    ) -> Result<CachePruneStats, CacheError> {
        let conn = self.clone();
        tokio::task::spawn_blocking(move || {
            conn.with_conn(|conn| {
                let mut deleted: usize = 0;
                if let Some(days) = max_age_days {
                    let cutoff = now_epoch().saturating_sub((days as i64).saturating_mul(86_400));
                    let removed = conn.execute(
                        "DELETE FROM weight_cache WHERE updated_at < ?1",
                        params![cutoff],
                    )?;
                    deleted = deleted.saturating_add(removed);
                }

                if let Some(max_rows) = max_rows {
                    if max_rows == 0 {
                        let removed = conn.execute("DELETE FROM weight_cache", [])?;
                        deleted = deleted.saturating_add(removed);
                        return Ok(CachePruneStats {
                            deleted,
                            remaining: 0,
                        });
                    }
                    let count: i64 =
                        conn.query_row("SELECT COUNT(*) FROM weight_cache", [], |row| row.get(0))?;
                    let keep = max_rows as i64;
                    if count > keep {
                        let removed = conn.execute(
                            "DELETE FROM weight_cache WHERE key_hash IN (\
                                SELECT key_hash FROM weight_cache \
                                ORDER BY updated_at DESC LIMIT -1 OFFSET ?1\
                             )",
                            params![keep],
                        )?;
                        deleted = deleted.saturating_add(removed);
                    }
                }

                let remaining: i64 =
                    conn.query_row("SELECT COUNT(*) FROM weight_cache", [], |row| row.get(0))?;
                Ok(CachePruneStats {
                    deleted,
                    remaining: remaining.max(0) as usize,
                })
            })
        })
        .await
        .map_err(|e| CacheError::Join(e.to_string()))?
    }
}

fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            hasher.update(b"|");
        }
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
