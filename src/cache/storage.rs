//! Bucket storage backends: SQLite for persistence, in-memory for
//! ephemeral hosts and tests.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::http::RequestKey;

use super::traits::{BucketStore, CachedEntry, StoredResponse};

/// SQLite-based bucket storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the storage at the default location.
  pub fn open() -> Result<Self> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Self::open_at(&data_dir.join("medquiz-offline").join("cache.db"))
  }

  /// Open the storage at an explicit path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a throwaway in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(BUCKET_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for bucket tables.
const BUCKET_SCHEMA: &str = r#"
-- One row per named cache bucket
CREATE TABLE IF NOT EXISTS buckets (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Stored responses, keyed by bucket and request identity hash
CREATE TABLE IF NOT EXISTS entries (
    bucket TEXT NOT NULL,
    request_key TEXT NOT NULL,
    description TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (bucket, request_key)
);

CREATE INDEX IF NOT EXISTS idx_entries_bucket ON entries(bucket);
"#;

impl BucketStore for SqliteStorage {
  fn open_bucket(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("INSERT OR IGNORE INTO buckets (name) VALUES (?)", params![name])
      .map_err(|e| eyre!("Failed to open bucket {}: {}", name, e))?;

    Ok(())
  }

  fn list_buckets(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM buckets ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare bucket query: {}", e))?;

    let names: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list buckets: {}", e))?
      .filter_map(|r| r.ok())
      .collect();

    Ok(names)
  }

  fn delete_bucket(&self, name: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let entries = conn
      .execute("DELETE FROM entries WHERE bucket = ?", params![name])
      .map_err(|e| eyre!("Failed to delete entries of bucket {}: {}", name, e))?;

    let buckets = conn
      .execute("DELETE FROM buckets WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete bucket {}: {}", name, e))?;

    Ok(entries + buckets > 0)
  }

  fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT data, cached_at FROM entries
         WHERE bucket = ? AND request_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare entry query: {}", e))?;

    let result: Option<(Vec<u8>, String)> = stmt
      .query_row(params![bucket, key.cache_hash()], |row| {
        Ok((row.get(0)?, row.get(1)?))
      })
      .ok();

    match result {
      Some((data, cached_at_str)) => {
        let response: StoredResponse = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize entry {}: {}", key.description(), e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry {
          response,
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let data =
      serde_json::to_vec(response).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entries (bucket, request_key, description, data, cached_at)
         VALUES (?, ?, ?, ?, datetime('now'))",
        params![bucket, key.cache_hash(), key.description(), data],
      )
      .map_err(|e| eyre!("Failed to store entry {}: {}", key.description(), e))?;

    Ok(())
  }

  fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<()> {
    // Serialize outside the transaction so every early return below leaves
    // the connection transaction-free
    let mut rows = Vec::with_capacity(entries.len());
    for (key, response) in entries {
      let data =
        serde_json::to_vec(response).map_err(|e| eyre!("Failed to serialize entry: {}", e))?;
      rows.push((key.cache_hash(), key.description(), data));
    }

    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (hash, description, data) in &rows {
      let stored = conn
        .execute(
          "INSERT OR REPLACE INTO entries (bucket, request_key, description, data, cached_at)
           VALUES (?, ?, ?, ?, datetime('now'))",
          params![bucket, hash, description, data],
        )
        .map_err(|e| eyre!("Failed to store entry {}: {}", description, e));

      if let Err(err) = stored {
        conn
          .execute("ROLLBACK", [])
          .map_err(|e| eyre!("Failed to roll back transaction: {}", e))?;
        return Err(err);
      }
    }

    conn
      .execute("COMMIT", [])
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

type MemoryBuckets = BTreeMap<String, HashMap<String, (StoredResponse, DateTime<Utc>)>>;

/// In-memory bucket storage. Clones share the same underlying buckets, so a
/// test can hold a handle onto the store it handed to the agent.
#[derive(Clone, Default)]
pub struct MemoryStorage {
  inner: Arc<Mutex<MemoryBuckets>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Number of entries in a bucket.
  pub fn entry_count(&self, bucket: &str) -> usize {
    self
      .inner
      .lock()
      .map(|buckets| buckets.get(bucket).map(|b| b.len()).unwrap_or(0))
      .unwrap_or(0)
  }
}

impl BucketStore for MemoryStorage {
  fn open_bucket(&self, name: &str) -> Result<()> {
    let mut buckets = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    buckets.entry(name.to_string()).or_default();
    Ok(())
  }

  fn list_buckets(&self) -> Result<Vec<String>> {
    let buckets = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(buckets.keys().cloned().collect())
  }

  fn delete_bucket(&self, name: &str) -> Result<bool> {
    let mut buckets = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(buckets.remove(name).is_some())
  }

  fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>> {
    let buckets = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(buckets.get(bucket).and_then(|entries| {
      entries
        .get(&key.cache_hash())
        .map(|(response, cached_at)| CachedEntry {
          response: response.clone(),
          cached_at: *cached_at,
        })
    }))
  }

  fn put(&self, bucket: &str, key: &RequestKey, response: &StoredResponse) -> Result<()> {
    let mut buckets = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    buckets
      .entry(bucket.to_string())
      .or_default()
      .insert(key.cache_hash(), (response.clone(), Utc::now()));

    Ok(())
  }

  fn put_all(&self, bucket: &str, entries: &[(RequestKey, StoredResponse)]) -> Result<()> {
    let mut buckets = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let target = buckets.entry(bucket.to_string()).or_default();
    for (key, response) in entries {
      target.insert(key.cache_hash(), (response.clone(), Utc::now()));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::{Request, RequestKey};
  use url::Url;

  fn key(url: &str) -> RequestKey {
    RequestKey::of(&Request::get(Url::parse(url).unwrap()))
  }

  fn stored(body: &str) -> StoredResponse {
    StoredResponse {
      status: 200,
      status_text: "OK".to_string(),
      headers: vec![("Content-Type".to_string(), "text/html".to_string())],
      body: body.as_bytes().to_vec(),
    }
  }

  fn roundtrip(store: &dyn BucketStore) {
    let k = key("https://medquiz.example/index.html");
    store.open_bucket("medquiz-v1.0").unwrap();

    assert!(store.get("medquiz-v1.0", &k).unwrap().is_none());

    store.put("medquiz-v1.0", &k, &stored("<html>")).unwrap();
    let entry = store.get("medquiz-v1.0", &k).unwrap().unwrap();
    assert_eq!(entry.response.body, b"<html>");
    assert_eq!(entry.response.headers.len(), 1);
  }

  fn replace_is_wholesale(store: &dyn BucketStore) {
    let k = key("https://medquiz.example/app.js");
    store.put("medquiz-v1.0", &k, &stored("v1")).unwrap();
    store.put("medquiz-v1.0", &k, &stored("v2")).unwrap();

    let entry = store.get("medquiz-v1.0", &k).unwrap().unwrap();
    assert_eq!(entry.response.body, b"v2");
  }

  fn bucket_lifecycle(store: &dyn BucketStore) {
    store.open_bucket("medquiz-v0.9").unwrap();
    store.open_bucket("medquiz-v1.0").unwrap();
    // Opening twice is a no-op
    store.open_bucket("medquiz-v1.0").unwrap();

    assert_eq!(
      store.list_buckets().unwrap(),
      vec!["medquiz-v0.9".to_string(), "medquiz-v1.0".to_string()]
    );

    assert!(store.delete_bucket("medquiz-v0.9").unwrap());
    assert!(!store.delete_bucket("medquiz-v0.9").unwrap());
    assert_eq!(store.list_buckets().unwrap(), vec!["medquiz-v1.0".to_string()]);
  }

  fn delete_bucket_destroys_entries(store: &dyn BucketStore) {
    let k = key("https://medquiz.example/");
    store.open_bucket("medquiz-v1.0").unwrap();
    store.put("medquiz-v1.0", &k, &stored("shell")).unwrap();

    assert!(store.delete_bucket("medquiz-v1.0").unwrap());
    assert!(store.get("medquiz-v1.0", &k).unwrap().is_none());
  }

  fn put_all_stores_every_entry(store: &dyn BucketStore) {
    let entries = vec![
      (key("https://medquiz.example/"), stored("shell")),
      (key("https://medquiz.example/index.html"), stored("index")),
      (key("https://medquiz.example/manifest.json"), stored("{}")),
    ];

    store.open_bucket("medquiz-v1.0").unwrap();
    store.put_all("medquiz-v1.0", &entries).unwrap();

    for (k, response) in &entries {
      let entry = store.get("medquiz-v1.0", k).unwrap().unwrap();
      assert_eq!(&entry.response, response);
    }
  }

  #[test]
  fn test_memory_storage() {
    let store = MemoryStorage::new();
    roundtrip(&store);
    replace_is_wholesale(&store);
    put_all_stores_every_entry(&store);
    delete_bucket_destroys_entries(&store);

    let fresh = MemoryStorage::new();
    bucket_lifecycle(&fresh);
  }

  #[test]
  fn test_memory_storage_clones_share_state() {
    let store = MemoryStorage::new();
    let handle = store.clone();

    let k = key("https://medquiz.example/");
    store.put("medquiz-v1.0", &k, &stored("shell")).unwrap();

    assert!(handle.get("medquiz-v1.0", &k).unwrap().is_some());
    assert_eq!(handle.entry_count("medquiz-v1.0"), 1);
  }

  #[test]
  fn test_sqlite_storage() {
    let store = SqliteStorage::open_in_memory().unwrap();
    roundtrip(&store);
    replace_is_wholesale(&store);
    put_all_stores_every_entry(&store);
    delete_bucket_destroys_entries(&store);

    let fresh = SqliteStorage::open_in_memory().unwrap();
    bucket_lifecycle(&fresh);
  }

  #[test]
  fn test_sqlite_records_cached_at() {
    let store = SqliteStorage::open_in_memory().unwrap();
    let k = key("https://medquiz.example/");
    store.put("medquiz-v1.0", &k, &stored("shell")).unwrap();

    let entry = store.get("medquiz-v1.0", &k).unwrap().unwrap();
    // datetime('now') is UTC; allow generous clock skew
    let age = Utc::now() - entry.cached_at;
    assert!(age.num_minutes().abs() < 5);
  }
}
