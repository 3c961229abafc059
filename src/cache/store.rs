//! Blob cache trait and its SQLite and in-memory implementations.
//!
//! The backend is a dumb generation-scoped key-value store; what the keys
//! mean (request identity) and which generation wins a lookup is decided by
//! [`super::ResourceCache`].

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::http::{identity, Method};

/// One cached response blob as served back to a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAsset {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
  /// When the entry was inserted.
  pub stored_at: DateTime<Utc>,
}

/// A full entry as captured at install time.
#[derive(Debug, Clone)]
pub struct AssetEntry {
  pub method: Method,
  pub url: String,
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

/// Trait for the key-value blob cache backing the resource cache.
pub trait BlobCache: Send + Sync {
  /// Insert every entry into `generation` as one atomic write: either all
  /// entries land or none do.
  fn insert_all(&self, generation: &str, entries: &[AssetEntry]) -> Result<()>;

  /// Exact-match lookup of one identity within one generation.
  fn get(&self, generation: &str, identity: &str) -> Result<Option<CachedAsset>>;

  /// Every generation tag currently present, sorted.
  fn generations(&self) -> Result<Vec<String>>;

  /// Drop one generation and all of its entries. Irreversible.
  fn remove_generation(&self, generation: &str) -> Result<()>;
}

/// Schema for the cached-asset table. Payloads are stored as opaque blobs;
/// method and url ride along readable for inspection.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cached_assets (
    generation TEXT NOT NULL,
    identity TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    content_type TEXT,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (generation, identity)
);

CREATE INDEX IF NOT EXISTS idx_cached_assets_identity
    ON cached_assets(identity);
"#;

/// SQLite-backed blob cache.
pub struct SqliteBlobCache {
  conn: Mutex<Connection>,
}

impl SqliteBlobCache {
  /// Open (creating if absent) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("Failed to create cache directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Storage(format!(
        "Failed to open cache database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::from_connection(conn)
  }

  /// Open a cache that lives only as long as the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::Storage(format!("Failed to open in-memory cache database: {}", e)))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| Error::Storage(format!("Failed to run cache migrations: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl BlobCache for SqliteBlobCache {
  fn insert_all(&self, generation: &str, entries: &[AssetEntry]) -> Result<()> {
    let mut conn = self.lock()?;

    let tx = conn
      .transaction()
      .map_err(|e| Error::Storage(format!("Failed to begin cache transaction: {}", e)))?;

    for entry in entries {
      let identity = identity(entry.method, &entry.url);

      tx.execute(
        "INSERT OR REPLACE INTO cached_assets
           (generation, identity, method, url, status, content_type, body, stored_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          generation,
          identity,
          entry.method.as_str(),
          entry.url,
          entry.status,
          entry.content_type,
          entry.body,
        ],
      )
      .map_err(|e| Error::Storage(format!("Failed to store cached asset {}: {}", entry.url, e)))?;
    }

    tx.commit()
      .map_err(|e| Error::Storage(format!("Failed to commit cache transaction: {}", e)))?;

    Ok(())
  }

  fn get(&self, generation: &str, identity: &str) -> Result<Option<CachedAsset>> {
    let conn = self.lock()?;

    let row = conn
      .query_row(
        "SELECT status, content_type, body, stored_at FROM cached_assets
         WHERE generation = ? AND identity = ?",
        params![generation, identity],
        |row| {
          Ok((
            row.get::<_, u16>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Vec<u8>>(2)?,
            row.get::<_, String>(3)?,
          ))
        },
      )
      .optional()
      .map_err(|e| Error::Storage(format!("Failed to query cached asset: {}", e)))?;

    match row {
      Some((status, content_type, body, stored_at)) => Ok(Some(CachedAsset {
        status,
        content_type,
        body,
        stored_at: parse_datetime(&stored_at)?,
      })),
      None => Ok(None),
    }
  }

  fn generations(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT DISTINCT generation FROM cached_assets ORDER BY generation")
      .map_err(|e| Error::Storage(format!("Failed to prepare generations query: {}", e)))?;

    let tags = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| Error::Storage(format!("Failed to list cache generations: {}", e)))?
      .collect::<std::result::Result<Vec<_>, _>>()
      .map_err(|e| Error::Storage(format!("Failed to read cache generation: {}", e)))?;

    Ok(tags)
  }

  fn remove_generation(&self, generation: &str) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute(
        "DELETE FROM cached_assets WHERE generation = ?",
        params![generation],
      )
      .map_err(|e| {
        Error::Storage(format!(
          "Failed to delete cache generation {}: {}",
          generation, e
        ))
      })?;

    Ok(())
  }
}

/// In-memory blob cache for tests and ephemeral embeddings.
#[derive(Default)]
pub struct MemoryBlobCache {
  generations: Mutex<BTreeMap<String, HashMap<String, CachedAsset>>>,
}

impl MemoryBlobCache {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, HashMap<String, CachedAsset>>>> {
    self
      .generations
      .lock()
      .map_err(|e| Error::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl BlobCache for MemoryBlobCache {
  fn insert_all(&self, generation: &str, entries: &[AssetEntry]) -> Result<()> {
    let mut generations = self.lock()?;
    let slot = generations.entry(generation.to_string()).or_default();

    for entry in entries {
      slot.insert(
        identity(entry.method, &entry.url),
        CachedAsset {
          status: entry.status,
          content_type: entry.content_type.clone(),
          body: entry.body.clone(),
          stored_at: Utc::now(),
        },
      );
    }

    Ok(())
  }

  fn get(&self, generation: &str, identity: &str) -> Result<Option<CachedAsset>> {
    Ok(
      self
        .lock()?
        .get(generation)
        .and_then(|slot| slot.get(identity))
        .cloned(),
    )
  }

  fn generations(&self) -> Result<Vec<String>> {
    Ok(self.lock()?.keys().cloned().collect())
  }

  fn remove_generation(&self, generation: &str) -> Result<()> {
    self.lock()?.remove(generation);
    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| Error::Storage(format!("Failed to parse datetime '{}': {}", s, e)))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(url: &str, body: &str) -> AssetEntry {
    AssetEntry {
      method: Method::Get,
      url: url.to_string(),
      status: 200,
      content_type: Some("text/html".to_string()),
      body: body.as_bytes().to_vec(),
    }
  }

  fn caches() -> Vec<Box<dyn BlobCache>> {
    vec![
      Box::new(SqliteBlobCache::open_in_memory().unwrap()),
      Box::new(MemoryBlobCache::new()),
    ]
  }

  #[test]
  fn test_insert_and_exact_lookup() {
    for cache in caches() {
      cache
        .insert_all("v1", &[entry("https://a.test/", "home")])
        .unwrap();

      let id = identity(Method::Get, "https://a.test/");
      let asset = cache.get("v1", &id).unwrap().unwrap();
      assert_eq!(asset.status, 200);
      assert_eq!(asset.content_type.as_deref(), Some("text/html"));
      assert_eq!(asset.body, b"home");

      // Identity is exact: a different method or url misses.
      let other = identity(Method::Post, "https://a.test/");
      assert!(cache.get("v1", &other).unwrap().is_none());
      assert!(cache.get("v2", &id).unwrap().is_none());
    }
  }

  #[test]
  fn test_generations_listed_and_removed() {
    for cache in caches() {
      cache
        .insert_all("v1", &[entry("https://a.test/", "old")])
        .unwrap();
      cache
        .insert_all("v2", &[entry("https://a.test/", "new")])
        .unwrap();

      assert_eq!(cache.generations().unwrap(), vec!["v1", "v2"]);

      cache.remove_generation("v1").unwrap();
      assert_eq!(cache.generations().unwrap(), vec!["v2"]);

      let id = identity(Method::Get, "https://a.test/");
      assert!(cache.get("v1", &id).unwrap().is_none());
      assert_eq!(cache.get("v2", &id).unwrap().unwrap().body, b"new");

      // Removing an absent generation is a no-op.
      cache.remove_generation("v0").unwrap();
    }
  }

  #[test]
  fn test_insert_all_replaces_within_generation() {
    for cache in caches() {
      cache
        .insert_all("v1", &[entry("https://a.test/app.css", "body{}")])
        .unwrap();
      cache
        .insert_all("v1", &[entry("https://a.test/app.css", "body{margin:0}")])
        .unwrap();

      let id = identity(Method::Get, "https://a.test/app.css");
      assert_eq!(cache.get("v1", &id).unwrap().unwrap().body, b"body{margin:0}");
      assert_eq!(cache.generations().unwrap(), vec!["v1"]);
    }
  }

  #[test]
  fn test_binary_bodies_roundtrip() {
    for cache in caches() {
      let png = AssetEntry {
        method: Method::Get,
        url: "https://a.test/imgs/logo.png".to_string(),
        status: 200,
        content_type: Some("image/png".to_string()),
        body: vec![0x89, 0x50, 0x4e, 0x47, 0x00, 0xff],
      };
      cache.insert_all("v1", &[png.clone()]).unwrap();

      let id = identity(Method::Get, &png.url);
      let asset = cache.get("v1", &id).unwrap().unwrap();
      assert_eq!(asset.body, png.body);
      assert_eq!(asset.content_type.as_deref(), Some("image/png"));
    }
  }
}
