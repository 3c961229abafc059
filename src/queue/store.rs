//! Queue store trait and its SQLite and in-memory implementations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::http::Method;

/// One deferred mutation, exactly as it will be replayed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueuedRequest {
  /// Store-assigned id: unique, monotonically increasing, never reused.
  pub id: i64,
  /// Full resource address.
  pub url: String,
  /// POST, PUT or DELETE; GET is never queued.
  pub method: Method,
  /// Serialized payload, may be empty.
  pub body: String,
  /// When the record was captured. Metadata only; replay never consults it.
  pub created_at: DateTime<Utc>,
}

/// Trait for the durable record store backing the queue.
///
/// Every call runs as one short-lived transaction; nothing spans multiple
/// logical operations, so a concurrent enqueue and a drain-side removal
/// interleave safely on distinct ids.
pub trait QueueStore: Send + Sync {
  /// Insert a new record, returning it with its assigned id. Either the
  /// complete record is stored or nothing is.
  fn enqueue(&self, method: Method, url: &str, body: &str) -> Result<QueuedRequest>;

  /// Full snapshot of every record currently present, not a live cursor.
  fn all(&self) -> Result<Vec<QueuedRequest>>;

  /// Delete one record by id. Removing an absent id is a no-op.
  fn remove(&self, id: i64) -> Result<()>;

  /// Number of records currently queued.
  fn count(&self) -> Result<usize>;
}

/// Schema for the pending-request table.
///
/// AUTOINCREMENT keeps ids strictly increasing even after deletions, which is
/// what makes "two sequential enqueues yield increasing ids" hold across a
/// drain cycle.
const QUEUE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pending_requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    method TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// SQLite-backed durable queue store.
pub struct SqliteQueueStore {
  conn: Mutex<Connection>,
}

impl SqliteQueueStore {
  /// Open (creating if absent) the queue database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::Storage(format!("Failed to create queue directory: {}", e)))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::Storage(format!(
        "Failed to open queue database at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::from_connection(conn)
  }

  /// Open a queue store that lives only as long as the process. Used by
  /// tests; durability-free by definition.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::Storage(format!("Failed to open in-memory queue database: {}", e)))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(QUEUE_SCHEMA)
      .map_err(|e| Error::Storage(format!("Failed to run queue migrations: {}", e)))?;

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

impl QueueStore for SqliteQueueStore {
  fn enqueue(&self, method: Method, url: &str, body: &str) -> Result<QueuedRequest> {
    let mut conn = self.lock()?;

    // The read-back runs inside the insert's transaction: a failed enqueue
    // rolls back and stores nothing.
    let tx = conn
      .transaction()
      .map_err(|e| Error::Storage(format!("Failed to begin enqueue transaction: {}", e)))?;

    tx.execute(
      "INSERT INTO pending_requests (url, method, body) VALUES (?, ?, ?)",
      params![url, method.as_str(), body],
    )
    .map_err(|e| Error::Storage(format!("Failed to enqueue request for {}: {}", url, e)))?;

    let id = tx.last_insert_rowid();
    let created_at: String = tx
      .query_row(
        "SELECT created_at FROM pending_requests WHERE id = ?",
        params![id],
        |row| row.get(0),
      )
      .map_err(|e| Error::Storage(format!("Failed to read back queued record {}: {}", id, e)))?;
    let created_at = parse_datetime(&created_at)?;

    tx.commit()
      .map_err(|e| Error::Storage(format!("Failed to commit enqueue transaction: {}", e)))?;

    Ok(QueuedRequest {
      id,
      url: url.to_string(),
      method,
      body: body.to_string(),
      created_at,
    })
  }

  fn all(&self) -> Result<Vec<QueuedRequest>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT id, url, method, body, created_at FROM pending_requests ORDER BY id")
      .map_err(|e| Error::Storage(format!("Failed to prepare queue query: {}", e)))?;

    let rows = stmt
      .query_map([], |row| {
        Ok((
          row.get::<_, i64>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, String>(2)?,
          row.get::<_, String>(3)?,
          row.get::<_, String>(4)?,
        ))
      })
      .map_err(|e| Error::Storage(format!("Failed to query queue: {}", e)))?;

    let mut records = Vec::new();
    for row in rows {
      let (id, url, method, body, created_at) =
        row.map_err(|e| Error::Storage(format!("Failed to read queue row: {}", e)))?;

      // A record we cannot parse cannot be replayed; surface it instead of
      // silently dropping a pending mutation.
      let method = method
        .parse::<Method>()
        .map_err(|e| Error::Storage(format!("Corrupt queue record {}: {}", id, e)))?;

      records.push(QueuedRequest {
        id,
        url,
        method,
        body,
        created_at: parse_datetime(&created_at)?,
      });
    }

    Ok(records)
  }

  fn remove(&self, id: i64) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM pending_requests WHERE id = ?", params![id])
      .map_err(|e| Error::Storage(format!("Failed to remove queued record {}: {}", id, e)))?;

    Ok(())
  }

  fn count(&self) -> Result<usize> {
    let conn = self.lock()?;

    let count: i64 = conn
      .query_row("SELECT COUNT(*) FROM pending_requests", [], |row| row.get(0))
      .map_err(|e| Error::Storage(format!("Failed to count queued records: {}", e)))?;

    Ok(count as usize)
  }
}

/// In-memory queue store. Records do not survive the process; everything else
/// behaves like the durable store, including monotonic ids.
#[derive(Default)]
pub struct MemoryQueueStore {
  inner: Mutex<MemoryQueueInner>,
}

#[derive(Default)]
struct MemoryQueueInner {
  next_id: i64,
  records: Vec<QueuedRequest>,
}

impl MemoryQueueStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn lock(&self) -> Result<MutexGuard<'_, MemoryQueueInner>> {
    self
      .inner
      .lock()
      .map_err(|e| Error::Storage(format!("Lock poisoned: {}", e)))
  }
}

impl QueueStore for MemoryQueueStore {
  fn enqueue(&self, method: Method, url: &str, body: &str) -> Result<QueuedRequest> {
    let mut inner = self.lock()?;

    inner.next_id += 1;
    let record = QueuedRequest {
      id: inner.next_id,
      url: url.to_string(),
      method,
      body: body.to_string(),
      created_at: Utc::now(),
    };

    inner.records.push(record.clone());
    Ok(record)
  }

  fn all(&self) -> Result<Vec<QueuedRequest>> {
    Ok(self.lock()?.records.clone())
  }

  fn remove(&self, id: i64) -> Result<()> {
    self.lock()?.records.retain(|record| record.id != id);
    Ok(())
  }

  fn count(&self) -> Result<usize> {
    Ok(self.lock()?.records.len())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| Error::Storage(format!("Failed to parse datetime '{}': {}", s, e)))
}
