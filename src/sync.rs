//! Queue drain and replay.
//!
//! Once connectivity returns, every deferred mutation is replayed against the
//! live backend. Replays are best-effort and independent: one failure never
//! blocks the rest of the queue, and failed records stay put for the next
//! sync round.

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::http::{Method, Request};
use crate::net::NetworkClient;
use crate::queue::{QueueStore, QueuedRequest};

/// Tag identifying the pending-request sync task. Sync events carrying any
/// other tag are ignored.
pub const SYNC_TAG: &str = "sync-pending-requests";

/// Outcome of replaying a single queued record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStatus {
  /// Handed to the backend and removed from the queue.
  Delivered,
  /// Still queued; will be retried on the next sync.
  Failed { reason: String },
}

/// One replayed record, for reporting.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
  pub id: i64,
  pub method: Method,
  pub url: String,
  pub status: ReplayStatus,
}

/// Summary of one drain pass over the queue.
#[derive(Debug, Clone, Default)]
pub struct DrainReport {
  pub outcomes: Vec<ReplayOutcome>,
}

impl DrainReport {
  pub fn attempted(&self) -> usize {
    self.outcomes.len()
  }

  pub fn delivered(&self) -> usize {
    self
      .outcomes
      .iter()
      .filter(|o| o.status == ReplayStatus::Delivered)
      .count()
  }

  pub fn failed(&self) -> usize {
    self.attempted() - self.delivered()
  }

  pub fn is_clean(&self) -> bool {
    self.failed() == 0
  }
}

/// Replays queued mutations when a matching sync event fires.
pub struct SyncEngine<Q: QueueStore, N: NetworkClient> {
  queue: Arc<Q>,
  net: Arc<N>,
}

impl<Q: QueueStore, N: NetworkClient> SyncEngine<Q, N> {
  pub fn new(queue: Arc<Q>, net: Arc<N>) -> Self {
    Self { queue, net }
  }

  /// Entry point for sync events. Drains the queue only when the tag
  /// matches [`SYNC_TAG`]; anything else returns `Ok(None)` untouched.
  pub async fn sync_event(&self, tag: &str) -> Result<Option<DrainReport>> {
    if tag != SYNC_TAG {
      debug!("Ignoring sync event with unrelated tag {}", tag);
      return Ok(None);
    }

    self.drain().await.map(Some)
  }

  /// Replay every currently queued record, oldest first.
  ///
  /// Works over a snapshot: records enqueued while the drain is running are
  /// left for the next round. Delivered records are removed one by one, so
  /// an interrupted drain never forgets what it already handed off.
  pub async fn drain(&self) -> Result<DrainReport> {
    let records = self.queue.all()?;
    if records.is_empty() {
      debug!("Sync fired with an empty queue");
      return Ok(DrainReport::default());
    }

    info!("Replaying {} pending request(s)", records.len());

    let mut report = DrainReport::default();
    for record in records {
      let status = self.replay(&record).await;
      report.outcomes.push(ReplayOutcome {
        id: record.id,
        method: record.method,
        url: record.url,
        status,
      });
    }

    info!(
      "Sync finished: {} delivered, {} still queued",
      report.delivered(),
      report.failed()
    );
    Ok(report)
  }

  /// Replay one record and, on success, drop it from the queue.
  ///
  /// Delivery means the transport round-trip completed; the backend's status
  /// code is not inspected. A record that reached the backend but could not
  /// be removed is reported as failed and stays queued, which the backend may
  /// see as a duplicate on the next sync.
  async fn replay(&self, record: &QueuedRequest) -> ReplayStatus {
    let request = Request::new(record.method, &record.url)
      .with_body(record.body.as_str())
      .with_content_type("application/json");

    match self.net.fetch(&request).await {
      Ok(_) => match self.queue.remove(record.id) {
        Ok(()) => {
          info!("Replayed {} {} (id {})", record.method, record.url, record.id);
          ReplayStatus::Delivered
        }
        Err(e) => {
          error!(
            "Replayed {} {} (id {}) but failed to remove it from the queue: {}",
            record.method, record.url, record.id, e
          );
          ReplayStatus::Failed {
            reason: format!("replayed but not removed: {}", e),
          }
        }
      },
      Err(e) => {
        error!(
          "Replay of {} {} (id {}) failed: {}",
          record.method, record.url, record.id, e
        );
        ReplayStatus::Failed {
          reason: e.to_string(),
        }
      }
    }
  }
}

impl<Q: QueueStore, N: NetworkClient> Clone for SyncEngine<Q, N> {
  fn clone(&self) -> Self {
    Self {
      queue: Arc::clone(&self.queue),
      net: Arc::clone(&self.net),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::Error;
  use crate::net::testing::FakeNetwork;
  use crate::net::FetchedResponse;
  use crate::queue::MemoryQueueStore;

  fn engine() -> (SyncEngine<MemoryQueueStore, FakeNetwork>, Arc<MemoryQueueStore>, Arc<FakeNetwork>)
  {
    let queue = Arc::new(MemoryQueueStore::new());
    let net = Arc::new(FakeNetwork::new());
    let engine = SyncEngine::new(Arc::clone(&queue), Arc::clone(&net));
    (engine, queue, net)
  }

  #[tokio::test]
  async fn test_sync_event_ignores_unrelated_tags() {
    let (engine, queue, net) = engine();
    queue
      .enqueue(Method::Post, "https://api.example.com/tasks", "{}")
      .unwrap();

    let report = engine.sync_event("periodic-cleanup").await.unwrap();
    assert!(report.is_none());
    assert_eq!(queue.count().unwrap(), 1);
    assert!(net.requests().is_empty());
  }

  #[tokio::test]
  async fn test_drain_replays_and_removes_everything() {
    let (engine, queue, net) = engine();
    queue
      .enqueue(Method::Post, "https://api.example.com/tasks", r#"{"title":"a"}"#)
      .unwrap();
    queue
      .enqueue(Method::Put, "https://api.example.com/tasks/1", r#"{"done":true}"#)
      .unwrap();
    queue
      .enqueue(Method::Delete, "https://api.example.com/tasks/2", "")
      .unwrap();

    let report = engine.sync_event(SYNC_TAG).await.unwrap().unwrap();
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.delivered(), 3);
    assert!(report.is_clean());
    assert_eq!(queue.count().unwrap(), 0);

    let seen = net.requests();
    assert_eq!(seen.len(), 3);
    // Replays carry the stored body verbatim and declare a JSON payload.
    assert_eq!(seen[0].method, Method::Post);
    assert_eq!(seen[0].body, r#"{"title":"a"}"#);
    assert_eq!(seen[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(seen[2].method, Method::Delete);
    assert_eq!(seen[2].body, "");
  }

  #[tokio::test]
  async fn test_failed_replay_keeps_record_and_continues() {
    let (engine, queue, net) = engine();
    queue
      .enqueue(Method::Post, "https://api.example.com/a", "1")
      .unwrap();
    queue
      .enqueue(Method::Post, "https://api.example.com/b", "2")
      .unwrap();
    queue
      .enqueue(Method::Post, "https://api.example.com/c", "3")
      .unwrap();
    net.fail("https://api.example.com/b");

    let report = engine.drain().await.unwrap();
    assert_eq!(report.attempted(), 3);
    assert_eq!(report.delivered(), 2);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_clean());

    // Only the failed record survives, untouched.
    let remaining = queue.all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].url, "https://api.example.com/b");
    assert_eq!(remaining[0].body, "2");
    assert_eq!(remaining[0].method, Method::Post);

    assert!(matches!(
      &report.outcomes[1].status,
      ReplayStatus::Failed { .. }
    ));
  }

  #[tokio::test]
  async fn test_drain_twice_is_idempotent() {
    let (engine, queue, _net) = engine();
    queue
      .enqueue(Method::Post, "https://api.example.com/tasks", "{}")
      .unwrap();

    let first = engine.drain().await.unwrap();
    assert_eq!(first.delivered(), 1);

    let second = engine.drain().await.unwrap();
    assert_eq!(second.attempted(), 0);
    assert!(second.is_clean());
  }

  #[tokio::test]
  async fn test_backend_status_is_not_validated() {
    let (engine, queue, net) = engine();
    queue
      .enqueue(Method::Post, "https://api.example.com/tasks", "{}")
      .unwrap();
    net.respond(
      "https://api.example.com/tasks",
      FetchedResponse {
        status: 500,
        content_type: None,
        body: Vec::new(),
      },
    );

    // The round-trip completed, so the record is done even though the
    // backend rejected it.
    let report = engine.drain().await.unwrap();
    assert_eq!(report.delivered(), 1);
    assert_eq!(queue.count().unwrap(), 0);
  }

  // Accepts and lists records normally but can never delete one, modeling a
  // store whose writes start failing mid-drain.
  struct StuckQueueStore {
    inner: MemoryQueueStore,
  }

  impl QueueStore for StuckQueueStore {
    fn enqueue(&self, method: Method, url: &str, body: &str) -> Result<QueuedRequest> {
      self.inner.enqueue(method, url, body)
    }

    fn all(&self) -> Result<Vec<QueuedRequest>> {
      self.inner.all()
    }

    fn remove(&self, _id: i64) -> Result<()> {
      Err(Error::Storage("disk full".to_string()))
    }

    fn count(&self) -> Result<usize> {
      self.inner.count()
    }
  }

  #[tokio::test]
  async fn test_delivered_record_that_cannot_be_removed_stays_queued() {
    let queue = Arc::new(StuckQueueStore {
      inner: MemoryQueueStore::new(),
    });
    queue
      .enqueue(Method::Post, "https://api.example.com/tasks", "{}")
      .unwrap();

    let net = Arc::new(FakeNetwork::new());
    let engine = SyncEngine::new(Arc::clone(&queue), Arc::clone(&net));

    let report = engine.drain().await.unwrap();
    assert_eq!(report.attempted(), 1);
    assert_eq!(report.failed(), 1);
    assert!(!report.is_clean());

    // The replay itself went out, exactly once.
    assert_eq!(net.requests().len(), 1);

    // Reported with the removal reason; the record stays for the next drain,
    // which the backend may see as a duplicate delivery.
    match &report.outcomes[0].status {
      ReplayStatus::Failed { reason } => {
        assert!(reason.contains("replayed but not removed"), "{}", reason);
        assert!(reason.contains("disk full"), "{}", reason);
      }
      other => panic!("expected a failed outcome, got {:?}", other),
    }
    assert_eq!(queue.count().unwrap(), 1);
  }

  // Enqueues a record into the shared store the moment a fetch goes out,
  // simulating a mutation racing with an in-flight drain.
  struct EnqueuingNetwork {
    queue: Arc<MemoryQueueStore>,
  }

  #[async_trait::async_trait]
  impl NetworkClient for EnqueuingNetwork {
    async fn fetch(&self, _request: &Request) -> Result<FetchedResponse> {
      self
        .queue
        .enqueue(Method::Post, "https://api.example.com/late", "{}")
        .unwrap();
      Ok(FetchedResponse {
        status: 200,
        content_type: None,
        body: Vec::new(),
      })
    }
  }

  #[tokio::test]
  async fn test_drain_snapshot_excludes_concurrent_enqueues() {
    let queue = Arc::new(MemoryQueueStore::new());
    queue
      .enqueue(Method::Post, "https://api.example.com/tasks", "{}")
      .unwrap();

    let net = Arc::new(EnqueuingNetwork {
      queue: Arc::clone(&queue),
    });
    let engine = SyncEngine::new(Arc::clone(&queue), net);

    let report = engine.drain().await.unwrap();
    assert_eq!(report.attempted(), 1);

    // The record enqueued mid-drain waits for the next round.
    let remaining = queue.all().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].url, "https://api.example.com/late");
  }
}
