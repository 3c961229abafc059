//! The assembled offline layer: one facade over the resource cache, the
//! pending-request queue, the router and the sync engine.
//!
//! Lifecycle mirrors how a web client adopts a new release:
//! [`OfflineLayer::install`] populates the configured generation,
//! [`OfflineLayer::activate`] purges superseded ones, and from then on every
//! request goes through [`OfflineLayer::handle`] while
//! [`OfflineLayer::sync_event`] drains the queue when connectivity returns.

use std::sync::Arc;
use url::Url;

use crate::cache::{BlobCache, ResourceCache, SqliteBlobCache};
use crate::config::Config;
use crate::error::Result;
use crate::http::{Request, RoutedResponse};
use crate::net::{Connectivity, NetworkClient, OnlineFlag, ReqwestClient};
use crate::queue::{QueueStore, QueuedRequest, SqliteQueueStore};
use crate::router::RequestRouter;
use crate::sync::{DrainReport, SyncEngine};

pub struct OfflineLayer<Q, B, N, C>
where
  Q: QueueStore,
  B: BlobCache,
  N: NetworkClient,
  C: Connectivity,
{
  queue: Arc<Q>,
  net: Arc<N>,
  connectivity: Arc<C>,
  cache: ResourceCache<B>,
  router: RequestRouter<Q, B, N, C>,
  sync: SyncEngine<Q, N>,
  manifest: Vec<Url>,
}

impl OfflineLayer<SqliteQueueStore, SqliteBlobCache, ReqwestClient, OnlineFlag> {
  /// Open the layer with the production stack: SQLite-backed stores under
  /// the configured data directory, a reqwest client, and a connectivity
  /// flag that starts online.
  pub fn open(config: &Config) -> Result<Self> {
    let queue = Arc::new(SqliteQueueStore::open(&config.queue_db_path()?)?);
    let blobs = Arc::new(SqliteBlobCache::open(&config.cache_db_path()?)?);
    let net = Arc::new(ReqwestClient::new());
    let connectivity = Arc::new(OnlineFlag::default());

    Ok(Self::with_parts(
      queue,
      blobs,
      net,
      connectivity,
      &config.cache.tag,
      config.manifest_urls()?,
    ))
  }
}

impl<Q, B, N, C> OfflineLayer<Q, B, N, C>
where
  Q: QueueStore,
  B: BlobCache,
  N: NetworkClient,
  C: Connectivity,
{
  /// Assemble the layer from explicit parts. Tests use this with in-memory
  /// stores and a scripted network.
  pub fn with_parts(
    queue: Arc<Q>,
    blobs: Arc<B>,
    net: Arc<N>,
    connectivity: Arc<C>,
    tag: impl Into<String>,
    manifest: Vec<Url>,
  ) -> Self {
    let cache = ResourceCache::new(blobs, tag);
    let router = RequestRouter::new(
      Arc::clone(&queue),
      cache.clone(),
      Arc::clone(&net),
      Arc::clone(&connectivity),
    );
    let sync = SyncEngine::new(Arc::clone(&queue), Arc::clone(&net));

    Self {
      queue,
      net,
      connectivity,
      cache,
      router,
      sync,
      manifest,
    }
  }

  /// Fetch and cache the configured precache manifest into the current
  /// generation. Returns the number of resources cached.
  pub async fn install(&self) -> Result<usize> {
    self.cache.populate(self.net.as_ref(), &self.manifest).await
  }

  /// Purge every cache generation except the current one, returning the
  /// purged tags.
  pub fn activate(&self) -> Result<Vec<String>> {
    self.cache.purge_stale()
  }

  /// Route one request through the offline policy.
  pub async fn handle(&self, request: Request) -> Result<RoutedResponse> {
    self.router.route(request).await
  }

  /// React to a sync event: drains the queue when the tag matches, does
  /// nothing otherwise.
  pub async fn sync_event(&self, tag: &str) -> Result<Option<DrainReport>> {
    self.sync.sync_event(tag).await
  }

  /// Snapshot of the requests currently awaiting replay.
  pub fn pending(&self) -> Result<Vec<QueuedRequest>> {
    self.queue.all()
  }

  pub fn connectivity(&self) -> &C {
    &self.connectivity
  }

  pub fn cache_tag(&self) -> &str {
    self.cache.tag()
  }
}

impl<Q, B, N, C> Clone for OfflineLayer<Q, B, N, C>
where
  Q: QueueStore,
  B: BlobCache,
  N: NetworkClient,
  C: Connectivity,
{
  fn clone(&self) -> Self {
    Self {
      queue: Arc::clone(&self.queue),
      net: Arc::clone(&self.net),
      connectivity: Arc::clone(&self.connectivity),
      cache: self.cache.clone(),
      router: self.router.clone(),
      sync: self.sync.clone(),
      manifest: self.manifest.clone(),
    }
  }
}
