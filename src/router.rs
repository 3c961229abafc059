//! Request routing: decide per request whether to defer it to the queue,
//! answer from cache, or pass it through to the network.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{BlobCache, ResourceCache};
use crate::error::Result;
use crate::http::{Request, ResponseSource, RoutedResponse};
use crate::net::{Connectivity, NetworkClient};
use crate::queue::QueueStore;

/// Routes every outgoing request through the offline policy.
///
/// Order matters and is fixed: deferral of offline mutations is checked
/// before the cache, and the cache before the network. A cached entry for a
/// mutating request (unusual, but storable) is therefore never consulted
/// while offline.
pub struct RequestRouter<Q, B, N, C>
where
  Q: QueueStore,
  B: BlobCache,
  N: NetworkClient,
  C: Connectivity,
{
  queue: Arc<Q>,
  cache: ResourceCache<B>,
  net: Arc<N>,
  connectivity: Arc<C>,
}

impl<Q, B, N, C> RequestRouter<Q, B, N, C>
where
  Q: QueueStore,
  B: BlobCache,
  N: NetworkClient,
  C: Connectivity,
{
  pub fn new(queue: Arc<Q>, cache: ResourceCache<B>, net: Arc<N>, connectivity: Arc<C>) -> Self {
    Self {
      queue,
      cache,
      net,
      connectivity,
    }
  }

  /// Route one request and produce the response the caller will see.
  ///
  /// Offline mutations are enqueued and acknowledged synthetically; the
  /// enqueue itself failing is the one hard error here. Everything else
  /// degrades: cache read failures fall through to the network, network
  /// failures become a 503.
  pub async fn route(&self, request: Request) -> Result<RoutedResponse> {
    if request.method.is_mutating() && !self.connectivity.is_online() {
      let record = self
        .queue
        .enqueue(request.method, &request.url, &request.body)?;
      info!(
        "Offline, queued {} {} for later sync (id {})",
        record.method, record.url, record.id
      );
      return Ok(RoutedResponse::queued_ack());
    }

    match self.cache.lookup(request.method, &request.url) {
      Ok(Some(asset)) => {
        debug!("Cache hit for {} {}", request.method, request.url);
        return Ok(RoutedResponse {
          status: asset.status,
          content_type: asset.content_type,
          body: asset.body,
          source: ResponseSource::Cache,
        });
      }
      Ok(None) => {}
      Err(e) => {
        warn!(
          "Cache lookup for {} {} failed, falling through to network: {}",
          request.method, request.url, e
        );
      }
    }

    match self.net.fetch(&request).await {
      Ok(response) => Ok(RoutedResponse {
        status: response.status,
        content_type: response.content_type,
        body: response.body,
        source: ResponseSource::Network,
      }),
      Err(e) => {
        debug!("Fetch for {} {} failed: {}", request.method, request.url, e);
        Ok(RoutedResponse::unavailable())
      }
    }
  }
}

impl<Q, B, N, C> Clone for RequestRouter<Q, B, N, C>
where
  Q: QueueStore,
  B: BlobCache,
  N: NetworkClient,
  C: Connectivity,
{
  fn clone(&self) -> Self {
    Self {
      queue: Arc::clone(&self.queue),
      cache: self.cache.clone(),
      net: Arc::clone(&self.net),
      connectivity: Arc::clone(&self.connectivity),
    }
  }
}
