//! Resource cache component: install-time populate, per-request lookup, and
//! activation-time purge of stale generations.

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::store::{AssetEntry, BlobCache, CachedAsset};
use crate::error::{Error, Result};
use crate::http::{identity, Method, Request};
use crate::net::NetworkClient;

/// Read-side cache of pre-fetched static resources, scoped to one current
/// generation tag.
///
/// Lifecycle sequencing is the caller's: populate the new generation first
/// (install), purge the old ones after (activate). Between those two steps
/// lookups may be served from either generation.
pub struct ResourceCache<B: BlobCache> {
  store: Arc<B>,
  tag: String,
}

impl<B: BlobCache> ResourceCache<B> {
  pub fn new(store: Arc<B>, tag: impl Into<String>) -> Self {
    Self {
      store,
      tag: tag.into(),
    }
  }

  /// The current generation tag.
  pub fn tag(&self) -> &str {
    &self.tag
  }

  /// Fetch every manifest URL and insert the responses into the current
  /// generation.
  ///
  /// All-or-nothing: fetches run first (concurrently), and any transport
  /// failure or non-2xx status aborts the whole operation before anything is
  /// inserted. Insertion itself is a single storage transaction. Returns the
  /// number of entries written.
  pub async fn populate<N: NetworkClient + ?Sized>(
    &self,
    net: &N,
    manifest: &[Url],
  ) -> Result<usize> {
    let fetches = manifest.iter().map(|url| async move {
      let response = net.fetch(&Request::get(url.as_str())).await?;

      if !response.is_success() {
        return Err(Error::Network(format!(
          "Precache fetch for {} returned status {}",
          url, response.status
        )));
      }

      Ok(AssetEntry {
        method: Method::Get,
        url: url.to_string(),
        status: response.status,
        content_type: response.content_type,
        body: response.body,
      })
    });

    let entries = try_join_all(fetches).await?;
    self.store.insert_all(&self.tag, &entries)?;

    info!(
      "Populated cache generation {} with {} resource(s)",
      self.tag,
      entries.len()
    );
    Ok(entries.len())
  }

  /// Exact-match lookup by request identity.
  ///
  /// Prefers the current generation, then falls back to any older one still
  /// present (a not-yet-activated install leaves two live generations).
  pub fn lookup(&self, method: Method, url: &str) -> Result<Option<CachedAsset>> {
    let identity = identity(method, url);

    if let Some(asset) = self.store.get(&self.tag, &identity)? {
      return Ok(Some(asset));
    }

    for generation in self.store.generations()? {
      if generation == self.tag {
        continue;
      }
      if let Some(asset) = self.store.get(&generation, &identity)? {
        debug!(
          "Cache hit for {} {} in superseded generation {}",
          method, url, generation
        );
        return Ok(Some(asset));
      }
    }

    Ok(None)
  }

  /// Delete every generation except the current one, returning the purged
  /// tags. Irreversible: only call once the current generation is fully
  /// populated.
  pub fn purge_stale(&self) -> Result<Vec<String>> {
    let mut purged = Vec::new();

    for generation in self.store.generations()? {
      if generation != self.tag {
        self.store.remove_generation(&generation)?;
        purged.push(generation);
      }
    }

    if purged.is_empty() {
      debug!("No stale cache generations to purge");
    } else {
      info!("Purged stale cache generation(s): {}", purged.join(", "));
    }
    Ok(purged)
  }
}

impl<B: BlobCache> Clone for ResourceCache<B> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      tag: self.tag.clone(),
    }
  }
}
