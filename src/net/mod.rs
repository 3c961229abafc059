//! Network access and connectivity signaling.
//!
//! The live network and the is-online predicate are external collaborators;
//! both are traits here so the router and sync engine can be exercised
//! against scripted fakes.

mod client;

pub use client::ReqwestClient;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::http::Request;

/// A response fetched from the live network.
#[derive(Debug, Clone)]
pub struct FetchedResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl FetchedResponse {
  /// Whether the status is in the 2xx range.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// The live network collaborator.
///
/// A fetch resolves `Ok` whenever the transport delivered the request and
/// produced a response, whatever its status code. `Err(Error::Network)` means
/// the request never made it out.
#[async_trait]
pub trait NetworkClient: Send + Sync {
  async fn fetch(&self, req: &Request) -> Result<FetchedResponse>;
}

/// Synchronous is-online predicate, consulted by the router once per request.
pub trait Connectivity: Send + Sync {
  fn is_online(&self) -> bool;
}

/// Shared connectivity flag the hosting environment flips as the network
/// status changes. Starts online.
#[derive(Debug, Clone)]
pub struct OnlineFlag {
  online: Arc<AtomicBool>,
}

impl OnlineFlag {
  pub fn new(online: bool) -> Self {
    Self {
      online: Arc::new(AtomicBool::new(online)),
    }
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::Relaxed);
  }
}

impl Default for OnlineFlag {
  fn default() -> Self {
    Self::new(true)
  }
}

impl Connectivity for OnlineFlag {
  fn is_online(&self) -> bool {
    self.online.load(Ordering::Relaxed)
  }
}
