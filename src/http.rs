//! Core request and response types shared by the router, caches and sync
//! engine.
//!
//! Requests here are plain owned data: method, URL, serialized body. Owned
//! bodies mean a request can be inspected, queued and replayed without
//! consuming anything.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Message in the synthetic acknowledgment returned when a mutation is parked
/// in the offline queue.
pub const OFFLINE_ACK_MESSAGE: &str = "saved for later sync";

/// Plain-text body of the synthesized 503 response.
pub const UNAVAILABLE_MESSAGE: &str = "No internet connection";

/// HTTP methods the router classifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }

  /// Mutating methods are the ones deferred to the queue while offline.
  /// Everything else takes the cache-then-network path.
  pub fn is_mutating(&self) -> bool {
    matches!(self, Method::Post | Method::Put | Method::Delete)
  }
}

impl std::fmt::Display for Method {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Method {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_uppercase().as_str() {
      "GET" => Ok(Method::Get),
      "HEAD" => Ok(Method::Head),
      "POST" => Ok(Method::Post),
      "PUT" => Ok(Method::Put),
      "PATCH" => Ok(Method::Patch),
      "DELETE" => Ok(Method::Delete),
      other => Err(format!("unsupported method: {}", other)),
    }
  }
}

/// An outbound request intercepted by the router.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  /// Full resource address.
  pub url: String,
  /// Serialized payload; empty for body-less requests.
  pub body: String,
  pub content_type: Option<String>,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      body: String::new(),
      content_type: None,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = body.into();
    self
  }

  pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
    self.content_type = Some(content_type.into());
    self
  }
}

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Served from the resource cache.
  Cache,
  /// Live network response, passed through unmodified.
  Network,
  /// Mutation accepted into the offline queue for later replay.
  Queued,
  /// Nothing cached and the network was unreachable.
  Unavailable,
}

/// Response handed back to the caller of a routed request.
#[derive(Debug, Clone)]
pub struct RoutedResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
  pub source: ResponseSource,
}

impl RoutedResponse {
  /// Synthetic acknowledgment for a queued mutation. Deliberately
  /// success-shaped (status 200) with `success: false` in the body, so
  /// callers need no special-case handling for the deferred path.
  pub(crate) fn queued_ack() -> Self {
    let body = serde_json::json!({
      "success": false,
      "message": OFFLINE_ACK_MESSAGE,
    });

    Self {
      status: 200,
      content_type: Some("application/json".to_string()),
      body: body.to_string().into_bytes(),
      source: ResponseSource::Queued,
    }
  }

  /// Synthesized response for a request that could be neither served nor
  /// queued.
  pub(crate) fn unavailable() -> Self {
    Self {
      status: 503,
      content_type: Some("text/plain".to_string()),
      body: UNAVAILABLE_MESSAGE.as_bytes().to_vec(),
      source: ResponseSource::Unavailable,
    }
  }

  /// Body as text, lossy on invalid UTF-8.
  pub fn text(&self) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(&self.body)
  }
}

/// Stable identity for a request: SHA-256 over `METHOD:url`, hex encoded.
///
/// Cache lookups are exact-match on this identity; there is no partial or
/// fuzzy matching, and request bodies never participate.
pub fn identity(method: Method, url: &str) -> String {
  let input = format!("{}:{}", method.as_str(), url);

  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}
