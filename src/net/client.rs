//! Live network client backed by reqwest.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use super::{FetchedResponse, NetworkClient};
use crate::error::{Error, Result};
use crate::http::{Method, Request};

/// Network client over a shared reqwest connection pool.
///
/// Timeouts and retries are reqwest's own; this layer adds none. Any HTTP
/// status counts as a delivered response; only transport failures error.
#[derive(Clone, Default)]
pub struct ReqwestClient {
  client: reqwest::Client,
}

impl ReqwestClient {
  pub fn new() -> Self {
    Self {
      client: reqwest::Client::new(),
    }
  }
}

fn to_reqwest(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Head => reqwest::Method::HEAD,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
  }
}

#[async_trait]
impl NetworkClient for ReqwestClient {
  async fn fetch(&self, req: &Request) -> Result<FetchedResponse> {
    let mut builder = self.client.request(to_reqwest(req.method), &req.url);

    if let Some(content_type) = &req.content_type {
      builder = builder.header(CONTENT_TYPE, content_type);
    }
    if !req.body.is_empty() {
      builder = builder.body(req.body.clone());
    }

    let response = builder
      .send()
      .await
      .map_err(|e| Error::Network(format!("Failed to fetch {}: {}", req.url, e)))?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(CONTENT_TYPE)
      .and_then(|value| value.to_str().ok())
      .map(String::from);

    let body = response
      .bytes()
      .await
      .map_err(|e| Error::Network(format!("Failed to read response body from {}: {}", req.url, e)))?
      .to_vec();

    Ok(FetchedResponse {
      status,
      content_type,
      body,
    })
  }
}
