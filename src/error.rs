use thiserror::Error;

/// Errors surfaced by the offline layer and its collaborators.
///
/// `Storage` covers the durable queue store and the blob cache; `Network`
/// covers live fetches and replay attempts. An offline GET that is neither
/// cached nor queueable is not an error: the router answers it with a
/// synthesized 503 response.
#[derive(Error, Debug)]
pub enum Error {
  #[error("Storage error: {0}")]
  Storage(String),

  #[error("Network error: {0}")]
  Network(String),

  #[error("Config error: {0}")]
  Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
