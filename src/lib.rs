//! Offline-tolerant request layer for web clients.
//!
//! Keeps a client usable without connectivity: static resources are cached
//! ahead of time in versioned generations and served when the network is
//! unreachable, while mutations issued offline are parked in a durable queue
//! and replayed against the backend once a sync event fires.
//!
//! [`layer::OfflineLayer`] is the assembled facade; the pieces underneath
//! ([`router::RequestRouter`], [`cache::ResourceCache`],
//! [`sync::SyncEngine`]) are generic over their storage and network
//! collaborators so they can run on SQLite and reqwest in production and on
//! in-memory fakes in tests.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod layer;
pub mod net;
pub mod queue;
pub mod router;
pub mod sync;

pub use config::Config;
pub use error::{Error, Result};
pub use http::{Method, Request, ResponseSource, RoutedResponse};
pub use layer::OfflineLayer;
pub use router::RequestRouter;
pub use sync::{DrainReport, ReplayOutcome, ReplayStatus, SyncEngine, SYNC_TAG};
