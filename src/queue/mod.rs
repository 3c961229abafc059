//! Durable queue of mutating requests captured while offline.
//!
//! Records live in the store from the moment the router intercepts an offline
//! mutation until the sync engine replays them successfully. The store is an
//! injected dependency: SQLite for durability across restarts, in-memory for
//! tests and ephemeral embeddings.

mod store;

pub use store::{MemoryQueueStore, QueueStore, QueuedRequest, SqliteQueueStore};
