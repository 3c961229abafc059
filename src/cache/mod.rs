//! Resource cache: pre-fetched static assets held in named generations.
//!
//! A generation is one versioned snapshot of the precache manifest,
//! identified by a tag string. Install populates the current generation in
//! one shot; activation purges every other generation. Entries are never
//! updated in place.

mod resource;
mod store;

pub use resource::ResourceCache;
pub use store::{AssetEntry, BlobCache, CachedAsset, MemoryBlobCache, SqliteBlobCache};
