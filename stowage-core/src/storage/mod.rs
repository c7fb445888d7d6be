//! Storage modules for Stowage
//!
//! Provides the node-side chunk store and the gateway-side version index.

pub mod chunk_store;
pub mod metadata_store;

pub use chunk_store::{ChunkPayload, ChunkStore, compute_checksum, verify_checksum};
pub use metadata_store::{MetadataIndex, MetadataStore, ObjectVersion};
