//! commitq - durable commit request queue items
//!
//! A commit request (upsert with content, or delete) is persisted as one
//! `.request.tar.zst` archive and read back later with its content fully
//! cached and replayable.
//!
//! # Quick Start
//!
//! ```ignore
//! use commitq::{decode, encode, CacheConfig, MetadataStore, RequestRecord};
//! use std::io::Cursor;
//! use std::path::Path;
//!
//! let mut metadata = MetadataStore::new();
//! metadata.add("Content-Type", "text/html");
//!
//! let mut record = RequestRecord::upsert("doc-1", metadata, Cursor::new(b"<html/>".to_vec()))?;
//! let info = encode(&mut record, Path::new("./queue/0001.request.tar.zst"))?;
//!
//! let decoded = decode(&info.path, &CacheConfig::default())?;
//! assert!(decoded.is_upsert());
//! ```
//!
//! # Architecture
//!
//! - `commitq-core`: request records and the metadata store
//! - `commitq-durability`: content caching and the archive codec

// Re-export the public API
pub use commitq_core::*;
pub use commitq_durability::*;
