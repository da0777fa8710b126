//! Durability layer for commitq
//!
//! This crate handles everything that touches disk:
//!
//! - Queue items: one `.request.tar.zst` archive per commit request
//! - Atomic publish: temp file, fsync, rename
//! - Content caching: single-pass sources made replayable, spilling to disk
//!   past a memory threshold

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache; // Replayable content streams
pub mod queue_item; // Queue item archive encode/decode

// === Re-exports ===

// Cache types
pub use cache::{
    is_released_error, CacheConfig, CacheConfigError, CacheError, CacheResult,
    CachedContentStream, StreamState, DEFAULT_MEMORY_THRESHOLD,
};

// Queue item types
pub use queue_item::{
    decode, decode_from_reader, encode, encode_to_writer, encode_with, is_queue_item,
    read_entry_names, DecodedRequest, QueueItemError, QueueItemInfo, QueueItemResult,
    QUEUE_ITEM_EXTENSION,
};
