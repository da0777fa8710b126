//! Replayable content caching
//!
//! Raw content streams are single-pass. This module turns them into streams
//! that can be read, rewound and read again:
//!
//! - **CachedContentStream**: Drains a one-shot source into memory, spilling to
//!   an anonymous temporary file past a threshold
//! - **CacheConfig**: Threshold and spill location, also the stream factory
//!
//! ## State Machine
//!
//! ```text
//! Uncached --enforce_full_caching()--> CachedAtStart --read()--> CachedMidStream
//!                                           ^                          |
//!                                           +--------rewind()----------+
//! any state --release()--> Released
//! ```

mod config;
mod stream;

pub use config::{CacheConfig, CacheConfigError, DEFAULT_MEMORY_THRESHOLD};
pub use stream::{is_released_error, CacheError, CacheResult, CachedContentStream, StreamState};
