//! Queue item: durable archive form of a commit request
//!
//! A queue item is one self-contained `.request.tar.zst` file holding a
//! single upsert or delete request.
//!
//! ## Archive Structure
//!
//! ```text
//! 0001.request.tar.zst
//! ├── reference   UTF-8 reference of the content item
//! ├── metadata    metadata store in its line-oriented text form
//! └── content     raw content bytes (upserts only)
//! ```
//!
//! The presence of `content` is the only discriminator: an upsert with empty
//! content still writes a zero-length `content` entry. Entries are written
//! in the order above but accepted in any order.
//!
//! ## Usage
//!
//! ```ignore
//! let info = encode(&mut record, Path::new("./queue/0001.request.tar.zst"))?;
//! let decoded = decode(&info.path, &CacheConfig::default())?;
//! ```
//!
//! ## Guarantees
//!
//! - **Atomic**: an archive is either fully published at its target path or absent
//! - **Single pass**: an upsert's content source is read exactly once
//! - **Replayable**: decoded content is fully cached and positioned at its start
//! - **Deterministic**: the same request encodes to identical bytes

pub mod error;
pub mod reader;
pub mod types;
pub mod writer;

// Re-export public types
pub use error::{QueueItemError, QueueItemResult};
pub use reader::{decode, decode_from_reader, read_entry_names, DecodedRequest};
pub use types::{entries, is_queue_item, xxh3_hex, QueueItemInfo, QUEUE_ITEM_EXTENSION, TEMP_SUFFIX};
pub use writer::{encode, encode_to_writer, encode_with};
