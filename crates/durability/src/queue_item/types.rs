//! Queue item core types
//!
//! Types for the queue item archive format (.request.tar.zst)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File extension for queue item archives
pub const QUEUE_ITEM_EXTENSION: &str = ".request.tar.zst";

/// Suffix of the private temporary file written before publishing
pub const TEMP_SUFFIX: &str = ".tmp";

/// Zstd level used for every queue item
pub(crate) const ZSTD_LEVEL: i32 = 3;

/// Entry names within the archive
pub mod entries {
    /// Reference of the content item (UTF-8 text)
    pub const REFERENCE: &str = "reference";
    /// Metadata store in its text form
    pub const METADATA: &str = "metadata";
    /// Raw content bytes, upserts only
    pub const CONTENT: &str = "content";
}

/// Whether `path` names a published queue item
///
/// Temporary files from an in-flight encode never match.
pub fn is_queue_item(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(false, |name| {
            name.len() > QUEUE_ITEM_EXTENSION.len() && name.ends_with(QUEUE_ITEM_EXTENSION)
        })
}

/// Information about an encoded queue item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItemInfo {
    /// Path of the published archive (empty when encoded to a writer)
    pub path: PathBuf,

    /// Number of entries written (2 for deletes, 3 for upserts)
    pub entry_count: usize,

    /// Content size in bytes, `None` for deletes
    pub content_bytes: Option<u64>,

    /// Size of the compressed archive in bytes
    pub archive_bytes: u64,

    /// xxh3 checksum of the archive bytes
    pub checksum: String,
}

impl QueueItemInfo {
    /// Whether the archive carries a content entry
    pub fn has_content(&self) -> bool {
        self.content_bytes.is_some()
    }
}

/// Compute xxh3 hash of data and return as hex string
pub fn xxh3_hex(data: &[u8]) -> String {
    use xxhash_rust::xxh3::xxh3_64;
    format!("{:016x}", xxh3_64(data))
}
