//! Queue item archive reader
//!
//! Reads .request.tar.zst archives back into request records. Content, when
//! present, is fully cached and rewound before the record is returned.

use crate::cache::{CacheConfig, CacheError, CachedContentStream};
use crate::queue_item::error::{QueueItemError, QueueItemResult};
use crate::queue_item::types::entries;
use commitq_core::{MetadataStore, RequestRecord};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tar::Archive;
use tracing::{debug, warn};

/// Record decoded from a queue item; upsert content is replayable
pub type DecodedRequest = RequestRecord<CachedContentStream>;

/// Decode the queue item at `path`
///
/// `cache` decides how content is materialized; pass
/// `&CacheConfig::default()` for the default policy.
///
/// The variant is decided only after every entry has been read: a `content`
/// entry, even an empty one, yields an upsert, its absence a delete.
pub fn decode(path: &Path, cache: &CacheConfig) -> QueueItemResult<DecodedRequest> {
    cache.validate()?;

    let file = File::open(path)?;
    let record = decode_from_reader(file, cache)?;

    debug!(
        target: "commitq::queue_item",
        path = %path.display(),
        kind = %record.kind(),
        "Decoded queue item"
    );

    Ok(record)
}

/// Decode a queue item archive from `reader`
pub fn decode_from_reader<R: Read>(
    reader: R,
    cache: &CacheConfig,
) -> QueueItemResult<DecodedRequest> {
    let decoder = zstd::Decoder::new(reader).map_err(QueueItemError::from_read)?;
    let mut archive = Archive::new(decoder);

    let mut reference: Option<String> = None;
    let mut metadata: Option<MetadataStore> = None;
    let mut content: Option<CachedContentStream> = None;

    for entry in archive.entries().map_err(QueueItemError::from_read)? {
        let mut entry = entry.map_err(QueueItemError::from_read)?;
        let name = entry
            .path()
            .map_err(QueueItemError::from_read)?
            .to_string_lossy()
            .into_owned();

        match name.as_str() {
            entries::REFERENCE => {
                ensure_absent(&reference, entries::REFERENCE)?;
                let mut bytes = Vec::new();
                entry
                    .read_to_end(&mut bytes)
                    .map_err(QueueItemError::from_read)?;
                let text = String::from_utf8(bytes).map_err(|e| {
                    QueueItemError::invalid_entry(entries::REFERENCE, format!("not UTF-8: {}", e))
                })?;
                reference = Some(text);
            }
            entries::METADATA => {
                ensure_absent(&metadata, entries::METADATA)?;
                metadata = Some(MetadataStore::read_from(&mut entry)?);
            }
            entries::CONTENT => {
                ensure_absent(&content, entries::CONTENT)?;
                let mut stream =
                    CachedContentStream::from_reader(&mut entry, cache).map_err(content_error)?;
                stream.rewind()?;
                content = Some(stream);
            }
            other => {
                warn!(
                    target: "commitq::queue_item",
                    entry = other,
                    "Skipping unknown queue item entry"
                );
            }
        }
    }

    // Tar stops at the end-of-archive block; reading the zstd frame to its
    // end verifies the frame checksum.
    let mut decoder = archive.into_inner();
    io::copy(&mut decoder, &mut io::sink()).map_err(QueueItemError::from_read)?;

    let reference = reference.ok_or_else(|| QueueItemError::missing_entry(entries::REFERENCE))?;
    let metadata = metadata.ok_or_else(|| QueueItemError::missing_entry(entries::METADATA))?;

    let record = match content {
        Some(stream) => RequestRecord::upsert(reference, metadata, stream)?,
        None => RequestRecord::delete(reference, metadata)?,
    };
    Ok(record)
}

/// List entry names of the queue item at `path`, in archive order
pub fn read_entry_names(path: &Path) -> QueueItemResult<Vec<String>> {
    let file = File::open(path)?;
    let decoder = zstd::Decoder::new(file).map_err(QueueItemError::from_read)?;
    let mut archive = Archive::new(decoder);

    let mut names = Vec::new();
    for entry in archive.entries().map_err(QueueItemError::from_read)? {
        let entry = entry.map_err(QueueItemError::from_read)?;
        let name = entry
            .path()
            .map_err(QueueItemError::from_read)?
            .to_string_lossy()
            .into_owned();
        names.push(name);
    }
    Ok(names)
}

fn ensure_absent<T>(slot: &Option<T>, name: &str) -> QueueItemResult<()> {
    if slot.is_some() {
        return Err(QueueItemError::duplicate_entry(name));
    }
    Ok(())
}

/// Content drain failures are read failures unless the stream was released
fn content_error(err: CacheError) -> QueueItemError {
    match err {
        CacheError::Io(e) => QueueItemError::from_read(e),
        other => other.into(),
    }
}
