//! Queue item archive writer
//!
//! Creates .request.tar.zst archives containing:
//! - reference - Reference of the content item
//! - metadata - Metadata store in its text form
//! - content - Raw content bytes (upserts only)

use crate::cache::{CacheConfig, CachedContentStream};
use crate::queue_item::error::{QueueItemError, QueueItemResult};
use crate::queue_item::types::{entries, QueueItemInfo, TEMP_SUFFIX, ZSTD_LEVEL};
use commitq_core::{RecordError, RequestRecord};
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tar::{Builder, EntryType, Header};
use tracing::{debug, warn};
use xxhash_rust::xxh3::Xxh3;

/// Encode `record` to a queue item at `target`
///
/// Content is spooled with the default cache policy. See [`encode_with`].
pub fn encode<R: Read>(
    record: &mut RequestRecord<R>,
    target: &Path,
) -> QueueItemResult<QueueItemInfo> {
    encode_with(record, target, &CacheConfig::default())
}

/// Encode `record` to a queue item at `target`, spooling content with `spool`
///
/// This is an atomic operation - either the complete archive is published at
/// `target` or nothing is. The archive is written to a uniquely named
/// temporary file next to `target`, fsynced, then renamed into place. An
/// existing file at `target` is replaced.
///
/// Once the rename has happened the archive is published and `Ok` is
/// returned; a failure to fsync the parent directory afterwards is only
/// logged, as the rename may then not survive a power loss.
///
/// The content source of an upsert is read exactly once.
pub fn encode_with<R: Read>(
    record: &mut RequestRecord<R>,
    target: &Path,
    spool: &CacheConfig,
) -> QueueItemResult<QueueItemInfo> {
    spool.validate()?;

    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent)?;
    }

    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)?;

    let written = encode_to_writer(record, BufWriter::new(temp.as_file_mut()), spool)
        .and_then(|info| {
            temp.as_file().sync_all()?;
            Ok(info)
        });
    let info = match written {
        Ok(info) => info,
        Err(e) => {
            let temp_path = temp.path().to_path_buf();
            if let Err(cleanup) = temp.close() {
                warn!(
                    target: "commitq::queue_item",
                    path = %temp_path.display(),
                    error = %cleanup,
                    "Failed to remove temporary queue item"
                );
            }
            return Err(e);
        }
    };

    temp.persist(target)
        .map_err(|e| QueueItemError::Io(e.error))?;
    sync_published(target, parent);

    debug!(
        target: "commitq::queue_item",
        path = %target.display(),
        kind = %record.kind(),
        entries = info.entry_count,
        archive_bytes = info.archive_bytes,
        "Encoded queue item"
    );

    Ok(QueueItemInfo {
        path: target.to_path_buf(),
        ..info
    })
}

/// Encode `record` as a queue item archive into `writer`
///
/// Writes `reference`, `metadata` and, for upserts, `content`, in that order.
/// The returned info has an empty `path`.
pub fn encode_to_writer<R: Read, W: Write>(
    record: &mut RequestRecord<R>,
    writer: W,
    spool: &CacheConfig,
) -> QueueItemResult<QueueItemInfo> {
    if record.reference().is_empty() {
        return Err(RecordError::EmptyReference.into());
    }

    let mut encoder = zstd::Encoder::new(HashingWriter::new(writer), ZSTD_LEVEL)?;
    // Frame checksum lets the reader reject corrupted content
    encoder.include_checksum(true)?;
    let mut builder = Builder::new(encoder);

    let reference = record.reference().as_bytes();
    append_entry(&mut builder, entries::REFERENCE, reference.len() as u64, reference)?;

    let metadata = record.metadata().to_text();
    append_entry(
        &mut builder,
        entries::METADATA,
        metadata.len() as u64,
        metadata.as_bytes(),
    )?;

    let mut entry_count = 2;
    let mut content_bytes = None;
    if let Some(source) = record.content_mut() {
        // Tar headers carry the entry size, so unknown-length content is
        // spooled once before it is appended.
        let mut spooled = CachedContentStream::from_reader(source, spool)?;
        let len = spooled.enforce_full_caching()?;
        append_entry(&mut builder, entries::CONTENT, len, &mut spooled)?;
        spooled.release();
        entry_count += 1;
        content_bytes = Some(len);
    }

    let encoder = builder.into_inner()?;
    let mut hashing = encoder.finish()?;
    hashing.flush()?;

    Ok(QueueItemInfo {
        path: PathBuf::new(),
        entry_count,
        content_bytes,
        archive_bytes: hashing.bytes_written,
        checksum: hashing.checksum(),
    })
}

/// Append one regular file entry to the archive
fn append_entry<W: Write, D: Read>(
    builder: &mut Builder<W>,
    name: &str,
    size: u64,
    data: D,
) -> QueueItemResult<()> {
    let mut header = Header::new_gnu();
    header
        .set_path(name)
        .map_err(|e| QueueItemError::archive(format!("set path '{}': {}", name, e)))?;
    header.set_entry_type(EntryType::Regular);
    header.set_size(size);
    header.set_mode(0o644);
    header.set_mtime(0); // Reproducible output: zero mtime
    header.set_cksum();

    builder.append(&header, data)?;
    Ok(())
}

/// Fsync the directory holding a freshly renamed archive
fn sync_published(target: &Path, parent: &Path) {
    if let Err(e) = sync_dir(parent) {
        warn!(
            target: "commitq::queue_item",
            path = %target.display(),
            error = %e,
            "Queue item published but directory fsync failed"
        );
    }
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

/// Writer that hashes and counts every byte passed through
struct HashingWriter<W> {
    inner: W,
    hasher: Xxh3,
    bytes_written: u64,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Xxh3::new(),
            bytes_written: 0,
        }
    }

    fn checksum(&self) -> String {
        format!("{:016x}", self.hasher.digest())
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
