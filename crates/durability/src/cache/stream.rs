//! Cached content stream
//!
//! Wraps a one-shot byte source so it can be replayed from the start any
//! number of times. Content up to `CacheConfig::memory_threshold` bytes is kept
//! in memory; anything larger is moved to an anonymous temporary file.

use super::config::CacheConfig;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use thiserror::Error;
use tracing::debug;

/// Chunk size used when draining a source
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Observable state of a cached stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Source not drained yet
    Uncached,
    /// Fully cached, cursor at position 0
    CachedAtStart,
    /// Fully cached, some bytes consumed
    CachedMidStream,
    /// Backing storage freed; all further access fails
    Released,
}

/// Errors from cached stream operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// The stream was accessed after `release()`
    #[error("Content stream used after release")]
    Released,

    /// Draining the source or accessing the backing storage failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for cached stream operations
pub type CacheResult<T> = Result<T, CacheError>;

impl From<CacheError> for io::Error {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Io(e) => e,
            released @ CacheError::Released => io::Error::new(io::ErrorKind::Other, released),
        }
    }
}

/// Whether an `io::Error` returned by `Read`/`Seek` denotes use after release
pub fn is_released_error(err: &io::Error) -> bool {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<CacheError>())
        .map_or(false, |inner| matches!(inner, CacheError::Released))
}

enum Backing {
    Memory(Cursor<Vec<u8>>),
    Disk(BufReader<File>),
}

impl Backing {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Backing::Memory(cursor) => cursor.read(buf),
            Backing::Disk(reader) => reader.read(buf),
        }
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        match self {
            Backing::Memory(cursor) => cursor.set_position(offset),
            Backing::Disk(reader) => {
                reader.seek(SeekFrom::Start(offset))?;
            }
        }
        Ok(())
    }
}

enum Inner {
    Uncached {
        source: Box<dyn Read + Send>,
        config: CacheConfig,
    },
    Cached {
        backing: Backing,
        len: u64,
        pos: u64,
    },
    Released,
}

/// A fully materialized, rewindable content stream
///
/// Reading or seeking an uncached stream caches it first. A failed drain
/// releases the stream, since the source can no longer be replayed.
pub struct CachedContentStream {
    inner: Inner,
}

impl CachedContentStream {
    /// Wrap a one-shot source without reading it yet
    pub fn new(source: Box<dyn Read + Send>, config: &CacheConfig) -> Self {
        Self {
            inner: Inner::Uncached {
                source,
                config: config.clone(),
            },
        }
    }

    /// Drain `source` immediately into a cached stream positioned at 0
    pub fn from_reader<R: Read + ?Sized>(source: &mut R, config: &CacheConfig) -> CacheResult<Self> {
        let (backing, len) = drain(source, config)?;
        Ok(Self {
            inner: Inner::Cached {
                backing,
                len,
                pos: 0,
            },
        })
    }

    /// Cached stream over bytes already in memory
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        let len = bytes.len() as u64;
        Self {
            inner: Inner::Cached {
                backing: Backing::Memory(Cursor::new(bytes)),
                len,
                pos: 0,
            },
        }
    }

    /// Drain the source completely and drop it
    ///
    /// Idempotent; returns the cached length.
    pub fn enforce_full_caching(&mut self) -> CacheResult<u64> {
        let drained = match &mut self.inner {
            Inner::Released => return Err(CacheError::Released),
            Inner::Cached { len, .. } => return Ok(*len),
            Inner::Uncached { source, config } => drain(source.as_mut(), config),
        };
        match drained {
            Ok((backing, len)) => {
                self.inner = Inner::Cached {
                    backing,
                    len,
                    pos: 0,
                };
                Ok(len)
            }
            Err(e) => {
                self.inner = Inner::Released;
                Err(e.into())
            }
        }
    }

    /// Reset the read cursor to position 0
    pub fn rewind(&mut self) -> CacheResult<()> {
        self.enforce_full_caching()?;
        if let Inner::Cached { backing, pos, .. } = &mut self.inner {
            backing.seek_to(0)?;
            *pos = 0;
        }
        Ok(())
    }

    /// Free backing storage; any later access fails
    pub fn release(&mut self) {
        if self.is_spilled() {
            debug!(target: "commitq::cache", "Releasing spilled content stream");
        }
        self.inner = Inner::Released;
    }

    /// Current state
    pub fn state(&self) -> StreamState {
        match &self.inner {
            Inner::Uncached { .. } => StreamState::Uncached,
            Inner::Cached { pos: 0, .. } => StreamState::CachedAtStart,
            Inner::Cached { .. } => StreamState::CachedMidStream,
            Inner::Released => StreamState::Released,
        }
    }

    /// Cached length in bytes, once cached
    pub fn cached_len(&self) -> Option<u64> {
        match &self.inner {
            Inner::Cached { len, .. } => Some(*len),
            _ => None,
        }
    }

    /// Cursor position, once cached
    pub fn position(&self) -> Option<u64> {
        match &self.inner {
            Inner::Cached { pos, .. } => Some(*pos),
            _ => None,
        }
    }

    /// Whether the content lives in a spill file
    pub fn is_spilled(&self) -> bool {
        matches!(
            &self.inner,
            Inner::Cached {
                backing: Backing::Disk(_),
                ..
            }
        )
    }

    /// Read from the current position to the end
    pub fn read_to_vec(&mut self) -> CacheResult<Vec<u8>> {
        let len = self.enforce_full_caching()?;
        let pos = self.position().unwrap_or(0);
        let mut out = Vec::with_capacity(len.saturating_sub(pos) as usize);
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for CachedContentStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.enforce_full_caching()?;
        match &mut self.inner {
            Inner::Cached { backing, pos, .. } => {
                let n = backing.read(buf)?;
                *pos += n as u64;
                Ok(n)
            }
            _ => Err(CacheError::Released.into()),
        }
    }
}

impl Seek for CachedContentStream {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        self.enforce_full_caching()?;
        match &mut self.inner {
            Inner::Cached { backing, len, pos } => {
                let offset = match target {
                    SeekFrom::Start(offset) => Some(offset),
                    SeekFrom::End(delta) => len.checked_add_signed(delta),
                    SeekFrom::Current(delta) => pos.checked_add_signed(delta),
                }
                .ok_or_else(|| {
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "invalid seek to a negative or overflowing position",
                    )
                })?;
                backing.seek_to(offset)?;
                *pos = offset;
                Ok(offset)
            }
            _ => Err(CacheError::Released.into()),
        }
    }
}

impl fmt::Debug for CachedContentStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedContentStream")
            .field("state", &self.state())
            .field("len", &self.cached_len())
            .field("spilled", &self.is_spilled())
            .finish()
    }
}

/// Copy `source` to its end, in memory until the threshold is crossed
fn drain<R: Read + ?Sized>(source: &mut R, config: &CacheConfig) -> io::Result<(Backing, u64)> {
    let mut memory: Vec<u8> = Vec::new();
    let mut spill: Option<BufWriter<File>> = None;
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut len: u64 = 0;

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        len += n as u64;

        match spill.as_mut() {
            Some(writer) => writer.write_all(&buf[..n])?,
            None if memory.len() + n > config.memory_threshold => {
                let mut writer = BufWriter::new(config.spill_file()?);
                writer.write_all(&memory)?;
                writer.write_all(&buf[..n])?;
                let spill_dir = config.spill_dir();
                debug!(
                    target: "commitq::cache",
                    threshold = config.memory_threshold,
                    spill_dir = %spill_dir.display(),
                    "Content exceeds memory threshold, spilling to disk"
                );
                memory = Vec::new();
                spill = Some(writer);
            }
            None => memory.extend_from_slice(&buf[..n]),
        }
    }

    let backing = match spill {
        Some(writer) => {
            let mut file = writer.into_inner().map_err(|e| e.into_error())?;
            file.seek(SeekFrom::Start(0))?;
            Backing::Disk(BufReader::new(file))
        }
        None => Backing::Memory(Cursor::new(memory)),
    };

    Ok((backing, len))
}
