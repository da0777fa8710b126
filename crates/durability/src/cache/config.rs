//! Cache configuration.
//!
//! This module provides the materialization policy for content streams.

use super::stream::CachedContentStream;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Default in-memory threshold (1MB)
pub const DEFAULT_MEMORY_THRESHOLD: usize = 1024 * 1024;

/// Content caching parameters.
///
/// `CacheConfig::default()` is the policy used when a caller has no
/// preference: 1MB in memory, spill files in the system temp directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Bytes kept in memory before spilling to disk (default: 1MB).
    ///
    /// Content of exactly this size stays in memory. Zero spills any
    /// non-empty content.
    pub memory_threshold: usize,

    /// Directory for spill files (default: system temp directory).
    pub spill_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            memory_threshold: DEFAULT_MEMORY_THRESHOLD,
            spill_dir: None,
        }
    }
}

impl CacheConfig {
    /// Create a cache configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the in-memory threshold (builder pattern).
    pub fn with_memory_threshold(mut self, bytes: usize) -> Self {
        self.memory_threshold = bytes;
        self
    }

    /// Set the spill directory (builder pattern).
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if let Some(dir) = &self.spill_dir {
            if !dir.is_dir() {
                return Err(CacheConfigError::SpillDirNotFound(dir.clone()));
            }
        }
        Ok(())
    }

    /// Create a configuration for testing (tiny threshold, spills early).
    pub fn for_testing() -> Self {
        CacheConfig {
            memory_threshold: 16,
            spill_dir: None,
        }
    }

    /// Wrap a one-shot source in an uncached stream governed by this policy.
    pub fn new_stream(&self, source: Box<dyn Read + Send>) -> CachedContentStream {
        CachedContentStream::new(source, self)
    }

    /// Directory spill files are created in.
    pub fn spill_dir(&self) -> PathBuf {
        self.spill_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Create an anonymous spill file, removed by the OS once closed.
    pub(crate) fn spill_file(&self) -> io::Result<File> {
        match &self.spill_dir {
            Some(dir) => tempfile::tempfile_in(dir),
            None => tempfile::tempfile(),
        }
    }
}

/// Cache configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheConfigError {
    /// The spill directory does not exist or is not a directory.
    #[error("Spill directory not found: {}", .0.display())]
    SpillDirNotFound(PathBuf),
}

impl CacheConfigError {
    /// Path the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            CacheConfigError::SpillDirNotFound(path) => path,
        }
    }
}
