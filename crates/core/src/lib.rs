//! Core types for commitq
//!
//! This crate defines the in-process representation of a commit request:
//! - MetadataStore: Ordered multi-valued string map with a line-oriented text form
//! - RequestRecord: Tagged union of UpsertRequest and DeleteRequest
//! - RequestKind: Discriminates the two request variants
//! - Error: RecordError and MetadataError

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod metadata;
pub mod request;

pub use error::{MetadataError, MetadataResult, RecordError, RecordResult};
pub use metadata::MetadataStore;
pub use request::{DeleteRequest, RequestKind, RequestRecord, UpsertRequest};
