//! Commit request records
//!
//! A commit request either upserts a content item (with its content) or
//! deletes it (without content). The variant is fixed when the record is
//! built and travels with it as a tagged union.
//!
//! Records are generic over the content type `C` so that producers can hand in
//! any byte source while decoders hand back a replayable stream.

use crate::error::{RecordError, RecordResult};
use crate::metadata::MetadataStore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a commit request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Add or update a content item
    Upsert,
    /// Remove a content item
    Delete,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Upsert => write!(f, "upsert"),
            RequestKind::Delete => write!(f, "delete"),
        }
    }
}

/// Upsert request: reference, metadata and content
#[derive(Debug)]
pub struct UpsertRequest<C> {
    reference: String,
    metadata: MetadataStore,
    content: C,
}

impl<C> UpsertRequest<C> {
    /// Create an upsert request
    ///
    /// Fails if `reference` is empty.
    pub fn new(
        reference: impl Into<String>,
        metadata: MetadataStore,
        content: C,
    ) -> RecordResult<Self> {
        Ok(Self {
            reference: validate_reference(reference.into())?,
            metadata,
            content,
        })
    }

    /// Reference of the content item
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Metadata of the content item
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Mutable metadata
    pub fn metadata_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }

    /// Content stream
    pub fn content(&self) -> &C {
        &self.content
    }

    /// Mutable content stream
    pub fn content_mut(&mut self) -> &mut C {
        &mut self.content
    }

    /// Split into reference, metadata and content
    pub fn into_parts(self) -> (String, MetadataStore, C) {
        (self.reference, self.metadata, self.content)
    }
}

/// Delete request: reference and metadata, no content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDeleteRequest")]
pub struct DeleteRequest {
    reference: String,
    metadata: MetadataStore,
}

/// Serialized shape of a delete request, validated on conversion
#[derive(Deserialize)]
struct RawDeleteRequest {
    reference: String,
    metadata: MetadataStore,
}

impl TryFrom<RawDeleteRequest> for DeleteRequest {
    type Error = RecordError;

    fn try_from(raw: RawDeleteRequest) -> RecordResult<Self> {
        Self::new(raw.reference, raw.metadata)
    }
}

impl DeleteRequest {
    /// Create a delete request
    ///
    /// Fails if `reference` is empty.
    pub fn new(reference: impl Into<String>, metadata: MetadataStore) -> RecordResult<Self> {
        Ok(Self {
            reference: validate_reference(reference.into())?,
            metadata,
        })
    }

    /// Reference of the content item
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Metadata of the content item
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Mutable metadata
    pub fn metadata_mut(&mut self) -> &mut MetadataStore {
        &mut self.metadata
    }

    /// Split into reference and metadata
    pub fn into_parts(self) -> (String, MetadataStore) {
        (self.reference, self.metadata)
    }
}

/// A commit request destined for a downstream content index
#[derive(Debug)]
pub enum RequestRecord<C> {
    /// Add or update with content
    Upsert(UpsertRequest<C>),
    /// Delete without content
    Delete(DeleteRequest),
}

impl<C> RequestRecord<C> {
    /// Build an upsert record
    pub fn upsert(
        reference: impl Into<String>,
        metadata: MetadataStore,
        content: C,
    ) -> RecordResult<Self> {
        UpsertRequest::new(reference, metadata, content).map(RequestRecord::Upsert)
    }

    /// Build a delete record
    pub fn delete(reference: impl Into<String>, metadata: MetadataStore) -> RecordResult<Self> {
        DeleteRequest::new(reference, metadata).map(RequestRecord::Delete)
    }

    /// Kind of this request
    pub fn kind(&self) -> RequestKind {
        match self {
            RequestRecord::Upsert(_) => RequestKind::Upsert,
            RequestRecord::Delete(_) => RequestKind::Delete,
        }
    }

    /// Whether this is an upsert
    pub fn is_upsert(&self) -> bool {
        matches!(self, RequestRecord::Upsert(_))
    }

    /// Whether this is a delete
    pub fn is_delete(&self) -> bool {
        matches!(self, RequestRecord::Delete(_))
    }

    /// Reference of the content item
    pub fn reference(&self) -> &str {
        match self {
            RequestRecord::Upsert(upsert) => upsert.reference(),
            RequestRecord::Delete(delete) => delete.reference(),
        }
    }

    /// Metadata of the content item
    pub fn metadata(&self) -> &MetadataStore {
        match self {
            RequestRecord::Upsert(upsert) => upsert.metadata(),
            RequestRecord::Delete(delete) => delete.metadata(),
        }
    }

    /// Mutable metadata
    pub fn metadata_mut(&mut self) -> &mut MetadataStore {
        match self {
            RequestRecord::Upsert(upsert) => upsert.metadata_mut(),
            RequestRecord::Delete(delete) => delete.metadata_mut(),
        }
    }

    /// Content stream, present only for upserts
    pub fn content_mut(&mut self) -> Option<&mut C> {
        match self {
            RequestRecord::Upsert(upsert) => Some(upsert.content_mut()),
            RequestRecord::Delete(_) => None,
        }
    }

    /// Take the content stream, dropping reference and metadata
    pub fn into_content(self) -> Option<C> {
        match self {
            RequestRecord::Upsert(upsert) => Some(upsert.content),
            RequestRecord::Delete(_) => None,
        }
    }

    /// Replace the content type, keeping reference and metadata
    pub fn map_content<D>(self, f: impl FnOnce(C) -> D) -> RequestRecord<D> {
        match self {
            RequestRecord::Upsert(UpsertRequest {
                reference,
                metadata,
                content,
            }) => RequestRecord::Upsert(UpsertRequest {
                reference,
                metadata,
                content: f(content),
            }),
            RequestRecord::Delete(delete) => RequestRecord::Delete(delete),
        }
    }
}

impl<C> From<UpsertRequest<C>> for RequestRecord<C> {
    fn from(upsert: UpsertRequest<C>) -> Self {
        RequestRecord::Upsert(upsert)
    }
}

impl<C> From<DeleteRequest> for RequestRecord<C> {
    fn from(delete: DeleteRequest) -> Self {
        RequestRecord::Delete(delete)
    }
}

fn validate_reference(reference: String) -> RecordResult<String> {
    if reference.is_empty() {
        return Err(RecordError::EmptyReference);
    }
    Ok(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn html_metadata() -> MetadataStore {
        let mut metadata = MetadataStore::new();
        metadata.add("Content-Type", "text/html");
        metadata
    }

    #[test]
    fn test_upsert_record() {
        let record = RequestRecord::upsert(
            "https://example.com/a",
            html_metadata(),
            Cursor::new(b"<html></html>".to_vec()),
        )
        .unwrap();

        assert_eq!(record.kind(), RequestKind::Upsert);
        assert!(record.is_upsert());
        assert!(!record.is_delete());
        assert_eq!(record.reference(), "https://example.com/a");
        assert_eq!(record.metadata().get_first("Content-Type"), Some("text/html"));

        let content = record.into_content().unwrap();
        assert_eq!(content.into_inner(), b"<html></html>");
    }

    #[test]
    fn test_delete_record() {
        let mut record: RequestRecord<Cursor<Vec<u8>>> =
            RequestRecord::delete("doc-42", MetadataStore::new()).unwrap();

        assert_eq!(record.kind(), RequestKind::Delete);
        assert!(record.is_delete());
        assert_eq!(record.reference(), "doc-42");
        assert!(record.metadata().is_empty());
        assert!(record.content_mut().is_none());
    }

    #[test]
    fn test_empty_reference_rejected() {
        let err = RequestRecord::upsert("", MetadataStore::new(), Cursor::new(Vec::<u8>::new()))
            .unwrap_err();
        assert_eq!(err, RecordError::EmptyReference);

        let err = DeleteRequest::new("", MetadataStore::new()).unwrap_err();
        assert_eq!(err, RecordError::EmptyReference);
    }

    #[test]
    fn test_delete_request_serde() {
        let delete = DeleteRequest::new("doc-42", html_metadata()).unwrap();
        let json = serde_json::to_string(&delete).unwrap();
        let parsed: DeleteRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, delete);
    }

    #[test]
    fn test_delete_request_rejects_empty_reference_on_deserialize() {
        let json = r#"{"reference":"","metadata":{"entries":[]}}"#;
        let err = serde_json::from_str::<DeleteRequest>(json).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn test_metadata_mut() {
        let mut record: RequestRecord<()> =
            RequestRecord::delete("doc-1", MetadataStore::new()).unwrap();
        record.metadata_mut().add("k", "v");
        assert_eq!(record.metadata().get_first("k"), Some("v"));
    }

    #[test]
    fn test_map_content() {
        let record = RequestRecord::upsert("doc-1", html_metadata(), "abc").unwrap();
        let mapped = record.map_content(|s| s.len());
        assert_eq!(mapped.reference(), "doc-1");
        assert_eq!(mapped.into_content(), Some(3));

        let record: RequestRecord<&str> =
            RequestRecord::delete("doc-2", MetadataStore::new()).unwrap();
        let mapped = record.map_content(|s| s.len());
        assert!(mapped.is_delete());
    }

    #[test]
    fn test_into_parts() {
        let upsert = UpsertRequest::new("doc-1", html_metadata(), 7u8).unwrap();
        let (reference, metadata, content) = upsert.into_parts();
        assert_eq!(reference, "doc-1");
        assert_eq!(metadata, html_metadata());
        assert_eq!(content, 7);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(RequestKind::Upsert.to_string(), "upsert");
        assert_eq!(RequestKind::Delete.to_string(), "delete");
    }
}
