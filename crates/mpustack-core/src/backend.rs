//! Object store abstraction consumed by the engine.
//!
//! [`BackendClient`] is the narrow set of primitives the multipart engine
//! needs: plain object CRUD, a bounded fan-in `compose`, a metadata-aware
//! `copy` and a token-driven `rewrite_step`. Transport, authentication and
//! token refresh live behind the implementation.
//!
//! The trait uses `#[async_trait]` so it can be held as
//! `Arc<dyn BackendClient>` and swapped for [`InMemoryBackend`] in tests.
//!
//! [`InMemoryBackend`]: crate::memory::InMemoryBackend

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use mpustack_model::ObjectMetadata;

use crate::error::BackendError;

/// Result type for backend primitives.
pub type BackendResult<T> = Result<T, BackendError>;

/// Description of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Bucket the object lives in.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Quoted hex MD5 of the content.
    pub etag: String,
    /// Content length in bytes.
    pub size: u64,
    /// Backend generation of the object.
    pub version_id: Option<String>,
    /// When this generation was written.
    pub last_modified: DateTime<Utc>,
    /// User metadata.
    pub metadata: ObjectMetadata,
}

/// A single-object upload.
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Object payload.
    pub body: Bytes,
    /// Declared length; the backend rejects a mismatch.
    pub content_length: Option<u64>,
    /// User metadata to store with the object.
    pub metadata: ObjectMetadata,
}

/// A server-side copy.
#[derive(Debug, Clone)]
pub struct CopyRequest {
    /// Source bucket.
    pub src_bucket: String,
    /// Source key.
    pub src_key: String,
    /// Destination bucket.
    pub dst_bucket: String,
    /// Destination key.
    pub dst_key: String,
    /// When set, replaces the source metadata on the destination.
    pub replace_metadata: Option<ObjectMetadata>,
}

/// One call of a (possibly multi-step) rewrite.
#[derive(Debug, Clone)]
pub struct RewriteRequest {
    /// Source bucket.
    pub src_bucket: String,
    /// Source key.
    pub src_key: String,
    /// Destination bucket.
    pub dst_bucket: String,
    /// Destination key.
    pub dst_key: String,
    /// Continuation token returned by the previous step.
    pub token: Option<String>,
}

/// Outcome of one rewrite step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteProgress {
    /// More steps are required; pass `token` into the next call.
    Pending {
        /// Opaque continuation token.
        token: String,
        /// Bytes copied so far.
        bytes_rewritten: u64,
    },
    /// The destination object is complete.
    Done(ObjectInfo),
}

/// A prefix listing request.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Bucket to list.
    pub bucket: String,
    /// Key prefix filter.
    pub prefix: String,
    /// Maximum entries per page.
    pub max_keys: Option<usize>,
    /// Continuation token from a previous page.
    pub page_token: Option<String>,
}

/// One page of a listing.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page, in lexical key order.
    pub objects: Vec<ObjectInfo>,
    /// Token for the next page, if the listing was truncated.
    pub next_page_token: Option<String>,
}

/// The object store primitives the multipart engine is built on.
#[async_trait]
pub trait BackendClient: Send + Sync + fmt::Debug {
    /// Store an object, replacing any existing one at the same key.
    async fn put_object(&self, req: PutObjectRequest) -> BackendResult<ObjectInfo>;

    /// Fetch an object's description without its body.
    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<ObjectInfo>;

    /// Fetch an object's body.
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<Bytes>;

    /// List objects under a prefix.
    async fn list_objects(&self, req: ListRequest) -> BackendResult<ListPage>;

    /// Delete an object. Deleting a missing object is a not-found error.
    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()>;

    /// Concatenate `sources` (all in `bucket`, in order) into `dest`.
    ///
    /// Backends reject more sources than their fan-in limit.
    async fn compose(
        &self,
        bucket: &str,
        sources: &[String],
        dest: &str,
    ) -> BackendResult<ObjectInfo>;

    /// Copy an object, optionally replacing its metadata.
    async fn copy_object(&self, req: CopyRequest) -> BackendResult<ObjectInfo>;

    /// Issue one rewrite step, resuming from `req.token` when present.
    async fn rewrite_step(&self, req: RewriteRequest) -> BackendResult<RewriteProgress>;
}
