//! Error types for the multipart compose engine.
//!
//! Defines [`MpuError`], the domain error returned by every engine
//! operation, and [`BackendError`], the structured failure reported by a
//! [`BackendClient`](crate::backend::BackendClient). Backend errors are
//! always wrapped together with the pipeline [`Stage`] they occurred in so a
//! caller can decide whether an external retry makes sense.
//!
//! # Usage
//!
//! ```
//! use mpustack_core::error::MpuError;
//!
//! let err = MpuError::NoSuchUpload {
//!     upload_id: "abc".to_owned(),
//! };
//! assert_eq!(err.code(), "NoSuchUpload");
//! ```

use std::fmt;

use mpustack_model::MpuResult;

/// A step of a multipart operation, attached to backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Init-marker existence check.
    Verify,
    /// Writing the init marker.
    Initiate,
    /// Storing an uploaded part.
    UploadPart,
    /// Copying an existing object into a part.
    UploadPartCopy,
    /// Listing stored parts.
    ListParts,
    /// First reduction pass over the raw parts.
    ComposePass1,
    /// Second reduction pass over pass-1 nodes.
    ComposePass2,
    /// Rewriting survivors into the overflow bucket.
    Migrate,
    /// Final compose inside the overflow bucket.
    Merge,
    /// Copying the assembled object to its destination.
    CopyToDestination,
    /// Purging the scratch namespace.
    Cleanup,
}

impl Stage {
    /// Return a stable, lowercase identifier for this stage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Initiate => "initiate",
            Self::UploadPart => "upload-part",
            Self::UploadPartCopy => "upload-part-copy",
            Self::ListParts => "list-parts",
            Self::ComposePass1 => "compose-pass1",
            Self::ComposePass2 => "compose-pass2",
            Self::Migrate => "migrate",
            Self::Merge => "merge",
            Self::CopyToDestination => "copy-to-destination",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the object store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("backend error {status} {code}: {message}")]
pub struct BackendError {
    /// HTTP-style status code.
    pub status: u16,
    /// Backend error code (e.g. `notFound`, `rateLimitExceeded`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

impl BackendError {
    /// Create a backend error.
    #[must_use]
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a 404 on `key`.
    #[must_use]
    pub fn not_found(key: &str) -> Self {
        Self::new(404, "notFound", format!("No such object: {key}"))
    }

    /// Whether the failure may succeed if the same request is repeated.
    ///
    /// Request timeouts, throttling and server-side errors are transient;
    /// everything else (malformed requests, permissions, missing objects)
    /// is terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self.status, 408 | 429) || (500..600).contains(&self.status)
    }

    /// Whether this is a not-found failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Multipart engine error type.
#[derive(Debug, thiserror::Error)]
pub enum MpuError {
    /// Missing or malformed parameters. Raised before any backend call.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// Part numbers in a completion request are not strictly increasing.
    #[error("The list of parts was not in ascending order")]
    InvalidPartOrder,

    /// The upload's init marker does not exist.
    #[error("The specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload id that was not found.
        upload_id: String,
    },

    /// A backend call failed terminally (or exhausted its retries).
    #[error("{stage} failed: {source}")]
    Backend {
        /// The step that failed.
        stage: Stage,
        /// The underlying backend failure.
        #[source]
        source: BackendError,
    },

    /// A rewrite did not finish within the configured number of steps.
    #[error("rewrite of {object} did not complete after {steps} steps")]
    RewriteIncomplete {
        /// The object being rewritten.
        object: String,
        /// Steps issued before giving up.
        steps: u32,
    },

    /// The destination object was written but scratch cleanup failed.
    ///
    /// The completed [`MpuResult`] is carried so the caller still learns the
    /// final object's identity; leftover scratch objects need an external
    /// sweep or a later abort.
    #[error("upload completed but scratch cleanup failed: {source}")]
    CleanupFailed {
        /// The result of the completed upload.
        result: Box<MpuResult>,
        /// The cleanup failure.
        #[source]
        source: BackendError,
    },

    /// Internal invariant violation.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MpuError {
    /// Build an [`MpuError::InvalidRequest`].
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Wrap a backend failure with its stage.
    #[must_use]
    pub fn backend(stage: Stage, source: BackendError) -> Self {
        Self::Backend { stage, source }
    }

    /// The S3-compatible error code for this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::InvalidRequest { .. } => "InvalidRequest",
            Self::InvalidPartOrder => "InvalidPartOrder",
            Self::NoSuchUpload { .. } => "NoSuchUpload",
            Self::Backend { source, .. } => &source.code,
            Self::RewriteIncomplete { .. } => "RequestTimeout",
            Self::CleanupFailed { .. } | Self::Internal(_) => "InternalError",
        }
    }

    /// The stage a backend-originated error came from, if any.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Backend { stage, .. } => Some(*stage),
            Self::RewriteIncomplete { .. } => Some(Stage::Migrate),
            Self::CleanupFailed { .. } => Some(Stage::Cleanup),
            _ => None,
        }
    }
}

/// Convenience result type for engine operations.
pub type EngineResult<T> = Result<T, MpuError>;
