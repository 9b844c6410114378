//! Upload session identity and completed-part descriptors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// User metadata attached to an object (`x-amz-meta-*` style pairs).
pub type ObjectMetadata = HashMap<String, String>;

/// Identity of one multipart upload.
///
/// A session has no server-side state besides its init marker object; this
/// value is the immutable context every operation is evaluated against.
///
/// # Examples
///
/// ```
/// use mpustack_model::UploadSession;
///
/// let session = UploadSession::new("dest", "scratch", "overflow", "video.mp4", "abc123");
/// assert_eq!(session.upload_id, "abc123");
/// assert_eq!(session.scratch_bucket, "scratch");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    /// Destination bucket that receives the final object.
    pub bucket: String,
    /// Bucket holding the init marker, parts and the first two compose levels.
    pub scratch_bucket: String,
    /// Bucket matching the destination's storage class, used for migration.
    pub overflow_bucket: String,
    /// Destination object key.
    pub key: String,
    /// Upload identifier issued at initiation.
    pub upload_id: String,
}

impl UploadSession {
    /// Create a new session descriptor.
    #[must_use]
    pub fn new(
        bucket: impl Into<String>,
        scratch_bucket: impl Into<String>,
        overflow_bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            scratch_bucket: scratch_bucket.into(),
            overflow_bucket: overflow_bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }
}

/// A part named in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPart {
    /// Caller-assigned part number (1-based).
    pub part_number: u32,
    /// ETag returned when the part was uploaded, usually quoted hex MD5.
    pub etag: String,
}

impl CompletedPart {
    /// Create a completed part entry.
    #[must_use]
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}
