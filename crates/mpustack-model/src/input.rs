//! Operation inputs.

use bytes::Bytes;

use crate::session::{CompletedPart, ObjectMetadata, UploadSession};

/// Input for starting a multipart upload.
#[derive(Debug, Clone, Default)]
pub struct InitiateMpuInput {
    /// Destination bucket.
    pub bucket: String,
    /// Scratch bucket that will hold the init marker and parts.
    pub scratch_bucket: String,
    /// Destination object key.
    pub key: String,
    /// Metadata applied to the final object on completion.
    pub metadata: ObjectMetadata,
}

/// Input for uploading one part.
#[derive(Debug, Clone)]
pub struct UploadPartInput {
    /// The session the part belongs to.
    pub session: UploadSession,
    /// Caller-assigned part number.
    pub part_number: u32,
    /// Part payload.
    pub body: Bytes,
    /// Declared payload length, forwarded to the backend.
    pub content_length: Option<u64>,
}

/// Input for creating a part by copying an existing object.
#[derive(Debug, Clone)]
pub struct UploadPartCopyInput {
    /// The session the part belongs to.
    pub session: UploadSession,
    /// Caller-assigned part number.
    pub part_number: u32,
    /// Source in `bucket/key` form; a leading `/` is accepted.
    pub copy_source: String,
}

/// Input for completing a multipart upload.
#[derive(Debug, Clone)]
pub struct CompleteMpuInput {
    /// The session being completed.
    pub session: UploadSession,
    /// Parts to assemble, in strictly increasing part-number order.
    pub parts: Vec<CompletedPart>,
}

/// Input for listing the parts of an upload.
#[derive(Debug, Clone)]
pub struct ListPartsInput {
    /// The session whose parts are listed.
    pub session: UploadSession,
    /// Upper bound on returned entries.
    pub max_parts: Option<usize>,
    /// Continuation token from a previous truncated listing.
    pub page_token: Option<String>,
}
