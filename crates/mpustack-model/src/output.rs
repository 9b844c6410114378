//! Operation outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of initiating an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateMpuOutput {
    /// Destination bucket.
    pub bucket: String,
    /// Destination key.
    pub key: String,
    /// Newly issued upload id.
    pub upload_id: String,
}

/// Identity the backend assigned to an uploaded part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPartOutput {
    /// Part ETag (quoted hex MD5).
    pub etag: String,
    /// Backend generation of the part object.
    pub version_id: Option<String>,
}

/// Result of an upload-part-copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyPartResult {
    /// ETag of the copied part.
    pub etag: String,
    /// When the part object was written.
    pub last_modified: DateTime<Utc>,
}

/// The externally visible result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MpuResult {
    /// Destination bucket.
    pub bucket: String,
    /// Destination key.
    pub key: String,
    /// Version id reported by the destination copy.
    pub version_id: Option<String>,
    /// Multipart ETag, `"<hex>-<part count>"`.
    pub etag: String,
}

/// One entry of a part listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartSummary {
    /// Part number parsed from the object key.
    pub part_number: u32,
    /// ETag of the stored part.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// When the part object was written.
    pub last_modified: DateTime<Utc>,
}

/// Result of listing an upload's parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPartsOutput {
    /// Destination bucket.
    pub bucket: String,
    /// Destination key.
    pub key: String,
    /// Upload id.
    pub upload_id: String,
    /// Listed parts in backend order.
    pub parts: Vec<PartSummary>,
    /// Whether more parts remain beyond this page.
    pub is_truncated: bool,
    /// Token to resume the listing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}
