//! Part storage and listing.
//!
//! Parts are plain objects at `<Key>-<UploadId>/parts/<PartNumber>` in the
//! scratch bucket. Callers are expected to have verified the session first;
//! size and count limits are enforced upstream.

use bytes::Bytes;
use mpustack_model::{
    CopyPartResult, ListPartsOutput, ObjectMetadata, PartSummary, UploadPartOutput, UploadSession,
};
use tracing::debug;

use crate::backend::{BackendClient, CopyRequest, ListRequest, PutObjectRequest};
use crate::error::{EngineResult, MpuError, Stage};
use crate::keys::ScratchLayout;

/// Writes, copies and lists the parts of one upload.
#[derive(Debug)]
pub struct PartStore<'a> {
    backend: &'a dyn BackendClient,
    session: &'a UploadSession,
    layout: ScratchLayout,
}

impl<'a> PartStore<'a> {
    /// Create a part store for `session`.
    #[must_use]
    pub fn new(backend: &'a dyn BackendClient, session: &'a UploadSession) -> Self {
        Self {
            backend,
            session,
            layout: ScratchLayout::for_session(session),
        }
    }

    /// Store `body` as part `part_number`, replacing any earlier upload of it.
    pub async fn upload_part(
        &self,
        part_number: u32,
        body: Bytes,
        content_length: Option<u64>,
    ) -> EngineResult<UploadPartOutput> {
        let key = self.layout.part(part_number);
        let info = self
            .backend
            .put_object(PutObjectRequest {
                bucket: self.session.scratch_bucket.clone(),
                key,
                body,
                content_length,
                metadata: ObjectMetadata::new(),
            })
            .await
            .map_err(|e| MpuError::backend(Stage::UploadPart, e))?;

        debug!(
            upload_id = %self.session.upload_id,
            part_number,
            size = info.size,
            "stored part"
        );
        Ok(UploadPartOutput {
            etag: info.etag,
            version_id: info.version_id,
        })
    }

    /// Copy the object named by `copy_source` into part `part_number`.
    ///
    /// # Errors
    ///
    /// [`MpuError::InvalidRequest`] if `copy_source` is malformed.
    pub async fn upload_part_copy(
        &self,
        part_number: u32,
        copy_source: &str,
    ) -> EngineResult<CopyPartResult> {
        let (src_bucket, src_key) = parse_copy_source(copy_source)?;
        let info = self
            .backend
            .copy_object(CopyRequest {
                src_bucket,
                src_key,
                dst_bucket: self.session.scratch_bucket.clone(),
                dst_key: self.layout.part(part_number),
                replace_metadata: Some(ObjectMetadata::new()),
            })
            .await
            .map_err(|e| MpuError::backend(Stage::UploadPartCopy, e))?;

        debug!(
            upload_id = %self.session.upload_id,
            part_number,
            copy_source,
            "copied part"
        );
        Ok(CopyPartResult {
            etag: info.etag,
            last_modified: info.last_modified,
        })
    }

    /// List stored parts, at most `max_parts` per page.
    ///
    /// Entries come back in backend listing order, which is lexical by key:
    /// part 10 sorts before part 2.
    pub async fn list_parts(
        &self,
        max_parts: Option<usize>,
        page_token: Option<String>,
    ) -> EngineResult<ListPartsOutput> {
        let page = self
            .backend
            .list_objects(ListRequest {
                bucket: self.session.scratch_bucket.clone(),
                prefix: self.layout.parts_prefix(),
                max_keys: max_parts,
                page_token,
            })
            .await
            .map_err(|e| MpuError::backend(Stage::ListParts, e))?;

        let parts = page
            .objects
            .into_iter()
            .filter_map(|obj| {
                let part_number = self.layout.parse_part_number(&obj.key)?;
                Some(PartSummary {
                    part_number,
                    etag: obj.etag,
                    size: obj.size,
                    last_modified: obj.last_modified,
                })
            })
            .collect();

        Ok(ListPartsOutput {
            bucket: self.session.bucket.clone(),
            key: self.session.key.clone(),
            upload_id: self.session.upload_id.clone(),
            parts,
            is_truncated: page.next_page_token.is_some(),
            next_page_token: page.next_page_token,
        })
    }
}

/// Parse a `[/]bucket/key` copy source, percent-decoding the key.
///
/// # Errors
///
/// [`MpuError::InvalidRequest`] when the bucket or key is missing, the key is
/// not valid UTF-8 once decoded, or a version is requested.
///
/// # Examples
///
/// ```
/// use mpustack_core::parts::parse_copy_source;
///
/// let (bucket, key) = parse_copy_source("/src/path%20to/obj").unwrap();
/// assert_eq!(bucket, "src");
/// assert_eq!(key, "path to/obj");
/// ```
pub fn parse_copy_source(source: &str) -> EngineResult<(String, String)> {
    let source = source.strip_prefix('/').unwrap_or(source);
    if source.contains('?') {
        return Err(MpuError::invalid_request(
            "Invalid copy source: versioned copy sources are not supported",
        ));
    }

    let (bucket, key) = source.split_once('/').ok_or_else(|| {
        MpuError::invalid_request("Invalid copy source: must be in the format bucket/key")
    })?;
    if bucket.is_empty() || key.is_empty() {
        return Err(MpuError::invalid_request(
            "Invalid copy source: bucket and key must not be empty",
        ));
    }

    let key = percent_encoding::percent_decode_str(key)
        .decode_utf8()
        .map_err(|_| MpuError::invalid_request("Invalid copy source: key contains invalid UTF-8"))?
        .into_owned();
    Ok((bucket.to_owned(), key))
}
