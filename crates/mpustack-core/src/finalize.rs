//! Destination copy and result ETag.
//!
//! Compose and rewrite do not carry user metadata through intermediate
//! nodes, so the caller's metadata, taken from the init marker when the
//! session is verified, is applied by a metadata-replacing copy into the
//! destination.

use mpustack_model::{CompletedPart, MpuResult, ObjectMetadata, UploadSession};
use tracing::debug;

use crate::backend::{BackendClient, CopyRequest};
use crate::checksums;
use crate::config::MpuConfig;
use crate::error::{EngineResult, MpuError, Stage};
use crate::retry::RetryPolicy;

/// Publishes the merged object and builds the completion result.
#[derive(Debug)]
pub struct Finalizer<'a> {
    backend: &'a dyn BackendClient,
    session: &'a UploadSession,
    retry: RetryPolicy,
}

impl<'a> Finalizer<'a> {
    /// Create a finalizer for `session`.
    #[must_use]
    pub fn new(
        backend: &'a dyn BackendClient,
        config: &MpuConfig,
        session: &'a UploadSession,
    ) -> Self {
        Self {
            backend,
            session,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Copy `merged` from the overflow bucket to the destination with
    /// `metadata` and build the result for `parts`.
    ///
    /// # Errors
    ///
    /// [`MpuError::Backend`] with [`Stage::CopyToDestination`] once the copy
    /// has failed terminally or used up its retries.
    pub async fn finalize(
        &self,
        merged: &str,
        parts: &[CompletedPart],
        metadata: ObjectMetadata,
    ) -> EngineResult<MpuResult> {
        let etag = multipart_etag(parts)?;

        let info = self
            .retry
            .retry_copy(
                self.backend,
                &CopyRequest {
                    src_bucket: self.session.overflow_bucket.clone(),
                    src_key: merged.to_owned(),
                    dst_bucket: self.session.bucket.clone(),
                    dst_key: self.session.key.clone(),
                    replace_metadata: Some(metadata),
                },
            )
            .await
            .map_err(|e| MpuError::backend(Stage::CopyToDestination, e))?;

        debug!(
            bucket = %self.session.bucket,
            key = %self.session.key,
            size = info.size,
            %etag,
            "published destination object"
        );
        Ok(MpuResult {
            bucket: self.session.bucket.clone(),
            key: self.session.key.clone(),
            version_id: info.version_id,
            etag,
        })
    }
}

/// Compute the completion ETag for `parts`, in list order.
///
/// # Errors
///
/// [`MpuError::InvalidRequest`] if a part ETag is not hex.
pub fn multipart_etag(parts: &[CompletedPart]) -> EngineResult<String> {
    let etags: Vec<&str> = parts.iter().map(|p| p.etag.as_str()).collect();
    checksums::compute_multipart_etag(&etags)
        .map_err(|e| MpuError::invalid_request(format!("Invalid part ETag: {e}")))
}
