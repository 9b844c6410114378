//! Session liveness checks.
//!
//! An upload is Open while its init marker exists in the scratch bucket and
//! Closed once cleanup deletes it. No other session state is kept.

use mpustack_model::UploadSession;
use tracing::trace;

use crate::backend::{BackendClient, ObjectInfo};
use crate::error::{EngineResult, MpuError, Stage};
use crate::keys::ScratchLayout;

/// Confirms that an upload session is still open.
#[derive(Debug, Clone, Copy)]
pub struct SessionVerifier<'a> {
    backend: &'a dyn BackendClient,
}

impl<'a> SessionVerifier<'a> {
    /// Create a verifier over `backend`.
    #[must_use]
    pub fn new(backend: &'a dyn BackendClient) -> Self {
        Self { backend }
    }

    /// Check that the init marker of `session` exists.
    ///
    /// Returns the marker's description so callers can reuse its metadata.
    ///
    /// # Errors
    ///
    /// [`MpuError::NoSuchUpload`] if the marker is absent, or
    /// [`MpuError::Backend`] with [`Stage::Verify`] for any other failure.
    pub async fn verify(&self, session: &UploadSession) -> EngineResult<ObjectInfo> {
        let marker = ScratchLayout::for_session(session).init_marker();
        match self
            .backend
            .head_object(&session.scratch_bucket, &marker)
            .await
        {
            Ok(info) => {
                trace!(upload_id = %session.upload_id, "session is open");
                Ok(info)
            }
            Err(e) if e.is_not_found() => Err(MpuError::NoSuchUpload {
                upload_id: session.upload_id.clone(),
            }),
            Err(e) => Err(MpuError::backend(Stage::Verify, e)),
        }
    }
}
