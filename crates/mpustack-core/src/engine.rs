//! The multipart upload engine.
//!
//! [`MpuEngine`] exposes the public operations. Each one validates its input
//! without I/O, checks that the session is open and then runs its stages in
//! order; the first failing stage ends the operation.
//!
//! Completion runs:
//!
//! ```text
//! verify -> compose pass1 -> compose pass2 -> migrate -> merge
//!        -> copy to destination -> cleanup
//! ```
//!
//! Scratch objects written by a failed completion are left in place; a later
//! abort removes them.

use std::sync::Arc;

use mpustack_model::{
    CompleteMpuInput, CopyPartResult, InitiateMpuInput, InitiateMpuOutput, ListPartsInput,
    ListPartsOutput, MpuResult, UploadPartCopyInput, UploadPartInput, UploadPartOutput,
    UploadSession,
};
use tracing::{debug, error};

use crate::backend::{BackendClient, ObjectInfo, PutObjectRequest};
use crate::cleanup::Cleanup;
use crate::compose::ComposeTree;
use crate::config::MpuConfig;
use crate::error::{EngineResult, MpuError, Stage};
use crate::finalize::Finalizer;
use crate::keys::ScratchLayout;
use crate::overflow::OverflowConsolidator;
use crate::parts::{PartStore, parse_copy_source};
use crate::session::SessionVerifier;
use crate::validation;

/// Multipart upload engine over a [`BackendClient`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use bytes::Bytes;
/// use mpustack_core::config::MpuConfig;
/// use mpustack_core::engine::MpuEngine;
/// use mpustack_core::memory::InMemoryBackend;
/// use mpustack_model::{
///     CompleteMpuInput, CompletedPart, InitiateMpuInput, UploadPartInput, UploadSession,
/// };
///
/// # tokio_test::block_on(async {
/// let backend = Arc::new(InMemoryBackend::new());
/// let engine = MpuEngine::new(backend.clone(), MpuConfig::default()).unwrap();
///
/// let init = engine
///     .initiate_mpu(InitiateMpuInput {
///         bucket: "dst".to_owned(),
///         scratch_bucket: "scratch".to_owned(),
///         key: "video.mp4".to_owned(),
///         ..Default::default()
///     })
///     .await
///     .unwrap();
/// let session = UploadSession::new("dst", "scratch", "overflow", "video.mp4", init.upload_id);
///
/// let part = engine
///     .upload_part(UploadPartInput {
///         session: session.clone(),
///         part_number: 1,
///         body: Bytes::from("frames"),
///         content_length: None,
///     })
///     .await
///     .unwrap();
///
/// let result = engine
///     .complete_mpu(CompleteMpuInput {
///         session,
///         parts: vec![CompletedPart::new(1, part.etag)],
///     })
///     .await
///     .unwrap();
/// assert!(result.etag.ends_with("-1\""));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct MpuEngine {
    backend: Arc<dyn BackendClient>,
    config: Arc<MpuConfig>,
}

impl MpuEngine {
    /// Create an engine over `backend`.
    ///
    /// # Errors
    ///
    /// Returns [`MpuError::InvalidRequest`] if `config` fails validation.
    pub fn new(backend: Arc<dyn BackendClient>, config: MpuConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            config: Arc::new(config),
        })
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &MpuConfig {
        &self.config
    }

    /// Start an upload: write the init marker carrying the caller metadata.
    pub async fn initiate_mpu(&self, input: InitiateMpuInput) -> EngineResult<InitiateMpuOutput> {
        validation::require("Bucket", &input.bucket)?;
        validation::require("ScratchBucket", &input.scratch_bucket)?;
        validation::validate_object_key(&input.key)?;

        let upload_id = uuid::Uuid::new_v4().simple().to_string();
        let layout = ScratchLayout::new(&input.key, &upload_id);
        self.backend
            .put_object(PutObjectRequest {
                bucket: input.scratch_bucket,
                key: layout.init_marker(),
                body: bytes::Bytes::new(),
                content_length: Some(0),
                metadata: input.metadata,
            })
            .await
            .map_err(|e| MpuError::backend(Stage::Initiate, e))?;

        debug!(
            bucket = %input.bucket,
            key = %input.key,
            %upload_id,
            "initiated multipart upload"
        );
        Ok(InitiateMpuOutput {
            bucket: input.bucket,
            key: input.key,
            upload_id,
        })
    }

    /// Check that `session` is still open.
    pub async fn verify(&self, session: &UploadSession) -> EngineResult<()> {
        validation::validate_session(session, false)?;
        self.check_open(session).await.map(|_| ())
    }

    // Callers validate the session first.
    async fn check_open(&self, session: &UploadSession) -> EngineResult<ObjectInfo> {
        SessionVerifier::new(self.backend.as_ref())
            .verify(session)
            .await
    }

    /// Store one part.
    pub async fn upload_part(&self, input: UploadPartInput) -> EngineResult<UploadPartOutput> {
        validation::validate_session(&input.session, false)?;
        validation::validate_part_number(input.part_number)?;
        self.check_open(&input.session).await?;

        PartStore::new(self.backend.as_ref(), &input.session)
            .upload_part(input.part_number, input.body, input.content_length)
            .await
    }

    /// Store one part by copying an existing object.
    pub async fn upload_part_copy(
        &self,
        input: UploadPartCopyInput,
    ) -> EngineResult<CopyPartResult> {
        validation::validate_session(&input.session, false)?;
        validation::validate_part_number(input.part_number)?;
        parse_copy_source(&input.copy_source)?;
        self.check_open(&input.session).await?;

        PartStore::new(self.backend.as_ref(), &input.session)
            .upload_part_copy(input.part_number, &input.copy_source)
            .await
    }

    /// List the parts uploaded so far.
    pub async fn list_parts(&self, input: ListPartsInput) -> EngineResult<ListPartsOutput> {
        validation::validate_session(&input.session, false)?;
        self.check_open(&input.session).await?;

        PartStore::new(self.backend.as_ref(), &input.session)
            .list_parts(input.max_parts, input.page_token)
            .await
    }

    /// Assemble the listed parts into the destination object.
    ///
    /// # Errors
    ///
    /// Validation failures ([`MpuError::InvalidRequest`],
    /// [`MpuError::InvalidPartOrder`]) happen before any I/O. Stage failures
    /// carry the [`Stage`] they came from. If the destination was written but
    /// cleanup failed, [`MpuError::CleanupFailed`] carries the result.
    pub async fn complete_mpu(&self, input: CompleteMpuInput) -> EngineResult<MpuResult> {
        let CompleteMpuInput { session, parts } = input;
        validation::validate_session(&session, true)?;
        validation::validate_completed_parts(&parts, self.config.max_parts)?;
        let marker = self.check_open(&session).await?;

        let backend = self.backend.as_ref();
        let layout = ScratchLayout::for_session(&session);

        let survivors = ComposeTree::new(backend, &self.config, &layout, &session.scratch_bucket)
            .reduce(&parts)
            .await?;

        let consolidator = OverflowConsolidator::new(backend, &self.config, &session, &layout);
        let migrated = consolidator.migrate(&survivors).await?;
        let merged = consolidator.merge(&migrated).await?;

        let result = Finalizer::new(backend, &self.config, &session)
            .finalize(&merged, &parts, marker.metadata)
            .await?;

        if let Err(source) = Cleanup::new(backend, self.config.max_in_flight)
            .remove_parts(&session.scratch_bucket, &session.overflow_bucket, &layout)
            .await
        {
            error!(
                upload_id = %session.upload_id,
                error = %source,
                "destination written but scratch cleanup failed"
            );
            return Err(MpuError::CleanupFailed {
                result: Box::new(result),
                source,
            });
        }

        debug!(
            bucket = %result.bucket,
            key = %result.key,
            upload_id = %session.upload_id,
            parts = parts.len(),
            etag = %result.etag,
            "completed multipart upload"
        );
        Ok(result)
    }

    /// Discard an upload and every scratch object it owns.
    pub async fn abort_mpu(&self, session: &UploadSession) -> EngineResult<()> {
        validation::validate_session(session, true)?;
        self.check_open(session).await?;

        let removed = Cleanup::new(self.backend.as_ref(), self.config.max_in_flight)
            .remove_parts(
                &session.scratch_bucket,
                &session.overflow_bucket,
                &ScratchLayout::for_session(session),
            )
            .await
            .map_err(|e| MpuError::backend(Stage::Cleanup, e))?;

        debug!(
            bucket = %session.bucket,
            key = %session.key,
            upload_id = %session.upload_id,
            removed,
            "aborted multipart upload"
        );
        Ok(())
    }
}
