//! Abort scenarios.

#[cfg(test)]
mod tests {
    use mpustack_core::backend::BackendClient;
    use mpustack_core::memory::Op;
    use mpustack_core::{BackendError, MpuError, Stage};
    use mpustack_model::{CompleteMpuInput, ObjectMetadata, UploadSession};

    use crate::{DEST_BUCKET, OVERFLOW_BUCKET, SCRATCH_BUCKET, open_session, setup, upload_parts};

    #[tokio::test]
    async fn test_should_abort_upload_with_parts() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "abort.bin", ObjectMetadata::new()).await;
        upload_parts(&engine, &session, &[1, 2, 3]).await;

        engine.abort_mpu(&session).await.expect("abort");

        assert!(backend.keys(SCRATCH_BUCKET, "abort.bin-").is_empty());
        assert!(backend.keys(OVERFLOW_BUCKET, "abort.bin-").is_empty());
        assert!(matches!(
            engine.verify(&session).await,
            Err(MpuError::NoSuchUpload { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_abort_upload_without_parts() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "empty.bin", ObjectMetadata::new()).await;
        let before = backend.stats();

        engine.abort_mpu(&session).await.expect("abort");

        let after = backend.stats();
        assert_eq!(after.deletes - before.deletes, 1);
        assert!(backend.keys(SCRATCH_BUCKET, "").is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_abort_of_unknown_upload() {
        let (backend, engine) = setup();
        let session = UploadSession::new(
            DEST_BUCKET,
            SCRATCH_BUCKET,
            OVERFLOW_BUCKET,
            "ghost.bin",
            "no-such-upload",
        );

        let err = engine.abort_mpu(&session).await.unwrap_err();
        assert_eq!(err.code(), "NoSuchUpload");
        assert_eq!(backend.stats().writes(), 0);
    }

    #[tokio::test]
    async fn test_should_clean_up_after_failed_completion() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "failed.bin", ObjectMetadata::new()).await;
        // 1100 parts leave two survivors, so a final merge is needed.
        let numbers: Vec<u32> = (1..=1100).collect();
        let (parts, _) = upload_parts(&engine, &session, &numbers).await;
        backend.inject_fault(
            Op::Compose,
            Some("/final"),
            1,
            BackendError::new(403, "forbidden", "denied"),
        );

        let err = engine
            .complete_mpu(CompleteMpuInput {
                session: session.clone(),
                parts,
            })
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Merge));
        assert!(!backend.keys(SCRATCH_BUCKET, "failed.bin-").is_empty());
        assert!(!backend.keys(OVERFLOW_BUCKET, "failed.bin-").is_empty());

        engine.abort_mpu(&session).await.expect("abort");
        assert!(backend.keys(SCRATCH_BUCKET, "failed.bin-").is_empty());
        assert!(backend.keys(OVERFLOW_BUCKET, "failed.bin-").is_empty());
        assert!(!backend.contains(DEST_BUCKET, "failed.bin"));
    }

    #[tokio::test]
    async fn test_should_not_touch_other_uploads_of_same_key() {
        let (backend, engine) = setup();
        let first = open_session(&engine, "shared.bin", ObjectMetadata::new()).await;
        let second = open_session(&engine, "shared.bin", ObjectMetadata::new()).await;
        upload_parts(&engine, &first, &[1, 2]).await;
        let (parts, expected) = upload_parts(&engine, &second, &[1, 2]).await;

        engine.abort_mpu(&first).await.expect("abort first");
        assert!(engine.verify(&second).await.is_ok());

        engine
            .complete_mpu(CompleteMpuInput {
                session: second,
                parts,
            })
            .await
            .expect("complete second");
        let body = backend.get_object(DEST_BUCKET, "shared.bin").await.expect("get");
        assert_eq!(body, expected);
    }
}
