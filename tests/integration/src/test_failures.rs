//! Validation and backend failure scenarios.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mpustack_core::memory::Op;
    use mpustack_core::{BackendError, InMemoryBackend, MpuConfig, MpuError, Stage};
    use mpustack_model::{CompleteMpuInput, CompletedPart, ObjectMetadata};

    use crate::{
        DEST_BUCKET, OVERFLOW_BUCKET, SCRATCH_BUCKET, engine_with, fast_config, open_session,
        setup, upload_parts,
    };

    fn unavailable() -> BackendError {
        BackendError::new(503, "backendError", "service unavailable")
    }

    #[tokio::test]
    async fn test_should_reject_unordered_parts_without_writes() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "order.bin", ObjectMetadata::new()).await;
        let (mut parts, _) = upload_parts(&engine, &session, &[1, 2, 3]).await;
        parts.swap(1, 2);
        let before = backend.stats();

        let err = engine
            .complete_mpu(CompleteMpuInput {
                session: session.clone(),
                parts,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, MpuError::InvalidPartOrder));
        assert_eq!(err.code(), "InvalidPartOrder");
        assert_eq!(backend.stats(), before);
        assert!(engine.verify(&session).await.is_ok());
    }

    #[tokio::test]
    async fn test_should_reject_empty_part_list_without_writes() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "empty.bin", ObjectMetadata::new()).await;
        let before = backend.stats();

        let err = engine
            .complete_mpu(CompleteMpuInput {
                session,
                parts: Vec::new(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code(), "InvalidRequest");
        assert_eq!(backend.stats(), before);
    }

    #[tokio::test]
    async fn test_should_reject_missing_overflow_bucket() {
        let (backend, engine) = setup();
        let mut session = open_session(&engine, "nobucket.bin", ObjectMetadata::new()).await;
        let (parts, _) = upload_parts(&engine, &session, &[1]).await;
        session.overflow_bucket.clear();
        let before = backend.stats();

        let err = engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .unwrap_err();
        assert!(matches!(err, MpuError::InvalidRequest { .. }));
        assert_eq!(backend.stats(), before);
    }

    #[tokio::test]
    async fn test_should_retry_transient_compose_and_copy_failures() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "flaky.bin", ObjectMetadata::new()).await;
        let numbers: Vec<u32> = (1..=64).collect();
        let (parts, _) = upload_parts(&engine, &session, &numbers).await;
        backend.inject_fault(Op::Compose, Some("pass1/2"), 2, unavailable());
        backend.inject_fault(Op::Copy, None, 1, unavailable());

        engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .expect("complete despite transient failures");

        // 2 pass1 groups, 1 pass2 group, 2 retried composes.
        let stats = backend.stats();
        assert_eq!(stats.composes, 2 + 1 + 2);
        assert_eq!(stats.copies, 2);
        assert!(backend.contains(DEST_BUCKET, "flaky.bin"));
    }

    #[tokio::test]
    async fn test_should_surface_stage_of_terminal_compose_failure() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "denied.bin", ObjectMetadata::new()).await;
        let numbers: Vec<u32> = (1..=40).collect();
        let (parts, _) = upload_parts(&engine, &session, &numbers).await;
        backend.inject_fault(
            Op::Compose,
            Some("pass2/"),
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

        assert_eq!(err.stage(), Some(Stage::ComposePass2));
        assert_eq!(err.code(), "forbidden");
        assert!(!backend.contains(DEST_BUCKET, "denied.bin"));
        // pass1 output stays behind for a later abort.
        assert_eq!(
            backend.keys(SCRATCH_BUCKET, "denied.bin-").len(),
            1 + 40 + 2
        );
        assert!(engine.verify(&session).await.is_ok());
    }

    #[tokio::test]
    async fn test_should_give_up_after_retry_budget() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "down.bin", ObjectMetadata::new()).await;
        let (parts, _) = upload_parts(&engine, &session, &[1]).await;
        backend.inject_fault(Op::Copy, None, 10, unavailable());

        let err = engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::CopyToDestination));
        assert_eq!(backend.stats().copies, u64::from(fast_config().retry_max_attempts));
    }

    #[tokio::test]
    async fn test_should_fail_when_rewrite_does_not_finish() {
        let backend = Arc::new(InMemoryBackend::new().with_rewrite_chunk(2));
        let config = fast_config();
        let engine = engine_with(
            &backend,
            MpuConfig {
                max_rewrite_steps: 3,
                ..config
            },
        );
        let session = open_session(&engine, "slow.bin", ObjectMetadata::new()).await;
        let (parts, _) = upload_parts(&engine, &session, &[1, 2]).await;

        let err = engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .unwrap_err();

        assert!(matches!(err, MpuError::RewriteIncomplete { steps: 3, .. }));
        assert_eq!(err.code(), "RequestTimeout");
        assert_eq!(backend.stats().rewrites, 3);
        assert!(!backend.contains(DEST_BUCKET, "slow.bin"));
    }

    #[tokio::test]
    async fn test_should_report_cleanup_failure_with_result() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "leak.bin", ObjectMetadata::new()).await;
        let (parts, _) = upload_parts(&engine, &session, &[1, 2]).await;
        backend.inject_fault(
            Op::Delete,
            Some("overflow/1"),
            1,
            BackendError::new(403, "forbidden", "denied"),
        );

        let err = engine
            .complete_mpu(CompleteMpuInput {
                session: session.clone(),
                parts: parts.clone(),
            })
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Cleanup));
        assert_eq!(err.code(), "InternalError");
        let MpuError::CleanupFailed { result, source } = err else {
            panic!("expected CleanupFailed");
        };
        assert_eq!(source.status, 403);
        assert_eq!(result.bucket, DEST_BUCKET);
        assert_eq!(result.key, "leak.bin");
        assert!(result.etag.ends_with("-2\""));
        assert!(backend.contains(DEST_BUCKET, "leak.bin"));
        let leftover = format!("leak.bin-{}/overflow/1", session.upload_id);
        assert!(backend.contains(OVERFLOW_BUCKET, &leftover));

        engine.abort_mpu(&session).await.expect("abort finishes cleanup");
        assert!(backend.keys(OVERFLOW_BUCKET, "leak.bin-").is_empty());
    }

    #[tokio::test]
    async fn test_should_reject_bad_etag_before_io() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "etag.bin", ObjectMetadata::new()).await;
        let before = backend.stats();

        let err = engine
            .complete_mpu(CompleteMpuInput {
                session,
                parts: vec![CompletedPart::new(1, "\"not-a-digest\"")],
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidRequest");
        assert_eq!(backend.stats(), before);
    }
}
