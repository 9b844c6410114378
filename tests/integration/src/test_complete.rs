//! Completion scenarios.

#[cfg(test)]
mod tests {
    use mpustack_core::backend::BackendClient;
    use mpustack_core::checksums::{compute_md5, decode_etag};
    use mpustack_core::MpuError;
    use mpustack_model::{CompleteMpuInput, CompletedPart, ObjectMetadata, UploadPartCopyInput};

    use crate::{DEST_BUCKET, OVERFLOW_BUCKET, SCRATCH_BUCKET, open_session, setup, upload_parts};

    /// The multipart ETag computed independently of the engine.
    fn expected_etag(parts: &[CompletedPart]) -> String {
        let mut concat = Vec::new();
        for part in parts {
            concat.extend(decode_etag(&part.etag).expect("hex etag"));
        }
        format!("\"{}-{}\"", compute_md5(&concat), parts.len())
    }

    #[tokio::test]
    async fn test_should_complete_ten_part_upload() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "ten.bin", ObjectMetadata::new()).await;
        let numbers: Vec<u32> = (1..=10).collect();
        let (parts, expected) = upload_parts(&engine, &session, &numbers).await;

        let result = engine
            .complete_mpu(CompleteMpuInput {
                session: session.clone(),
                parts: parts.clone(),
            })
            .await
            .expect("complete");

        assert_eq!(result.bucket, DEST_BUCKET);
        assert_eq!(result.key, "ten.bin");
        assert_eq!(result.etag, expected_etag(&parts));
        assert!(result.etag.ends_with("-10\""));

        let body = backend.get_object(DEST_BUCKET, "ten.bin").await.expect("get");
        assert_eq!(body, expected);

        let dest = backend.head_object(DEST_BUCKET, "ten.bin").await.expect("head");
        assert_eq!(result.version_id, dest.version_id);

        // One pass1 group, one pass2 group and no final merge.
        let stats = backend.stats();
        assert_eq!(stats.composes, 2);
        assert_eq!(stats.copies, 1);
    }

    #[tokio::test]
    async fn test_should_complete_large_upload_within_fan_in() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "large.bin", ObjectMetadata::new()).await;
        let numbers: Vec<u32> = (1..=1500).collect();
        let (parts, expected) = upload_parts(&engine, &session, &numbers).await;

        let result = engine
            .complete_mpu(CompleteMpuInput {
                session,
                parts: parts.clone(),
            })
            .await
            .expect("complete");

        assert_eq!(result.etag, expected_etag(&parts));
        let body = backend.get_object(DEST_BUCKET, "large.bin").await.expect("get");
        assert_eq!(body, expected);

        // 1500 parts: 47 pass1 nodes, 2 survivors, one final merge.
        let stats = backend.stats();
        assert_eq!(stats.composes, 47 + 2 + 1);
        assert!(stats.max_compose_sources <= 32);
    }

    #[tokio::test]
    async fn test_should_complete_upload_with_max_parts() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "max.bin", ObjectMetadata::new()).await;
        let numbers: Vec<u32> = (1..=10_000).collect();
        let (parts, expected) = upload_parts(&engine, &session, &numbers).await;

        let result = engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .expect("complete");

        assert!(result.etag.ends_with("-10000\""));
        let body = backend.get_object(DEST_BUCKET, "max.bin").await.expect("get");
        assert_eq!(body, expected);

        let stats = backend.stats();
        assert_eq!(stats.composes, 313 + 10 + 1);
        assert_eq!(stats.max_compose_sources, 32);
    }

    #[tokio::test]
    async fn test_should_only_assemble_listed_parts() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "gaps.bin", ObjectMetadata::new()).await;
        let (all, _) = upload_parts(&engine, &session, &[1, 2, 3, 7]).await;
        let listed: Vec<CompletedPart> = all
            .into_iter()
            .filter(|p| p.part_number != 2)
            .collect();
        let expected: Vec<u8> = [1, 3, 7]
            .iter()
            .flat_map(|&n| crate::part_body(n).to_vec())
            .collect();

        engine
            .complete_mpu(CompleteMpuInput {
                session,
                parts: listed,
            })
            .await
            .expect("complete");

        let body = backend.get_object(DEST_BUCKET, "gaps.bin").await.expect("get");
        assert_eq!(body, expected);
        assert!(backend.keys(SCRATCH_BUCKET, "gaps.bin-").is_empty());
    }

    #[tokio::test]
    async fn test_should_preserve_caller_metadata() {
        let (backend, engine) = setup();
        let mut metadata = ObjectMetadata::new();
        metadata.insert("content-type".to_owned(), "video/mp4".to_owned());
        metadata.insert("x-amz-meta-owner".to_owned(), "alice".to_owned());
        let session = open_session(&engine, "meta.mp4", metadata.clone()).await;
        let (parts, _) = upload_parts(&engine, &session, &[1, 2]).await;

        engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .expect("complete");

        let dest = backend.head_object(DEST_BUCKET, "meta.mp4").await.expect("head");
        assert_eq!(dest.metadata, metadata);
    }

    #[tokio::test]
    async fn test_should_remove_scratch_objects_after_completion() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "clean.bin", ObjectMetadata::new()).await;
        let numbers: Vec<u32> = (1..=100).collect();
        let (parts, _) = upload_parts(&engine, &session, &numbers).await;

        engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .expect("complete");

        assert!(backend.keys(SCRATCH_BUCKET, "").is_empty());
        assert!(backend.keys(OVERFLOW_BUCKET, "").is_empty());
        assert!(backend.contains(DEST_BUCKET, "clean.bin"));
    }

    #[tokio::test]
    async fn test_should_not_complete_twice() {
        let (_backend, engine) = setup();
        let session = open_session(&engine, "once.bin", ObjectMetadata::new()).await;
        let (parts, _) = upload_parts(&engine, &session, &[1]).await;

        engine
            .complete_mpu(CompleteMpuInput {
                session: session.clone(),
                parts: parts.clone(),
            })
            .await
            .expect("first complete");

        let err = engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .unwrap_err();
        assert!(matches!(err, MpuError::NoSuchUpload { .. }));
    }

    #[tokio::test]
    async fn test_should_complete_with_copied_part() {
        let (backend, engine) = setup();
        let session = open_session(&engine, "copy.bin", ObjectMetadata::new()).await;
        let (mut parts, _) = upload_parts(&engine, &session, &[1]).await;

        backend
            .put_object(mpustack_core::backend::PutObjectRequest {
                bucket: "library".to_owned(),
                key: "intro clip".to_owned(),
                body: bytes::Bytes::from_static(b"<copied>"),
                content_length: None,
                metadata: ObjectMetadata::new(),
            })
            .await
            .expect("put source");
        let copied = engine
            .upload_part_copy(UploadPartCopyInput {
                session: session.clone(),
                part_number: 2,
                copy_source: "library/intro%20clip".to_owned(),
            })
            .await
            .expect("upload part copy");
        parts.push(CompletedPart::new(2, copied.etag));

        engine
            .complete_mpu(CompleteMpuInput { session, parts })
            .await
            .expect("complete");

        let body = backend.get_object(DEST_BUCKET, "copy.bin").await.expect("get");
        let mut expected = crate::part_body(1).to_vec();
        expected.extend_from_slice(b"<copied>");
        assert_eq!(body, expected);
    }
}
