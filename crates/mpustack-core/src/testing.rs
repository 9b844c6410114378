//! Test backends shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{
    BackendClient, BackendResult, CopyRequest, ListPage, ListRequest, ObjectInfo,
    PutObjectRequest, RewriteProgress, RewriteRequest,
};
use crate::memory::InMemoryBackend;

/// Wraps [`InMemoryBackend`] so compose and rewrite calls stay pending for a
/// short while, recording how many overlap.
#[derive(Debug)]
pub(crate) struct SlowBackend {
    pub(crate) inner: InMemoryBackend,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowBackend {
    pub(crate) fn new(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Highest number of compose or rewrite calls seen at once.
    pub(crate) fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn hold<T, F>(&self, call: F) -> T
    where
        F: Future<Output = T>,
    {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        let out = call.await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

#[async_trait]
impl BackendClient for SlowBackend {
    async fn put_object(&self, req: PutObjectRequest) -> BackendResult<ObjectInfo> {
        self.inner.put_object(req).await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> BackendResult<ObjectInfo> {
        self.inner.head_object(bucket, key).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<Bytes> {
        self.inner.get_object(bucket, key).await
    }

    async fn list_objects(&self, req: ListRequest) -> BackendResult<ListPage> {
        self.inner.list_objects(req).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> BackendResult<()> {
        self.inner.delete_object(bucket, key).await
    }

    async fn compose(
        &self,
        bucket: &str,
        sources: &[String],
        dest: &str,
    ) -> BackendResult<ObjectInfo> {
        self.hold(self.inner.compose(bucket, sources, dest)).await
    }

    async fn copy_object(&self, req: CopyRequest) -> BackendResult<ObjectInfo> {
        self.inner.copy_object(req).await
    }

    async fn rewrite_step(&self, req: RewriteRequest) -> BackendResult<RewriteProgress> {
        self.hold(self.inner.rewrite_step(req)).await
    }
}
